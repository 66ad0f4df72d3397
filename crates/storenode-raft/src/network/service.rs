//! Raft gRPC Service
//!
//! Hand-written tonic client and server for the `storenode.raft.Raft` service:
//! - `RaftRpc`: openraft traffic (vote, append_entries, install_snapshot)
//! - `StoreCommand`: commands forwarded from followers to the leader

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tonic::{Request, Response, Status};

use super::context::RpcContext;
use super::models::{StoreCommandRequest, StoreCommandResponse};
use crate::RaftError;

const SERVICE_NAME: &str = "storenode.raft.Raft";

/// Raft RPC request message
#[derive(Clone, PartialEq, prost::Message)]
pub struct RaftRpcRequest {
    /// Replication group id (e.g. "hugegraph-g")
    #[prost(string, tag = "1")]
    pub group_id: String,

    /// RPC type: "vote", "append_entries", "install_snapshot"
    #[prost(string, tag = "2")]
    pub rpc_type: String,

    /// Bincode-serialized openraft request
    #[prost(bytes = "vec", tag = "3")]
    pub payload: Vec<u8>,
}

/// Raft RPC response message
#[derive(Clone, PartialEq, prost::Message)]
pub struct RaftRpcResponse {
    /// Bincode-serialized `Result` returned by the target raft instance
    #[prost(bytes = "vec", tag = "1")]
    pub payload: Vec<u8>,

    /// Routing or decoding error; the payload is empty when set
    #[prost(string, tag = "2")]
    pub error: String,
}

/// gRPC client module
pub mod raft_client {
    use super::*;
    use tonic::codegen::*;

    #[derive(Debug, Clone)]
    pub struct RaftClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl RaftClient<tonic::transport::Channel> {
        pub fn new(channel: tonic::transport::Channel) -> Self {
            let inner = tonic::client::Grpc::new(channel);
            Self { inner }
        }
    }

    impl<T> RaftClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError> + std::fmt::Debug,
        T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
    {
        /// Send a Raft RPC
        pub async fn raft_rpc(
            &mut self,
            request: impl tonic::IntoRequest<RaftRpcRequest>,
        ) -> std::result::Result<tonic::Response<RaftRpcResponse>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| tonic::Status::new(tonic::Code::Unknown, format!("Service not ready: {:?}", e)))?;

            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/storenode.raft.Raft/RaftRpc");
            let mut req = request.into_request();
            req.extensions_mut().insert(GrpcMethod::new(SERVICE_NAME, "RaftRpc"));
            self.inner.unary(req, path, codec).await
        }

        /// Forward a store command to the group leader
        pub async fn store_command(
            &mut self,
            request: impl tonic::IntoRequest<StoreCommandRequest>,
        ) -> std::result::Result<tonic::Response<StoreCommandResponse>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| tonic::Status::new(tonic::Code::Unknown, format!("Service not ready: {:?}", e)))?;

            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/storenode.raft.Raft/StoreCommand");
            let mut req = request.into_request();
            req.extensions_mut().insert(GrpcMethod::new(SERVICE_NAME, "StoreCommand"));
            self.inner.unary(req, path, codec).await
        }
    }
}

/// gRPC server module
pub mod raft_server {
    use super::*;
    use tonic::codegen::*;

    /// Raft service trait
    #[async_trait::async_trait]
    pub trait Raft: std::marker::Send + std::marker::Sync + 'static {
        async fn raft_rpc(
            &self,
            request: tonic::Request<RaftRpcRequest>,
        ) -> std::result::Result<tonic::Response<RaftRpcResponse>, tonic::Status>;

        async fn store_command(
            &self,
            request: tonic::Request<StoreCommandRequest>,
        ) -> std::result::Result<tonic::Response<StoreCommandResponse>, tonic::Status>;
    }

    #[derive(Debug)]
    pub struct RaftServer<T: Raft> {
        inner: Arc<T>,
    }

    impl<T: Raft> RaftServer<T> {
        pub fn new(inner: T) -> Self {
            Self { inner: Arc::new(inner) }
        }

        pub fn from_arc(inner: Arc<T>) -> Self {
            Self { inner }
        }
    }

    impl<T: Raft> Clone for RaftServer<T> {
        fn clone(&self) -> Self {
            Self {
                inner: self.inner.clone(),
            }
        }
    }

    impl<T: Raft> tonic::server::NamedService for RaftServer<T> {
        const NAME: &'static str = "storenode.raft.Raft";
    }

    impl<T, B> tonic::codegen::Service<http::Request<B>> for RaftServer<T>
    where
        T: Raft,
        B: Body + std::marker::Send + 'static,
        B::Error: Into<StdError> + std::marker::Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = std::convert::Infallible;
        type Future = BoxFuture<Self::Response, Self::Error>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let inner = self.inner.clone();

            match req.uri().path() {
                "/storenode.raft.Raft/RaftRpc" => {
                    let fut = async move {
                        let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                        let res = grpc.unary(RaftRpcSvc(inner), req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/storenode.raft.Raft/StoreCommand" => {
                    let fut = async move {
                        let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                        let res = grpc.unary(StoreCommandSvc(inner), req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                _ => Box::pin(async move {
                    let mut response = http::Response::new(tonic::body::empty_body());
                    let headers = response.headers_mut();
                    // 12 = UNIMPLEMENTED
                    headers.insert("grpc-status", http::HeaderValue::from_static("12"));
                    headers.insert(
                        http::header::CONTENT_TYPE,
                        http::HeaderValue::from_static("application/grpc"),
                    );
                    Ok(response)
                }),
            }
        }
    }

    struct RaftRpcSvc<T: Raft>(Arc<T>);

    impl<T: Raft> tonic::server::UnaryService<RaftRpcRequest> for RaftRpcSvc<T> {
        type Response = RaftRpcResponse;
        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

        fn call(&mut self, request: tonic::Request<RaftRpcRequest>) -> Self::Future {
            let inner = self.0.clone();
            Box::pin(async move { inner.raft_rpc(request).await })
        }
    }

    struct StoreCommandSvc<T: Raft>(Arc<T>);

    impl<T: Raft> tonic::server::UnaryService<StoreCommandRequest> for StoreCommandSvc<T> {
        type Response = StoreCommandResponse;
        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

        fn call(&mut self, request: tonic::Request<StoreCommandRequest>) -> Self::Future {
            let inner = self.0.clone();
            Box::pin(async move { inner.store_command(request).await })
        }
    }
}

/// Raft gRPC service implementation
pub struct RaftService {
    context: Arc<RpcContext>,
}

impl RaftService {
    pub fn new(context: Arc<RpcContext>) -> Self {
        Self { context }
    }
}

#[async_trait::async_trait]
impl raft_server::Raft for RaftService {
    async fn raft_rpc(&self, request: Request<RaftRpcRequest>) -> Result<Response<RaftRpcResponse>, Status> {
        let req = request.into_inner();

        let result = match req.rpc_type.as_str() {
            "vote" => self.context.handle_vote(&req.group_id, &req.payload).await,
            "append_entries" => self.context.handle_append_entries(&req.group_id, &req.payload).await,
            "install_snapshot" => self.context.handle_install_snapshot(&req.group_id, &req.payload).await,
            _ => {
                return Err(Status::invalid_argument(format!("Unknown RPC type: {}", req.rpc_type)));
            }
        };

        match result {
            Ok(payload) => Ok(Response::new(RaftRpcResponse {
                payload,
                error: String::new(),
            })),
            Err(e) => Ok(Response::new(RaftRpcResponse {
                payload: Vec::new(),
                error: e.to_string(),
            })),
        }
    }

    async fn store_command(
        &self,
        request: Request<StoreCommandRequest>,
    ) -> Result<Response<StoreCommandResponse>, Status> {
        let response = self.context.handle_store_command(request.into_inner()).await;
        Ok(Response::new(response))
    }
}

/// Running shared RPC server
#[derive(Debug)]
pub struct RpcServerHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RpcServerHandle {
    /// Address the server is bound to (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting requests and wait for the server task to end
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }
}

/// Bind the shared RPC server and serve every group registered in `context`.
///
/// Binding happens before this returns so address conflicts surface as
/// [`RaftError::Initialization`].
pub async fn start_rpc_server(
    addr: SocketAddr,
    context: Arc<RpcContext>,
    concurrency_per_connection: usize,
) -> Result<RpcServerHandle, RaftError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| RaftError::Initialization(format!("Failed to bind rpc server to {}: {}", addr, e)))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| RaftError::Initialization(format!("Failed to read rpc server address: {}", e)))?;
    let incoming = tonic::transport::server::TcpIncoming::from_listener(listener, true, None)
        .map_err(|e| RaftError::Initialization(format!("Failed to serve {}: {}", local_addr, e)))?;

    let span = context.span().clone();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let router = tonic::transport::Server::builder()
        .concurrency_limit_per_connection(concurrency_per_connection)
        .add_service(raft_server::RaftServer::new(RaftService::new(context)));

    let task = tokio::spawn(async move {
        tracing::info!(parent: &span, addr = %local_addr, "Raft rpc server listening");
        let shutdown = async {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = router.serve_with_incoming_shutdown(incoming, shutdown).await {
            tracing::error!(parent: &span, error = %e, "Raft rpc server failed");
        }
        tracing::info!(parent: &span, addr = %local_addr, "Raft rpc server stopped");
    });

    Ok(RpcServerHandle {
        local_addr,
        shutdown: Some(shutdown_tx),
        task,
    })
}
