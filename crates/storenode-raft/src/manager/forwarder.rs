//! Leader Forwarder
//!
//! Ships a command from a follower to the current leader of its group and
//! translates the leader's answer into a closure outcome. One attempt only:
//! a rejected or failed forward is reported, never retried.

use std::sync::Arc;
use std::time::Duration;

use tracing::Span;

use crate::engine::RaftEngine;
use crate::network::{CommandClient, StoreCommandRequest};
use crate::{GroupId, RaftError, StoreClosure, StoreCommand};

pub struct LeaderForwarder {
    group: GroupId,
    engine: Arc<dyn RaftEngine>,
    client: Arc<dyn CommandClient>,
    timeout: Duration,
    span: Span,
}

impl LeaderForwarder {
    pub fn new(
        group: GroupId,
        engine: Arc<dyn RaftEngine>,
        client: Arc<dyn CommandClient>,
        timeout: Duration,
        span: Span,
    ) -> Self {
        Self {
            group,
            engine,
            client,
            timeout,
            span,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Forward `command` to the leader; `closure` reflects the leader's answer.
    ///
    /// Transport failures (including the timeout) and an unknown leader are
    /// returned as errors *and* delivered to the closure.
    pub async fn forward(&self, command: StoreCommand, closure: StoreClosure) -> Result<(), RaftError> {
        // Leadership can move here after the caller's role check
        if self.engine.is_leader() {
            tracing::warn!(parent: &self.span, group = %self.group, "Became leader during submit, forwarding to the reported leader");
        }

        let Some(leader) = self.engine.current_leader() else {
            let err = RaftError::not_leader(self.group.as_str(), None);
            tracing::warn!(parent: &self.span, "No leader known, cannot forward {} command", command.action());
            closure.fail(err.clone());
            return Err(err);
        };

        let action = command.action();
        let request = StoreCommandRequest {
            group_id: self.group.to_string(),
            action: action.code() as u32,
            data: command.into_data(),
        };

        tracing::debug!(parent: &self.span, %leader, %action, "Forwarding command to leader");

        let outcome = tokio::time::timeout(self.timeout, self.client.store_command(&leader, request)).await;
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(self.transport_failure(&leader.to_string(), e.to_string(), closure));
            }
            Err(_) => {
                let reason = format!("timed out after {}ms", self.timeout.as_millis());
                return Err(self.transport_failure(&leader.to_string(), reason, closure));
            }
        };

        if response.status {
            closure.complete(Vec::new());
        } else {
            tracing::warn!(
                parent: &self.span,
                %leader,
                message = %response.message,
                "Leader rejected forwarded command"
            );
            closure.fail(RaftError::ForwardRejected {
                leader: leader.to_string(),
                message: response.message,
            });
        }
        Ok(())
    }

    fn transport_failure(&self, leader: &str, reason: String, closure: StoreClosure) -> RaftError {
        let err = RaftError::ForwardTransport {
            leader: leader.to_string(),
            reason,
        };
        tracing::warn!(parent: &self.span, error = %err, "Forward to leader failed");
        closure.fail(err.clone());
        err
    }
}
