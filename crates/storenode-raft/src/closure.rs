//! Completion handle for submitted commands
//!
//! A [`StoreClosure`] travels with a command from submission until the
//! command is applied (or rejected). It is consumed by [`StoreClosure::complete`]
//! and [`StoreClosure::fail`], so it can only fire once. Dropping it unresolved
//! fails it with [`RaftError::Internal`], so it also cannot fire zero times.

use std::fmt;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::RaftError;

type Callback = Box<dyn FnOnce(Result<Vec<u8>, RaftError>) + Send + 'static>;

enum Sink {
    Channel(oneshot::Sender<Result<Vec<u8>, RaftError>>),
    Callback(Callback),
}

/// Single-fire success/failure handle for one command
pub struct StoreClosure {
    sink: Option<Sink>,
}

impl StoreClosure {
    /// Closure backed by a oneshot channel; await the returned [`CommandFuture`]
    pub fn channel() -> (Self, CommandFuture) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sink: Some(Sink::Channel(tx)),
            },
            CommandFuture { rx },
        )
    }

    /// Closure that invokes `f` with the outcome
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce(Result<Vec<u8>, RaftError>) + Send + 'static,
    {
        Self {
            sink: Some(Sink::Callback(Box::new(f))),
        }
    }

    /// Resolve successfully with the state machine's response bytes
    pub fn complete(mut self, data: Vec<u8>) {
        self.resolve(Ok(data));
    }

    /// Resolve with an error
    pub fn fail(mut self, error: RaftError) {
        self.resolve(Err(error));
    }

    fn resolve(&mut self, outcome: Result<Vec<u8>, RaftError>) {
        match self.sink.take() {
            // Receiver gone means the caller stopped waiting
            Some(Sink::Channel(tx)) => {
                let _ = tx.send(outcome);
            }
            Some(Sink::Callback(f)) => f(outcome),
            None => {}
        }
    }
}

impl Drop for StoreClosure {
    fn drop(&mut self) {
        if self.sink.is_some() {
            self.resolve(Err(RaftError::Internal(
                "command closure dropped without completion".to_string(),
            )));
        }
    }
}

impl fmt::Debug for StoreClosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.sink {
            Some(Sink::Channel(_)) => "channel",
            Some(Sink::Callback(_)) => "callback",
            None => "resolved",
        };
        f.debug_struct("StoreClosure").field("sink", &kind).finish()
    }
}

/// Receiving side of [`StoreClosure::channel`]
#[derive(Debug)]
pub struct CommandFuture {
    rx: oneshot::Receiver<Result<Vec<u8>, RaftError>>,
}

impl CommandFuture {
    /// Wait for the command outcome
    pub async fn wait(self) -> Result<Vec<u8>, RaftError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(RaftError::Shutdown),
        }
    }

    /// Wait for the command outcome for at most `timeout`
    pub async fn wait_timeout(self, timeout: Duration) -> Result<Vec<u8>, RaftError> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RaftError::Internal(format!(
                "timed out after {}ms waiting for command completion",
                timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_channel_complete() {
        let (closure, fut) = StoreClosure::channel();
        closure.complete(b"ok".to_vec());
        assert_eq!(fut.wait().await.unwrap(), b"ok".to_vec());
    }

    #[tokio::test]
    async fn test_channel_fail() {
        let (closure, fut) = StoreClosure::channel();
        closure.fail(RaftError::apply_failed("boom"));
        let err = fut.wait().await.unwrap_err();
        assert!(matches!(err, RaftError::ApplyFailed(ref m) if m == "boom"));
    }

    #[tokio::test]
    async fn test_dropped_closure_fails() {
        let (closure, fut) = StoreClosure::channel();
        drop(closure);
        assert!(matches!(fut.wait().await, Err(RaftError::Internal(_))));
    }

    #[test]
    fn test_callback_fires_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let closure = StoreClosure::from_fn(move |outcome| {
            assert!(outcome.is_ok());
            seen.fetch_add(1, Ordering::SeqCst);
        });

        closure.complete(Vec::new());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_fires_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let closure = StoreClosure::from_fn(move |outcome| {
            assert!(outcome.is_err());
            seen.fetch_add(1, Ordering::SeqCst);
        });

        drop(closure);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wait_timeout() {
        let (_closure, fut) = StoreClosure::channel();
        let err = fut.wait_timeout(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, RaftError::Internal(_)));
    }
}
