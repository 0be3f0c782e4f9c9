//! Explicit cancellation for in-flight requests.
//!
//! A view that abandons a fetch cancels its token; the request future
//! racing against the paired receiver resolves to a `Cancelled` error.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use super::{ApiError, ApiResult};

/// Owner side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
}

/// Observer side, handed to the task that does the work.
#[derive(Debug, Clone)]
pub struct CancellationReceiver {
    rx: watch::Receiver<bool>,
}

impl CancellationToken {
    /// Create a new token and its receiver.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Self, CancellationReceiver) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, CancellationReceiver { rx })
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl CancellationReceiver {
    /// Resolves once the token is cancelled. Never resolves if the token
    /// is dropped without being cancelled.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Race `fut` against cancellation. The future is dropped as soon as
    /// the token fires.
    pub async fn run_until_cancelled<T, F>(&mut self, fut: F) -> ApiResult<T>
    where
        F: Future<Output = ApiResult<T>>,
    {
        if self.is_cancelled() {
            return Err(ApiError::cancelled());
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(ApiError::cancelled()),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_receiver() {
        let (token, mut rx) = CancellationToken::new();
        assert!(!rx.is_cancelled());

        let waiter = tokio::spawn(async move {
            rx.cancelled().await;
            true
        });
        token.cancel();

        let woke = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("receiver should wake")
            .expect("task should not panic");
        assert!(woke);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_run_until_cancelled() {
        let (token, mut rx) = CancellationToken::new();
        let ok: ApiResult<u32> = rx.run_until_cancelled(async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        token.cancel();
        let err = rx
            .run_until_cancelled(async { Ok::<_, ApiError>(7) })
            .await
            .unwrap_err();
        assert!(err.is_cancelled());

        let (token, mut rx) = CancellationToken::new();
        let slow = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, ApiError>(())
        };
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });
        assert!(rx.run_until_cancelled(slow).await.unwrap_err().is_cancelled());
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_token_never_cancels() {
        let (token, mut rx) = CancellationToken::new();
        drop(token);

        let result = tokio::time::timeout(Duration::from_millis(50), rx.cancelled()).await;
        assert!(result.is_err());
    }
}
