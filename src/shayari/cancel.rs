use std::future::Future;

use tokio::sync::watch;

use super::error::PipelineError;

/// Run-level cancellation. Cloned tokens all observe one `cancel()` call.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `cancel()` has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives inside every clone, so wait_for only errors if it is gone.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Race `fut` against cancellation. A cancelled future is dropped, which
    /// kills any child process it spawned with `kill_on_drop`.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        if self.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(PipelineError::Cancelled),
            result = fut => result,
        }
    }

    /// Cancel this token when the process receives Ctrl-C.
    pub fn cancel_on_ctrl_c(&self) {
        let token = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                crate::ui::emit(
                    crate::ui::Level::Warn,
                    "shayari.cancel",
                    "Interrupt received, cancelling in-flight items...",
                    None,
                );
                token.cancel();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn guard_passes_through_when_not_cancelled() {
        let token = CancelToken::new();
        let value = token.guard(async { Ok::<_, PipelineError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn cancel_interrupts_pending_work() {
        let token = CancelToken::new();
        let clone = token.clone();
        let handle = tokio::spawn(async move {
            clone
                .guard(async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok::<_, PipelineError>(())
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[tokio::test]
    async fn already_cancelled_token_never_polls_the_future() {
        let token = CancelToken::new();
        token.cancel();
        let ran = std::sync::atomic::AtomicBool::new(false);
        let result = token
            .guard(async {
                ran.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok::<_, PipelineError>(())
            })
            .await;
        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
    }
}
