use crate::domain::timer::{TimerScheduler, Timeout};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// One-shot timers on the current tokio runtime. Expiries are delivered on
/// `tx` and picked up by the session loop.
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<Timeout>,
    pending: Vec<JoinHandle<()>>,
}

impl TokioScheduler {
    /// Must be created from within a tokio runtime.
    pub fn new(tx: mpsc::UnboundedSender<Timeout>) -> Self {
        Self {
            tx,
            pending: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.pending.iter().filter(|h| !h.is_finished()).count()
    }
}

impl TimerScheduler for TokioScheduler {
    fn schedule_once(&mut self, timeout: Timeout, delay: Duration) {
        self.pending.retain(|h| !h.is_finished());

        let tx = self.tx.clone();
        trace!("Arming {:?} for {:?}", timeout, delay);
        self.pending.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(timeout);
        }));
    }

    fn cancel_all(&mut self) {
        for handle in self.pending.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timer::TimerKind;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = TokioScheduler::new(tx);
        let timeout = Timeout {
            kind: TimerKind::ScanTimeout,
            epoch: 7,
        };

        scheduler.schedule_once(timeout, Duration::from_secs(10));
        tokio::time::sleep(Duration::from_millis(9_999)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(rx.recv().await, Some(timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_drops_pending() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = TokioScheduler::new(tx);
        scheduler.schedule_once(
            Timeout {
                kind: TimerKind::ConnectTimeout,
                epoch: 1,
            },
            Duration::from_secs(1),
        );
        assert_eq!(scheduler.pending(), 1);

        scheduler.cancel_all();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(scheduler.pending(), 0);
    }
}
