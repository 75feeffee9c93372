//! Last-write-wins coalescing of rapid edits.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Delays values until no new value has arrived for `quiet`, then hands only
/// the latest one to the apply callback.
///
/// Applications run on a single task, one at a time, in the order they
/// settle. Dropping or cancelling the debouncer discards anything pending.
pub struct Debouncer<T> {
    tx: mpsc::UnboundedSender<T>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn spawn<F, Fut>(quiet: Duration, mut apply: F) -> Self
    where
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<T>();
        let task = tokio::spawn(async move {
            while let Some(mut pending) = rx.recv().await {
                loop {
                    tokio::select! {
                        next = rx.recv() => match next {
                            Some(value) => pending = value,
                            None => break,
                        },
                        _ = tokio::time::sleep(quiet) => break,
                    }
                }
                apply(pending).await;
            }
        });
        Self { tx, task }
    }

    /// Queue a value, restarting the quiet period. Returns false once cancelled.
    pub fn push(&self, value: T) -> bool {
        !self.task.is_finished() && self.tx.send(value).is_ok()
    }

    /// Drop any pending value and stop the timer task.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.task.is_finished()
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl FnMut(T) -> std::future::Ready<()> + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let apply = move |v: T| {
            sink.lock().unwrap().push(v);
            std::future::ready(())
        };
        (seen, apply)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_last_value() {
        let (seen, apply) = recorder::<String>();
        let d = Debouncer::spawn(Duration::from_millis(500), apply);
        for (i, v) in ["a", "ab", "abc", "abcd", "abcde"].into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(40)).await;
            }
            assert!(d.push(v.to_string()));
        }
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(seen.lock().unwrap().is_empty(), "quiet period not over yet");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["abcde".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn separated_edits_apply_in_order() {
        let (seen, apply) = recorder::<u16>();
        let d = Debouncer::spawn(Duration::from_millis(100), apply);
        d.push(1);
        tokio::time::sleep(Duration::from_millis(300)).await;
        d.push(2);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_pending_value() {
        let (seen, apply) = recorder::<u16>();
        let d = Debouncer::spawn(Duration::from_millis(100), apply);
        d.push(7);
        d.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(seen.lock().unwrap().is_empty());
        assert!(d.is_cancelled());
        assert!(!d.push(8));
    }
}
