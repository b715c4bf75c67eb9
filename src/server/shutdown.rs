//! Graceful-shutdown plumbing: one [`Notifier`] per server, one [`Listener`]
//! per task that needs to wind down when the server does.

use std::sync::Mutex;
use tokio::sync::{mpsc, watch};

// Broadcasts the shutdown signal and waits for subscribers to finish. The
// completion side works by channel closure: every Listener holds a clone of
// an mpsc sender and linger() returns once the last clone is gone.
#[derive(Debug)]
pub struct Notifier {
    signal_tx: watch::Sender<bool>,
    done_tx: Mutex<Option<mpsc::Sender<()>>>,
    done_rx: tokio::sync::Mutex<mpsc::Receiver<()>>,
}

impl Notifier {
    pub fn new() -> Notifier {
        let (signal_tx, _) = watch::channel(false);
        let (done_tx, done_rx) = mpsc::channel(1);
        Notifier {
            signal_tx,
            done_tx: Mutex::new(Some(done_tx)),
            done_rx: tokio::sync::Mutex::new(done_rx),
        }
    }

    pub fn subscribe(&self) -> Listener {
        Listener {
            signal_rx: self.signal_tx.subscribe(),
            _done: self.done_tx.lock().unwrap().clone(),
        }
    }

    // Signals every subscribed task to wind down.
    pub fn notify(&self) {
        let _ = self.signal_tx.send(true);
    }

    // Waits until every Listener handed out so far has been dropped. The
    // notifier's own sender clone is dropped here, so the channel closing
    // can only mean that no subscriber is left.
    pub async fn linger(&self) {
        drop(self.done_tx.lock().unwrap().take());
        let mut done_rx = self.done_rx.lock().await;
        while done_rx.recv().await.is_some() {}
    }
}

// Held by tasks that participate in graceful shutdown.
#[derive(Debug, Clone)]
pub struct Listener {
    signal_rx: watch::Receiver<bool>,
    _done: Option<mpsc::Sender<()>>,
}

impl Listener {
    /// Resolves once shutdown has been signalled. Safe to poll repeatedly.
    pub async fn listen(&mut self) {
        while !*self.signal_rx.borrow() {
            if self.signal_rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn listeners_wake_on_notify() {
        let notifier = Notifier::new();
        let mut listener = notifier.subscribe();
        let waiter = tokio::spawn(async move {
            listener.listen().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        notifier.notify();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn linger_waits_for_subscribers() {
        let notifier = Notifier::new();
        let mut listener = notifier.subscribe();
        let task = tokio::spawn(async move {
            listener.listen().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(listener);
        });
        notifier.notify();
        tokio::time::timeout(Duration::from_secs(1), notifier.linger()).await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn linger_returns_immediately_without_subscribers() {
        let notifier = Notifier::new();
        notifier.notify();
        tokio::time::timeout(Duration::from_secs(1), notifier.linger()).await.unwrap();
    }
}
