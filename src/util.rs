use anyhow::{anyhow, Result};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};
use tokio::sync::Notify;

/// Single slot channel. Sending overwrites the value not yet received, so the
/// receiver only ever sees the most recent one.
pub fn latest_value_channel<T>() -> (LatestSender<T>, LatestReceiver<T>) {
    let value = Arc::new(Mutex::new(None));
    let notify = Arc::new(Notify::new());
    let both_alive = Arc::new(AtomicBool::new(true));

    let sender = LatestSender {
        value: Arc::clone(&value),
        notify: Arc::clone(&notify),
        both_alive: Arc::clone(&both_alive),
    };
    let receiver = LatestReceiver {
        value,
        notify,
        both_alive,
    };
    (sender, receiver)
}

pub struct LatestSender<T> {
    value: Arc<Mutex<Option<T>>>,
    notify: Arc<Notify>,
    both_alive: Arc<AtomicBool>,
}

impl<T> LatestSender<T> {
    pub fn send(&self, value: T) -> Result<()> {
        if !self.both_alive.load(Ordering::SeqCst) {
            Err(anyhow!("Other end died"))
        } else {
            *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
            self.notify.notify_one();
            Ok(())
        }
    }
}

impl<T> Drop for LatestSender<T> {
    fn drop(&mut self) {
        self.both_alive.store(false, Ordering::SeqCst);
        self.notify.notify_one();
    }
}

pub struct LatestReceiver<T> {
    value: Arc<Mutex<Option<T>>>,
    notify: Arc<Notify>,
    both_alive: Arc<AtomicBool>,
}

impl<T> LatestReceiver<T> {
    pub async fn recv(&self) -> Result<T> {
        loop {
            if let Some(value) = self.try_recv() {
                return Ok(value);
            }
            if !self.both_alive.load(Ordering::SeqCst) {
                return Err(anyhow!("Sender died"));
            }
            self.notify.notified().await;
        }
    }

    /// Take the pending value without waiting.
    pub fn try_recv(&self) -> Option<T> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl<T> Drop for LatestReceiver<T> {
    fn drop(&mut self) {
        self.both_alive.store(false, Ordering::SeqCst);
    }
}
