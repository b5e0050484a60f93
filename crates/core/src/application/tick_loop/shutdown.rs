// Stop signal for the tick loop

use tokio::sync::watch;

/// Handle the loop checks between ticks and awaits while idle
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once a stop was requested or the sender was dropped
    pub async fn wait(&mut self) {
        // `wait_for` checks the current value before waiting
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

/// Owned by the daemon; `shutdown` stops every loop holding a token
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}
