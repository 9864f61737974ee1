//! Timer-based coalescing of file-write activity.
//!
//! Each [`SettleHandle::touch`] pushes the single pending deadline out by the settle window.
//! The queue emits one `()` only when a full window passes without another touch, so a burst
//! of writes yields exactly one notification after the last of them.

use std::time::Duration;
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    time::{sleep, Instant},
};

#[derive(Debug, Clone)]
pub struct SettleHandle {
    touch_tx: UnboundedSender<()>,
}

impl SettleHandle {
    /// Records raw write activity. Returns false once the queue has shut down.
    pub fn touch(&self) -> bool {
        self.touch_tx.send(()).is_ok()
    }
}

pub struct SettleQueue;

impl SettleQueue {
    /// Spawns the queue on the current tokio runtime.
    ///
    /// The output stream ends when every handle is dropped; a deadline still pending at that
    /// point is discarded rather than flushed.
    pub fn spawn(window: Duration) -> (SettleHandle, UnboundedReceiver<()>) {
        let (touch_tx, mut touch_rx) = unbounded_channel::<()>();
        let (settled_tx, settled_rx) = unbounded_channel::<()>();

        tokio::spawn(async move {
            let timer = sleep(window);
            tokio::pin!(timer);

            loop {
                // Idle until the first write of a burst
                if touch_rx.recv().await.is_none() {
                    break;
                }
                timer.as_mut().reset(Instant::now() + window);
                let mut touches = 1usize;

                loop {
                    tokio::select! {
                        touched = touch_rx.recv() => match touched {
                            Some(()) => {
                                touches += 1;
                                timer.as_mut().reset(Instant::now() + window);
                            }
                            None => {
                                tracing::debug!("[Settle] All handles dropped with a change pending");
                                return;
                            }
                        },
                        () = &mut timer => {
                            tracing::debug!("[Settle] Settled after {} write events", touches);
                            if settled_tx.send(()).is_err() {
                                return;
                            }
                            break;
                        }
                    }
                }
            }
        });

        (SettleHandle { touch_tx }, settled_rx)
    }
}
