// Background clock for the control side. Ticks the sampler, then sleeps until
// the next sequencer deadline (or the poll interval, whichever is sooner).
// The sleep is a receive on the shutdown channel so dropping the transport
// wakes it immediately.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender};
use tracing::{debug, error};

use crate::middle::Sampler;

pub struct Transport {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Transport {
    pub fn spawn(sampler: Arc<Mutex<Sampler>>, poll: Duration) -> anyhow::Result<Self> {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let handle = std::thread::Builder::new()
            .name("hakata-transport".into())
            .spawn(move || {
                debug!(poll_ms = poll.as_millis() as u64, "transport running");
                loop {
                    let wait = {
                        let Ok(mut guard) = sampler.lock() else {
                            error!("sampler lock poisoned, transport exiting");
                            return;
                        };
                        let now = Instant::now();
                        guard.tick(now);
                        guard
                            .sequencer()
                            .time_until_next(now)
                            .map_or(poll, |d| d.min(poll))
                    };
                    match shutdown_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("transport stopped");
            })?;

        Ok(Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        // closing the channel is enough to wake the thread
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("transport thread panicked");
            }
        }
    }
}
