//! # Session Driver
//!
//! Runs a [`Session`] on its own control thread:
//! - **Inputs**: UI input arrives over a crossbeam channel
//! - **Ticks**: a 10 ms ticker fires due continuations
//! - **Shutdown**: a dedicated channel stops and joins the thread
//!
//! The session is built *on* the control thread, so backends holding
//! thread-bound device handles (a CPAL stream) never cross threads.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::audio::AudioBackend;
use crate::scores::ScoreStore;
use crate::session::{Input, Session};

/// Resolution of the control timeline.
pub const TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Handle to a running control thread. Dropping it shuts the thread down.
#[derive(Debug)]
pub struct SessionHandle {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Stops the session (silencing its noise) and waits for the thread.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("[DRIVER] Control thread panicked");
            }
        }
    }
}

/// Spawns the control thread. `build` runs on that thread and creates the
/// session; input is read from `inputs` until it disconnects or the handle is
/// dropped.
pub fn spawn_session<F, B, S>(build: F, inputs: Receiver<Input>) -> SessionHandle
where
    F: FnOnce() -> Session<B, S> + Send + 'static,
    B: AudioBackend + 'static,
    S: ScoreStore + 'static,
{
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);

    let thread_handle = thread::spawn(move || {
        log::debug!("[DRIVER] Control thread starting");
        let mut session = build();
        let start = Instant::now();
        let ticker = crossbeam_channel::tick(TICK_INTERVAL);

        loop {
            crossbeam_channel::select! {
                recv(inputs) -> msg => match msg {
                    Ok(input) => {
                        // Illegal input is already logged by the session.
                        let _ = session.handle(input, start.elapsed());
                    }
                    Err(_) => {
                        log::debug!("[DRIVER] Input channel closed");
                        break;
                    }
                },
                recv(ticker) -> _ => session.tick(start.elapsed()),
                recv(shutdown_rx) -> _ => {
                    log::debug!("[DRIVER] Received shutdown signal");
                    break;
                }
            }
        }

        session.shutdown();
        log::debug!("[DRIVER] Control thread finished");
    });

    SessionHandle {
        shutdown_tx,
        thread_handle: Some(thread_handle),
    }
}
