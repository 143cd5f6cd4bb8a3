// SPDX-License-Identifier: MIT
//
// Background input reader.
//
// A dedicated thread calls the backend's `read_raw_event` in a loop and
// pushes every frame onto the driver's input queue. The main thread never
// blocks on the console; it waits on the queue instead, which timers and
// wakers can also interrupt.
//
// Shutdown: a stop flag is checked between reads. Cancellable readers
// return within their poll interval, so `stop` joins the thread. A reader
// that blocks in the OS indefinitely (the Windows console, stdin without
// `poll`) cannot be interrupted; its thread is detached instead, and
// whatever it reads after the stop is discarded.
//
// A failing or panicking read never takes the thread down: it is logged
// and treated as an empty read.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::backend::{InputReader, ReadOutcome};
use crate::event_loop::InputQueue;

/// Pause after a failed read, so a persistent error does not spin.
const ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Handle to the reader thread. Stops it on drop.
pub struct ReaderThread {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    cancellable: bool,
}

impl ReaderThread {
    /// Spawn the thread, moving `reader` into it.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the thread cannot be spawned.
    pub fn spawn(reader: Box<dyn InputReader>, queue: InputQueue) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let cancellable = reader.is_cancellable();

        let handle = thread::Builder::new()
            .name("conio-reader".into())
            .spawn(move || reader_loop(reader, &queue, &stop_flag))?;

        debug!(cancellable, "reader thread started");
        Ok(Self {
            handle: Some(handle),
            stop,
            cancellable,
        })
    }

    /// Whether the thread has exited (input closed, or stopped).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Signal the thread to stop; join it when its reader is cancellable.
    ///
    /// Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        let Some(handle) = self.handle.take() else {
            return;
        };
        if self.cancellable {
            if handle.join().is_err() {
                warn!("reader thread panicked");
            }
        } else {
            debug!("detaching blocking reader thread");
        }
    }
}

impl Drop for ReaderThread {
    fn drop(&mut self) {
        self.stop();
    }
}

#[allow(clippy::needless_pass_by_value)] // Owned by the thread closure.
fn reader_loop(mut reader: Box<dyn InputReader>, queue: &InputQueue, stop: &AtomicBool) {
    while !stop.load(Ordering::Relaxed) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| reader.read_raw_event()));
        if stop.load(Ordering::Relaxed) {
            break;
        }
        match outcome {
            Ok(Ok(ReadOutcome::Frame(frame))) => {
                trace!(?frame, "frame");
                queue.push(frame);
            }
            Ok(Ok(ReadOutcome::Idle)) => {}
            Ok(Ok(ReadOutcome::Closed)) => {
                debug!("input closed");
                break;
            }
            Ok(Err(err)) => {
                warn!(%err, "read failed");
                thread::sleep(ERROR_BACKOFF);
            }
            Err(_) => {
                warn!("read panicked");
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    // Unblock a driver waiting on an empty queue.
    queue.waker().wake();
}
