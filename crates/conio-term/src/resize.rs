// SPDX-License-Identifier: MIT
//
// Resize sampling for consoles that never signal size changes.
//
// A background thread probes the console size at a fixed interval. While
// the user drags a window edge the size changes on every probe, and
// publishing each intermediate size would reallocate and repaint the
// screen for nothing. A size is published only once two consecutive
// samples agree and differ from the last published size.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::backend::{Size, SizeProbe};
use crate::event_loop::{InputQueue, RawInputFrame};

/// Two-sample stability filter.
#[derive(Debug, Clone)]
pub struct ResizeDebouncer {
    published: Size,
    candidate: Option<Size>,
}

impl ResizeDebouncer {
    #[must_use]
    pub const fn new(initial: Size) -> Self {
        Self {
            published: initial,
            candidate: None,
        }
    }

    /// Feed one sample. Returns the size to publish, if this sample
    /// confirms a new one.
    pub fn sample(&mut self, size: Size) -> Option<Size> {
        if size == self.published {
            self.candidate = None;
            return None;
        }
        if self.candidate == Some(size) {
            self.candidate = None;
            self.published = size;
            return Some(size);
        }
        self.candidate = Some(size);
        None
    }

    #[must_use]
    pub const fn published(&self) -> Size {
        self.published
    }
}

/// Handle to the sampling thread. Stops it on drop.
pub struct ResizeSampler {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl ResizeSampler {
    /// Start sampling `probe` every `interval`, pushing confirmed sizes
    /// onto `queue` as `Resize` frames.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the thread cannot be spawned.
    pub fn spawn(
        probe: SizeProbe,
        initial: Size,
        interval: Duration,
        queue: InputQueue,
    ) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("conio-resize".into())
            .spawn(move || {
                let mut debouncer = ResizeDebouncer::new(initial);
                while !stop_flag.load(Ordering::Relaxed) {
                    thread::park_timeout(interval);
                    if stop_flag.load(Ordering::Relaxed) {
                        break;
                    }
                    let Some(size) = probe().filter(|s| !s.is_empty()) else {
                        continue;
                    };
                    if let Some(size) = debouncer.sample(size) {
                        debug!(%size, "console resized");
                        queue.push(RawInputFrame::Resize(size));
                    }
                }
            })?;

        debug!(?interval, "resize sampler started");
        Ok(Self {
            handle: Some(handle),
            stop,
        })
    }

    /// Stop and join the thread. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("resize sampler thread panicked");
            }
        }
    }
}

impl Drop for ResizeSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::time::Instant;

    #[test]
    fn unstable_sizes_publish_once_stable() {
        let mut d = ResizeDebouncer::new(Size::new(80, 24));
        let samples = [
            Size::new(90, 24),
            Size::new(100, 25),
            Size::new(110, 26),
            Size::new(120, 30),
            Size::new(120, 30),
            Size::new(120, 30),
        ];
        let published: Vec<Size> = samples.into_iter().filter_map(|s| d.sample(s)).collect();
        assert_eq!(published, vec![Size::new(120, 30)]);
        assert_eq!(d.published(), Size::new(120, 30));
    }

    #[test]
    fn returning_to_published_size_cancels() {
        let mut d = ResizeDebouncer::new(Size::new(80, 24));
        assert_eq!(d.sample(Size::new(100, 30)), None);
        assert_eq!(d.sample(Size::new(80, 24)), None);
        assert_eq!(d.sample(Size::new(100, 30)), None);
        assert_eq!(d.sample(Size::new(100, 30)), Some(Size::new(100, 30)));
    }

    #[test]
    fn steady_size_never_publishes() {
        let mut d = ResizeDebouncer::new(Size::new(80, 24));
        for _ in 0..5 {
            assert_eq!(d.sample(Size::new(80, 24)), None);
        }
    }

    #[test]
    fn sampler_pushes_confirmed_resize() {
        let size = Arc::new(Mutex::new(Size::new(80, 24)));
        let probe_size = Arc::clone(&size);
        let probe: SizeProbe = Arc::new(move || probe_size.lock().ok().map(|s| *s));
        let queue = InputQueue::new();

        let mut sampler =
            ResizeSampler::spawn(probe, Size::new(80, 24), Duration::from_millis(2), queue.clone())
                .unwrap();
        *size.lock().unwrap() = Size::new(100, 40);

        let deadline = Instant::now() + Duration::from_secs(5);
        while queue.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        sampler.stop();
        assert_eq!(queue.drain(), vec![RawInputFrame::Resize(Size::new(100, 40))]);
    }

    #[test]
    fn panicking_size_query_is_contained() {
        let probe: SizeProbe = Arc::new(|| -> Option<Size> { panic!("console vanished") });
        let queue = InputQueue::new();
        let mut sampler =
            ResizeSampler::spawn(probe, Size::new(80, 24), Duration::from_millis(1), queue.clone())
                .unwrap();
        thread::sleep(Duration::from_millis(20));
        sampler.stop();
        sampler.stop();
        assert!(queue.is_empty());
    }
}
