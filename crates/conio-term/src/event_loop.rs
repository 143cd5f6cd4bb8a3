// SPDX-License-Identifier: MIT
//
// Event loop: input queue, wakeups, timers and idle handlers.
//
// Reader threads and the resize sampler never call into the application.
// They push `RawInputFrame`s onto the `InputQueue` and signal its condition
// variable. The loop thread waits on that condition in `events_pending`,
// bounded by the poll interval and by the nearest timer deadline, then
// drains the queue and runs due timers and idle handlers in `iteration`.
// All callbacks therefore run on the thread that owns the loop.
//
// `Waker` lets any thread cut a wait short without queuing a frame, e.g.
// to make the loop notice a flag another thread just set.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::backend::Size;
use crate::decoder::{CapabilityResponse, Decoded};
use crate::key::KeyEvent;
use crate::mouse::MouseEvent;

// ─── Frames ─────────────────────────────────────────────────────────────────

/// A reply the terminal sent to something we asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalResponse {
    /// 0-based cursor position.
    CursorPosition { row: u16, col: u16 },
    Capability(CapabilityResponse),
}

/// One unit of input, as produced by a backend reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInputFrame {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(Size),
    Response(TerminalResponse),
}

impl RawInputFrame {
    /// The frame a decoder result stands for. `None` for results that
    /// carry no event.
    #[must_use]
    pub fn from_decoded(decoded: Decoded) -> Option<Self> {
        match decoded {
            Decoded::Key(key) => Some(Self::Key(KeyEvent::down(key))),
            Decoded::Mouse(event) => Some(Self::Mouse(event)),
            Decoded::CursorReport { row, col } => {
                Some(Self::Response(TerminalResponse::CursorPosition { row, col }))
            }
            Decoded::CapabilityResponse(resp) => {
                Some(Self::Response(TerminalResponse::Capability(resp)))
            }
            Decoded::Incomplete | Decoded::Unrecognized => None,
        }
    }
}

// ─── InputQueue ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct QueueState {
    frames: VecDeque<RawInputFrame>,
    woken: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // A panicking producer cannot leave the deque half-modified.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer handle to the loop's frame queue. Clones share the queue.
#[derive(Debug, Clone, Default)]
pub struct InputQueue {
    shared: Arc<Shared>,
}

impl InputQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a frame and wake the loop.
    pub fn push(&self, frame: RawInputFrame) {
        trace!(?frame, "queued");
        self.shared.lock().frames.push_back(frame);
        self.shared.ready.notify_one();
    }

    /// Frames waiting to be dispatched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.lock().frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A waker for this queue.
    #[must_use]
    pub fn waker(&self) -> Waker {
        Waker {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Block until a frame or wakeup arrives, or `timeout` passes. Returns
    /// whether anything is ready. Consumes the wakeup.
    fn wait(&self, timeout: Duration) -> bool {
        let guard = self.shared.lock();
        let (mut guard, _) = self
            .shared
            .ready
            .wait_timeout_while(guard, timeout, |s| s.frames.is_empty() && !s.woken)
            .unwrap_or_else(PoisonError::into_inner);
        let woken = std::mem::take(&mut guard.woken);
        woken || !guard.frames.is_empty()
    }

    /// Remove and return every queued frame.
    #[must_use]
    pub fn drain(&self) -> Vec<RawInputFrame> {
        self.shared.lock().frames.drain(..).collect()
    }
}

/// Cuts the loop's current wait short. Cheap to clone, usable from any
/// thread.
#[derive(Debug, Clone)]
pub struct Waker {
    shared: Arc<Shared>,
}

impl Waker {
    pub fn wake(&self) {
        self.shared.lock().woken = true;
        self.shared.ready.notify_one();
    }
}

// ─── Timers and idle handlers ───────────────────────────────────────────────

/// Handle returned by [`EventLoop::add_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// Handle returned by [`EventLoop::add_idle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdleToken(u64);

/// Timer callback. Returning `true` re-arms the timer with the same period.
pub type TimerCallback = Box<dyn FnMut() -> bool>;

/// Idle callback. Returning `false` removes the handler.
pub type IdleCallback = Box<dyn FnMut() -> bool>;

struct Timer {
    token: TimerToken,
    deadline: Instant,
    period: Duration,
    callback: TimerCallback,
}

// ─── EventLoop ──────────────────────────────────────────────────────────────

/// The loop-thread half: waits for input, dispatches frames, runs timers
/// and idle handlers.
pub struct EventLoop {
    queue: InputQueue,
    timers: Vec<Timer>,
    idle: Vec<(IdleToken, IdleCallback)>,
    next_token: u64,
    poll_interval: Duration,
}

impl EventLoop {
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            queue: InputQueue::new(),
            timers: Vec::new(),
            idle: Vec::new(),
            next_token: 0,
            poll_interval,
        }
    }

    /// Producer handle for reader threads.
    #[must_use]
    pub fn queue(&self) -> InputQueue {
        self.queue.clone()
    }

    #[must_use]
    pub fn waker(&self) -> Waker {
        self.queue.waker()
    }

    const fn token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    // ── Scheduling ──────────────────────────────────────────────────

    /// Run `callback` after `period`, and again every `period` for as long
    /// as it returns `true`.
    pub fn add_timeout(
        &mut self,
        period: Duration,
        callback: impl FnMut() -> bool + 'static,
    ) -> TimerToken {
        let token = TimerToken(self.token());
        self.timers.push(Timer {
            token,
            deadline: Instant::now() + period,
            period,
            callback: Box::new(callback),
        });
        token
    }

    /// Cancel a timer. Returns whether it was still scheduled.
    pub fn remove_timeout(&mut self, token: TimerToken) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.token != token);
        self.timers.len() != before
    }

    /// Run `callback` once per iteration while it returns `true`.
    pub fn add_idle(&mut self, callback: impl FnMut() -> bool + 'static) -> IdleToken {
        let token = IdleToken(self.token());
        self.idle.push((token, Box::new(callback)));
        token
    }

    pub fn remove_idle(&mut self, token: IdleToken) -> bool {
        let before = self.idle.len();
        self.idle.retain(|(t, _)| *t != token);
        self.idle.len() != before
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|t| t.deadline).min()
    }

    // ── Waiting and dispatch ────────────────────────────────────────

    /// Wait for something to do. Returns `true` when frames are queued, a
    /// timer is due, an idle handler is registered, or the loop was woken.
    ///
    /// Waits at most `timeout` (the poll interval when `None`), and never
    /// past the nearest timer deadline.
    pub fn events_pending(&mut self, timeout: Option<Duration>) -> bool {
        let now = Instant::now();
        if !self.idle.is_empty() || self.next_deadline().is_some_and(|d| d <= now) {
            return true;
        }
        let mut wait = timeout.unwrap_or(self.poll_interval);
        if let Some(deadline) = self.next_deadline() {
            wait = wait.min(deadline - now);
        }
        self.queue.wait(wait) || self.next_deadline().is_some_and(|d| d <= Instant::now())
    }

    /// Dispatch every queued frame to `handler`, then run due timers and
    /// idle handlers. Returns the number of frames dispatched.
    pub fn iteration(&mut self, handler: &mut dyn FnMut(RawInputFrame)) -> usize {
        let frames = self.queue.drain();
        let count = frames.len();
        for frame in frames {
            handler(frame);
        }
        self.run_timers(Instant::now());
        self.run_idle();
        count
    }

    /// Fire every timer due at `now`. Returns how many fired.
    pub fn run_timers(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        let mut i = 0;
        while i < self.timers.len() {
            if self.timers[i].deadline > now {
                i += 1;
                continue;
            }
            fired += 1;
            let timer = &mut self.timers[i];
            if (timer.callback)() {
                timer.deadline = now + timer.period;
                i += 1;
            } else {
                self.timers.swap_remove(i);
            }
        }
        fired
    }

    fn run_idle(&mut self) {
        self.idle.retain_mut(|(_, callback)| callback());
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
