//! One-shot timers on a dedicated thread.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::error::{Result, TransactionError};

type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Identifies one scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// A deadline heap served by one background thread.
///
/// Cloning yields another handle to the same thread. The thread starts on
/// the first [`Timer::schedule`] and stops when the last handle is dropped.
/// A callback either fires or is cancelled, never both.
#[derive(Clone, Default)]
pub struct Timer {
    inner: Arc<TimerInner>,
}

#[derive(Default)]
struct TimerInner {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    wakeup: Condvar,
}

#[derive(Default)]
struct State {
    deadlines: BinaryHeap<Reverse<(Instant, u64)>>,
    callbacks: HashMap<u64, Callback>,
    next_id: u64,
    shutdown: bool,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` on the timer thread once `delay` has elapsed.
    pub fn schedule(
        &self,
        delay: Duration,
        callback: impl FnOnce() + Send + 'static,
    ) -> Result<TimerHandle> {
        self.ensure_thread()?;
        let mut state = self.inner.shared.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.deadlines.push(Reverse((Instant::now() + delay, id)));
        state.callbacks.insert(id, Box::new(callback));
        drop(state);
        self.inner.shared.wakeup.notify_one();
        trace!(id, ?delay, "timer scheduled");
        Ok(TimerHandle(id))
    }

    /// Cancel a pending callback. Returns false if it already fired or was
    /// cancelled before.
    pub fn cancel(&self, handle: TimerHandle) -> bool {
        let removed = self
            .inner
            .shared
            .state
            .lock()
            .callbacks
            .remove(&handle.0)
            .is_some();
        if removed {
            trace!(id = handle.0, "timer cancelled");
        }
        removed
    }

    /// Callbacks scheduled and not yet fired or cancelled.
    pub fn pending(&self) -> usize {
        self.inner.shared.state.lock().callbacks.len()
    }

    fn ensure_thread(&self) -> Result<()> {
        let mut thread = self.inner.thread.lock();
        if thread.is_none() {
            let shared = Arc::clone(&self.inner.shared);
            let handle = thread::Builder::new()
                .name("echonet-timer".to_string())
                .spawn(move || run(&shared))
                .map_err(TransactionError::Timer)?;
            *thread = Some(handle);
            debug!("timer thread started");
        }
        Ok(())
    }
}

fn run(shared: &Shared) {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            break;
        }
        let Some(&Reverse((deadline, id))) = state.deadlines.peek() else {
            shared.wakeup.wait(&mut state);
            continue;
        };
        if deadline > Instant::now() {
            shared.wakeup.wait_until(&mut state, deadline);
            continue;
        }
        state.deadlines.pop();
        if let Some(callback) = state.callbacks.remove(&id) {
            trace!(id, "timer fired");
            MutexGuard::unlocked(&mut state, callback);
        }
    }
    debug!("timer thread exiting");
}

impl Drop for TimerInner {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.callbacks.clear();
        }
        self.shared.wakeup.notify_all();
        if let Some(handle) = self.thread.get_mut().take() {
            // The last handle may be dropped by a callback on the timer
            // thread itself.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn callbacks_fire_in_deadline_order() {
        let timer = Timer::new();
        let (tx, rx) = mpsc::channel();
        for (delay, tag) in [(60, "late"), (10, "early"), (30, "middle")] {
            let tx = tx.clone();
            timer
                .schedule(Duration::from_millis(delay), move || tx.send(tag).unwrap())
                .unwrap();
        }
        let order: Vec<_> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        assert_eq!(order, ["early", "middle", "late"]);
        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn cancelled_callback_never_fires() {
        let timer = Timer::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = {
            let fired = Arc::clone(&fired);
            timer
                .schedule(Duration::from_millis(30), move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
        };
        assert!(timer.cancel(handle));
        assert!(!timer.cancel(handle));
        thread::sleep(Duration::from_millis(80));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_after_fire_reports_false() {
        let timer = Timer::new();
        let (tx, rx) = mpsc::channel();
        let handle = timer
            .schedule(Duration::from_millis(5), move || tx.send(()).unwrap())
            .unwrap();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(!timer.cancel(handle));
    }

    #[test]
    fn callback_may_drop_last_handle() {
        let timer = Timer::new();
        let (tx, rx) = mpsc::channel();
        let captured = timer.clone();
        timer
            .schedule(Duration::from_millis(5), move || {
                drop(captured);
                tx.send(()).unwrap();
            })
            .unwrap();
        drop(timer);
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
    }
}
