//! Trailing-edge debounce timer running on its own thread.

use std::{
    io,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tracing::debug;

/// Runs an action once a burst of triggers has been quiet for `delay`.
///
/// Every [`trigger`](Self::trigger) pushes the deadline back to `delay` from
/// now. The action runs on the timer thread.
pub(crate) struct Debouncer {
    timer: Arc<Timer>,
    worker: Option<JoinHandle<()>>,
    delay: Duration,
}

struct Timer {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

#[derive(Default)]
struct TimerState {
    deadline: Option<Instant>,
    shutdown: bool,
}

impl Timer {
    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debouncer {
    /// Spawns the timer thread.
    ///
    /// # Errors
    /// Returns the OS error if the thread cannot be spawned.
    pub(crate) fn spawn<F>(name: &str, delay: Duration, action: F) -> io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let timer = Arc::new(Timer {
            state: Mutex::new(TimerState::default()),
            wakeup: Condvar::new(),
        });

        let worker_timer = Arc::clone(&timer);
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(&worker_timer, &action))?;

        Ok(Self {
            timer,
            worker: Some(worker),
            delay,
        })
    }

    /// Restarts the quiet period.
    pub(crate) fn trigger(&self) {
        self.timer.lock().deadline = Some(Instant::now() + self.delay);
        self.timer.wakeup.notify_one();
    }

    /// Drops a pending deadline without running the action.
    pub(crate) fn cancel(&self) {
        if self.timer.lock().deadline.take().is_some() {
            debug!("Cancelled pending debounce deadline");
        }
        self.timer.wakeup.notify_one();
    }

    /// Whether a deadline is waiting to fire.
    #[cfg(test)]
    pub(crate) fn is_pending(&self) -> bool {
        self.timer.lock().deadline.is_some()
    }

    pub(crate) fn delay(&self) -> Duration {
        self.delay
    }
}

fn run(timer: &Timer, action: &dyn Fn()) {
    let mut state = timer.lock();

    loop {
        if state.shutdown {
            return;
        }

        match state.deadline {
            None => {
                state = timer
                    .wakeup
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    state.deadline = None;
                    drop(state);
                    action();
                    state = timer.lock();
                } else {
                    state = timer
                        .wakeup
                        .wait_timeout(state, deadline - now)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|e| e.into_inner().0);
                }
            }
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        {
            let mut state = self.timer.lock();
            state.shutdown = true;
            state.deadline = None;
        }
        self.timer.wakeup.notify_all();

        let Some(worker) = self.worker.take() else {
            return;
        };

        // The action may release the last owner of this debouncer, in which
        // case drop runs on the timer thread itself.
        if worker.thread().id() != thread::current().id() {
            let _ = worker.join();
        }
    }
}
