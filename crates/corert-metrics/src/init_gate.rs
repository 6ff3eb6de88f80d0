use std::sync::{Condvar, Mutex};

/// Three-state latch guarding one-time label setup for a newly-inserted
/// time-series (spec.md §4.10 `getTS`): concurrent readers block in
/// `Initing` until the first-store branch flips it to `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Initing,
    Ready,
}

pub struct InitGate {
    state: Mutex<State>,
    cond: Condvar,
}

impl Default for InitGate {
    fn default() -> Self {
        Self::new()
    }
}

impl InitGate {
    pub fn new() -> Self {
        InitGate {
            state: Mutex::new(State::Idle),
            cond: Condvar::new(),
        }
    }

    /// Blocks until the gate is `Ready`. If this caller is the one to
    /// transition it from `Idle`, `init` runs while other waiters block,
    /// and the gate flips to `Ready` once it returns.
    pub fn ready_or_init(&self, init: impl FnOnce()) {
        let mut state = self.state.lock().unwrap();
        match *state {
            State::Ready => return,
            State::Initing => {
                while *state == State::Initing {
                    state = self.cond.wait(state).unwrap();
                }
                return;
            }
            State::Idle => {
                *state = State::Initing;
            }
        }
        drop(state);
        init();
        let mut state = self.state.lock().unwrap();
        *state = State::Ready;
        self.cond.notify_all();
    }
}
