use std::sync::{Condvar, Mutex, PoisonError};

/// One-shot start gate: relay workers block on [`StartGate::wait`] until
/// the dispatcher opens it, so no worker reads before every stream is
/// registered and connected.
pub(crate) struct StartGate {
    started: Mutex<bool>,
    cond: Condvar,
}

impl StartGate {
    pub(crate) fn new() -> Self {
        Self {
            started: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Block until the gate is open.
    pub(crate) fn wait(&self) {
        let mut started = self.started.lock().unwrap_or_else(PoisonError::into_inner);
        while !*started {
            started = self
                .cond
                .wait(started)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Open the gate and wake every waiting worker. Idempotent.
    pub(crate) fn open(&self) {
        *self.started.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn workers_block_until_open() {
        let gate = Arc::new(StartGate::new());
        let passed = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let passed = Arc::clone(&passed);
                thread::spawn(move || {
                    gate.wait();
                    passed.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(passed.load(Ordering::SeqCst), 0);

        gate.open();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(passed.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn wait_after_open_returns_immediately() {
        let gate = StartGate::new();
        gate.open();
        gate.open();
        gate.wait();
    }
}
