use std::{
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle, ThreadId},
};

/// A fixed set of named worker threads sharing one running flag.
///
/// `stop_and_join` returns only once every worker has exited, except the
/// calling thread itself when a worker is the one asking to stop.
#[derive(Debug)]
pub struct WorkerSet {
    running: Arc<AtomicBool>,
    handles: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
    /// Every thread ever started here, kept after the handles are joined.
    ids: Mutex<Vec<ThreadId>>,
}

impl Default for WorkerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerSet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            handles: Mutex::new(Vec::new()),
            ids: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts `f` on a thread called `name`; `f` gets the shared flag.
    /// Once the set is stopping, `f` is dropped without running.
    pub fn spawn<F>(&self, name: &'static str, f: F) -> io::Result<()>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let Ok(mut handles) = self.handles.lock() else {
            return Ok(());
        };
        // Checked under the lock so `stop_and_join` cannot miss this one.
        if !self.is_running() {
            return Ok(());
        }
        let running = self.running();
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || f(running))?;
        if let Ok(mut ids) = self.ids.lock() {
            ids.push(handle.thread().id());
        }
        handles.push((name, handle));
        Ok(())
    }

    /// Whether the calling thread is one of this set's workers.
    #[must_use]
    pub fn is_current_worker(&self) -> bool {
        let me = thread::current().id();
        self.ids.lock().is_ok_and(|ids| ids.contains(&me))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.lock().map_or(0, |h| h.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears the flag and joins every worker. Returns the names of workers
    /// that panicked.
    pub fn stop_and_join(&self) -> Vec<&'static str> {
        self.running.store(false, Ordering::SeqCst);
        let handles = self
            .handles
            .lock()
            .map(|mut h| std::mem::take(&mut *h))
            .unwrap_or_default();

        let me = thread::current().id();
        let mut panicked = Vec::new();
        for (name, handle) in handles {
            if handle.thread().id() == me {
                continue;
            }
            if handle.join().is_err() {
                panicked.push(name);
            }
        }
        panicked
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::{
        sync::mpsc,
        time::{Duration, Instant},
    };

    fn idle_until_stopped(running: Arc<AtomicBool>) {
        while running.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn stop_joins_every_worker() {
        let set = WorkerSet::new();
        for name in ["a", "b", "c", "d", "e"] {
            set.spawn(name, idle_until_stopped).unwrap();
        }
        assert_eq!(set.len(), 5);

        let started = Instant::now();
        assert!(set.stop_and_join().is_empty());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(set.is_empty());
        assert!(!set.is_running());

        // Second stop is a no-op.
        assert!(set.stop_and_join().is_empty());
    }

    #[test]
    fn stopped_set_spawns_nothing() {
        let set = WorkerSet::new();
        set.stop_and_join();
        let (tx, rx) = mpsc::channel::<()>();
        set.spawn("late", move |_| {
            let _ = tx.send(());
        })
        .unwrap();
        assert!(set.is_empty());
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn panicking_worker_is_reported() {
        let set = WorkerSet::new();
        set.spawn("boom", |_| panic!("worker failed")).unwrap();
        set.spawn("calm", idle_until_stopped).unwrap();
        assert_eq!(set.stop_and_join(), vec!["boom"]);
    }

    #[test]
    fn worker_may_stop_its_own_set() {
        let set = Arc::new(WorkerSet::new());
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&set);
        set.spawn("other", idle_until_stopped).unwrap();
        set.spawn("self-stopper", move |_| {
            thread::sleep(Duration::from_millis(20));
            let _ = tx.send(inner.stop_and_join());
        })
        .unwrap();

        let panicked = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(panicked.is_empty());
        assert!(!set.is_running());
    }

    #[test]
    fn workers_know_they_belong_to_the_set() {
        let set = Arc::new(WorkerSet::new());
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&set);
        set.spawn("asker", move |_| {
            let _ = tx.send(inner.is_current_worker());
        })
        .unwrap();

        assert!(rx.recv_timeout(Duration::from_secs(2)).unwrap());
        assert!(!set.is_current_worker());
        set.stop_and_join();
        assert!(!set.is_current_worker());
    }
}
