//! Job graph (C9): single-producer, many-consumer queue of cancelable work
//! items driving simulator batches.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

/// A single unit of work: given the claiming thread's id and a shared cancel
/// flag, performs whatever work it captured and returns.
type Job<'a> = Box<dyn FnMut(usize, &AtomicBool) + Send + 'a>;

/// An append-only vector of jobs plus a single atomic consumer cursor.
///
/// Jobs may borrow data for lifetime `'a` (typically the scope of one
/// `ReflectionSimulator::simulate` call, which borrows a `&dyn Scene`)
/// rather than requiring `'static` closures.
///
/// `add_job` may only be called before consumers start draining; nothing
/// enforces that beyond the caller's discipline (mirroring the "no further
/// jobs may be added once consumers begin" rule, since there would be no
/// way to both add and drain safely through this type's single cursor).
pub struct JobGraph<'a> {
    jobs: Vec<Mutex<Job<'a>>>,
    next: AtomicUsize,
}

impl<'a> JobGraph<'a> {
    pub fn new() -> Self {
        Self { jobs: Vec::new(), next: AtomicUsize::new(0) }
    }

    pub fn add_job<F>(&mut self, job: F)
    where
        F: FnMut(usize, &AtomicBool) + Send + 'a,
    {
        self.jobs.push(Mutex::new(Box::new(job)));
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Atomically claims the next job index and invokes it if one remains.
    /// Returns `true` while work may still be available (whether or not
    /// this call claimed one), `false` once the cursor is past the end.
    pub fn process_next_job(&self, thread_id: usize, cancel: &AtomicBool) -> bool {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        if index >= self.jobs.len() {
            return false;
        }
        self.jobs[index].lock()(thread_id, cancel);
        true
    }

    /// Clears the job list and resets the consumer cursor for reuse.
    pub fn reset(&mut self) {
        self.jobs.clear();
        self.next.store(0, Ordering::Relaxed);
    }

    /// Spawns `num_threads` workers, each looping `process_next_job` until
    /// the graph is drained. The graph itself stays driver-agnostic; a host
    /// may instead drain it from its own thread pool.
    pub fn run_with(&self, num_threads: usize, cancel: &AtomicBool) {
        rayon::scope(|scope| {
            for thread_id in 0..num_threads.max(1) {
                scope.spawn(move |_| while self.process_next_job(thread_id, cancel) {});
            }
        });
    }
}

impl Default for JobGraph<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn drains_every_job_exactly_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut graph = JobGraph::new();
        for _ in 0..10 {
            let counter = counter.clone();
            graph.add_job(move |_thread_id, _cancel| {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        let cancel = AtomicBool::new(false);
        while graph.process_next_job(0, &cancel) {}
        assert_eq!(counter.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn empty_graph_reports_no_work_immediately() {
        let graph = JobGraph::new();
        let cancel = AtomicBool::new(false);
        assert!(!graph.process_next_job(0, &cancel));
    }

    #[test]
    fn reset_allows_reuse() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut graph = JobGraph::new();
        for _ in 0..4 {
            let counter = counter.clone();
            graph.add_job(move |_, _| {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        let cancel = AtomicBool::new(false);
        while graph.process_next_job(0, &cancel) {}
        assert_eq!(counter.load(Ordering::Relaxed), 4);

        graph.reset();
        assert!(graph.is_empty());
        assert!(!graph.process_next_job(0, &cancel));
    }

    #[test]
    fn run_with_multiple_threads_drains_all_jobs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut graph = JobGraph::new();
        for _ in 0..64 {
            let counter = counter.clone();
            graph.add_job(move |_, _| {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        let cancel = AtomicBool::new(false);
        graph.run_with(4, &cancel);
        assert_eq!(counter.load(Ordering::Relaxed), 64);
    }

    #[test]
    fn cancel_flag_is_observable_inside_jobs() {
        let observed = Arc::new(AtomicBool::new(false));
        let mut graph = JobGraph::new();
        let observed_clone = observed.clone();
        graph.add_job(move |_thread_id, cancel| {
            observed_clone.store(cancel.load(Ordering::Relaxed), Ordering::Relaxed);
        });
        let cancel = AtomicBool::new(true);
        assert!(graph.process_next_job(0, &cancel));
        assert!(observed.load(Ordering::Relaxed));
    }
}
