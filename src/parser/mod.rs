//! Parser coordinator.
//!
//! Owns one worker pool per service, ordered by target step, and routes
//! every task outcome: advance to the next pool, retry, defer until a
//! device returns, or record a permanent failure.

pub mod task;
pub mod worker;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use mediatheque_common::{Result, Step, MAX_TASK_RETRIES};
use mediatheque_db::pool::{get_conn, DbPool};
use parking_lot::RwLock;

use crate::notifier::LibraryNotifier;
use crate::parser::task::{Status, Task};
use crate::parser::worker::Worker;
use crate::services::ParserService;

/// Callback surface a worker pool uses to hand results back.
pub trait ParserCb: Send + Sync {
    /// A service finished one task with the given status.
    fn done(&self, task: Task, status: Status);

    /// (Re-)enter a task into the pipeline at its first unfinished step.
    fn parse(&self, task: Task);

    /// A pool's idle state flipped.
    fn on_idle_changed(&self, idle: bool);
}

struct ParserInner {
    pool: DbPool,
    notifier: Arc<dyn LibraryNotifier>,
    workers: RwLock<Vec<Worker>>,
    ops_scheduled: AtomicU32,
    ops_done: AtomicU32,
}

/// The pipeline coordinator.
#[derive(Clone)]
pub struct Parser {
    inner: Arc<ParserInner>,
}

impl Parser {
    pub fn new(pool: DbPool, notifier: Arc<dyn LibraryNotifier>) -> Self {
        Self {
            inner: Arc::new(ParserInner {
                pool,
                notifier,
                workers: RwLock::new(Vec::new()),
                ops_scheduled: AtomicU32::new(0),
                ops_done: AtomicU32::new(0),
            }),
        }
    }

    /// Register a service. Services must be added in target-step order so
    /// the routing table can chain them.
    pub fn add_service(&self, service: Arc<dyn ParserService>) -> Result<()> {
        if !service.initialize() {
            return Err(mediatheque_common::Error::internal(format!(
                "Failed to initialize service {}",
                service.name()
            )));
        }
        let cb: Arc<dyn ParserCb> = self.inner.clone();
        let worker = Worker::new(service, Arc::downgrade(&cb), self.inner.pool.clone());
        let mut workers = self.inner.workers.write();
        debug_assert!(workers
            .last()
            .map(|w| (w.target_step() as u8) < (worker.target_step() as u8))
            .unwrap_or(true));
        workers.push(worker);
        Ok(())
    }

    /// Start the pipeline: resume the persisted uncompleted tasks.
    pub fn start(&self) {
        self.restore();
    }

    /// Enter a task into the pipeline.
    pub fn parse(&self, task: Task) {
        self.inner.parse(task);
    }

    /// Re-enqueue persisted tasks (on start, and when a device returns).
    pub fn restore(&self) {
        let workers = self.inner.workers.read();
        if let Some(first) = workers.first() {
            first.submit_restore();
        }
    }

    pub fn pause(&self) {
        for worker in self.inner.workers.read().iter() {
            worker.pause();
        }
    }

    pub fn resume(&self) {
        for worker in self.inner.workers.read().iter() {
            worker.resume();
        }
    }

    /// Pause, wait for every pool to drain, and drop their queues.
    pub fn flush(&self) {
        let workers = self.inner.workers.read();
        for worker in workers.iter() {
            worker.pause();
        }
        for worker in workers.iter() {
            worker.flush();
        }
        for worker in workers.iter() {
            worker.resume();
        }
    }

    /// Re-seed service caches and resume deferred tasks. Called when a
    /// device becomes present again.
    pub fn restart(&self) {
        for worker in self.inner.workers.read().iter() {
            worker.restart();
        }
        self.restore();
    }

    /// Two-phase stop: signal every pool, then join their threads.
    pub fn stop(&self) {
        let workers = self.inner.workers.read();
        for worker in workers.iter() {
            worker.signal_stop();
        }
        for worker in workers.iter() {
            worker.stop();
        }
    }

    /// The library is idle iff all pools are idle.
    pub fn is_idle(&self) -> bool {
        self.inner.is_idle()
    }
}

impl ParserInner {
    fn is_idle(&self) -> bool {
        self.workers.read().iter().all(Worker::is_idle)
    }

    fn worker_for_step(&self, step: Step) -> Option<Worker> {
        self.workers
            .read()
            .iter()
            .find(|w| w.target_step() == step)
            .cloned()
    }

    /// The pool serving the task's first unfinished step. Steps without a
    /// registered service (e.g. no thumbnailer) are skipped.
    fn next_worker(&self, mask: mediatheque_common::StepMask) -> Option<Worker> {
        [Step::MetadataExtraction, Step::MetadataAnalysis, Step::Thumbnail]
            .into_iter()
            .filter(|step| !mask.contains(*step))
            .find_map(|step| self.worker_for_step(step))
    }

    fn update_stats(&self) {
        let done = self.ops_done.load(Ordering::SeqCst);
        let scheduled = self.ops_scheduled.load(Ordering::SeqCst);
        self.notifier.on_parsing_stats_updated(done, scheduled);
        // Reset once the pipeline drains so the next discovery starts a
        // fresh progress report.
        if done == scheduled && done > 0 && self.is_idle() {
            self.ops_done.store(0, Ordering::SeqCst);
            self.ops_scheduled.store(0, Ordering::SeqCst);
        }
    }

    /// Record a permanent failure: the Completed bit doubles as the
    /// failure marker, so the task survives in the database but is ignored
    /// on restart.
    fn mark_task_failed(&self, task: &mut Task) {
        task.mark_step_completed(Step::Completed);
        if let Ok(conn) = get_conn(&self.pool) {
            if let Err(e) = task.save_steps(&conn) {
                tracing::error!("Failed to record failure of task {}: {}", task.id(), e);
            }
        }
    }
}

impl ParserCb for ParserInner {
    fn done(&self, mut task: Task, status: Status) {
        self.ops_done.fetch_add(1, Ordering::SeqCst);
        self.update_stats();

        match status {
            Status::Success | Status::Completed => {
                if task.step_done().is_completed() {
                    return;
                }
                match self.next_worker(task.step_done()) {
                    Some(worker) => {
                        self.ops_scheduled.fetch_add(1, Ordering::SeqCst);
                        worker.submit(task);
                    }
                    None => {
                        // Every registered step ran; seal the task.
                        task.mark_step_completed(Step::Completed);
                        if let Ok(conn) = get_conn(&self.pool) {
                            let _ = task.save_steps(&conn);
                        }
                    }
                }
            }
            Status::Error => {
                if task.retry_count() < MAX_TASK_RETRIES {
                    if let Some(worker) = self.next_worker(task.step_done()) {
                        self.ops_scheduled.fetch_add(1, Ordering::SeqCst);
                        worker.submit(task);
                        return;
                    }
                } else {
                    tracing::warn!(
                        "Task {} exhausted its retries, marking it failed",
                        task.item.mrl()
                    );
                    self.mark_task_failed(&mut task);
                }
            }
            Status::TemporaryUnavailable => {
                // Dropped from the in-flight set; restart() resumes it from
                // the task store once the device reappears.
            }
            Status::Fatal => {
                self.mark_task_failed(&mut task);
            }
            Status::Discarded => {
                // Row already deleted.
            }
        }
    }

    fn parse(&self, task: Task) {
        self.ops_scheduled.fetch_add(1, Ordering::SeqCst);
        self.update_stats();
        let workers = self.workers.read();
        if let Some(first) = workers.first() {
            first.submit(task);
        }
    }

    fn on_idle_changed(&self, idle: bool) {
        if !idle {
            self.notifier.on_idle_changed(false);
            return;
        }
        if self.is_idle() {
            self.notifier.on_idle_changed(true);
            self.update_stats();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediatheque_db::pool::init_memory_pool;
    use mediatheque_db::queries::{folders, tasks};
    use parking_lot::Mutex;
    use std::time::{Duration, Instant};

    struct CountingService {
        step: Step,
        fail_times: u32,
        calls: Mutex<u32>,
    }

    impl CountingService {
        fn new(step: Step, fail_times: u32) -> Self {
            Self {
                step,
                fail_times,
                calls: Mutex::new(0),
            }
        }
    }

    impl ParserService for CountingService {
        fn name(&self) -> &'static str {
            "Counting"
        }
        fn target_step(&self) -> Step {
            self.step
        }
        fn nb_threads(&self) -> u8 {
            1
        }
        fn run(&self, _task: &mut Task) -> Status {
            let mut calls = self.calls.lock();
            *calls += 1;
            if *calls <= self.fail_times {
                Status::Error
            } else {
                Status::Success
            }
        }
    }

    #[derive(Default)]
    struct IdleProbe {
        idle_flips: Mutex<Vec<bool>>,
        stats: Mutex<Vec<(u32, u32)>>,
    }

    impl LibraryNotifier for IdleProbe {
        fn on_idle_changed(&self, idle: bool) {
            self.idle_flips.lock().push(idle);
        }
        fn on_parsing_stats_updated(&self, done: u32, scheduled: u32) {
            self.stats.lock().push((done, scheduled));
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn make_task(pool: &DbPool, mrl: &str) -> Task {
        let conn = get_conn(pool).unwrap();
        let folder = match folders::from_path(&conn, "/music").unwrap() {
            Some(f) => f.id,
            None => folders::create(&conn, "/music", None, None, false).unwrap().id,
        };
        let row = tasks::create(&conn, mrl, None, None, folder, None, None, false).unwrap();
        Task::from_row(row)
    }

    #[test]
    fn test_task_advances_through_chained_pools() {
        let pool = init_memory_pool().unwrap();
        let notifier = Arc::new(IdleProbe::default());
        let parser = Parser::new(pool.clone(), notifier);

        let extraction = Arc::new(CountingService::new(Step::MetadataExtraction, 0));
        let analysis = Arc::new(CountingService::new(Step::MetadataAnalysis, 0));
        parser.add_service(extraction.clone()).unwrap();
        parser.add_service(analysis.clone()).unwrap();

        let task = make_task(&pool, "file:///music/a.flac");
        let task_id = task.id();
        parser.parse(task);

        let (p, conn_pool) = (parser.clone(), pool.clone());
        wait_until(move || {
            let conn = get_conn(&conn_pool).unwrap();
            tasks::get(&conn, task_id).unwrap().step_done.is_completed() && p.is_idle()
        });
        parser.stop();

        assert_eq!(*extraction.calls.lock(), 1);
        assert_eq!(*analysis.calls.lock(), 1);

        // Extraction success refunded its retry; analysis persisted its bit.
        let conn = get_conn(&pool).unwrap();
        let row = tasks::get(&conn, task_id).unwrap();
        assert!(row.retry_count <= 1);
        assert!(row.step_done.contains(Step::MetadataAnalysis));
    }

    #[test]
    fn test_error_retries_until_budget_exhausted() {
        let pool = init_memory_pool().unwrap();
        let notifier = Arc::new(IdleProbe::default());
        let parser = Parser::new(pool.clone(), notifier);

        // Always fails.
        let analysis = Arc::new(CountingService::new(Step::MetadataAnalysis, u32::MAX));
        parser.add_service(analysis.clone()).unwrap();

        let task = make_task(&pool, "file:///music/b.flac");
        let task_id = task.id();
        parser.parse(task);

        let conn_pool = pool.clone();
        wait_until(move || {
            let conn = get_conn(&conn_pool).unwrap();
            tasks::get(&conn, task_id).unwrap().step_done.is_completed()
        });
        parser.stop();

        let conn = get_conn(&pool).unwrap();
        let row = tasks::get(&conn, task_id).unwrap();
        assert_eq!(row.retry_count, MAX_TASK_RETRIES);
        // Failure is recorded, so a restart ignores the task.
        assert!(tasks::fetch_uncompleted(&conn).unwrap().is_empty());
        assert_eq!(*analysis.calls.lock(), MAX_TASK_RETRIES as u32);
    }

    #[test]
    fn test_restore_resumes_persisted_tasks() {
        let pool = init_memory_pool().unwrap();
        let notifier = Arc::new(IdleProbe::default());

        // A task left over from a previous run.
        let task = make_task(&pool, "file:///music/left_over.flac");
        let task_id = task.id();
        drop(task);

        let parser = Parser::new(pool.clone(), notifier);
        let analysis = Arc::new(CountingService::new(Step::MetadataAnalysis, 0));
        parser.add_service(analysis).unwrap();
        parser.start();

        let conn_pool = pool.clone();
        wait_until(move || {
            let conn = get_conn(&conn_pool).unwrap();
            tasks::get(&conn, task_id).unwrap().step_done.is_completed()
        });
        parser.stop();
    }

    #[test]
    fn test_idle_notification_reaches_library_notifier() {
        let pool = init_memory_pool().unwrap();
        let notifier = Arc::new(IdleProbe::default());
        let parser = Parser::new(pool.clone(), notifier.clone());
        parser
            .add_service(Arc::new(CountingService::new(Step::MetadataAnalysis, 0)))
            .unwrap();

        let task = make_task(&pool, "file:///music/c.flac");
        parser.parse(task);

        let probe = notifier.clone();
        wait_until(move || probe.idle_flips.lock().iter().any(|&idle| idle));
        parser.stop();

        let flips = notifier.idle_flips.lock();
        assert!(flips.contains(&false));
        assert!(flips.contains(&true));
        assert!(!notifier.stats.lock().is_empty());
    }
}
