//! Per-service worker pool.
//!
//! One pool per pipeline service. Threads pop tasks FIFO, run the service,
//! and forward every outcome to the coordinator; a queued `None` is the
//! sentinel asking a worker thread to re-enqueue persisted tasks.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Instant;

use mediatheque_common::Step;
use mediatheque_db::pool::{get_conn, DbPool};
use mediatheque_db::queries::{folders, tasks};
use parking_lot::{Condvar, Mutex};

use crate::parser::task::{Status, Task};
use crate::parser::ParserCb;
use crate::services::ParserService;

/// Worker pool lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Stopped,
    Starting,
    Running,
    Paused,
    Stopping,
}

struct Queue {
    tasks: VecDeque<Option<Task>>,
    /// Orthogonal to the lifecycle state: a pool can be paused before its
    /// threads ever start.
    paused: bool,
    state: PoolState,
}

struct WorkerInner {
    service: Arc<dyn ParserService>,
    cb: Weak<dyn ParserCb>,
    pool: DbPool,
    queue: Mutex<Queue>,
    cond: Condvar,
    idle_cond: Condvar,
    /// Written only under the queue lock; read lock-free.
    idle: AtomicBool,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

/// A thread group bound to one service.
#[derive(Clone)]
pub struct Worker {
    inner: Arc<WorkerInner>,
}

impl Worker {
    pub fn new(service: Arc<dyn ParserService>, cb: Weak<dyn ParserCb>, pool: DbPool) -> Self {
        Self {
            inner: Arc::new(WorkerInner {
                service,
                cb,
                pool,
                queue: Mutex::new(Queue {
                    tasks: VecDeque::new(),
                    paused: false,
                    state: PoolState::Stopped,
                }),
                cond: Condvar::new(),
                idle_cond: Condvar::new(),
                idle: AtomicBool::new(true),
                threads: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The step this pool's service completes.
    pub fn target_step(&self) -> Step {
        self.inner.service.target_step()
    }

    /// Spawn the service's threads. Idempotent when already running.
    pub fn start(&self) {
        let mut threads = self.inner.threads.lock();
        if !threads.is_empty() {
            return;
        }
        {
            let mut queue = self.inner.queue.lock();
            queue.state = PoolState::Starting;
        }
        for _ in 0..self.inner.service.nb_threads().max(1) {
            let inner = Arc::clone(&self.inner);
            threads.push(std::thread::spawn(move || mainloop(inner)));
        }
        let mut queue = self.inner.queue.lock();
        if queue.state == PoolState::Starting {
            queue.state = PoolState::Running;
        }
    }

    /// Enqueue a task, spawning the threads on first use. The pool is
    /// flagged non-idle before the push so a caller polling `is_idle` can
    /// never observe an idle pool with a queued task.
    pub fn submit(&self, task: Task) {
        self.enqueue(Some(task));
    }

    /// Enqueue the restore sentinel: one worker thread will re-enqueue the
    /// persisted uncompleted tasks through the coordinator.
    pub fn submit_restore(&self) {
        self.enqueue(None);
    }

    fn enqueue(&self, slot: Option<Task>) {
        {
            let mut queue = self.inner.queue.lock();
            self.inner.set_idle(&queue, false);
            queue.tasks.push_back(slot);
        }
        self.inner.cond.notify_all();
        self.start();
    }

    /// Threads block on the paused flag without exiting.
    pub fn pause(&self) {
        let mut queue = self.inner.queue.lock();
        queue.paused = true;
    }

    pub fn resume(&self) {
        {
            let mut queue = self.inner.queue.lock();
            queue.paused = false;
        }
        self.inner.cond.notify_all();
    }

    /// Block until the pool is idle, then drop the queue and let the
    /// service clear its own state. Callers pause the pool first.
    pub fn flush(&self) {
        let has_threads = !self.inner.threads.lock().is_empty();
        let mut queue = self.inner.queue.lock();
        debug_assert!(queue.paused || !has_threads);
        while !self.inner.idle.load(Ordering::SeqCst) {
            self.inner.idle_cond.wait(&mut queue);
        }
        queue.tasks.clear();
        drop(queue);
        self.inner.service.on_flushing();
    }

    /// Let the service re-seed its caches after a pipeline restart.
    pub fn restart(&self) {
        self.inner.service.on_restarted();
    }

    /// First stop phase: raise the stopping flag and wake every thread.
    pub fn signal_stop(&self) {
        {
            let mut queue = self.inner.queue.lock();
            queue.state = PoolState::Stopping;
        }
        self.inner.cond.notify_all();
        self.inner.idle_cond.notify_all();
    }

    /// Second stop phase: join the threads.
    pub fn stop(&self) {
        let handles: Vec<_> = self.inner.threads.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
        let mut queue = self.inner.queue.lock();
        queue.state = PoolState::Stopped;
    }

    /// A pool is idle iff its queue is empty and no thread is executing a
    /// task.
    pub fn is_idle(&self) -> bool {
        self.inner.idle.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> PoolState {
        let queue = self.inner.queue.lock();
        if queue.paused && queue.state == PoolState::Running {
            PoolState::Paused
        } else {
            queue.state
        }
    }
}

impl WorkerInner {
    /// Flip the idle flag and notify the coordinator. Callers hold the
    /// queue lock, so flush observers see a monotonic sequence.
    fn set_idle(&self, _queue: &Queue, idle: bool) {
        if self.idle.swap(idle, Ordering::SeqCst) != idle {
            self.idle_cond.notify_all();
            if let Some(cb) = self.cb.upgrade() {
                cb.on_idle_changed(idle);
            }
        }
    }

    fn done(&self, task: Task, status: Status) {
        if let Some(cb) = self.cb.upgrade() {
            cb.done(task, status);
        }
    }

    /// Run the service on one task, demoting faults to statuses.
    fn execute(&self, task: &mut Task) -> Status {
        let conn = match get_conn(&self.pool) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!("No database connection for {}: {}", task.item.mrl(), e);
                return Status::Error;
            }
        };

        // A file on an absent removable device cannot be parsed; postpone
        // until the device is mounted back.
        if let Some(file) = &task.file {
            if file.is_removable {
                if let Some(folder_id) = file.folder_id {
                    match folders::is_present(&conn, folder_id) {
                        Ok(true) => {}
                        Ok(false) => {
                            tracing::info!(
                                "Postponing parsing of {} until its device is mounted back",
                                file.mrl
                            );
                            return Status::TemporaryUnavailable;
                        }
                        Err(e) => {
                            tracing::error!("Presence check failed for {}: {}", file.mrl, e);
                            return Status::Error;
                        }
                    }
                }
            }
        }

        if let Err(e) = task.start_step(&conn) {
            tracing::error!("Failed to persist retry count for {}: {}", task.item.mrl(), e);
            return Status::Error;
        }
        drop(conn);

        tracing::info!("Executing {} task on {}", self.service.name(), task.item.mrl());
        let started = Instant::now();
        let status = match catch_unwind(AssertUnwindSafe(|| self.service.run(task))) {
            Ok(status) => status,
            Err(_) => {
                tracing::error!(
                    "Caught a panic during {} [{}] parsing",
                    task.item.mrl(),
                    self.service.name()
                );
                Status::Fatal
            }
        };
        tracing::info!(
            "Done executing {} task on {} in {}ms",
            self.service.name(),
            task.item.mrl(),
            started.elapsed().as_millis()
        );
        status
    }

    /// Persist the step outcome. Success on the extraction step is
    /// deliberately not persisted: restarting a task with extraction done
    /// but analysis pending would skip the extraction and hand the analyzer
    /// an empty item. The retry counter is refunded instead, so the
    /// two-step design does not halve the retry budget.
    fn handle_service_result(&self, task: &mut Task, status: Status) -> Status {
        let conn = match get_conn(&self.pool) {
            Ok(conn) => conn,
            Err(_) => return Status::Fatal,
        };
        match status {
            Status::Success => {
                task.mark_step_completed(self.service.target_step());
                let res = if self.service.target_step() == Step::MetadataExtraction {
                    task.decrement_retry(&conn)
                } else {
                    task.save_steps(&conn)
                };
                match res {
                    Ok(()) => Status::Success,
                    Err(_) => Status::Fatal,
                }
            }
            Status::Completed => {
                task.mark_step_completed(Step::Completed);
                match task.save_steps(&conn) {
                    Ok(()) => Status::Completed,
                    Err(_) => Status::Fatal,
                }
            }
            Status::Discarded => {
                if let Err(e) = tasks::destroy(&conn, task.id()) {
                    tracing::error!("Failed to delete discarded task {}: {}", task.id(), e);
                }
                Status::Discarded
            }
            other => other,
        }
    }

    /// Re-enqueue persisted tasks through the coordinator.
    fn restore_tasks(&self) {
        let conn = match get_conn(&self.pool) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!("Cannot restore tasks: {}", e);
                return;
            }
        };
        let rows = match tasks::fetch_uncompleted(&conn) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!("Cannot fetch uncompleted tasks: {}", e);
                return;
            }
        };
        tracing::info!("Resuming parsing on {} tasks", rows.len());
        for row in rows {
            if self.queue.lock().state == PoolState::Stopping {
                break;
            }
            let mut task = Task::from_row(row.clone());
            match task.restore_linked_entities(&conn, &row) {
                Ok(true) => {
                    if let Some(cb) = self.cb.upgrade() {
                        cb.parse(task);
                    }
                }
                Ok(false) => {
                    tracing::warn!("Dropping task {} with stale entities", row.mrl);
                }
                Err(e) => {
                    tracing::error!("Failed to restore task {}: {}", row.mrl, e);
                }
            }
        }
    }
}

fn mainloop(inner: Arc<WorkerInner>) {
    let service_name = inner.service.name();
    tracing::info!("Entering parser service [{}] thread", service_name);
    {
        let queue = inner.queue.lock();
        inner.set_idle(&queue, false);
    }

    loop {
        let slot = {
            let mut queue = inner.queue.lock();
            if queue.state == PoolState::Stopping {
                break;
            }
            if queue.tasks.is_empty() || queue.paused {
                tracing::debug!("Halting parser service [{}] mainloop", service_name);
                inner.set_idle(&queue, true);
                while (queue.tasks.is_empty() || queue.paused)
                    && queue.state != PoolState::Stopping
                {
                    inner.cond.wait(&mut queue);
                }
                if queue.state == PoolState::Stopping {
                    break;
                }
                tracing::debug!("Resuming parser service [{}] mainloop", service_name);
                inner.set_idle(&queue, false);
            }
            match queue.tasks.pop_front() {
                Some(slot) => slot,
                None => continue,
            }
        };

        let mut task = match slot {
            Some(task) => task,
            None => {
                inner.restore_tasks();
                continue;
            }
        };

        if task.is_step_completed(inner.service.target_step()) {
            tracing::info!(
                "Skipping completed task [{}] on {}",
                service_name,
                task.item.mrl()
            );
            inner.done(task, Status::Success);
            continue;
        }

        let status = inner.execute(&mut task);
        let status = inner.handle_service_result(&mut task, status);
        inner.done(task, status);
    }

    tracing::info!("Exiting parser service [{}] thread", service_name);
    let queue = inner.queue.lock();
    inner.set_idle(&queue, true);
}
