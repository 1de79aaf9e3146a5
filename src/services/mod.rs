//! Pipeline services.
//!
//! A service is one stage of the ingestion conveyor. Each service is bound
//! to a worker pool that drives it; the service itself only transforms the
//! task it is handed.

pub mod analyzer;
pub mod prober;
pub mod thumbnailer;

use mediatheque_common::Step;

use crate::parser::task::{Status, Task};

/// One stage of the pipeline.
pub trait ParserService: Send + Sync {
    /// Service name, for logging.
    fn name(&self) -> &'static str;

    /// The step this service completes.
    fn target_step(&self) -> Step;

    /// How many worker threads the service tolerates. The analyzer forces 1
    /// to keep its resolution caches lock-free in spirit.
    fn nb_threads(&self) -> u8;

    /// Run the service on one task. Faults must be reported through the
    /// returned status; this must not panic the worker on bad input.
    fn run(&self, task: &mut Task) -> Status;

    /// One-time setup when the service is registered.
    fn initialize(&self) -> bool {
        true
    }

    /// The owning pool dropped its queue.
    fn on_flushing(&self) {}

    /// The pipeline restarted (e.g. a device came back); re-seed caches.
    fn on_restarted(&self) {}
}
