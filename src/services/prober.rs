//! Metadata extraction service.
//!
//! Thin adapter over the decoding backend. Fills the task's `Item` with
//! tags, duration, typed tracks, and playlist sub-items; writes no database
//! state. Persistence is entirely the analyzer's job.

use std::sync::Arc;
use std::time::Duration;

use mediatheque_common::Step;

use crate::parser::task::{Status, Task};
use crate::services::ParserService;

/// How long a single parse request may run before it is abandoned.
pub const PARSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Why the decoding backend failed to produce an item.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("probe failed: {0}")]
    Failed(String),

    #[error("probe timed out")]
    Timeout,

    #[error("device removed during probe")]
    DeviceRemoved,
}

/// The decoding backend. Implementations parse the mrl's tags and streams
/// into the task's item; `use_playback` asks for the deep probe that spins
/// up the playback engine.
pub trait MediaProber: Send + Sync {
    fn probe(
        &self,
        item: &mut crate::parser::task::Item,
        timeout: Duration,
        use_playback: bool,
    ) -> Result<(), ProbeError>;
}

/// The MetadataExtraction stage.
pub struct ProberService {
    prober: Arc<dyn MediaProber>,
}

impl ProberService {
    pub fn new(prober: Arc<dyn MediaProber>) -> Self {
        Self { prober }
    }
}

impl ParserService for ProberService {
    fn name(&self) -> &'static str {
        "Extraction"
    }

    fn target_step(&self) -> Step {
        Step::MetadataExtraction
    }

    fn nb_threads(&self) -> u8 {
        // The decoding backend keeps per-instance state.
        1
    }

    fn run(&self, task: &mut Task) -> Status {
        let mrl = task.item.mrl().clone();
        tracing::info!("Probing {}", mrl);

        if let Err(e) = self.prober.probe(&mut task.item, PARSE_TIMEOUT, false) {
            return probe_error_status(&mrl, e);
        }

        // A file with no stream and no sub-item either needs the playback
        // engine to reveal its streams, and so does artwork behind an
        // attachment:// mrl, which only the decoder can resolve.
        let no_content = task.item.tracks().is_empty() && task.item.sub_items().is_empty();
        let attachment_artwork = task
            .item
            .meta(crate::parser::task::Meta::ArtworkUrl)
            .map(|artwork| artwork.starts_with("attachment://"))
            .unwrap_or(false);

        if no_content || attachment_artwork {
            if no_content {
                tracing::warn!("No tracks found for {}, falling back to playback", mrl);
            }
            if let Err(e) = self.prober.probe(&mut task.item, PARSE_TIMEOUT, true) {
                return probe_error_status(&mrl, e);
            }
        }

        Status::Success
    }
}

fn probe_error_status(mrl: &crate::fs::Mrl, e: ProbeError) -> Status {
    match e {
        ProbeError::DeviceRemoved => {
            tracing::info!("Device removed while probing {}", mrl);
            Status::TemporaryUnavailable
        }
        ProbeError::Failed(reason) => {
            tracing::error!("Failed to probe {}: {}", mrl, reason);
            Status::Fatal
        }
        ProbeError::Timeout => {
            tracing::error!("Timed out probing {}", mrl);
            Status::Fatal
        }
    }
}
