//! Business logic services.

pub mod campaign;
pub mod importer;
pub mod providers;
pub mod queue;
pub mod report;

pub use campaign::{CampaignService, CreateCampaignInput, UpdateCampaignInput};
pub use importer::{
    ChunkSet, ImportSummary, MergeCounters, RecipientImporter, StagingLoader, is_spreadsheet,
    is_valid_email, split_into_chunks,
};
pub use providers::{ProviderGateway, SendOutcome, SendTransport, TransportHandle};
pub use queue::{CampaignQueue, EnqueuedJob, NoOpQueue, QueueHandle, RecordingQueue};
pub use report::ReportService;
