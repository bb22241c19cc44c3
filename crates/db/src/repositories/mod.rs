//! Repository layer.

mod campaign;
mod delivery_log;
mod recipient;

pub use campaign::{CampaignRepository, ClaimOutcome};
pub use delivery_log::DeliveryLogRepository;
pub use recipient::RecipientRepository;
