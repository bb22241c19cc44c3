//! Database entities.

pub mod campaign;
pub mod delivery_log;
pub mod recipient;

pub use campaign::Entity as Campaign;
pub use delivery_log::Entity as DeliveryLog;
pub use recipient::Entity as Recipient;
