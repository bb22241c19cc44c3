//! Delivery log entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Outcome of a single send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum DeliveryStatus {
    /// The provider accepted the message.
    #[sea_orm(string_value = "sent")]
    Sent,
    /// The provider rejected the message; see `failure_reason`.
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl DeliveryStatus {
    /// Stored string value, used verbatim in report rows.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

/// Append-only outcome record per send attempt.
///
/// There is deliberately no uniqueness constraint on (campaign, recipient):
/// a retried batch may insert duplicate rows, and consumers that need an
/// effective per-recipient outcome must take the most recent row.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Campaign this attempt belongs to.
    #[sea_orm(indexed)]
    pub campaign_id: String,

    /// Recipient, if the record still exists.
    #[sea_orm(nullable)]
    pub recipient_id: Option<String>,

    /// Snapshot of the recipient's email at send time.
    #[sea_orm(indexed)]
    pub recipient_email: String,

    /// Send outcome.
    pub status: DeliveryStatus,

    /// Provider failure message, when `status` is failed.
    #[sea_orm(nullable, column_type = "Text")]
    pub failure_reason: Option<String>,

    /// When the attempt was made.
    pub sent_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::campaign::Entity",
        from = "Column::CampaignId",
        to = "super::campaign::Column::Id",
        on_delete = "Cascade"
    )]
    Campaign,
    #[sea_orm(
        belongs_to = "super::recipient::Entity",
        from = "Column::RecipientId",
        to = "super::recipient::Column::Id",
        on_delete = "SetNull"
    )]
    Recipient,
}

impl Related<super::campaign::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campaign.def()
    }
}

impl Related<super::recipient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipient.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
