//! Campaign entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a campaign.
///
/// Strict state machine: draft and scheduled are operator-editable;
/// the scheduler performs the one scheduled → `in_progress` transition and
/// the finalizer the one `in_progress` → completed transition. No other
/// transitions exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum CampaignStatus {
    /// Being drafted; not yet eligible for delivery.
    #[sea_orm(string_value = "draft")]
    Draft,
    /// Waiting for its scheduled time.
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    /// Claimed by the scheduler; batches are being sent.
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    /// All delivery logs accounted for.
    #[sea_orm(string_value = "completed")]
    Completed,
}

impl CampaignStatus {
    /// Whether the campaign's editable fields are frozen.
    ///
    /// Once the pipeline owns a campaign, no edit path may mutate it.
    #[must_use]
    pub const fn is_frozen(self) -> bool {
        matches!(self, Self::InProgress | Self::Completed)
    }

    /// Stored string value, for log and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

/// A single email blast with content, schedule, and status.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "campaign")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Campaign name, used in the report subject line.
    pub name: String,

    /// Email subject line.
    pub subject: String,

    /// HTML body content.
    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// When the campaign should start sending, if scheduled.
    #[sea_orm(nullable)]
    pub scheduled_time: Option<DateTimeWithTimeZone>,

    /// Current lifecycle status.
    pub status: CampaignStatus,

    /// Operator who created the campaign.
    #[sea_orm(nullable)]
    pub created_by: Option<String>,

    /// When this campaign was created.
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::delivery_log::Entity")]
    DeliveryLog,
}

impl Related<super::delivery_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frozen_statuses() {
        assert!(!CampaignStatus::Draft.is_frozen());
        assert!(!CampaignStatus::Scheduled.is_frozen());
        assert!(CampaignStatus::InProgress.is_frozen());
        assert!(CampaignStatus::Completed.is_frozen());
    }
}
