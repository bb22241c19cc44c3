//! Recipient entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Subscription state of a recipient.
///
/// Only subscribed recipients are eligible for campaign delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum SubscriptionStatus {
    /// Eligible for campaign delivery.
    #[sea_orm(string_value = "subscribed")]
    Subscribed,
    /// Opted out; skipped by the batch dispatcher.
    #[sea_orm(string_value = "unsubscribed")]
    Unsubscribed,
}

/// A subscriber record.
///
/// Emails are stored case-normalized and are globally unique; the bulk
/// importer silently absorbs uniqueness conflicts instead of erroring.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "recipient")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Display name. May be empty.
    pub name: String,

    /// Case-normalized email address.
    #[sea_orm(unique, indexed)]
    pub email: String,

    /// Current subscription state.
    pub subscription_status: SubscriptionStatus,

    /// When this recipient was created.
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
