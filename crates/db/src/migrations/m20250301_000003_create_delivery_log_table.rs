//! Create `delivery_log` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DeliveryLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeliveryLog::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DeliveryLog::CampaignId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(DeliveryLog::RecipientId).string_len(32))
                    .col(
                        ColumnDef::new(DeliveryLog::RecipientEmail)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeliveryLog::Status)
                            .string_len(10)
                            .not_null(),
                    )
                    .col(ColumnDef::new(DeliveryLog::FailureReason).text())
                    .col(
                        ColumnDef::new(DeliveryLog::SentAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_delivery_log_campaign")
                            .from(DeliveryLog::Table, DeliveryLog::CampaignId)
                            .to(Campaign::Table, Campaign::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_delivery_log_recipient")
                            .from(DeliveryLog::Table, DeliveryLog::RecipientId)
                            .to(Recipient::Table, Recipient::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Index on campaign_id for the finalizer's log count
        manager
            .create_index(
                Index::create()
                    .name("idx_delivery_log_campaign_id")
                    .table(DeliveryLog::Table)
                    .col(DeliveryLog::CampaignId)
                    .to_owned(),
            )
            .await?;

        // Index on recipient_email for the report's ordered scan.
        // No uniqueness on (campaign_id, recipient_id): retried batches may
        // write duplicate rows and no consumer assumes one row per recipient.
        manager
            .create_index(
                Index::create()
                    .name("idx_delivery_log_recipient_email")
                    .table(DeliveryLog::Table)
                    .col(DeliveryLog::RecipientEmail)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeliveryLog::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DeliveryLog {
    Table,
    Id,
    CampaignId,
    RecipientId,
    RecipientEmail,
    Status,
    FailureReason,
    SentAt,
}

#[derive(Iden)]
enum Campaign {
    Table,
    Id,
}

#[derive(Iden)]
enum Recipient {
    Table,
    Id,
}
