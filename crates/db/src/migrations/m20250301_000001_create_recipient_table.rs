//! Create `recipient` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Recipient::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Recipient::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Recipient::Name)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Recipient::Email).text().not_null())
                    .col(
                        ColumnDef::new(Recipient::SubscriptionStatus)
                            .string_len(20)
                            .not_null()
                            .default("subscribed"),
                    )
                    .col(
                        ColumnDef::new(Recipient::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index on email: the bulk importer's ON CONFLICT target
        manager
            .create_index(
                Index::create()
                    .name("idx_recipient_email")
                    .table(Recipient::Table)
                    .col(Recipient::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index on subscription_status for eligible-recipient scans
        manager
            .create_index(
                Index::create()
                    .name("idx_recipient_subscription_status")
                    .table(Recipient::Table)
                    .col(Recipient::SubscriptionStatus)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Recipient::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Recipient {
    Table,
    Id,
    Name,
    Email,
    SubscriptionStatus,
    CreatedAt,
}
