//! Create `campaign` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Campaign::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Campaign::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Campaign::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Campaign::Subject)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Campaign::Content).text().not_null())
                    .col(ColumnDef::new(Campaign::ScheduledTime).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Campaign::Status)
                            .string_len(20)
                            .not_null()
                            .default("draft"),
                    )
                    .col(ColumnDef::new(Campaign::CreatedBy).string_len(255))
                    .col(
                        ColumnDef::new(Campaign::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Composite index for the scheduler's due-campaign scan
        manager
            .create_index(
                Index::create()
                    .name("idx_campaign_status_scheduled_time")
                    .table(Campaign::Table)
                    .col(Campaign::Status)
                    .col(Campaign::ScheduledTime)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Campaign::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Campaign {
    Table,
    Id,
    Name,
    Subject,
    Content,
    ScheduledTime,
    Status,
    CreatedBy,
    CreatedAt,
}
