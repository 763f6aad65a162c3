// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

/// 创建任务执行记录表
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScheduledJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScheduledJobs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScheduledJobs::ScheduledCrawlId).uuid())
                    .col(ColumnDef::new(ScheduledJobs::JobType).string().not_null())
                    .col(ColumnDef::new(ScheduledJobs::SourceUrl).string().not_null())
                    .col(ColumnDef::new(ScheduledJobs::Status).string().not_null())
                    .col(ColumnDef::new(ScheduledJobs::SummaryResult).json())
                    .col(ColumnDef::new(ScheduledJobs::ErrorMessage).text())
                    .col(
                        ColumnDef::new(ScheduledJobs::ResultSummarized)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ScheduledJobs::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ScheduledJobs::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(ScheduledJobs::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ScheduledJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ScheduledJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_scheduled_jobs_status")
                    .table(ScheduledJobs::Table)
                    .col(ScheduledJobs::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScheduledJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ScheduledJobs {
    Table,
    Id,
    ScheduledCrawlId,
    JobType,
    SourceUrl,
    Status,
    SummaryResult,
    ErrorMessage,
    ResultSummarized,
    Attempts,
    StartedAt,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}
