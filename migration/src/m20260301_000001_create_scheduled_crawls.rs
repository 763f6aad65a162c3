// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

/// 创建定时爬取表
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScheduledCrawls::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScheduledCrawls::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScheduledCrawls::MangaId).uuid())
                    .col(ColumnDef::new(ScheduledCrawls::MangaTitle).string().not_null())
                    .col(ColumnDef::new(ScheduledCrawls::SourceUrl).string().not_null())
                    .col(
                        ColumnDef::new(ScheduledCrawls::ContentType)
                            .string()
                            .not_null()
                            .default("manga"),
                    )
                    .col(
                        ColumnDef::new(ScheduledCrawls::ScheduleExpression)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledCrawls::NextRunAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ScheduledCrawls::LastRunAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ScheduledCrawls::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ScheduledCrawls::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ScheduledCrawls::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Due lookup: enabled AND next_run_at <= now
        manager
            .create_index(
                Index::create()
                    .name("idx_scheduled_crawls_due")
                    .table(ScheduledCrawls::Table)
                    .col(ScheduledCrawls::Enabled)
                    .col(ScheduledCrawls::NextRunAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScheduledCrawls::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ScheduledCrawls {
    Table,
    Id,
    MangaId,
    MangaTitle,
    SourceUrl,
    ContentType,
    ScheduleExpression,
    NextRunAt,
    LastRunAt,
    Enabled,
    CreatedAt,
    UpdatedAt,
}
