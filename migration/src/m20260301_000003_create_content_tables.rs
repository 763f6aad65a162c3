// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

/// 创建漫画与章节表
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Mangas::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Mangas::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Mangas::Title).string().not_null())
                    .col(ColumnDef::new(Mangas::SourceUrl).string().not_null())
                    .col(ColumnDef::new(Mangas::ContentType).string().not_null())
                    .col(
                        ColumnDef::new(Mangas::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Mangas::UpdatedAt)
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
                    .name("idx_mangas_title_type")
                    .table(Mangas::Table)
                    .col(Mangas::Title)
                    .col(Mangas::ContentType)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Chapters::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Chapters::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Chapters::MangaId).uuid().not_null())
                    .col(ColumnDef::new(Chapters::Number).double().not_null())
                    .col(ColumnDef::new(Chapters::Slug).string().not_null())
                    .col(ColumnDef::new(Chapters::Title).string())
                    .col(ColumnDef::new(Chapters::SourceUrl).string().not_null())
                    .col(ColumnDef::new(Chapters::Images).json().not_null())
                    .col(ColumnDef::new(Chapters::Content).text())
                    .col(
                        ColumnDef::new(Chapters::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per chapter slug, which keeps re-runs idempotent
        manager
            .create_index(
                Index::create()
                    .name("idx_chapters_manga_slug")
                    .table(Chapters::Table)
                    .col(Chapters::MangaId)
                    .col(Chapters::Slug)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Chapters::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Mangas::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Mangas {
    Table,
    Id,
    Title,
    SourceUrl,
    ContentType,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Chapters {
    Table,
    Id,
    MangaId,
    Number,
    Slug,
    Title,
    SourceUrl,
    Images,
    Content,
    CreatedAt,
}
