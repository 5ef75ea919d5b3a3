//! 黑名单表迁移
//!
//! 点击入库前按 (kind, value) 检查；expires_at 过期的条目不再生效。

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BlacklistEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BlacklistEntries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(BlacklistEntries::Kind)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BlacklistEntries::Value)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(ColumnDef::new(BlacklistEntries::Reason).string_len(255).null())
                    .col(
                        ColumnDef::new(BlacklistEntries::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(BlacklistEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_blacklist_kind_value")
                    .table(BlacklistEntries::Table)
                    .col(BlacklistEntries::Kind)
                    .col(BlacklistEntries::Value)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_blacklist_kind_value").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(BlacklistEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BlacklistEntries {
    #[sea_orm(iden = "blacklist_entries")]
    Table,
    Id,
    Kind,
    Value,
    Reason,
    ExpiresAt,
    CreatedAt,
}
