//! Postback 表迁移
//!
//! - postback_profiles: 回传配置（目标地址、鉴权、签名、模板、重试与过滤规则）
//! - postback_deliveries: 每次投递尝试一行的审计日志

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 postback_profiles 表
        manager
            .create_table(
                Table::create()
                    .table(PostbackProfiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PostbackProfiles::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::OwnerId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::Name)
                            .string_len(255)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::ScopeType)
                            .string_len(16)
                            .not_null()
                            .default("global"),
                    )
                    .col(ColumnDef::new(PostbackProfiles::ScopeId).string_len(64).null())
                    .col(
                        ColumnDef::new(PostbackProfiles::Priority)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(PostbackProfiles::EndpointUrl).text().not_null())
                    .col(
                        ColumnDef::new(PostbackProfiles::Method)
                            .string_len(8)
                            .not_null()
                            .default("GET"),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::IdParam)
                            .string_len(16)
                            .not_null()
                            .default("clickid"),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::AuthQueryKey)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::AuthQueryVal)
                            .string_len(1024)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::AuthHeaderKey)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::AuthHeaderVal)
                            .string_len(1024)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::HmacEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::HmacSecret)
                            .string_len(1024)
                            .null(),
                    )
                    .col(ColumnDef::new(PostbackProfiles::HmacPayloadTpl).text().null())
                    .col(
                        ColumnDef::new(PostbackProfiles::HmacParamName)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::HmacEncoding)
                            .string_len(16)
                            .not_null()
                            .default("hex"),
                    )
                    .col(ColumnDef::new(PostbackProfiles::StatusMap).text().not_null())
                    .col(
                        ColumnDef::new(PostbackProfiles::ParamsTemplate)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::UrlEncode)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::Retries)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::TimeoutMs)
                            .big_integer()
                            .not_null()
                            .default(5000),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::BackoffBaseSec)
                            .big_integer()
                            .not_null()
                            .default(2),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::FilterRevenueGt0)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::FilterCountryWhitelist)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::FilterCountryBlacklist)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::FilterExcludeBots)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PostbackProfiles::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // (owner_id, priority) 复合索引：分发时按 owner 拉取并按优先级排序
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_postback_profiles_owner_priority")
                    .table(PostbackProfiles::Table)
                    .col(PostbackProfiles::OwnerId)
                    .col(PostbackProfiles::Priority)
                    .to_owned(),
            )
            .await?;

        // 创建 postback_deliveries 表
        manager
            .create_table(
                Table::create()
                    .table(PostbackDeliveries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PostbackDeliveries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PostbackDeliveries::ProfileId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PostbackDeliveries::EventId)
                            .string_len(32)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PostbackDeliveries::ClickId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PostbackDeliveries::EventType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PostbackDeliveries::Attempt)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PostbackDeliveries::MaxAttempts)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PostbackDeliveries::RequestMethod)
                            .string_len(8)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PostbackDeliveries::RequestUrl)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PostbackDeliveries::RequestBody).text().null())
                    .col(
                        ColumnDef::new(PostbackDeliveries::ResponseCode)
                            .integer()
                            .null(),
                    )
                    .col(ColumnDef::new(PostbackDeliveries::ResponseBody).text().null())
                    .col(ColumnDef::new(PostbackDeliveries::Error).text().null())
                    .col(
                        ColumnDef::new(PostbackDeliveries::DurationMs)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PostbackDeliveries::CreatedAt)
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
                    .name("idx_postback_deliveries_profile_time")
                    .table(PostbackDeliveries::Table)
                    .col(PostbackDeliveries::ProfileId)
                    .col(PostbackDeliveries::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_postback_deliveries_click_id")
                    .table(PostbackDeliveries::Table)
                    .col(PostbackDeliveries::ClickId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_postback_deliveries_click_id")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_postback_deliveries_profile_time")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(PostbackDeliveries::Table).to_owned())
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_postback_profiles_owner_priority")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(PostbackProfiles::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PostbackProfiles {
    #[sea_orm(iden = "postback_profiles")]
    Table,
    Id,
    OwnerId,
    Name,
    ScopeType,
    ScopeId,
    Priority,
    Enabled,
    EndpointUrl,
    Method,
    IdParam,
    AuthQueryKey,
    AuthQueryVal,
    AuthHeaderKey,
    AuthHeaderVal,
    HmacEnabled,
    HmacSecret,
    HmacPayloadTpl,
    HmacParamName,
    HmacEncoding,
    StatusMap,
    ParamsTemplate,
    UrlEncode,
    Retries,
    TimeoutMs,
    BackoffBaseSec,
    #[sea_orm(iden = "filter_revenue_gt0")]
    FilterRevenueGt0,
    FilterCountryWhitelist,
    FilterCountryBlacklist,
    FilterExcludeBots,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PostbackDeliveries {
    #[sea_orm(iden = "postback_deliveries")]
    Table,
    Id,
    ProfileId,
    EventId,
    ClickId,
    EventType,
    Attempt,
    MaxAttempts,
    RequestMethod,
    RequestUrl,
    RequestBody,
    ResponseCode,
    ResponseBody,
    Error,
    DurationMs,
    CreatedAt,
}
