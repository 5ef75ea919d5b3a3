//! 跟踪相关表迁移
//!
//! 创建 offers / tracking_links / clicks / events 四张表：
//! - offers: 广告主 offer 及落地页
//! - tracking_links: partner 跟踪短码
//! - clicks: 每次点击的完整上下文（sub1..sub16、UTM、设备信息）
//! - events: 点击之后的转化事件（open / lead / sale ...）

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 offers 表
        manager
            .create_table(
                Table::create()
                    .table(Offers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Offers::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Offers::AdvertiserId).string_len(64).not_null())
                    .col(ColumnDef::new(Offers::CampaignId).string_len(64).null())
                    .col(ColumnDef::new(Offers::Name).string_len(255).null())
                    .col(ColumnDef::new(Offers::LandingUrl).text().null())
                    .col(
                        ColumnDef::new(Offers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 创建 tracking_links 表
        manager
            .create_table(
                Table::create()
                    .table(TrackingLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TrackingLinks::Code)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TrackingLinks::PartnerId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(TrackingLinks::OfferId).string_len(64).not_null())
                    .col(ColumnDef::new(TrackingLinks::FlowId).string_len(64).null())
                    .col(ColumnDef::new(TrackingLinks::DefaultSubs).text().null())
                    .col(
                        ColumnDef::new(TrackingLinks::ClickCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TrackingLinks::CreatedAt)
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
                    .name("idx_tracking_links_partner")
                    .table(TrackingLinks::Table)
                    .col(TrackingLinks::PartnerId)
                    .to_owned(),
            )
            .await?;

        // 创建 clicks 表
        let mut clicks = Table::create();
        clicks
            .table(Clicks::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Clicks::ClickId)
                    .string_len(32)
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(Clicks::AdvertiserId).string_len(64).not_null())
            .col(ColumnDef::new(Clicks::PartnerId).string_len(64).not_null())
            .col(ColumnDef::new(Clicks::OfferId).string_len(64).not_null())
            .col(ColumnDef::new(Clicks::CampaignId).string_len(64).null())
            .col(ColumnDef::new(Clicks::FlowId).string_len(64).null())
            .col(ColumnDef::new(Clicks::TrackingCode).string_len(64).null());

        // sub1..sub16
        for sub in Clicks::SUBS {
            clicks.col(ColumnDef::new(sub).string_len(255).null());
        }

        clicks
            .col(ColumnDef::new(Clicks::Sub2Parsed).text().null())
            .col(ColumnDef::new(Clicks::Ip).string_len(45).null())
            .col(ColumnDef::new(Clicks::UserAgent).text().null())
            .col(ColumnDef::new(Clicks::Referrer).text().null())
            .col(ColumnDef::new(Clicks::UtmSource).string_len(255).null())
            .col(ColumnDef::new(Clicks::UtmMedium).string_len(255).null())
            .col(ColumnDef::new(Clicks::UtmCampaign).string_len(255).null())
            .col(ColumnDef::new(Clicks::UtmTerm).string_len(255).null())
            .col(ColumnDef::new(Clicks::UtmContent).string_len(255).null())
            .col(ColumnDef::new(Clicks::Country).string_len(2).null())
            .col(ColumnDef::new(Clicks::City).string_len(100).null())
            .col(ColumnDef::new(Clicks::DeviceType).string_len(32).null())
            .col(ColumnDef::new(Clicks::Os).string_len(64).null())
            .col(ColumnDef::new(Clicks::Browser).string_len(64).null())
            .col(
                ColumnDef::new(Clicks::IsBot)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(
                ColumnDef::new(Clicks::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null(),
            );

        manager.create_table(clicks.to_owned()).await?;

        // 创建 (offer_id, created_at) 复合索引（用于按 offer 查询）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_clicks_offer_time")
                    .table(Clicks::Table)
                    .col(Clicks::OfferId)
                    .col(Clicks::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_clicks_partner_time")
                    .table(Clicks::Table)
                    .col(Clicks::PartnerId)
                    .col(Clicks::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // 创建 events 表
        manager
            .create_table(
                Table::create()
                    .table(Events::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Events::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Events::ClickId).string_len(32).not_null())
                    .col(ColumnDef::new(Events::EventType).string_len(32).not_null())
                    .col(ColumnDef::new(Events::Revenue).double().null())
                    .col(ColumnDef::new(Events::Currency).string_len(3).null())
                    .col(ColumnDef::new(Events::Txid).string_len(255).null())
                    .col(ColumnDef::new(Events::AdvertiserId).string_len(64).not_null())
                    .col(ColumnDef::new(Events::PartnerId).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Events::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 创建 click_id 索引（按点击查询事件）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_events_click_id")
                    .table(Events::Table)
                    .col(Events::ClickId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_events_click_id").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Events::Table).to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_clicks_partner_time").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_clicks_offer_time").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Clicks::Table).to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_tracking_links_partner").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TrackingLinks::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Offers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Offers {
    #[sea_orm(iden = "offers")]
    Table,
    Id,
    AdvertiserId,
    CampaignId,
    Name,
    LandingUrl,
    CreatedAt,
}

#[derive(DeriveIden)]
enum TrackingLinks {
    #[sea_orm(iden = "tracking_links")]
    Table,
    Code,
    PartnerId,
    OfferId,
    FlowId,
    DefaultSubs,
    ClickCount,
    CreatedAt,
}

#[derive(DeriveIden, Clone, Copy)]
enum Clicks {
    #[sea_orm(iden = "clicks")]
    Table,
    ClickId,
    AdvertiserId,
    PartnerId,
    OfferId,
    CampaignId,
    FlowId,
    TrackingCode,
    Sub1,
    Sub2,
    Sub3,
    Sub4,
    Sub5,
    Sub6,
    Sub7,
    Sub8,
    Sub9,
    Sub10,
    Sub11,
    Sub12,
    Sub13,
    Sub14,
    Sub15,
    Sub16,
    Sub2Parsed,
    Ip,
    UserAgent,
    Referrer,
    UtmSource,
    UtmMedium,
    UtmCampaign,
    UtmTerm,
    UtmContent,
    Country,
    City,
    DeviceType,
    Os,
    Browser,
    IsBot,
    CreatedAt,
}

impl Clicks {
    const SUBS: [Clicks; 16] = [
        Clicks::Sub1,
        Clicks::Sub2,
        Clicks::Sub3,
        Clicks::Sub4,
        Clicks::Sub5,
        Clicks::Sub6,
        Clicks::Sub7,
        Clicks::Sub8,
        Clicks::Sub9,
        Clicks::Sub10,
        Clicks::Sub11,
        Clicks::Sub12,
        Clicks::Sub13,
        Clicks::Sub14,
        Clicks::Sub15,
        Clicks::Sub16,
    ];
}

#[derive(DeriveIden)]
enum Events {
    #[sea_orm(iden = "events")]
    Table,
    Id,
    ClickId,
    EventType,
    Revenue,
    Currency,
    Txid,
    AdvertiserId,
    PartnerId,
    CreatedAt,
}
