//! Click entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "clicks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub click_id: String,
    pub advertiser_id: String,
    pub partner_id: String,
    pub offer_id: String,
    pub campaign_id: Option<String>,
    pub flow_id: Option<String>,
    pub tracking_code: Option<String>,
    pub sub1: Option<String>,
    pub sub2: Option<String>,
    pub sub3: Option<String>,
    pub sub4: Option<String>,
    pub sub5: Option<String>,
    pub sub6: Option<String>,
    pub sub7: Option<String>,
    pub sub8: Option<String>,
    pub sub9: Option<String>,
    pub sub10: Option<String>,
    pub sub11: Option<String>,
    pub sub12: Option<String>,
    pub sub13: Option<String>,
    pub sub14: Option<String>,
    pub sub15: Option<String>,
    pub sub16: Option<String>,
    /// sub2 解析结果（JSON 对象），解析失败时为 NULL
    #[sea_orm(column_type = "Text", nullable)]
    pub sub2_parsed: Option<String>,
    pub ip: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub user_agent: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub referrer: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub device_type: Option<String>,
    pub os: Option<String>,
    pub browser: Option<String>,
    #[sea_orm(default_value = false)]
    pub is_bot: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
