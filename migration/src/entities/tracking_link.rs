//! Tracking link entity（partner 生成的短跟踪码）

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "tracking_links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,
    pub partner_id: String,
    pub offer_id: String,
    pub flow_id: Option<String>,
    /// 默认 sub 值（JSON 对象，如 {"sub1": "x"}）
    #[sea_orm(column_type = "Text", nullable)]
    pub default_subs: Option<String>,
    pub click_count: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
