//! Postback profile entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "postback_profiles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub owner_id: String,
    pub name: String,
    pub scope_type: String,
    pub scope_id: Option<String>,
    pub priority: i32,
    pub enabled: bool,
    #[sea_orm(column_type = "Text")]
    pub endpoint_url: String,
    pub method: String,
    pub id_param: String,
    pub auth_query_key: Option<String>,
    pub auth_query_val: Option<String>,
    pub auth_header_key: Option<String>,
    pub auth_header_val: Option<String>,
    pub hmac_enabled: bool,
    pub hmac_secret: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub hmac_payload_tpl: Option<String>,
    pub hmac_param_name: Option<String>,
    pub hmac_encoding: String,
    /// JSON 对象：内部事件类型 → 外部状态
    #[sea_orm(column_type = "Text")]
    pub status_map: String,
    /// JSON 对象：参数名 → 宏模板
    #[sea_orm(column_type = "Text")]
    pub params_template: String,
    pub url_encode: bool,
    pub retries: i32,
    pub timeout_ms: i64,
    pub backoff_base_sec: i64,
    pub filter_revenue_gt0: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub filter_country_whitelist: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub filter_country_blacklist: Option<String>,
    pub filter_exclude_bots: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
