//! Repository traits
//!
//! 引擎只通过这些窄接口访问存储；`SeaOrmStorage` 实现全部 trait，
//! 测试可以替换成内存实现。

use async_trait::async_trait;

use crate::errors::Result;

use super::models::{
    BlacklistEntry, Click, DeliveryQuery, DeliveryRecord, Event, NewBlacklistEntry, NewDelivery,
    NewEvent, Offer, PostbackProfile, ProfileDraft, TrackingLink,
};

#[async_trait]
pub trait ClickStore: Send + Sync {
    /// 点击与它的 open 事件原子写入，返回写入的事件
    async fn insert_click(&self, click: &Click, open_event: &NewEvent) -> Result<Event>;
    async fn get_click(&self, click_id: &str) -> Result<Option<Click>>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert_event(&self, event: &NewEvent) -> Result<Event>;
    /// 按创建顺序返回
    async fn events_for_click(&self, click_id: &str) -> Result<Vec<Event>>;
}

#[async_trait]
pub trait OfferStore: Send + Sync {
    async fn get_offer(&self, offer_id: &str) -> Result<Option<Offer>>;
    async fn upsert_offer(&self, offer: &Offer) -> Result<()>;
}

#[async_trait]
pub trait TrackingLinkStore: Send + Sync {
    async fn get_tracking_link(&self, code: &str) -> Result<Option<TrackingLink>>;
    async fn insert_tracking_link(&self, link: &TrackingLink) -> Result<()>;
    async fn increment_link_clicks(&self, code: &str) -> Result<()>;
}

/// owner 维度的回传配置存储
///
/// 所有按 id 的操作都带 owner_id，不属于调用方的记录与不存在等同。
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// 按 priority 升序
    async fn list_profiles(&self, owner_id: &str, enabled_only: bool)
    -> Result<Vec<PostbackProfile>>;
    async fn get_profile(&self, owner_id: &str, id: &str) -> Result<Option<PostbackProfile>>;
    async fn insert_profile(&self, owner_id: &str, draft: &ProfileDraft)
    -> Result<PostbackProfile>;
    async fn update_profile(
        &self,
        owner_id: &str,
        id: &str,
        draft: &ProfileDraft,
    ) -> Result<Option<PostbackProfile>>;
    /// 返回是否删除了记录
    async fn delete_profile(&self, owner_id: &str, id: &str) -> Result<bool>;
}

/// 只追加的投递日志
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    async fn append_delivery(&self, delivery: &NewDelivery) -> Result<()>;
    /// 最新的在前，仅限 owner 自己的 profile
    async fn recent_deliveries(&self, query: &DeliveryQuery) -> Result<Vec<DeliveryRecord>>;
}

#[async_trait]
pub trait BlacklistStore: Send + Sync {
    async fn list_blacklist(&self) -> Result<Vec<BlacklistEntry>>;
    async fn insert_blacklist(&self, entry: &NewBlacklistEntry) -> Result<BlacklistEntry>;
    async fn delete_blacklist(&self, id: &str) -> Result<bool>;
}

/// 就绪探针
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> Result<()>;
}
