//! 点击/事件追踪
//!
//! 点击 ID 与跟踪码生成、sub2 解析、落地页渲染、访客信息补全，
//! 以及串起这些步骤的 [`TrackingService`]。

pub mod click_id;
pub mod enrichment;
pub mod landing;
pub mod service;
pub mod sub_params;

pub use enrichment::{ClickEnricher, ClientInfo, HeaderEnricher};
pub use service::{
    ClickOutcome, ClickRequest, ClickSource, EventInput, OfferInput, TrackingLinkInput,
    TrackingService, TrackingStores,
};
