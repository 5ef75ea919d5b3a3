//! Storage backend tests
//!
//! Tests for SeaOrmStorage using temporary SQLite databases.

use std::collections::BTreeMap;
use std::sync::Once;

use chrono::{Duration, Utc};
use clicktrail::config::init_config;
use clicktrail::storage::backend::{SeaOrmStorage, infer_backend_from_url, normalize_backend_name};
use clicktrail::storage::models::{
    BlacklistKind, Click, DeliveryQuery, Enrichment, NewBlacklistEntry, NewDelivery, NewEvent,
    Offer, ProfileDraft, ScopeType, SubValues, TrackingLink, Utm,
};
use clicktrail::storage::traits::{
    BlacklistStore, ClickStore, DeliveryLog, EventStore, HealthCheck, OfferStore, ProfileStore,
    TrackingLinkStore,
};
use sea_orm::ConnectionTrait;
use tempfile::TempDir;

// 确保 config 只初始化一次
static INIT: Once = Once::new();

fn init_test_config() {
    INIT.call_once(|| {
        init_config();
    });
}

/// 创建临时 SQLite 数据库的存储实例
async fn create_temp_storage() -> (SeaOrmStorage, TempDir) {
    init_test_config();

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let storage = SeaOrmStorage::new(&db_url, "sqlite")
        .await
        .expect("Failed to create storage");

    (storage, temp_dir)
}

fn test_offer(id: &str, advertiser: &str) -> Offer {
    Offer {
        id: id.to_string(),
        advertiser_id: advertiser.to_string(),
        campaign_id: Some("camp1".to_string()),
        name: Some("Test offer".to_string()),
        landing_url: Some("https://lp.example/?c={clickid}".to_string()),
        created_at: Utc::now(),
    }
}

fn test_click(click_id: &str) -> Click {
    let mut subs = SubValues::default();
    subs.set(1, Some("x".to_string()));
    subs.set(2, Some("geo-US|dev-mobile".to_string()));
    Click {
        click_id: click_id.to_string(),
        advertiser_id: "adv1".to_string(),
        partner_id: "p1".to_string(),
        offer_id: "o1".to_string(),
        campaign_id: Some("camp1".to_string()),
        flow_id: None,
        tracking_code: None,
        subs,
        sub2_parsed: Some(BTreeMap::from([
            ("geo".to_string(), "US".to_string()),
            ("dev".to_string(), "mobile".to_string()),
        ])),
        ip: Some("203.0.113.7".to_string()),
        user_agent: Some("Mozilla/5.0".to_string()),
        referrer: None,
        utm: Utm {
            source: Some("fb".to_string()),
            ..Default::default()
        },
        enrichment: Enrichment {
            country: Some("US".to_string()),
            browser: Some("Chrome".to_string()),
            ..Default::default()
        },
        created_at: Utc::now(),
    }
}

fn new_event(click_id: &str, event_type: &str) -> NewEvent {
    NewEvent {
        click_id: click_id.to_string(),
        event_type: event_type.to_string(),
        revenue: None,
        currency: None,
        txid: None,
        advertiser_id: "adv1".to_string(),
        partner_id: "p1".to_string(),
    }
}

fn delivery(profile_id: &str, click_id: &str, attempt: u32) -> NewDelivery {
    NewDelivery {
        profile_id: profile_id.to_string(),
        event_id: None,
        click_id: click_id.to_string(),
        event_type: "sale".to_string(),
        attempt,
        max_attempts: 3,
        request_method: "GET".to_string(),
        request_url: "https://t.example/pb".to_string(),
        request_body: None,
        response_code: Some(500),
        response_body: Some("err".to_string()),
        error: Some("HTTP 500".to_string()),
        duration_ms: 12,
    }
}

// =============================================================================
// URL 推断和规范化测试
// =============================================================================

#[test]
fn test_infer_backend_from_url() {
    assert_eq!(infer_backend_from_url("sqlite://test.db").unwrap(), "sqlite");
    assert_eq!(infer_backend_from_url("clicktrail.db").unwrap(), "sqlite");
    assert_eq!(
        infer_backend_from_url("postgres://u:p@localhost/db").unwrap(),
        "postgres"
    );
    assert_eq!(
        infer_backend_from_url("mysql://u:p@localhost/db").unwrap(),
        "mysql"
    );
}

#[test]
fn test_normalize_backend_name() {
    assert_eq!(normalize_backend_name("postgresql"), "postgres");
    assert_eq!(normalize_backend_name("mariadb"), "mysql");
    assert_eq!(normalize_backend_name("sqlite"), "sqlite");
}

// =============================================================================
// 点击 / 事件 / offer / 跟踪链接
// =============================================================================

#[tokio::test]
async fn test_click_roundtrip() {
    let (storage, _dir) = create_temp_storage().await;
    let click = test_click("abcDEF123456");

    let open = storage
        .insert_click(&click, &new_event("abcDEF123456", "open"))
        .await
        .unwrap();
    assert_eq!(open.event_type, "open");
    let loaded = storage.get_click("abcDEF123456").await.unwrap().unwrap();

    assert_eq!(loaded.offer_id, "o1");
    assert_eq!(loaded.subs.get(1), Some("x"));
    assert_eq!(loaded.subs.get(2), Some("geo-US|dev-mobile"));
    assert_eq!(loaded.sub2_parsed, click.sub2_parsed);
    assert_eq!(loaded.utm.source.as_deref(), Some("fb"));
    assert_eq!(loaded.enrichment.country.as_deref(), Some("US"));

    assert!(storage.get_click("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_events_have_string_ids_and_oldest_first() {
    let (storage, _dir) = create_temp_storage().await;
    let open = storage
        .insert_click(&test_click("c1"), &new_event("c1", "open"))
        .await
        .unwrap();
    let mut sale = new_event("c1", "sale");
    sale.revenue = Some(50.0);
    sale.currency = Some("USD".to_string());
    let sale = storage.insert_event(&sale).await.unwrap();

    assert!(open.id.parse::<i64>().is_ok());
    assert_ne!(open.id, sale.id);

    let events = storage.events_for_click("c1").await.unwrap();
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec!["open", "sale"]);
    assert_eq!(events[1].revenue, Some(50.0));
}

#[tokio::test]
async fn test_click_rolls_back_when_open_event_fails() {
    let (storage, _dir) = create_temp_storage().await;
    storage
        .get_db()
        .execute_unprepared("DROP TABLE events")
        .await
        .unwrap();

    let result = storage
        .insert_click(&test_click("c1"), &new_event("c1", "open"))
        .await;

    assert!(result.is_err());
    assert!(storage.get_click("c1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_offer_upsert() {
    let (storage, _dir) = create_temp_storage().await;
    storage.upsert_offer(&test_offer("o1", "adv1")).await.unwrap();

    let mut updated = test_offer("o1", "adv1");
    updated.landing_url = None;
    storage.upsert_offer(&updated).await.unwrap();

    let offer = storage.get_offer("o1").await.unwrap().unwrap();
    assert_eq!(offer.landing_url, None);
    assert_eq!(offer.advertiser_id, "adv1");
}

#[tokio::test]
async fn test_tracking_link_click_count() {
    let (storage, _dir) = create_temp_storage().await;
    let mut subs = SubValues::default();
    subs.set(3, Some("default3".to_string()));
    let link = TrackingLink {
        code: "Ab12Cd34".to_string(),
        partner_id: "p1".to_string(),
        offer_id: "o1".to_string(),
        flow_id: Some("f1".to_string()),
        default_subs: subs,
        click_count: 0,
        created_at: Utc::now(),
    };
    storage.insert_tracking_link(&link).await.unwrap();
    storage.increment_link_clicks("Ab12Cd34").await.unwrap();
    storage.increment_link_clicks("Ab12Cd34").await.unwrap();

    let loaded = storage.get_tracking_link("Ab12Cd34").await.unwrap().unwrap();
    assert_eq!(loaded.click_count, 2);
    assert_eq!(loaded.default_subs.get(3), Some("default3"));
    assert_eq!(loaded.flow_id.as_deref(), Some("f1"));
}

// =============================================================================
// 回传 profile
// =============================================================================

#[tokio::test]
async fn test_profiles_are_owner_scoped_and_ordered() {
    let (storage, _dir) = create_temp_storage().await;

    let mut low = ProfileDraft::new("low", "https://a.example/pb");
    low.priority = 10;
    let mut high = ProfileDraft::new("high", "https://b.example/pb");
    high.priority = 1;
    high.scope_type = ScopeType::Offer;
    high.scope_id = Some("o1".to_string());
    high.status_map = BTreeMap::from([("deposit".to_string(), "sale".to_string())]);

    let low = storage.insert_profile("adv1", &low).await.unwrap();
    let high = storage.insert_profile("adv1", &high).await.unwrap();
    storage
        .insert_profile("adv2", &ProfileDraft::new("other", "https://c.example"))
        .await
        .unwrap();

    let list = storage.list_profiles("adv1", false).await.unwrap();
    let names: Vec<&str> = list.iter().map(|p| p.settings.name.as_str()).collect();
    assert_eq!(names, vec!["high", "low"]);
    assert_eq!(list[0].settings.scope_type, ScopeType::Offer);
    assert_eq!(list[0].settings.status_map.get("deposit").map(String::as_str), Some("sale"));

    // 其他 owner 看不到
    assert!(storage.get_profile("adv2", &high.id).await.unwrap().is_none());
    assert!(!storage.delete_profile("adv2", &low.id).await.unwrap());
    assert!(
        storage
            .update_profile("adv2", &low.id, &ProfileDraft::new("x", "https://x.example"))
            .await
            .unwrap()
            .is_none()
    );

    let mut disabled = low.settings.clone();
    disabled.enabled = false;
    let updated = storage
        .update_profile("adv1", &low.id, &disabled)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.created_at.timestamp(), low.created_at.timestamp());
    assert!(!updated.settings.enabled);
    assert_eq!(storage.list_profiles("adv1", true).await.unwrap().len(), 1);

    assert!(storage.delete_profile("adv1", &low.id).await.unwrap());
    assert!(storage.get_profile("adv1", &low.id).await.unwrap().is_none());
}

// =============================================================================
// 投递日志
// =============================================================================

#[tokio::test]
async fn test_recent_deliveries_filters_and_order() {
    let (storage, _dir) = create_temp_storage().await;
    let mine = storage
        .insert_profile("adv1", &ProfileDraft::new("mine", "https://a.example"))
        .await
        .unwrap();
    let theirs = storage
        .insert_profile("adv2", &ProfileDraft::new("theirs", "https://b.example"))
        .await
        .unwrap();

    for attempt in 1..=3 {
        storage
            .append_delivery(&delivery(&mine.id, "c1", attempt))
            .await
            .unwrap();
    }
    storage
        .append_delivery(&delivery(&mine.id, "c2", 1))
        .await
        .unwrap();
    storage
        .append_delivery(&delivery(&theirs.id, "c1", 1))
        .await
        .unwrap();

    let rows = storage
        .recent_deliveries(&DeliveryQuery {
            owner_id: "adv1".to_string(),
            profile_id: None,
            click_id: Some("c1".to_string()),
            limit: 50,
        })
        .await
        .unwrap();
    let attempts: Vec<u32> = rows.iter().map(|r| r.attempt.attempt).collect();
    assert_eq!(attempts, vec![3, 2, 1]);
    assert!(rows.iter().all(|r| r.attempt.profile_id == mine.id));

    let limited = storage
        .recent_deliveries(&DeliveryQuery {
            owner_id: "adv1".to_string(),
            profile_id: Some(mine.id.clone()),
            click_id: None,
            limit: 2,
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 2);

    // 不属于自己的 profile 查不到
    let none = storage
        .recent_deliveries(&DeliveryQuery {
            owner_id: "adv1".to_string(),
            profile_id: Some(theirs.id.clone()),
            click_id: None,
            limit: 50,
        })
        .await
        .unwrap();
    assert!(none.is_empty());
}

// =============================================================================
// 黑名单与健康检查
// =============================================================================

#[tokio::test]
async fn test_blacklist_crud() {
    let (storage, _dir) = create_temp_storage().await;
    let entry = storage
        .insert_blacklist(&NewBlacklistEntry {
            kind: BlacklistKind::Ip,
            value: "10.0.0.0/8".to_string(),
            reason: Some("datacenter".to_string()),
            expires_at: Some(Utc::now() + Duration::hours(1)),
        })
        .await
        .unwrap();

    let all = storage.list_blacklist().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].kind, BlacklistKind::Ip);
    assert!(all[0].is_active(Utc::now()));

    assert!(storage.delete_blacklist(&entry.id).await.unwrap());
    assert!(!storage.delete_blacklist(&entry.id).await.unwrap());
    assert!(!storage.delete_blacklist("not-a-number").await.unwrap());
}

#[tokio::test]
async fn test_ping() {
    let (storage, _dir) = create_temp_storage().await;
    storage.ping().await.unwrap();
}
