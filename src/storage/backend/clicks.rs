//! 点击、事件、offer、跟踪链接的存储实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DbErr, EntityTrait, ExprTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use tracing::debug;

use super::SeaOrmStorage;
use super::converters::{
    click_to_active_model, model_to_click, model_to_event, model_to_offer, model_to_tracking_link,
    new_event_to_active_model, offer_to_active_model, tracking_link_to_active_model,
};
use super::retry;
use crate::errors::{ClicktrailError, Result};
use crate::storage::models::{Click, Event, NewEvent, Offer, TrackingLink};
use crate::storage::traits::{ClickStore, EventStore, OfferStore, TrackingLinkStore};

use migration::entities::{click, event, offer, tracking_link};

fn stored_event(e: &NewEvent, id: i64, created_at: DateTime<Utc>) -> Event {
    Event {
        id: id.to_string(),
        click_id: e.click_id.clone(),
        event_type: e.event_type.clone(),
        revenue: e.revenue,
        currency: e.currency.clone(),
        txid: e.txid.clone(),
        advertiser_id: e.advertiser_id.clone(),
        partner_id: e.partner_id.clone(),
        created_at,
    }
}

#[async_trait]
impl ClickStore for SeaOrmStorage {
    async fn insert_click(&self, c: &Click, open_event: &NewEvent) -> Result<Event> {
        let db = &self.db;
        let now = Utc::now();
        // 点击与 open 事件同一事务提交，不会留下没有事件的点击
        let event_id = retry::with_retry(
            &format!("insert_click({})", c.click_id),
            self.retry_config,
            || async {
                let txn = db.begin().await?;
                click::Entity::insert(click_to_active_model(c))
                    .exec_without_returning(&txn)
                    .await?;
                let inserted = event::Entity::insert(new_event_to_active_model(open_event, now))
                    .exec(&txn)
                    .await?;
                txn.commit().await?;
                Ok::<_, DbErr>(inserted.last_insert_id)
            },
        )
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("写入点击失败: {}", e)))?;

        debug!("Click stored: {}", c.click_id);
        Ok(stored_event(open_event, event_id, now))
    }

    async fn get_click(&self, click_id: &str) -> Result<Option<Click>> {
        let db = &self.db;
        let model = retry::with_retry(
            &format!("get_click({})", click_id),
            self.retry_config,
            || async { click::Entity::find_by_id(click_id).one(db).await },
        )
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("查询点击失败: {}", e)))?;

        Ok(model.map(model_to_click))
    }
}

#[async_trait]
impl EventStore for SeaOrmStorage {
    async fn insert_event(&self, e: &NewEvent) -> Result<Event> {
        let db = &self.db;
        let now = Utc::now();
        let result = retry::with_retry(
            &format!("insert_event({})", e.click_id),
            self.retry_config,
            || async {
                event::Entity::insert(new_event_to_active_model(e, now))
                    .exec(db)
                    .await
            },
        )
        .await
        .map_err(|err| ClicktrailError::database_operation(format!("写入事件失败: {}", err)))?;

        Ok(stored_event(e, result.last_insert_id, now))
    }

    async fn events_for_click(&self, click_id: &str) -> Result<Vec<Event>> {
        let db = &self.db;
        let models = retry::with_retry(
            &format!("events_for_click({})", click_id),
            self.retry_config,
            || async {
                event::Entity::find()
                    .filter(event::Column::ClickId.eq(click_id))
                    .order_by_asc(event::Column::CreatedAt)
                    .order_by_asc(event::Column::Id)
                    .all(db)
                    .await
            },
        )
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("查询事件失败: {}", e)))?;

        Ok(models.into_iter().map(model_to_event).collect())
    }
}

#[async_trait]
impl OfferStore for SeaOrmStorage {
    async fn get_offer(&self, offer_id: &str) -> Result<Option<Offer>> {
        let db = &self.db;
        let model = retry::with_retry(
            &format!("get_offer({})", offer_id),
            self.retry_config,
            || async { offer::Entity::find_by_id(offer_id).one(db).await },
        )
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("查询 offer 失败: {}", e)))?;

        Ok(model.map(model_to_offer))
    }

    async fn upsert_offer(&self, o: &Offer) -> Result<()> {
        let db = &self.db;
        retry::with_retry(
            &format!("upsert_offer({})", o.id),
            self.retry_config,
            || async {
                offer::Entity::insert(offer_to_active_model(o))
                    .on_conflict(
                        OnConflict::column(offer::Column::Id)
                            .update_columns([
                                offer::Column::AdvertiserId,
                                offer::Column::CampaignId,
                                offer::Column::Name,
                                offer::Column::LandingUrl,
                            ])
                            .to_owned(),
                    )
                    .exec_without_returning(db)
                    .await
            },
        )
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("写入 offer 失败: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl TrackingLinkStore for SeaOrmStorage {
    async fn get_tracking_link(&self, code: &str) -> Result<Option<TrackingLink>> {
        let db = &self.db;
        let model = retry::with_retry(
            &format!("get_tracking_link({})", code),
            self.retry_config,
            || async { tracking_link::Entity::find_by_id(code).one(db).await },
        )
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("查询跟踪链接失败: {}", e)))?;

        Ok(model.map(model_to_tracking_link))
    }

    async fn insert_tracking_link(&self, link: &TrackingLink) -> Result<()> {
        let db = &self.db;
        retry::with_retry(
            &format!("insert_tracking_link({})", link.code),
            self.retry_config,
            || async {
                tracking_link::Entity::insert(tracking_link_to_active_model(link))
                    .exec_without_returning(db)
                    .await
            },
        )
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("写入跟踪链接失败: {}", e)))?;

        Ok(())
    }

    async fn increment_link_clicks(&self, code: &str) -> Result<()> {
        let db = &self.db;
        retry::with_retry(
            &format!("increment_link_clicks({})", code),
            self.retry_config,
            || async {
                tracking_link::Entity::update_many()
                    .col_expr(
                        tracking_link::Column::ClickCount,
                        Expr::col(tracking_link::Column::ClickCount).add(Expr::val(1i64)),
                    )
                    .filter(tracking_link::Column::Code.eq(code))
                    .exec(db)
                    .await
            },
        )
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("更新点击计数失败: {}", e)))?;

        Ok(())
    }
}
