//! 投递日志存储

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use tracing::warn;

use super::SeaOrmStorage;
use super::converters::{delivery_to_active_model, model_to_delivery, parse_id};
use super::retry;
use crate::errors::{ClicktrailError, Result};
use crate::storage::models::{DeliveryQuery, DeliveryRecord, NewDelivery};
use crate::storage::traits::DeliveryLog;

use migration::entities::{postback_delivery, postback_profile};

#[async_trait]
impl DeliveryLog for SeaOrmStorage {
    async fn append_delivery(&self, d: &NewDelivery) -> Result<()> {
        let Some(am) = delivery_to_active_model(d, Utc::now()) else {
            warn!(
                "Skip delivery log for non-persistent profile '{}'",
                d.profile_id
            );
            return Ok(());
        };

        let db = &self.db;
        retry::with_retry(
            &format!("append_delivery({})", d.click_id),
            self.retry_config,
            || async {
                postback_delivery::Entity::insert(am.clone())
                    .exec(db)
                    .await
                    .map(|_| ())
            },
        )
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("写入投递日志失败: {}", e)))
    }

    async fn recent_deliveries(&self, query: &DeliveryQuery) -> Result<Vec<DeliveryRecord>> {
        let db = &self.db;

        // 先取 owner 名下的 profile id，投递日志只按这些 id 过滤
        let mut owned: Vec<i64> = retry::with_retry(
            &format!("owned_profile_ids({})", query.owner_id),
            self.retry_config,
            || async {
                postback_profile::Entity::find()
                    .select_only()
                    .column(postback_profile::Column::Id)
                    .filter(postback_profile::Column::OwnerId.eq(query.owner_id.as_str()))
                    .into_tuple::<i64>()
                    .all(db)
                    .await
            },
        )
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("查询回传配置失败: {}", e)))?;

        if let Some(ref profile_id) = query.profile_id {
            match parse_id(profile_id) {
                Some(id) if owned.contains(&id) => owned = vec![id],
                _ => return Ok(Vec::new()),
            }
        }
        if owned.is_empty() {
            return Ok(Vec::new());
        }

        let models = retry::with_retry(
            &format!("recent_deliveries({})", query.owner_id),
            self.retry_config,
            || async {
                let mut select = postback_delivery::Entity::find()
                    .filter(postback_delivery::Column::ProfileId.is_in(owned.iter().copied()));
                if let Some(ref click_id) = query.click_id {
                    select = select.filter(postback_delivery::Column::ClickId.eq(click_id.as_str()));
                }
                select
                    .order_by_desc(postback_delivery::Column::CreatedAt)
                    .order_by_desc(postback_delivery::Column::Id)
                    .limit(query.limit)
                    .all(db)
                    .await
            },
        )
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("查询投递日志失败: {}", e)))?;

        Ok(models.into_iter().map(model_to_delivery).collect())
    }
}
