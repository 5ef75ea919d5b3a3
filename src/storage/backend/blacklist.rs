//! 黑名单存储

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder};
use tracing::{info, warn};

use super::SeaOrmStorage;
use super::converters::{model_to_blacklist_entry, parse_id};
use super::retry;
use crate::errors::{ClicktrailError, Result};
use crate::storage::models::{BlacklistEntry, NewBlacklistEntry};
use crate::storage::traits::BlacklistStore;

use migration::entities::blacklist_entry;

#[async_trait]
impl BlacklistStore for SeaOrmStorage {
    async fn list_blacklist(&self) -> Result<Vec<BlacklistEntry>> {
        let db = &self.db;
        let models = retry::with_retry("list_blacklist", self.retry_config, || async {
            blacklist_entry::Entity::find()
                .order_by_asc(blacklist_entry::Column::Id)
                .all(db)
                .await
        })
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("查询黑名单失败: {}", e)))?;

        Ok(models
            .into_iter()
            .filter_map(|m| {
                let id = m.id;
                let entry = model_to_blacklist_entry(m);
                if entry.is_none() {
                    warn!("Ignoring blacklist entry {} with unknown kind", id);
                }
                entry
            })
            .collect())
    }

    async fn insert_blacklist(&self, entry: &NewBlacklistEntry) -> Result<BlacklistEntry> {
        let db = &self.db;
        let now = Utc::now();
        let model = retry::with_retry("insert_blacklist", self.retry_config, || async {
            blacklist_entry::ActiveModel {
                id: NotSet,
                kind: Set(entry.kind.as_ref().to_string()),
                value: Set(entry.value.clone()),
                reason: Set(entry.reason.clone()),
                expires_at: Set(entry.expires_at),
                created_at: Set(now),
            }
            .insert(db)
            .await
        })
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("写入黑名单失败: {}", e)))?;

        info!("Blacklist entry added: {} {}", entry.kind, entry.value);
        model_to_blacklist_entry(model)
            .ok_or_else(|| ClicktrailError::internal("黑名单条目类型无法识别"))
    }

    async fn delete_blacklist(&self, id: &str) -> Result<bool> {
        let Some(id) = parse_id(id) else {
            return Ok(false);
        };
        let db = &self.db;
        let result = retry::with_retry(
            &format!("delete_blacklist({})", id),
            self.retry_config,
            || async { blacklist_entry::Entity::delete_by_id(id).exec(db).await },
        )
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("删除黑名单失败: {}", e)))?;

        Ok(result.rows_affected > 0)
    }
}
