//! 回传配置存储

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::info;

use super::SeaOrmStorage;
use super::converters::{draft_to_active_model, model_to_profile, parse_id};
use super::retry;
use crate::errors::{ClicktrailError, Result};
use crate::storage::models::{PostbackProfile, ProfileDraft};
use crate::storage::traits::ProfileStore;

use migration::entities::postback_profile;

impl SeaOrmStorage {
    async fn find_owned_profile(
        &self,
        owner_id: &str,
        id: i64,
    ) -> Result<Option<postback_profile::Model>> {
        let db = &self.db;
        retry::with_retry(
            &format!("get_profile({})", id),
            self.retry_config,
            || async {
                postback_profile::Entity::find_by_id(id)
                    .filter(postback_profile::Column::OwnerId.eq(owner_id))
                    .one(db)
                    .await
            },
        )
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("查询回传配置失败: {}", e)))
    }
}

#[async_trait]
impl ProfileStore for SeaOrmStorage {
    async fn list_profiles(
        &self,
        owner_id: &str,
        enabled_only: bool,
    ) -> Result<Vec<PostbackProfile>> {
        let db = &self.db;
        let models = retry::with_retry(
            &format!("list_profiles({})", owner_id),
            self.retry_config,
            || async {
                let mut query = postback_profile::Entity::find()
                    .filter(postback_profile::Column::OwnerId.eq(owner_id));
                if enabled_only {
                    query = query.filter(postback_profile::Column::Enabled.eq(true));
                }
                query
                    .order_by_asc(postback_profile::Column::Priority)
                    .order_by_asc(postback_profile::Column::Id)
                    .all(db)
                    .await
            },
        )
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("查询回传配置失败: {}", e)))?;

        Ok(models.into_iter().map(model_to_profile).collect())
    }

    async fn get_profile(&self, owner_id: &str, id: &str) -> Result<Option<PostbackProfile>> {
        let Some(id) = parse_id(id) else {
            return Ok(None);
        };
        Ok(self
            .find_owned_profile(owner_id, id)
            .await?
            .map(model_to_profile))
    }

    async fn insert_profile(
        &self,
        owner_id: &str,
        draft: &ProfileDraft,
    ) -> Result<PostbackProfile> {
        let db = &self.db;
        let now = Utc::now();
        let model = retry::with_retry(
            &format!("insert_profile({})", owner_id),
            self.retry_config,
            || async {
                let mut am = draft_to_active_model(draft, now);
                am.owner_id = Set(owner_id.to_string());
                am.created_at = Set(now);
                am.insert(db).await
            },
        )
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("创建回传配置失败: {}", e)))?;

        info!("Postback profile created: {} (owner {})", model.id, owner_id);
        Ok(model_to_profile(model))
    }

    async fn update_profile(
        &self,
        owner_id: &str,
        id: &str,
        draft: &ProfileDraft,
    ) -> Result<Option<PostbackProfile>> {
        let Some(id) = parse_id(id) else {
            return Ok(None);
        };
        let Some(existing) = self.find_owned_profile(owner_id, id).await? else {
            return Ok(None);
        };

        let db = &self.db;
        let now = Utc::now();
        let model = retry::with_retry(
            &format!("update_profile({})", id),
            self.retry_config,
            || async {
                let mut am = draft_to_active_model(draft, now);
                am.id = Set(existing.id);
                am.owner_id = Set(existing.owner_id.clone());
                am.created_at = Set(existing.created_at);
                am.update(db).await
            },
        )
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("更新回传配置失败: {}", e)))?;

        info!("Postback profile updated: {}", id);
        Ok(Some(model_to_profile(model)))
    }

    async fn delete_profile(&self, owner_id: &str, id: &str) -> Result<bool> {
        let Some(id) = parse_id(id) else {
            return Ok(false);
        };
        let db = &self.db;
        let result = retry::with_retry(
            &format!("delete_profile({})", id),
            self.retry_config,
            || async {
                postback_profile::Entity::delete_many()
                    .filter(postback_profile::Column::Id.eq(id))
                    .filter(postback_profile::Column::OwnerId.eq(owner_id))
                    .exec(db)
                    .await
            },
        )
        .await
        .map_err(|e| ClicktrailError::database_operation(format!("删除回传配置失败: {}", e)))?;

        if result.rows_affected > 0 {
            info!("Postback profile deleted: {}", id);
        }
        Ok(result.rows_affected > 0)
    }
}
