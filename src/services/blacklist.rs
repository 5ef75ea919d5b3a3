//! 黑名单过滤
//!
//! 点击入口在写入前调用 `check`。生效条目整体缓存在 moka 中，
//! TTL 到期或管理接口修改后重新加载。

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use tracing::{debug, info};

use crate::errors::{ClicktrailError, Result};
use crate::storage::models::{BlacklistEntry, BlacklistKind, NewBlacklistEntry};
use crate::storage::traits::BlacklistStore;
use crate::utils::ip::{ip_matches, is_ip_or_cidr};

const CACHE_KEY: &str = "entries";

/// 条目是否命中
///
/// - ip：精确或 CIDR
/// - user_agent：忽略大小写的子串
/// - domain：精确或子域名
/// - 其他：精确
pub fn entry_matches(entry: &BlacklistEntry, kind: BlacklistKind, value: &str) -> bool {
    if entry.kind != kind || value.is_empty() {
        return false;
    }
    match kind {
        BlacklistKind::Ip => match value.trim().parse::<IpAddr>() {
            Ok(ip) => ip_matches(&ip, entry.value.trim()),
            Err(_) => entry.value == value,
        },
        BlacklistKind::UserAgent => value
            .to_lowercase()
            .contains(&entry.value.to_lowercase()),
        BlacklistKind::Domain => {
            let host = value.trim().trim_end_matches('.').to_ascii_lowercase();
            let blocked = entry.value.trim().trim_end_matches('.').to_ascii_lowercase();
            host == blocked || host.ends_with(&format!(".{}", blocked))
        }
        BlacklistKind::DeviceId | BlacklistKind::Clickid | BlacklistKind::Subid => {
            entry.value == value
        }
    }
}

pub struct BlacklistFilter {
    store: Arc<dyn BlacklistStore>,
    cache: Cache<&'static str, Arc<Vec<BlacklistEntry>>>,
}

impl BlacklistFilter {
    pub fn new(store: Arc<dyn BlacklistStore>, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(ttl_secs.max(1)))
            .max_capacity(1)
            .build();
        Self { store, cache }
    }

    async fn active_entries(&self) -> Result<Arc<Vec<BlacklistEntry>>> {
        let store = Arc::clone(&self.store);
        self.cache
            .try_get_with(CACHE_KEY, async move {
                let now = Utc::now();
                let entries: Vec<BlacklistEntry> = store
                    .list_blacklist()
                    .await?
                    .into_iter()
                    .filter(|e| e.is_active(now))
                    .collect();
                debug!("Blacklist cache loaded: {} active entries", entries.len());
                Ok::<_, ClicktrailError>(Arc::new(entries))
            })
            .await
            .map_err(|e: Arc<ClicktrailError>| (*e).clone())
    }

    /// 返回第一个命中的条目
    ///
    /// 缓存期间过期的条目在这里再次按当前时间排除。
    pub async fn check(&self, candidates: &[(BlacklistKind, &str)]) -> Result<Option<BlacklistEntry>> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let entries = self.active_entries().await?;
        let now = Utc::now();

        Ok(entries
            .iter()
            .filter(|e| e.is_active(now))
            .find(|e| {
                candidates
                    .iter()
                    .any(|(kind, value)| entry_matches(e, *kind, value))
            })
            .cloned())
    }

    pub async fn list(&self) -> Result<Vec<BlacklistEntry>> {
        self.store.list_blacklist().await
    }

    pub async fn add(&self, entry: NewBlacklistEntry) -> Result<BlacklistEntry> {
        let value = entry.value.trim().to_string();
        if value.is_empty() {
            return Err(ClicktrailError::validation("黑名单值不能为空"));
        }
        if entry.kind == BlacklistKind::Ip && !is_ip_or_cidr(&value) {
            return Err(ClicktrailError::validation(format!(
                "无效的 IP 或 CIDR: {}",
                value
            )));
        }

        let created = self
            .store
            .insert_blacklist(&NewBlacklistEntry { value, ..entry })
            .await?;
        self.cache.invalidate_all();
        info!("Blacklist updated: + {} {}", created.kind, created.value);
        Ok(created)
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        if !self.store.delete_blacklist(id).await? {
            return Err(ClicktrailError::not_found(format!("黑名单条目不存在: {}", id)));
        }
        self.cache.invalidate_all();
        info!("Blacklist updated: - {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: BlacklistKind, value: &str) -> BlacklistEntry {
        BlacklistEntry {
            id: "1".into(),
            kind,
            value: value.into(),
            reason: None,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_ip_exact_and_cidr() {
        let exact = entry(BlacklistKind::Ip, "1.2.3.4");
        assert!(entry_matches(&exact, BlacklistKind::Ip, "1.2.3.4"));
        assert!(!entry_matches(&exact, BlacklistKind::Ip, "1.2.3.5"));

        let cidr = entry(BlacklistKind::Ip, "10.0.0.0/8");
        assert!(entry_matches(&cidr, BlacklistKind::Ip, "10.20.30.40"));
        assert!(!entry_matches(&cidr, BlacklistKind::Ip, "11.0.0.1"));
    }

    #[test]
    fn test_kind_must_match() {
        let e = entry(BlacklistKind::DeviceId, "1.2.3.4");
        assert!(!entry_matches(&e, BlacklistKind::Ip, "1.2.3.4"));
    }

    #[test]
    fn test_user_agent_substring() {
        let e = entry(BlacklistKind::UserAgent, "HeadlessChrome");
        assert!(entry_matches(
            &e,
            BlacklistKind::UserAgent,
            "Mozilla/5.0 headlesschrome/120"
        ));
        assert!(!entry_matches(&e, BlacklistKind::UserAgent, "Mozilla/5.0 Chrome/120"));
    }

    #[test]
    fn test_domain_suffix() {
        let e = entry(BlacklistKind::Domain, "spam.example");
        assert!(entry_matches(&e, BlacklistKind::Domain, "spam.example"));
        assert!(entry_matches(&e, BlacklistKind::Domain, "a.SPAM.example"));
        assert!(!entry_matches(&e, BlacklistKind::Domain, "notspam.example"));
    }

    #[test]
    fn test_subid_exact() {
        let e = entry(BlacklistKind::Subid, "bad");
        assert!(entry_matches(&e, BlacklistKind::Subid, "bad"));
        assert!(!entry_matches(&e, BlacklistKind::Subid, "bad2"));
        assert!(!entry_matches(&e, BlacklistKind::Subid, ""));
    }
}
