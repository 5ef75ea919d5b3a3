//! Postback profile registry
//!
//! owner 维度的 CRUD。写入路径统一经过 `coerce_scope_for_caller`，
//! 不属于调用方的 profile 一律按不存在处理。

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::errors::{ClicktrailError, FieldError, Result};
use crate::postback::request::validate_endpoint;
use crate::postback::scope::{CallerRole, coerce_scope_for_caller};
use crate::storage::models::{
    HmacEncoding, HttpMethod, IdParam, PostbackProfile, ProfileDraft, ScopeType,
};
use crate::storage::traits::ProfileStore;

const MAX_NAME_LEN: usize = 128;
const MAX_RETRIES: i64 = 100;
const MAX_TIMEOUT_MS: i64 = 600_000;
const MAX_BACKOFF_BASE_SEC: i64 = 86_400;

// ============ Request DTOs ============

/// 创建/更新 profile 的入参
///
/// 未提供的字段：创建时取默认值，更新时保留原值。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileInput {
    pub name: Option<String>,
    pub scope_type: Option<String>,
    pub scope_id: Option<String>,
    pub priority: Option<i32>,
    pub enabled: Option<bool>,
    pub endpoint_url: Option<String>,
    pub method: Option<String>,
    pub id_param: Option<String>,
    pub auth_query_key: Option<String>,
    pub auth_query_val: Option<String>,
    pub auth_header_key: Option<String>,
    pub auth_header_val: Option<String>,
    pub hmac_enabled: Option<bool>,
    pub hmac_secret: Option<String>,
    pub hmac_payload_tpl: Option<String>,
    pub hmac_param_name: Option<String>,
    pub hmac_encoding: Option<String>,
    pub status_map: Option<BTreeMap<String, String>>,
    pub params_template: Option<BTreeMap<String, String>>,
    pub url_encode: Option<bool>,
    pub retries: Option<i64>,
    pub timeout_ms: Option<i64>,
    pub backoff_base_sec: Option<i64>,
    pub filter_revenue_gt0: Option<bool>,
    pub filter_country_whitelist: Option<Vec<String>>,
    pub filter_country_blacklist: Option<Vec<String>>,
    pub filter_exclude_bots: Option<bool>,
}

/// 空字符串视为清空
fn optional_text(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_enum<T: FromStr>(
    field: &str,
    raw: Option<String>,
    current: T,
    errors: &mut Vec<FieldError>,
) -> T {
    match raw {
        None => current,
        Some(s) => s.trim().parse().unwrap_or_else(|_| {
            errors.push(FieldError::new(field, format!("unsupported value '{}'", s)));
            current
        }),
    }
}

fn parse_bounded<T: TryFrom<i64>>(
    field: &str,
    raw: Option<i64>,
    max: i64,
    current: T,
    errors: &mut Vec<FieldError>,
) -> T {
    match raw {
        None => current,
        Some(v) if (0..=max).contains(&v) => T::try_from(v).unwrap_or(current),
        Some(_) => {
            errors.push(FieldError::new(
                field,
                format!("must be between 0 and {}", max),
            ));
            current
        }
    }
}

fn parse_countries(
    field: &str,
    raw: Option<Vec<String>>,
    current: Vec<String>,
    errors: &mut Vec<FieldError>,
) -> Vec<String> {
    let Some(list) = raw else {
        return current;
    };
    let mut out = Vec::with_capacity(list.len());
    for code in list {
        let code = code.trim().to_ascii_uppercase();
        if code.len() == 2 && code.bytes().all(|b| b.is_ascii_alphabetic()) {
            if !out.contains(&code) {
                out.push(code);
            }
        } else {
            errors.push(FieldError::new(
                field,
                format!("'{}' is not an ISO 3166-1 alpha-2 code", code),
            ));
        }
    }
    out
}

impl ProfileInput {
    /// 合并到 `base` 上并校验；作用域约束在校验前应用
    pub fn apply(self, mut base: ProfileDraft, role: CallerRole) -> Result<ProfileDraft> {
        let mut errors = Vec::new();

        if let Some(name) = self.name {
            base.name = name.trim().to_string();
        }
        if let Some(url) = self.endpoint_url {
            base.endpoint_url = url.trim().to_string();
        }

        let scope_type = parse_enum("scope_type", self.scope_type, base.scope_type, &mut errors);
        let scope_id = match self.scope_id {
            Some(id) => optional_text(id),
            None => base.scope_id.take(),
        };
        (base.scope_type, base.scope_id) = coerce_scope_for_caller(role, scope_type, scope_id);

        base.method = parse_enum::<HttpMethod>("method", self.method, base.method, &mut errors);
        base.id_param = parse_enum::<IdParam>("id_param", self.id_param, base.id_param, &mut errors);
        base.hmac_encoding = parse_enum::<HmacEncoding>(
            "hmac_encoding",
            self.hmac_encoding,
            base.hmac_encoding,
            &mut errors,
        );

        if let Some(p) = self.priority {
            base.priority = p;
        }
        if let Some(v) = self.enabled {
            base.enabled = v;
        }
        if let Some(v) = self.url_encode {
            base.url_encode = v;
        }
        if let Some(v) = self.hmac_enabled {
            base.hmac_enabled = v;
        }
        if let Some(v) = self.filter_revenue_gt0 {
            base.filter_revenue_gt0 = v;
        }
        if let Some(v) = self.filter_exclude_bots {
            base.filter_exclude_bots = v;
        }

        let text_fields = [
            (self.auth_query_key, &mut base.auth_query_key),
            (self.auth_query_val, &mut base.auth_query_val),
            (self.auth_header_key, &mut base.auth_header_key),
            (self.auth_header_val, &mut base.auth_header_val),
            (self.hmac_secret, &mut base.hmac_secret),
            (self.hmac_payload_tpl, &mut base.hmac_payload_tpl),
            (self.hmac_param_name, &mut base.hmac_param_name),
        ];
        for (input, slot) in text_fields {
            if let Some(v) = input {
                *slot = optional_text(v);
            }
        }

        if let Some(map) = self.status_map {
            base.status_map = map;
        }
        if let Some(map) = self.params_template {
            base.params_template = map;
        }

        base.retries = parse_bounded("retries", self.retries, MAX_RETRIES, base.retries, &mut errors);
        base.timeout_ms = parse_bounded(
            "timeout_ms",
            self.timeout_ms,
            MAX_TIMEOUT_MS,
            base.timeout_ms,
            &mut errors,
        );
        base.backoff_base_sec = parse_bounded(
            "backoff_base_sec",
            self.backoff_base_sec,
            MAX_BACKOFF_BASE_SEC,
            base.backoff_base_sec,
            &mut errors,
        );

        base.filter_country_whitelist = parse_countries(
            "filter_country_whitelist",
            self.filter_country_whitelist,
            std::mem::take(&mut base.filter_country_whitelist),
            &mut errors,
        );
        base.filter_country_blacklist = parse_countries(
            "filter_country_blacklist",
            self.filter_country_blacklist,
            std::mem::take(&mut base.filter_country_blacklist),
            &mut errors,
        );

        validate_draft(&base, &mut errors);

        if errors.is_empty() {
            Ok(base)
        } else {
            Err(ClicktrailError::invalid_fields("回传配置校验失败", errors))
        }
    }
}

/// 合并之后的整体校验
fn validate_draft(draft: &ProfileDraft, errors: &mut Vec<FieldError>) {
    if draft.name.is_empty() {
        errors.push(FieldError::new("name", "is required"));
    } else if draft.name.chars().count() > MAX_NAME_LEN {
        errors.push(FieldError::new(
            "name",
            format!("must be at most {} characters", MAX_NAME_LEN),
        ));
    }

    if draft.endpoint_url.is_empty() {
        errors.push(FieldError::new("endpoint_url", "is required"));
    } else if let Err(e) = validate_endpoint(&draft.endpoint_url) {
        errors.push(FieldError::new("endpoint_url", e));
    }

    if draft.scope_type != ScopeType::Global && draft.scope_id.is_none() {
        errors.push(FieldError::new(
            "scope_id",
            "is required for non-global scopes",
        ));
    }

    if draft.hmac_enabled && draft.hmac_secret.is_none() {
        errors.push(FieldError::new(
            "hmac_secret",
            "is required when hmac_enabled is true",
        ));
    }

    if draft.auth_query_val.is_some() && draft.auth_query_key.is_none() {
        errors.push(FieldError::new(
            "auth_query_key",
            "is required when auth_query_val is set",
        ));
    }
    if draft.auth_header_val.is_some() && draft.auth_header_key.is_none() {
        errors.push(FieldError::new(
            "auth_header_key",
            "is required when auth_header_val is set",
        ));
    }

    for key in draft.params_template.keys() {
        if key.trim().is_empty() {
            errors.push(FieldError::new("params_template", "parameter names must not be empty"));
            break;
        }
    }
}

// ============ Service ============

pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// 按 priority 升序
    pub async fn list(&self, owner_id: &str) -> Result<Vec<PostbackProfile>> {
        self.store.list_profiles(owner_id, false).await
    }

    pub async fn get(&self, owner_id: &str, id: &str) -> Result<PostbackProfile> {
        self.store
            .get_profile(owner_id, id)
            .await?
            .ok_or_else(|| ClicktrailError::not_found(format!("回传配置不存在: {}", id)))
    }

    pub async fn create(
        &self,
        owner_id: &str,
        role: CallerRole,
        input: ProfileInput,
    ) -> Result<PostbackProfile> {
        let draft = input.apply(ProfileDraft::new("", ""), role)?;
        let profile = self.store.insert_profile(owner_id, &draft).await?;
        info!(
            "Profile {} created by {:?} {} (scope {})",
            profile.id, role, owner_id, profile.settings.scope_type
        );
        Ok(profile)
    }

    pub async fn update(
        &self,
        owner_id: &str,
        role: CallerRole,
        id: &str,
        input: ProfileInput,
    ) -> Result<PostbackProfile> {
        let existing = self.get(owner_id, id).await?;
        let draft = input.apply(existing.settings, role)?;
        self.store
            .update_profile(owner_id, id, &draft)
            .await?
            .ok_or_else(|| ClicktrailError::not_found(format!("回传配置不存在: {}", id)))
    }

    pub async fn delete(&self, owner_id: &str, id: &str) -> Result<()> {
        if self.store.delete_profile(owner_id, id).await? {
            Ok(())
        } else {
            Err(ClicktrailError::not_found(format!("回传配置不存在: {}", id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(url: &str) -> ProfileInput {
        ProfileInput {
            name: Some("tracker".into()),
            endpoint_url: Some(url.into()),
            ..ProfileInput::default()
        }
    }

    #[test]
    fn test_minimal_input_uses_defaults() {
        let draft = input("https://t.example/pb")
            .apply(ProfileDraft::new("", ""), CallerRole::Advertiser)
            .unwrap();
        assert_eq!(draft.scope_type, ScopeType::Global);
        assert_eq!(draft.method, HttpMethod::Get);
        assert_eq!(draft.retries, 3);
        assert!(draft.enabled);
    }

    #[test]
    fn test_partner_scope_coerced_on_apply() {
        let mut i = input("https://t.example/pb");
        i.scope_type = Some("offer".into());
        i.scope_id = Some("O1".into());
        let draft = i
            .apply(ProfileDraft::new("", ""), CallerRole::Partner)
            .unwrap();
        assert_eq!(draft.scope_type, ScopeType::Global);
        assert_eq!(draft.scope_id, None);
    }

    #[test]
    fn test_field_errors_are_collected() {
        let i = ProfileInput {
            endpoint_url: Some("ftp://x".into()),
            method: Some("PATCH".into()),
            retries: Some(-1),
            hmac_enabled: Some(true),
            filter_country_whitelist: Some(vec!["USA".into()]),
            ..ProfileInput::default()
        };
        let err = i
            .apply(ProfileDraft::new("", ""), CallerRole::Advertiser)
            .unwrap_err();
        let fields: Vec<&str> = err.field_errors().iter().map(|f| f.field.as_str()).collect();
        for expected in [
            "name",
            "endpoint_url",
            "method",
            "retries",
            "hmac_secret",
            "filter_country_whitelist",
        ] {
            assert!(fields.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_advertiser_offer_scope_requires_id() {
        let mut i = input("https://t.example/pb");
        i.scope_type = Some("offer".into());
        let err = i
            .apply(ProfileDraft::new("", ""), CallerRole::Advertiser)
            .unwrap_err();
        assert_eq!(err.field_errors()[0].field, "scope_id");
    }

    #[test]
    fn test_update_keeps_unspecified_fields() {
        let mut base = ProfileDraft::new("old", "https://t.example/pb");
        base.priority = 5;
        base.hmac_secret = Some("s".into());
        let i = ProfileInput {
            name: Some("new".into()),
            filter_country_blacklist: Some(vec!["ru".into(), "RU".into()]),
            ..ProfileInput::default()
        };
        let draft = i.apply(base, CallerRole::Advertiser).unwrap();
        assert_eq!(draft.name, "new");
        assert_eq!(draft.priority, 5);
        assert_eq!(draft.hmac_secret.as_deref(), Some("s"));
        assert_eq!(draft.filter_country_blacklist, vec!["RU".to_string()]);
    }
}
