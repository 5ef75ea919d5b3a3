//! 作用域解析与调用方作用域约束

use serde::{Deserialize, Serialize};

use super::event::PostbackEvent;
use crate::storage::models::{PostbackProfile, ScopeType};

/// 管理接口的调用方角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerRole {
    Advertiser,
    Partner,
}

/// partner 只能创建 global 作用域的 profile
///
/// 所有写入路径（创建、更新）都经过这里。
pub fn coerce_scope_for_caller(
    role: CallerRole,
    scope_type: ScopeType,
    scope_id: Option<String>,
) -> (ScopeType, Option<String>) {
    match (role, scope_type) {
        (CallerRole::Partner, _) | (_, ScopeType::Global) => (ScopeType::Global, None),
        (CallerRole::Advertiser, scope) => (scope, scope_id),
    }
}

/// profile 的作用域是否覆盖该事件
pub fn profile_matches(profile: &PostbackProfile, event: &PostbackEvent) -> bool {
    let scope_id = profile.settings.scope_id.as_deref();
    let target = match profile.settings.scope_type {
        ScopeType::Global => return true,
        ScopeType::Offer => Some(event.offer_id.as_str()),
        ScopeType::Campaign => event.campaign_id.as_deref(),
        ScopeType::Flow => event.flow_id.as_deref(),
    };
    matches!((scope_id, target), (Some(s), Some(t)) if s == t)
}
