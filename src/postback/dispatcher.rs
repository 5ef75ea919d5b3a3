//! 回传分发器
//!
//! 对一个事件：按 owner 取启用的 profile → 作用域匹配 → 过滤 → 全部并发投递。
//! 每个 profile 独立重试，每次尝试写一行投递日志；单个 profile 的失败只记录，
//! 不会向上传播。

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{Semaphore, watch};
use tracing::{debug, error, info, warn};

use super::event::PostbackEvent;
use super::filter::{FilterOutcome, apply_filters};
use super::request::{PreparedRequest, build_request};
use super::scope::profile_matches;
use super::transport::PostbackTransport;
use crate::config::PostbackConfig;
use crate::storage::models::{NewDelivery, PostbackProfile, ProfileDraft};
use crate::storage::traits::{DeliveryLog, ProfileStore};

/// 分发器的全局限制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    pub workers: usize,
    pub default_timeout_ms: u64,
    pub max_timeout_ms: u64,
    pub max_attempts: u32,
    pub max_backoff_secs: u64,
}

impl From<&PostbackConfig> for DispatchSettings {
    fn from(cfg: &PostbackConfig) -> Self {
        Self {
            workers: cfg.workers.max(1),
            default_timeout_ms: cfg.default_timeout_ms,
            max_timeout_ms: cfg.max_timeout_ms,
            max_attempts: cfg.max_attempts.max(1),
            max_backoff_secs: cfg.max_backoff_secs,
        }
    }
}

impl DispatchSettings {
    /// retries 表示总尝试次数；0 按 1 次处理，并受全局上限约束
    pub fn attempts_for(&self, profile: &ProfileDraft) -> u32 {
        profile.retries.max(1).min(self.max_attempts.max(1))
    }

    pub fn timeout_for(&self, profile: &ProfileDraft) -> Duration {
        let ms = if profile.timeout_ms == 0 {
            self.default_timeout_ms
        } else {
            profile.timeout_ms
        };
        Duration::from_millis(ms.min(self.max_timeout_ms).max(1))
    }

    /// 第 `attempt` 次失败后的等待：base * 2^(attempt-1)，封顶 max_backoff_secs
    pub fn backoff_after(&self, profile: &ProfileDraft, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let secs = profile
            .backoff_base_sec
            .saturating_mul(factor)
            .min(self.max_backoff_secs);
        Duration::from_secs(secs)
    }
}

/// 单个 profile 的投递结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    Failed { attempts: u32 },
    /// 进程关闭，剩余重试被取消
    Cancelled { attempts: u32 },
}

impl DeliveryOutcome {
    pub fn attempts(&self) -> u32 {
        match *self {
            DeliveryOutcome::Delivered { attempts }
            | DeliveryOutcome::Failed { attempts }
            | DeliveryOutcome::Cancelled { attempts } => attempts,
        }
    }
}

/// 一次分发的汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    /// 作用域匹配的 profile 数
    pub matched: usize,
    /// 被过滤掉的 profile 数
    pub filtered: usize,
    pub delivered: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// 实际发出的请求总数
    pub attempts: u32,
}

impl DispatchSummary {
    fn record(&mut self, outcome: DeliveryOutcome) {
        self.attempts += outcome.attempts();
        match outcome {
            DeliveryOutcome::Delivered { .. } => self.delivered += 1,
            DeliveryOutcome::Failed { .. } => self.failed += 1,
            DeliveryOutcome::Cancelled { .. } => self.cancelled += 1,
        }
    }
}

pub struct Dispatcher {
    profiles: Arc<dyn ProfileStore>,
    deliveries: Arc<dyn DeliveryLog>,
    transport: Arc<dyn PostbackTransport>,
    settings: DispatchSettings,
    /// 出站请求并发上限
    permits: Semaphore,
    shutdown: watch::Receiver<bool>,
}

impl Dispatcher {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        deliveries: Arc<dyn DeliveryLog>,
        transport: Arc<dyn PostbackTransport>,
        settings: DispatchSettings,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            profiles,
            deliveries,
            transport,
            permits: Semaphore::new(settings.workers.max(1)),
            settings,
            shutdown,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// 自动触发路径：advertiser 与 partner 的 profile 各自独立解析
    pub async fn dispatch(&self, event: &PostbackEvent) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        let mut targets = Vec::new();

        for owner in event.owners() {
            let profiles = match self.profiles.list_profiles(&owner, true).await {
                Ok(p) => p,
                Err(e) => {
                    error!(
                        clickid = %event.click_id,
                        owner = %owner,
                        "Failed to load postback profiles: {}",
                        e
                    );
                    continue;
                }
            };
            self.select_targets(profiles, event, false, &mut summary, &mut targets);
        }

        self.fan_out(targets, event, &mut summary).await;
        summary
    }

    /// 手动补发：只针对调用方自己的 profile；`force` 时跳过过滤条件
    pub async fn send_manual(
        &self,
        owner_id: &str,
        event: &PostbackEvent,
        force: bool,
    ) -> crate::errors::Result<DispatchSummary> {
        let profiles = self.profiles.list_profiles(owner_id, true).await?;
        let mut summary = DispatchSummary::default();
        let mut targets = Vec::new();
        self.select_targets(profiles, event, force, &mut summary, &mut targets);
        self.fan_out(targets, event, &mut summary).await;

        info!(
            clickid = %event.click_id,
            owner = %owner_id,
            attempts = summary.attempts,
            "Manual postback finished"
        );
        Ok(summary)
    }

    /// 渲染请求但不发送，不写日志
    pub fn dry_run(
        settings: &ProfileDraft,
        event: &PostbackEvent,
    ) -> Result<PreparedRequest, String> {
        build_request(settings, event)
    }

    fn select_targets(
        &self,
        profiles: Vec<PostbackProfile>,
        event: &PostbackEvent,
        force: bool,
        summary: &mut DispatchSummary,
        targets: &mut Vec<PostbackProfile>,
    ) {
        for profile in profiles {
            if !profile.settings.enabled || !profile_matches(&profile, event) {
                continue;
            }
            summary.matched += 1;

            if !force && let FilterOutcome::Skip(reason) = apply_filters(&profile.settings, event) {
                debug!(
                    clickid = %event.click_id,
                    profile_id = %profile.id,
                    "Postback filtered: {}",
                    reason
                );
                summary.filtered += 1;
                continue;
            }
            targets.push(profile);
        }
    }

    async fn fan_out(
        &self,
        targets: Vec<PostbackProfile>,
        event: &PostbackEvent,
        summary: &mut DispatchSummary,
    ) {
        let outcomes = join_all(targets.iter().map(|p| self.deliver(p, event))).await;
        for outcome in outcomes {
            summary.record(outcome);
        }
    }

    /// 单个 profile 的投递状态机
    ///
    /// 每次尝试写一行投递日志，最多 `attempts_for` 次。例外：请求渲染失败
    /// （endpoint 非法、缺少 HMAC secret）时只写一行错误记录并直接失败，
    /// 不消耗剩余重试次数。
    pub async fn deliver(&self, profile: &PostbackProfile, event: &PostbackEvent) -> DeliveryOutcome {
        let settings = &profile.settings;
        let max_attempts = self.settings.attempts_for(settings);

        let request = match build_request(settings, event) {
            Ok(r) => r,
            Err(e) => {
                // 渲染失败不会因重试而改变，只记一行
                error!(
                    clickid = %event.click_id,
                    profile_id = %profile.id,
                    "Postback request build failed: {}",
                    e
                );
                let row = NewDelivery {
                    profile_id: profile.id.clone(),
                    event_id: event.event_id.clone(),
                    click_id: event.click_id.clone(),
                    event_type: event.event_type.clone(),
                    attempt: 1,
                    max_attempts,
                    request_method: settings.method.to_string(),
                    request_url: settings.endpoint_url.clone(),
                    request_body: None,
                    response_code: None,
                    response_body: None,
                    error: Some(e),
                    duration_ms: 0,
                };
                self.record(&row).await;
                return DeliveryOutcome::Failed { attempts: 1 };
            }
        };
        let timeout = self.settings.timeout_for(settings);

        for attempt in 1..=max_attempts {
            let Ok(permit) = self.permits.acquire().await else {
                return DeliveryOutcome::Cancelled {
                    attempts: attempt - 1,
                };
            };
            let started = Instant::now();
            let result = self.transport.send(&request, timeout).await;
            drop(permit);
            let duration_ms = started.elapsed().as_millis().min(u64::MAX as u128) as u64;

            let mut row = NewDelivery {
                profile_id: profile.id.clone(),
                event_id: event.event_id.clone(),
                click_id: event.click_id.clone(),
                event_type: event.event_type.clone(),
                attempt,
                max_attempts,
                request_method: request.method.to_string(),
                request_url: request.url.clone(),
                request_body: request.body.clone(),
                response_code: None,
                response_body: None,
                error: None,
                duration_ms,
            };

            match result {
                Ok(resp) if resp.is_success() => {
                    row.response_code = Some(resp.status);
                    row.response_body = Some(resp.body);
                    self.record(&row).await;
                    info!(
                        clickid = %event.click_id,
                        profile_id = %profile.id,
                        attempt,
                        "Postback delivered ({} ms)",
                        duration_ms
                    );
                    return DeliveryOutcome::Delivered { attempts: attempt };
                }
                Ok(resp) => {
                    row.error = Some(format!("HTTP {}", resp.status));
                    row.response_code = Some(resp.status);
                    row.response_body = Some(resp.body);
                }
                Err(e) => row.error = Some(e),
            }

            let reason = row.error.clone().unwrap_or_default();
            self.record(&row).await;

            if attempt == max_attempts {
                error!(
                    clickid = %event.click_id,
                    profile_id = %profile.id,
                    attempt,
                    "Postback permanently failed: {}",
                    reason
                );
                break;
            }

            let delay = self.settings.backoff_after(settings, attempt);
            warn!(
                clickid = %event.click_id,
                profile_id = %profile.id,
                attempt,
                "Postback attempt failed: {}; retrying in {}s",
                reason,
                delay.as_secs()
            );
            if !self.sleep_unless_shutdown(delay).await {
                warn!(
                    clickid = %event.click_id,
                    profile_id = %profile.id,
                    "Shutdown requested, remaining retries cancelled"
                );
                return DeliveryOutcome::Cancelled { attempts: attempt };
            }
        }

        DeliveryOutcome::Failed {
            attempts: max_attempts,
        }
    }

    /// 返回 false 表示等待期间收到了关闭信号
    async fn sleep_unless_shutdown(&self, delay: Duration) -> bool {
        let mut shutdown = self.shutdown.clone();
        if *shutdown.borrow() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            Ok(_) = shutdown.wait_for(|stop| *stop) => false,
        }
    }

    async fn record(&self, row: &NewDelivery) {
        if let Err(e) = self.deliveries.append_delivery(row).await {
            error!(
                clickid = %row.click_id,
                profile_id = %row.profile_id,
                attempt = row.attempt,
                "Failed to write delivery log: {}",
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> DispatchSettings {
        DispatchSettings {
            workers: 4,
            default_timeout_ms: 5000,
            max_timeout_ms: 30_000,
            max_attempts: 10,
            max_backoff_secs: 300,
        }
    }

    #[test]
    fn test_attempts_bounds() {
        let mut p = ProfileDraft::new("p", "https://t.example");
        p.retries = 0;
        assert_eq!(settings().attempts_for(&p), 1);
        p.retries = 3;
        assert_eq!(settings().attempts_for(&p), 3);
        p.retries = 50;
        assert_eq!(settings().attempts_for(&p), 10);
    }

    #[test]
    fn test_timeout_defaults_and_cap() {
        let mut p = ProfileDraft::new("p", "https://t.example");
        p.timeout_ms = 0;
        assert_eq!(settings().timeout_for(&p), Duration::from_millis(5000));
        p.timeout_ms = 120_000;
        assert_eq!(settings().timeout_for(&p), Duration::from_millis(30_000));
        p.timeout_ms = 250;
        assert_eq!(settings().timeout_for(&p), Duration::from_millis(250));
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let mut p = ProfileDraft::new("p", "https://t.example");
        p.backoff_base_sec = 2;
        let s = settings();
        assert_eq!(s.backoff_after(&p, 1), Duration::from_secs(2));
        assert_eq!(s.backoff_after(&p, 2), Duration::from_secs(4));
        assert_eq!(s.backoff_after(&p, 3), Duration::from_secs(8));
        assert_eq!(s.backoff_after(&p, 20), Duration::from_secs(300));
        assert_eq!(s.backoff_after(&p, 80), Duration::from_secs(300));
    }

    #[test]
    fn test_summary_record() {
        let mut summary = DispatchSummary::default();
        summary.record(DeliveryOutcome::Delivered { attempts: 2 });
        summary.record(DeliveryOutcome::Failed { attempts: 3 });
        assert_eq!(summary.attempts, 5);
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.failed, 1);
    }
}
