//! profile 过滤条件
//!
//! 按 revenue、国家白名单、国家黑名单、bot 的顺序检查，遇到第一个不满足的即停止。

use std::fmt;

use super::event::PostbackEvent;
use crate::storage::models::ProfileDraft;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    RevenueNotPositive,
    CountryNotWhitelisted,
    CountryBlacklisted,
    BotTraffic,
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterReason::RevenueNotPositive => "revenue is absent or not positive",
            FilterReason::CountryNotWhitelisted => "country not in whitelist",
            FilterReason::CountryBlacklisted => "country in blacklist",
            FilterReason::BotTraffic => "bot traffic excluded",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    Pass,
    Skip(FilterReason),
}

impl FilterOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, FilterOutcome::Pass)
    }
}

fn contains_country(list: &[String], country: &str) -> bool {
    list.iter().any(|c| c.trim().eq_ignore_ascii_case(country))
}

/// 国家未知时不应用国家过滤
pub fn apply_filters(settings: &ProfileDraft, event: &PostbackEvent) -> FilterOutcome {
    if settings.filter_revenue_gt0 && !event.revenue.is_some_and(|r| r > 0.0) {
        return FilterOutcome::Skip(FilterReason::RevenueNotPositive);
    }

    if let Some(country) = event.country.as_deref().filter(|c| !c.is_empty()) {
        if !settings.filter_country_whitelist.is_empty()
            && !contains_country(&settings.filter_country_whitelist, country)
        {
            return FilterOutcome::Skip(FilterReason::CountryNotWhitelisted);
        }
        if contains_country(&settings.filter_country_blacklist, country) {
            return FilterOutcome::Skip(FilterReason::CountryBlacklisted);
        }
    }

    if settings.filter_exclude_bots && event.is_bot {
        return FilterOutcome::Skip(FilterReason::BotTraffic);
    }

    FilterOutcome::Pass
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn event(revenue: Option<f64>, country: Option<&str>, is_bot: bool) -> PostbackEvent {
        PostbackEvent {
            event_type: "sale".into(),
            click_id: "c".into(),
            event_id: None,
            partner_id: "p".into(),
            offer_id: "o".into(),
            advertiser_id: None,
            campaign_id: None,
            flow_id: None,
            revenue,
            currency: None,
            txid: None,
            country: country.map(String::from),
            is_bot,
            data: BTreeMap::new(),
        }
    }

    fn settings() -> ProfileDraft {
        ProfileDraft::new("p", "https://t.example/pb")
    }

    #[test]
    fn test_revenue_filter() {
        let mut s = settings();
        s.filter_revenue_gt0 = true;
        assert_eq!(
            apply_filters(&s, &event(None, None, false)),
            FilterOutcome::Skip(FilterReason::RevenueNotPositive)
        );
        assert!(!apply_filters(&s, &event(Some(0.0), None, false)).passed());
        assert!(apply_filters(&s, &event(Some(0.01), None, false)).passed());
    }

    #[test]
    fn test_country_lists() {
        let mut s = settings();
        s.filter_country_whitelist = vec!["US".into(), "ca".into()];
        assert!(apply_filters(&s, &event(None, Some("CA"), false)).passed());
        assert_eq!(
            apply_filters(&s, &event(None, Some("DE"), false)),
            FilterOutcome::Skip(FilterReason::CountryNotWhitelisted)
        );
        // 国家未知时不过滤
        assert!(apply_filters(&s, &event(None, None, false)).passed());

        let mut s = settings();
        s.filter_country_blacklist = vec!["RU".into()];
        assert_eq!(
            apply_filters(&s, &event(None, Some("ru"), false)),
            FilterOutcome::Skip(FilterReason::CountryBlacklisted)
        );
    }

    #[test]
    fn test_bot_filter_and_order() {
        let mut s = settings();
        s.filter_exclude_bots = true;
        s.filter_revenue_gt0 = true;
        // revenue 先于 bot 检查
        assert_eq!(
            apply_filters(&s, &event(None, None, true)),
            FilterOutcome::Skip(FilterReason::RevenueNotPositive)
        );
        assert_eq!(
            apply_filters(&s, &event(Some(1.0), None, true)),
            FilterOutcome::Skip(FilterReason::BotTraffic)
        );
    }
}
