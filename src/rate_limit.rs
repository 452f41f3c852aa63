use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::threshold::to_chrono;

/// 通知频率限制配置
///
/// 两道闸门同时生效：最小间隔防止连续刷屏，
/// 滚动周期内的总量上限防止长时间高频告警疲劳运维。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// 两次通知之间的最小间隔
    pub min_interval: Duration,
    /// 滚动周期内最多允许的通知次数
    pub max_per_period: usize,
    /// 滚动周期时长
    pub period_duration: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(15 * 60),
            max_per_period: 4,
            period_duration: Duration::from_secs(60 * 60),
        }
    }
}

/// 双闸门频率限制器，全局共享一个实例
///
/// `allow` 无副作用，`record` 单独提交，调用方可以先查后记。
pub struct RateLimiter {
    config: RateLimitConfig,
    last_dispatch: Option<DateTime<Utc>>,
    dispatch_history: Vec<DateTime<Utc>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            last_dispatch: None,
            dispatch_history: Vec::new(),
        }
    }

    /// 两道闸门都通过才返回 true
    pub fn allow(&self, now: DateTime<Utc>) -> bool {
        let interval_ok = match self.last_dispatch {
            None => true,
            Some(last) => now.signed_duration_since(last) >= to_chrono(self.config.min_interval),
        };

        interval_ok && self.dispatches_within_period(now) < self.config.max_per_period
    }

    /// 提交一次发送记录
    pub fn record(&mut self, now: DateTime<Utc>) {
        self.last_dispatch = Some(now);
        self.dispatch_history.push(now);

        // 历史保留两个周期作为缓冲，计数始终只看最近一个周期
        let cutoff = now - to_chrono(self.config.period_duration) * 2;
        self.dispatch_history.retain(|&timestamp| timestamp > cutoff);
    }

    /// 最近一个滚动周期内的发送次数
    pub fn dispatches_within_period(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - to_chrono(self.config.period_duration);
        self.dispatch_history
            .iter()
            .filter(|&&timestamp| timestamp > cutoff)
            .count()
    }

    pub fn last_dispatch(&self) -> Option<DateTime<Utc>> {
        self.last_dispatch
    }

    pub fn reset(&mut self) {
        self.last_dispatch = None;
        self.dispatch_history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_minutes(minutes: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + minutes * 60, 0).unwrap()
    }

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            min_interval: Duration::from_secs(15 * 60),
            max_per_period: 4,
            period_duration: Duration::from_secs(60 * 60),
        })
    }

    #[test]
    fn test_first_dispatch_allowed() {
        let limiter = limiter();
        assert!(limiter.allow(at_minutes(0)));
    }

    #[test]
    fn test_min_interval_enforced() {
        let mut limiter = limiter();

        limiter.record(at_minutes(0));
        assert!(!limiter.allow(at_minutes(10)));
        assert!(limiter.allow(at_minutes(15)));
    }

    #[test]
    fn test_period_cap_enforced_regardless_of_interval() {
        let mut limiter = RateLimiter::new(RateLimitConfig {
            min_interval: Duration::from_secs(5 * 60),
            max_per_period: 4,
            period_duration: Duration::from_secs(60 * 60),
        });

        // 每 5 分钟一次，周期上限 4 次
        for i in 0..4 {
            let now = at_minutes(i * 5);
            assert!(limiter.allow(now));
            limiter.record(now);
        }

        // 第 5 次落在同一个 60 分钟窗口内，间隔闸门已过但总量闸门拦下
        assert!(!limiter.allow(at_minutes(20)));
        assert!(!limiter.allow(at_minutes(59)));

        // 最早一次滑出窗口后放行
        assert!(limiter.allow(at_minutes(61)));
    }

    #[test]
    fn test_allow_has_no_side_effects() {
        let limiter = limiter();

        for _ in 0..10 {
            assert!(limiter.allow(at_minutes(0)));
        }
        assert_eq!(limiter.dispatches_within_period(at_minutes(0)), 0);
        assert!(limiter.last_dispatch().is_none());
    }

    #[test]
    fn test_history_pruned_with_buffer() {
        let mut limiter = limiter();

        for i in 0..10 {
            limiter.record(at_minutes(i * 30));
        }

        // 计数只看最近一个周期
        assert_eq!(limiter.dispatches_within_period(at_minutes(271)), 2);
    }

    #[test]
    fn test_reset() {
        let mut limiter = limiter();
        limiter.record(at_minutes(0));
        limiter.reset();

        assert!(limiter.last_dispatch().is_none());
        assert!(limiter.allow(at_minutes(1)));
    }
}
