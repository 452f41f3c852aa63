use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::rate_limit::RateLimiter;
use crate::threshold::{ThresholdEvaluator, ThresholdResult};

/// 闸门判定结果
#[derive(Debug, Clone)]
pub struct GateDecision {
    pub proceed: bool,
    pub threshold: ThresholdResult,
    pub rate_limited: bool,
}

/// 通知闸门
///
/// 所有通知发送的唯一决策点：先看阈值，再问频率限制器，
/// 两关都过才放行并当场记账。不经过闸门不会触达任何渠道。
pub struct NotificationGate {
    thresholds: Arc<RwLock<ThresholdEvaluator>>,
    rate_limiter: Arc<RwLock<RateLimiter>>,
}

impl NotificationGate {
    pub fn new(
        thresholds: Arc<RwLock<ThresholdEvaluator>>,
        rate_limiter: Arc<RwLock<RateLimiter>>,
    ) -> Self {
        Self {
            thresholds,
            rate_limiter,
        }
    }

    pub async fn should_notify(&self, source_id: &str, now: DateTime<Utc>) -> GateDecision {
        let threshold = {
            let mut evaluator = self.thresholds.write().await;
            evaluator.evaluate(source_id, now)
        };

        if !threshold.should_alert {
            log::debug!("Thresholds not exceeded for source '{}'", source_id);
            return GateDecision {
                proceed: false,
                threshold,
                rate_limited: false,
            };
        }

        let mut limiter = self.rate_limiter.write().await;
        if !limiter.allow(now) {
            log::debug!("Alert for source '{}' suppressed by rate limiter", source_id);
            return GateDecision {
                proceed: false,
                threshold,
                rate_limited: true,
            };
        }

        limiter.record(now);
        GateDecision {
            proceed: true,
            threshold,
            rate_limited: false,
        }
    }
}
