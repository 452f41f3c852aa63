use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::threshold::SlidingWindow;

/// 来源健康状态
///
/// 记录第一条结果之前保持 `Pending`，之后在三个状态之间
/// 随滚动成功率自由迁移，没有终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Pending,
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Pending => "pending",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 健康判定配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// 成功率不低于该值判定为 Healthy
    pub healthy_threshold: f64,
    /// 成功率不低于该值判定为 Degraded，再低为 Unhealthy
    pub degraded_threshold: f64,
    /// 成功率统计窗口时长
    pub window_duration: Duration,
    /// 窗口最大样本数
    pub window_max_samples: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            healthy_threshold: 0.9,
            degraded_threshold: 0.6,
            window_duration: Duration::from_secs(900),
            window_max_samples: 50,
        }
    }
}

struct SourceHealth {
    window: SlidingWindow,
    status: HealthStatus,
}

/// 健康状态跟踪器
///
/// 纯状态机，由引擎串行驱动。
pub struct HealthStateTracker {
    config: HealthConfig,
    sources: HashMap<String, SourceHealth>,
}

impl HealthStateTracker {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            sources: HashMap::new(),
        }
    }

    /// 记录一次结果并重新计算该来源的状态，返回最新状态
    pub fn record_outcome(
        &mut self,
        source_id: &str,
        success: bool,
        timestamp: DateTime<Utc>,
    ) -> HealthStatus {
        let config = self.config.clone();
        let state = self
            .sources
            .entry(source_id.to_string())
            .or_insert_with(|| SourceHealth {
                window: SlidingWindow::default(),
                status: HealthStatus::Pending,
            });

        state.window.push(timestamp, success);
        state
            .window
            .prune(timestamp, config.window_duration, config.window_max_samples);

        // 窗口被完全裁空时保留上一次算出的状态
        if !state.window.is_empty() {
            let success_rate = state.window.success_rate();
            state.status = if success_rate >= config.healthy_threshold {
                HealthStatus::Healthy
            } else if success_rate >= config.degraded_threshold {
                HealthStatus::Degraded
            } else {
                HealthStatus::Unhealthy
            };
        }

        state.status
    }

    /// 只读查询，未知来源返回 Pending
    pub fn current_status(&self, source_id: &str) -> HealthStatus {
        self.sources
            .get(source_id)
            .map(|state| state.status)
            .unwrap_or(HealthStatus::Pending)
    }

    pub fn reset_source(&mut self, source_id: &str) {
        self.sources.remove(source_id);
    }

    pub fn reset(&mut self) {
        self.sources.clear();
    }
}
