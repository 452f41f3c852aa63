use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 阈值配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// 连续失败次数达到该值即触发告警条件
    pub consecutive_failure_limit: u32,
    /// 窗口内失败率达到该值即触发告警条件，取值 [0, 1]
    pub failure_rate_limit: f64,
    /// 滑动窗口时长
    pub window_duration: Duration,
    /// 窗口最大样本数，超出时淘汰最旧的条目
    pub window_max_samples: usize,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            consecutive_failure_limit: 3,
            failure_rate_limit: 0.5,
            window_duration: Duration::from_secs(600),
            window_max_samples: 100,
        }
    }
}

/// 阈值评估结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdResult {
    pub consecutive_exceeded: bool,
    pub rate_exceeded: bool,
    pub failure_rate: f64,
    /// 两个条件的逻辑或
    pub should_alert: bool,
    pub consecutive_failures: u32,
    pub window_samples: usize,
}

pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::max_value())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WindowEntry {
    timestamp: DateTime<Utc>,
    success: bool,
}

/// 滑动窗口：按时间和样本数双重限制的近期结果序列
#[derive(Debug, Clone, Default)]
pub struct SlidingWindow {
    entries: VecDeque<WindowEntry>,
}

impl SlidingWindow {
    pub fn push(&mut self, timestamp: DateTime<Utc>, success: bool) {
        self.entries.push_back(WindowEntry { timestamp, success });
    }

    /// 淘汰早于 `now - duration` 的条目，再裁剪到最多 `max_samples` 条
    pub fn prune(&mut self, now: DateTime<Utc>, duration: Duration, max_samples: usize) {
        let cutoff = now - to_chrono(duration);
        while matches!(self.entries.front(), Some(entry) if entry.timestamp < cutoff) {
            self.entries.pop_front();
        }
        while self.entries.len() > max_samples {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.success).count()
    }

    /// 窗口内失败占比，空窗口为 0
    pub fn failure_rate(&self) -> f64 {
        if self.entries.is_empty() {
            0.0
        } else {
            self.failures() as f64 / self.entries.len() as f64
        }
    }

    /// 窗口内成功占比，空窗口为 0
    pub fn success_rate(&self) -> f64 {
        if self.entries.is_empty() {
            0.0
        } else {
            1.0 - self.failure_rate()
        }
    }
}

#[derive(Debug, Default)]
struct SourceThresholdState {
    consecutive_failures: u32,
    window: SlidingWindow,
}

/// 阈值评估器
///
/// 每个来源维护一个连续失败计数和一个滑动窗口。
/// 纯状态机：不做 I/O，不返回错误；裁剪在记录和评估两处惰性执行，
/// 保证评估结果永远相对"当前时刻"一致。
pub struct ThresholdEvaluator {
    config: ThresholdConfig,
    sources: HashMap<String, SourceThresholdState>,
}

impl ThresholdEvaluator {
    pub fn new(config: ThresholdConfig) -> Self {
        Self {
            config,
            sources: HashMap::new(),
        }
    }

    /// 记录一次同步结果
    ///
    /// 成功把连续失败计数清零，失败加一。
    pub fn record_outcome(&mut self, source_id: &str, success: bool, timestamp: DateTime<Utc>) {
        let state = self.sources.entry(source_id.to_string()).or_default();

        if success {
            state.consecutive_failures = 0;
        } else {
            state.consecutive_failures += 1;
        }

        state.window.push(timestamp, success);
        state.window.prune(
            timestamp,
            self.config.window_duration,
            self.config.window_max_samples,
        );
    }

    /// 评估某个来源当前是否满足告警条件
    pub fn evaluate(&mut self, source_id: &str, now: DateTime<Utc>) -> ThresholdResult {
        let config = self.config.clone();
        let state = self.sources.entry(source_id.to_string()).or_default();
        state
            .window
            .prune(now, config.window_duration, config.window_max_samples);

        let failure_rate = state.window.failure_rate();
        let consecutive_exceeded =
            state.consecutive_failures >= config.consecutive_failure_limit;
        let rate_exceeded = failure_rate >= config.failure_rate_limit;

        ThresholdResult {
            consecutive_exceeded,
            rate_exceeded,
            failure_rate,
            should_alert: consecutive_exceeded || rate_exceeded,
            consecutive_failures: state.consecutive_failures,
            window_samples: state.window.len(),
        }
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    pub fn reset_source(&mut self, source_id: &str) {
        self.sources.remove(source_id);
    }

    pub fn reset(&mut self) {
        self.sources.clear();
    }
}
