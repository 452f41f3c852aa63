use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use crate::error::SyncError;
use crate::events::{EngineEvent, EngineObserver, EventBus};
use crate::gate::NotificationGate;
use crate::health::{HealthConfig, HealthStateTracker, HealthStatus};
use crate::notification::dispatcher::NotificationDispatcher;
use crate::notification::payload::{DeliveryResult, NotificationPayload};
use crate::notification::providers::ChannelAdapter;
use crate::outcome::SyncOutcome;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::threshold::{ThresholdConfig, ThresholdEvaluator, ThresholdResult};

/// 持久化接口
///
/// 引擎只向外写最终结果，决策全部基于内存状态，从不读回。
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn persist(&self, outcome: &SyncOutcome) -> anyhow::Result<()>;
}

/// 引擎配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub retry: RetryPolicy,
    pub thresholds: ThresholdConfig,
    pub health: HealthConfig,
    pub rate_limit: RateLimitConfig,
    /// 单个渠道的投递超时
    pub adapter_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            thresholds: ThresholdConfig::default(),
            health: HealthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            adapter_timeout: Duration::from_secs(10),
        }
    }
}

/// 单来源统计
#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    pub health: HealthStatus,
    pub consecutive_failures: u32,
    pub failure_rate: f64,
    pub window_samples: usize,
    pub should_alert: bool,
}

/// 引擎统计信息
///
/// 告警抑制不是错误，这里是它唯一的外部可见面。
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub last_dispatch: Option<DateTime<Utc>>,
    pub dispatches_in_period: usize,
    pub suppressed_by_threshold: u64,
    pub suppressed_by_rate_limit: u64,
    pub per_source: HashMap<String, SourceStats>,
}

#[derive(Debug, Default)]
struct SuppressionCounters {
    by_threshold: u64,
    by_rate_limit: u64,
}

/// 弹性与告警引擎
///
/// 数据流：同步尝试经重试执行器得到终态结果 → 结果喂给健康跟踪器
/// 和阈值评估器 → 告警条件成立时经通知闸门咨询频率限制器 →
/// 放行后渲染载荷并扇出到各渠道适配器。
pub struct ResilienceEngine {
    config: EngineConfig,
    thresholds: Arc<RwLock<ThresholdEvaluator>>,
    health: Arc<RwLock<HealthStateTracker>>,
    rate_limiter: Arc<RwLock<RateLimiter>>,
    gate: NotificationGate,
    dispatcher: NotificationDispatcher,
    adapters: Vec<Arc<dyn ChannelAdapter>>,
    sink: Option<Arc<dyn PersistenceSink>>,
    events: EventBus,
    suppressions: Arc<RwLock<SuppressionCounters>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ResilienceEngine {
    pub fn new(config: EngineConfig) -> Self {
        let thresholds = Arc::new(RwLock::new(ThresholdEvaluator::new(
            config.thresholds.clone(),
        )));
        let health = Arc::new(RwLock::new(HealthStateTracker::new(config.health.clone())));
        let rate_limiter = Arc::new(RwLock::new(RateLimiter::new(config.rate_limit.clone())));
        let gate = NotificationGate::new(thresholds.clone(), rate_limiter.clone());
        let dispatcher = NotificationDispatcher::new(config.adapter_timeout);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            thresholds,
            health,
            rate_limiter,
            gate,
            dispatcher,
            adapters: Vec::new(),
            sink: None,
            events: EventBus::new(),
            suppressions: Arc::new(RwLock::new(SuppressionCounters::default())),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// 注册渠道适配器
    pub fn register_adapter(&mut self, adapter: Arc<dyn ChannelAdapter>) {
        self.adapters.push(adapter);
    }

    /// 挂接持久化接口
    pub fn set_persistence_sink(&mut self, sink: Arc<dyn PersistenceSink>) {
        self.sink = Some(sink);
    }

    pub async fn subscribe(&self, observer: Arc<dyn EngineObserver>) {
        self.events.subscribe(observer).await;
    }

    pub fn dispatcher_mut(&mut self) -> &mut NotificationDispatcher {
        &mut self.dispatcher
    }

    /// 记录一条同步结果
    ///
    /// 同一条记录依次喂给阈值评估器、健康跟踪器和持久化接口。
    pub async fn record_outcome(&self, outcome: SyncOutcome) {
        {
            let mut thresholds = self.thresholds.write().await;
            thresholds.record_outcome(&outcome.source_id, outcome.success, outcome.timestamp);
        }

        let (previous, current) = {
            let mut health = self.health.write().await;
            let previous = health.current_status(&outcome.source_id);
            let current =
                health.record_outcome(&outcome.source_id, outcome.success, outcome.timestamp);
            (previous, current)
        };

        if previous != current {
            log::info!(
                "Source '{}' health changed: {} -> {}",
                outcome.source_id,
                previous,
                current
            );
            self.events
                .publish(EngineEvent::HealthChanged {
                    source_id: outcome.source_id.clone(),
                    from: previous,
                    to: current,
                })
                .await;
        }

        if let Some(ref sink) = self.sink {
            if let Err(e) = sink.persist(&outcome).await {
                log::error!(
                    "Failed to persist outcome for source '{}': {:#}",
                    outcome.source_id,
                    e
                );
            }
        }

        self.events
            .publish(EngineEvent::OutcomeRecorded {
                source_id: outcome.source_id.clone(),
                success: outcome.success,
                timestamp: outcome.timestamp,
            })
            .await;
    }

    /// 评估某个来源的告警条件
    pub async fn evaluate(&self, source_id: &str) -> ThresholdResult {
        let mut thresholds = self.thresholds.write().await;
        thresholds.evaluate(source_id, Utc::now())
    }

    /// 查询来源健康状态，无副作用
    pub async fn current_status(&self, source_id: &str) -> HealthStatus {
        self.health.read().await.current_status(source_id)
    }

    /// 通过重试执行器驱动一次同步操作，并把终态结果记入引擎
    pub async fn execute<T, F, Fut>(&self, source_id: &str, operation: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let executor = RetryExecutor::new(self.config.retry.clone())
            .with_shutdown(self.shutdown_rx.clone());
        let correlation_id = Uuid::new_v4().to_string();

        let result = executor.run(operation).await;

        let outcome = match &result {
            Ok(_) => SyncOutcome::success(source_id),
            Err(e) => SyncOutcome::failure(source_id, e.kind(), e.message()),
        }
        .with_correlation_id(correlation_id);

        self.record_outcome(outcome).await;
        result
    }

    /// 发送告警通知
    ///
    /// 内部依次经过闸门、格式化器和分发器；抑制时静默返回空表，
    /// 可通过 `get_stats` 和事件观察到。
    pub async fn notify(
        &self,
        payload: NotificationPayload,
    ) -> anyhow::Result<HashMap<String, DeliveryResult>> {
        if *self.shutdown_rx.borrow() {
            log::warn!("Engine is shutting down, notification not dispatched");
            return Ok(HashMap::new());
        }

        let now = Utc::now();
        let decision = self.gate.should_notify(&payload.source_id, now).await;

        if !decision.proceed {
            {
                let mut counters = self.suppressions.write().await;
                if decision.rate_limited {
                    counters.by_rate_limit += 1;
                } else {
                    counters.by_threshold += 1;
                }
            }
            self.events
                .publish(EngineEvent::AlertSuppressed {
                    source_id: payload.source_id.clone(),
                    rate_limited: decision.rate_limited,
                })
                .await;
            return Ok(HashMap::new());
        }

        self.events
            .publish(EngineEvent::AlertTriggered {
                source_id: payload.source_id.clone(),
                failure_rate: decision.threshold.failure_rate,
                consecutive_exceeded: decision.threshold.consecutive_exceeded,
                rate_exceeded: decision.threshold.rate_exceeded,
            })
            .await;

        let results = self.dispatcher.dispatch(&payload, &self.adapters).await?;

        let delivered = results.values().filter(|r| r.success).count();
        let failed = results.len() - delivered;
        log::info!(
            "Notification for source '{}' dispatched: {} delivered, {} failed",
            payload.source_id,
            delivered,
            failed
        );

        self.events
            .publish(EngineEvent::NotificationDispatched {
                source_id: payload.source_id.clone(),
                delivered,
                failed,
            })
            .await;

        Ok(results)
    }

    /// 观测接口
    pub async fn get_stats(&self) -> EngineStats {
        let now = Utc::now();

        let (last_dispatch, dispatches_in_period) = {
            let limiter = self.rate_limiter.read().await;
            (limiter.last_dispatch(), limiter.dispatches_within_period(now))
        };

        let (suppressed_by_threshold, suppressed_by_rate_limit) = {
            let counters = self.suppressions.read().await;
            (counters.by_threshold, counters.by_rate_limit)
        };

        let mut per_source = HashMap::new();
        {
            let mut thresholds = self.thresholds.write().await;
            let health = self.health.read().await;
            for source_id in thresholds.source_ids() {
                let result = thresholds.evaluate(&source_id, now);
                per_source.insert(
                    source_id.clone(),
                    SourceStats {
                        health: health.current_status(&source_id),
                        consecutive_failures: result.consecutive_failures,
                        failure_rate: result.failure_rate,
                        window_samples: result.window_samples,
                        should_alert: result.should_alert,
                    },
                );
            }
        }

        EngineStats {
            last_dispatch,
            dispatches_in_period,
            suppressed_by_threshold,
            suppressed_by_rate_limit,
            per_source,
        }
    }

    /// 清空单个来源的状态，外部面板的"清除错误"操作走这里
    pub async fn reset_source(&self, source_id: &str) {
        self.thresholds.write().await.reset_source(source_id);
        self.health.write().await.reset_source(source_id);
    }

    /// 清空全部状态，含频率限制历史和抑制计数
    pub async fn reset(&self) {
        self.thresholds.write().await.reset();
        self.health.write().await.reset();
        self.rate_limiter.write().await.reset();
        *self.suppressions.write().await = SuppressionCounters::default();
    }

    /// 发出停机信号：在途尝试允许跑完，之后不再调度重试或投递
    pub fn shutdown(&self) {
        if self.shutdown_tx.send(true).is_err() {
            log::debug!("No active shutdown listeners");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// 停机信号的接收端，交给独立构造的重试执行器
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::notification::Severity;
    use crate::retry::default_retryable_kinds;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn fast_config() -> EngineConfig {
        EngineConfig {
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                jitter_max: Duration::from_millis(0),
                retryable_kinds: default_retryable_kinds(),
            },
            thresholds: ThresholdConfig {
                consecutive_failure_limit: 3,
                failure_rate_limit: 0.9,
                window_duration: Duration::from_secs(600),
                window_max_samples: 100,
            },
            ..Default::default()
        }
    }

    struct MemorySink {
        outcomes: Mutex<Vec<SyncOutcome>>,
    }

    #[async_trait]
    impl PersistenceSink for MemorySink {
        async fn persist(&self, outcome: &SyncOutcome) -> anyhow::Result<()> {
            self.outcomes.lock().unwrap().push(outcome.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_execute_records_outcomes() {
        let engine = ResilienceEngine::new(fast_config());
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result = engine
            .execute("main", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, SyncError>(1u32)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.current_status("main").await, HealthStatus::Healthy);
        assert_eq!(engine.evaluate("main").await.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_execute_failure_feeds_threshold_state() {
        let engine = ResilienceEngine::new(fast_config());

        for _ in 0..3 {
            let result: Result<(), SyncError> = engine
                .execute("main", || async {
                    Err(SyncError::new(ErrorKind::Authentication, "denied"))
                })
                .await;
            assert!(result.is_err());
        }

        let result = engine.evaluate("main").await;
        assert_eq!(result.consecutive_failures, 3);
        assert!(result.should_alert);
        assert_eq!(engine.current_status("main").await, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_outcomes_forwarded_to_persistence_sink() {
        let mut engine = ResilienceEngine::new(fast_config());
        let sink = Arc::new(MemorySink {
            outcomes: Mutex::new(Vec::new()),
        });
        engine.set_persistence_sink(sink.clone());

        engine.record_outcome(SyncOutcome::success("main")).await;
        engine
            .record_outcome(SyncOutcome::failure("main", ErrorKind::Timeout, "timed out"))
            .await;

        let persisted = sink.outcomes.lock().unwrap();
        assert_eq!(persisted.len(), 2);
        assert!(persisted[0].success);
        assert!(!persisted[1].success);
    }

    #[tokio::test]
    async fn test_notify_suppressed_when_thresholds_not_met() {
        let engine = ResilienceEngine::new(fast_config());
        engine.record_outcome(SyncOutcome::success("main")).await;

        let payload = NotificationPayload::new("main", Severity::Info, "all good");
        let results = engine.notify(payload).await.unwrap();

        assert!(results.is_empty());
        let stats = engine.get_stats().await;
        assert_eq!(stats.suppressed_by_threshold, 1);
        assert_eq!(stats.suppressed_by_rate_limit, 0);
        assert!(stats.last_dispatch.is_none());
    }

    #[tokio::test]
    async fn test_notify_skipped_after_shutdown() {
        let engine = ResilienceEngine::new(fast_config());
        for _ in 0..3 {
            engine
                .record_outcome(SyncOutcome::failure("main", ErrorKind::Timeout, "t"))
                .await;
        }

        engine.shutdown();
        assert!(engine.is_shutdown());

        let payload = NotificationPayload::new("main", Severity::Error, "down");
        let results = engine.notify(payload).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_reset_clears_per_source_state() {
        let engine = ResilienceEngine::new(fast_config());
        for _ in 0..3 {
            engine
                .record_outcome(SyncOutcome::failure("main", ErrorKind::Timeout, "t"))
                .await;
        }
        assert!(engine.evaluate("main").await.should_alert);

        engine.reset_source("main").await;
        assert!(!engine.evaluate("main").await.should_alert);
        assert_eq!(engine.current_status("main").await, HealthStatus::Pending);
    }

    #[tokio::test]
    async fn test_stats_expose_per_source_counters() {
        let engine = ResilienceEngine::new(fast_config());
        engine.record_outcome(SyncOutcome::success("stable")).await;
        engine
            .record_outcome(SyncOutcome::failure("flaky", ErrorKind::Timeout, "t"))
            .await;

        let stats = engine.get_stats().await;
        assert_eq!(stats.per_source.len(), 2);
        assert_eq!(stats.per_source["stable"].consecutive_failures, 0);
        assert_eq!(stats.per_source["flaky"].consecutive_failures, 1);
        assert_eq!(stats.per_source["flaky"].failure_rate, 1.0);
    }
}
