use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::sleep;

use crate::error::{ErrorKind, SyncError};

/// 重试策略
///
/// `max_attempts` 是重试次数，总调用次数为 `max_attempts + 1`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 最大重试次数
    pub max_attempts: u32,
    /// 初始延迟
    pub base_delay: Duration,
    /// 指数退避的延迟上限
    pub max_delay: Duration,
    /// 抖动上限，实际抖动在 [0, jitter_max] 内均匀分布
    pub jitter_max: Duration,
    /// 可重试的错误类型集合，其余类型一律视为致命错误
    pub retryable_kinds: HashSet<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter_max: Duration::from_millis(500),
            retryable_kinds: default_retryable_kinds(),
        }
    }
}

/// 默认可重试集合：连接被拒、主机不可达、超时、对端限流
pub fn default_retryable_kinds() -> HashSet<ErrorKind> {
    [
        ErrorKind::ConnectionRefused,
        ErrorKind::HostUnreachable,
        ErrorKind::Timeout,
        ErrorKind::RateLimited,
    ]
    .into_iter()
    .collect()
}

impl RetryPolicy {
    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        self.retryable_kinds.contains(&kind)
    }

    /// 计算第 `attempt_index` 次重试前的退避延迟（不含抖动）
    pub fn backoff_delay(&self, attempt_index: u32) -> Duration {
        let millis = self
            .base_delay
            .as_millis()
            .saturating_mul(1u128 << attempt_index.min(63))
            .min(self.max_delay.as_millis());
        Duration::from_millis(millis as u64)
    }

    /// 退避延迟加抖动，避免多个同步任务同时醒来造成重试风暴
    pub fn backoff_delay_with_jitter(&self, attempt_index: u32) -> Duration {
        let base = self.backoff_delay(attempt_index);
        let jitter_range = self.jitter_max.as_millis() as u64;
        let jitter = if jitter_range == 0 {
            0
        } else {
            rand::random::<u64>() % (jitter_range + 1)
        };
        base + Duration::from_millis(jitter)
    }
}

/// 重试执行器
///
/// 包装一个可失败的异步操作：瞬时错误按策略退避重试，
/// 致命错误立即向上传播，最终失败时原样返回最后一次的错误。
pub struct RetryExecutor {
    policy: RetryPolicy,
    shutdown: Option<watch::Receiver<bool>>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            shutdown: None,
        }
    }

    /// 挂接停机信号：收到信号后允许当前尝试跑完，但不再调度新的重试
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn shutdown_observed(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }

    /// 执行操作，成功立即返回
    ///
    /// 重试只挂起当前调用的控制流，不影响进程内其他同步任务。
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let mut attempt_index: u32 = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !self.policy.is_retryable(err.kind()) {
                        log::debug!(
                            "Operation failed with fatal error kind '{}', not retrying: {}",
                            err.kind(),
                            err
                        );
                        return Err(err);
                    }

                    if attempt_index >= self.policy.max_attempts {
                        log::warn!(
                            "Operation failed after {} attempts, giving up: {}",
                            attempt_index + 1,
                            err
                        );
                        return Err(err);
                    }

                    if self.shutdown_observed() {
                        log::info!("Shutdown observed, not scheduling another retry: {}", err);
                        return Err(err);
                    }

                    let delay = self.policy.backoff_delay_with_jitter(attempt_index);
                    log::warn!(
                        "Attempt {} failed ({}), retrying in {:?}: {}",
                        attempt_index + 1,
                        err.kind(),
                        delay,
                        err
                    );

                    sleep(delay).await;

                    // 延迟期间可能收到停机信号，开新尝试前再确认一次
                    if self.shutdown_observed() {
                        log::info!("Shutdown observed during backoff, giving up: {}", err);
                        return Err(err);
                    }

                    attempt_index += 1;
                }
            }
        }
    }
}
