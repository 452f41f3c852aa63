use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::time::timeout;

use crate::notification::formatter::MessageFormatter;
use crate::notification::payload::{DeliveryResult, NotificationPayload};
use crate::notification::providers::ChannelAdapter;

/// 通知分发器
///
/// 渲染一次，并发投递到所有渠道。单个渠道的失败（凭据错误、
/// 网络错误、目标不可达）只记入该渠道的结果，绝不中断其他渠道，
/// 也不会让整个调用失败；只有载荷本身不合法才在投递前报错。
pub struct NotificationDispatcher {
    formatter: MessageFormatter,
    adapter_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(adapter_timeout: Duration) -> Self {
        Self {
            formatter: MessageFormatter::new(),
            adapter_timeout,
        }
    }

    pub fn formatter(&self) -> &MessageFormatter {
        &self.formatter
    }

    pub fn formatter_mut(&mut self) -> &mut MessageFormatter {
        &mut self.formatter
    }

    /// 扇出投递，返回以适配器名为键的独立结果表
    pub async fn dispatch(
        &self,
        payload: &NotificationPayload,
        adapters: &[Arc<dyn ChannelAdapter>],
    ) -> anyhow::Result<HashMap<String, DeliveryResult>> {
        payload.validate()?;

        let rendered = self.formatter.format(payload)?;

        let deliveries = adapters.iter().map(|adapter| {
            let rendered = &rendered;
            async move {
                let started = Instant::now();
                let outcome = timeout(self.adapter_timeout, adapter.send(payload, rendered)).await;
                let elapsed = started.elapsed();

                let result = match outcome {
                    Ok(Ok(())) => DeliveryResult::success(adapter.channel(), elapsed),
                    Ok(Err(e)) => {
                        log::error!("Delivery via '{}' failed: {:#}", adapter.name(), e);
                        DeliveryResult::failure(adapter.channel(), format!("{:#}", e), elapsed)
                    }
                    Err(_) => {
                        log::error!(
                            "Delivery via '{}' timed out after {:?}",
                            adapter.name(),
                            self.adapter_timeout
                        );
                        DeliveryResult::failure(
                            adapter.channel(),
                            format!("delivery timed out after {:?}", self.adapter_timeout),
                            elapsed,
                        )
                    }
                };

                (adapter.name(), result)
            }
        });

        Ok(join_all(deliveries).await.into_iter().collect())
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}
