use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::health::HealthStatus;

/// 引擎事件
///
/// 告警被抑制同样会发事件：抑制是预期内的稳态，
/// 不是错误，但必须对观测方可见。
#[derive(Debug, Clone, Serialize)]
pub enum EngineEvent {
    OutcomeRecorded {
        source_id: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },
    HealthChanged {
        source_id: String,
        from: HealthStatus,
        to: HealthStatus,
    },
    AlertTriggered {
        source_id: String,
        failure_rate: f64,
        consecutive_exceeded: bool,
        rate_exceeded: bool,
    },
    AlertSuppressed {
        source_id: String,
        rate_limited: bool,
    },
    NotificationDispatched {
        source_id: String,
        delivered: usize,
        failed: usize,
    },
}

/// 事件观察者
pub trait EngineObserver: Send + Sync {
    fn on_event(&self, event: &EngineEvent);
}

/// 事件总线：显式的订阅/发布接口
pub struct EventBus {
    observers: RwLock<Vec<Arc<dyn EngineObserver>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }

    pub async fn subscribe(&self, observer: Arc<dyn EngineObserver>) {
        self.observers.write().await.push(observer);
    }

    pub async fn publish(&self, event: EngineEvent) {
        let observers = self.observers.read().await;
        for observer in observers.iter() {
            observer.on_event(&event);
        }
    }

    pub async fn observer_count(&self) -> usize {
        self.observers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
