use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// 同步结果记录
///
/// 每次重试结束后创建一条，创建后不再修改。
/// 同一条记录同时喂给健康跟踪器、阈值评估器和持久化接口。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub source_id: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub correlation_id: Option<String>,
}

impl SyncOutcome {
    pub fn success(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            success: true,
            timestamp: Utc::now(),
            error_kind: None,
            error_message: None,
            correlation_id: None,
        }
    }

    pub fn failure(
        source_id: impl Into<String>,
        error_kind: ErrorKind,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            success: false,
            timestamp: Utc::now(),
            error_kind: Some(error_kind),
            error_message: Some(error_message.into()),
            correlation_id: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}
