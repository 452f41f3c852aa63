use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 同步错误类型
///
/// 外部同步 SDK 返回的错误必须映射到一个稳定的错误类型，
/// 重试分类才能保持确定性。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// 连接被拒绝
    ConnectionRefused,
    /// 主机不可达
    HostUnreachable,
    /// 请求超时
    Timeout,
    /// 对端限流
    RateLimited,
    /// 认证失败
    Authentication,
    /// 响应格式无效
    InvalidResponse,
    /// 其他未分类错误
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionRefused => "connection-refused",
            ErrorKind::HostUnreachable => "host-unreachable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimited => "rate-limited",
            ErrorKind::Authentication => "authentication",
            ErrorKind::InvalidResponse => "invalid-response",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 同步操作错误
///
/// 错误类型和消息在重试全过程中保持原样传播，
/// 调用方看到的永远是最后一次尝试的原始错误。
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct SyncError {
    kind: ErrorKind,
    message: String,
}

impl SyncError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connection_refused(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionRefused, message)
    }

    pub fn host_unreachable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::HostUnreachable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidResponse, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
