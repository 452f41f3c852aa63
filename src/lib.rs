// Core modules
pub mod engine;
pub mod error;
pub mod events;
pub mod gate;
pub mod health;
pub mod outcome;
pub mod rate_limit;
pub mod retry;
pub mod threshold;

// Notification pipeline
pub mod notification;

pub use engine::{EngineConfig, EngineStats, PersistenceSink, ResilienceEngine, SourceStats};
pub use error::{ErrorKind, SyncError};
pub use events::{EngineEvent, EngineObserver, EventBus};
pub use gate::{GateDecision, NotificationGate};
pub use health::{HealthConfig, HealthStateTracker, HealthStatus};
pub use outcome::SyncOutcome;
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use retry::{RetryExecutor, RetryPolicy};
pub use threshold::{ThresholdConfig, ThresholdEvaluator, ThresholdResult};
