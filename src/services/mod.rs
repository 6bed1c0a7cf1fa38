// Services module - shared business logic

pub mod login_limiter;
pub mod password;

pub use login_limiter::{
    AttemptStore, KeyStatus, LimitDecision, LimiterConfig, LoginLimiter, MemoryAttemptStore,
};
