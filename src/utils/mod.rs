pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
pub use retry::{connect_with_retry, retry_with_backoff, RetryPolicy, RetryResult, StartupError};
