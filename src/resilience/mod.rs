mod retry;

pub use retry::{is_retryable, RetryConfig, RetryPolicy};
