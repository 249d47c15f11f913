//! Middleware for the AMZPulse API
//!
//! - `request_rate`: fixed-window request-rate limiting keyed by client address
//!
//! The request-rate layer wraps only the `/api` routes. Health endpoints are
//! never limited.

mod request_rate;

pub use request_rate::{
    client_key, rate_key, request_rate_middleware, retry_after_secs, window_index,
    RequestRateError, RequestRateState,
};
