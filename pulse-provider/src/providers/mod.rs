//! Product provider implementations
//!
//! [`HttpProductProvider`] talks to a real upstream; [`MockProductProvider`]
//! synthesizes data when no upstream is configured.

pub mod http;
pub mod mock;

pub use http::HttpProductProvider;
pub use mock::MockProductProvider;
