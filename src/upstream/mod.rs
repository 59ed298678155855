//! The upstream HTTP client: the system's only source of volatile data
//! (spec.md §4.1, §6).

pub mod circuit_breaker;
pub mod client;
pub mod endpoints;
pub mod rate_limit;

pub use client::{FailureKind, UpstreamClient};
