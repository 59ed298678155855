//! In-memory caching layer between the tool dispatcher and the upstream
//! client / persistent store (spec.md §4.4, §4.5).

pub mod layer;
pub mod market;
pub mod volatile;

pub use market::MarketCache;
pub use volatile::VolatileCache;
