// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod article;
pub mod config;
pub mod context;
pub mod ingest;
pub mod metrics;
pub mod profile;
pub mod scheduler;
pub mod store;

// Topic extraction engines and relevance scoring
pub mod analyze;

// ---- Re-exports for stable public API ----
pub use crate::analyze::ai_adapter;
pub use crate::api::router;
pub use crate::context::{AppContext, MemoryStores};
pub use crate::scheduler::{AnalysisScheduler, CycleOutcome, SchedulerStatus};
