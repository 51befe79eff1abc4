pub mod ai;
pub mod recommendation;
pub mod scheduler;

pub use ai::AiConfig;
pub use recommendation::{PoolStrategy, RecommendationConfig, StrategyError};
pub use scheduler::SchedulerConfig;
