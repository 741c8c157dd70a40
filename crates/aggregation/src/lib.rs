//! Engagement Aggregation
//!
//! Folds the scored subjects of one tick into session-level counts and
//! emits an [`EngagementSample`] on a fixed wall-clock cadence, independent
//! of the tick rate.

mod aggregator;
mod sample;

pub use aggregator::{AggregatorConfig, MetricsAggregator};
pub use sample::{EngagementSample, TickResult};
