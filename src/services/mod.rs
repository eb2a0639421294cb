pub mod cache;
pub mod collaborative;
pub mod content;
pub mod popularity;
pub mod recommendations;
pub mod similarity;
pub mod sources;
pub mod tracking;

pub use cache::{CachedRecommendations, RecommendationCache, SharedResultStore};
pub use recommendations::{EngineSettings, RecommendationEngine};
pub use sources::{CatalogSource, InteractionSink, InteractionSource, UserDirectory};
pub use tracking::{InteractionTracker, TrackOutcome};
