use serde::{Deserialize, Serialize};

use super::{Product, ProductId};

/// Signal that produced a recommendation
///
/// Personalized results are tagged `Collaborative` even when part of their
/// score came from category affinity. `ContentBased` is part of the wire
/// vocabulary but the engine does not emit it today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationSource {
    Collaborative,
    ContentBased,
    Popular,
}

/// A single recommended product, built fresh per request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product_id: ProductId,
    pub product_name: String,
    pub score: f64,
    #[serde(rename = "recommendation_type")]
    pub source: RecommendationSource,
}

impl Recommendation {
    pub fn from_product(product: &Product, score: f64, source: RecommendationSource) -> Self {
        Self {
            product_id: product.id,
            product_name: product.name.clone(),
            score: score.max(0.0),
            source,
        }
    }
}
