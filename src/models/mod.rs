mod interaction;
mod product;
mod recommendation;

pub use interaction::{Interaction, InteractionType};
pub use product::Product;
pub use recommendation::{Recommendation, RecommendationSource};

/// Identifier of a registered user
pub type UserId = i64;

/// Identifier of a catalog product
pub type ProductId = i64;

/// Identifier of a product category
pub type CategoryId = i64;
