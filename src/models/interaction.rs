use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ProductId, UserId};

/// Kind of action a user took on a product
///
/// Types written by newer collaborators that this service does not know about
/// deserialize as [`InteractionType::Unknown`] instead of failing the whole
/// history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionType {
    View,
    AddToCart,
    Purchase,
    Rating,
    #[serde(other)]
    Unknown,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "VIEW",
            Self::AddToCart => "ADD_TO_CART",
            Self::Purchase => "PURCHASE",
            Self::Rating => "RATING",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl Display for InteractionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InteractionType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "VIEW" => Self::View,
            "ADD_TO_CART" => Self::AddToCart,
            "PURCHASE" => Self::Purchase,
            "RATING" => Self::Rating,
            _ => Self::Unknown,
        })
    }
}

/// A recorded user action on a product. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub interaction_type: InteractionType,
    pub created_at: DateTime<Utc>,
}

impl Interaction {
    /// Creates an interaction stamped with the current time
    pub fn new(user_id: UserId, product_id: ProductId, interaction_type: InteractionType) -> Self {
        Self {
            user_id,
            product_id,
            interaction_type,
            created_at: Utc::now(),
        }
    }
}
