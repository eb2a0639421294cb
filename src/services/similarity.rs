use std::collections::HashSet;

use crate::models::{Interaction, ProductId};

/// Distinct products a user interacted with, ignoring interaction type
pub fn product_set(interactions: &[Interaction]) -> HashSet<ProductId> {
    interactions.iter().map(|i| i.product_id).collect()
}

/// Jaccard similarity of two product sets
///
/// Returns `|A ∩ B| / |A ∪ B|`, or 0.0 when both sets are empty.
pub fn jaccard(a: &HashSet<ProductId>, b: &HashSet<ProductId>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let intersection = small.iter().filter(|p| large.contains(p)).count();
    let union = a.len() + b.len() - intersection;

    if union == 0 {
        return 0.0;
    }

    intersection as f64 / union as f64
}

/// Similarity between two users' interaction histories
pub fn similarity(a: &[Interaction], b: &[Interaction]) -> f64 {
    jaccard(&product_set(a), &product_set(b))
}
