use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, instrument};

use crate::{
    error::AppResult,
    models::{Interaction, InteractionType, ProductId, UserId},
    services::{similarity, sources::InteractionSource},
};

/// Neighbours must be strictly more similar than this to contribute
pub const SIMILARITY_THRESHOLD: f64 = 0.3;

/// Candidate users fetched per batch call to the interaction source
const HISTORY_BATCH_SIZE: usize = 64;

/// Accumulated score per candidate product, scoped to one computation
pub type ScoreMap = HashMap<ProductId, f64>;

/// Fixed weight of an interaction when it is propagated to a similar user
pub fn interaction_weight(interaction_type: InteractionType) -> f64 {
    match interaction_type {
        InteractionType::Purchase => 5.0,
        InteractionType::Rating => 3.0,
        InteractionType::AddToCart => 2.0,
        InteractionType::View => 1.0,
        InteractionType::Unknown => 1.0,
    }
}

/// Adds every entry of `partial` into `scores`
pub fn merge_scores(scores: &mut ScoreMap, partial: ScoreMap) {
    for (product_id, score) in partial {
        *scores.entry(product_id).or_insert(0.0) += score;
    }
}

/// Contribution of a single neighbour to the target user's candidates
///
/// Returns `None` when the neighbour is at or below [`SIMILARITY_THRESHOLD`].
/// Products the target already interacted with never receive a score.
pub fn neighbour_scores(
    target_products: &HashSet<ProductId>,
    neighbour: &[Interaction],
) -> Option<ScoreMap> {
    if neighbour.is_empty() {
        return None;
    }

    let sim = similarity::jaccard(target_products, &similarity::product_set(neighbour));
    if sim <= SIMILARITY_THRESHOLD {
        return None;
    }

    let mut scores = ScoreMap::new();
    for interaction in neighbour {
        if target_products.contains(&interaction.product_id) {
            continue;
        }
        *scores.entry(interaction.product_id).or_insert(0.0) +=
            sim * interaction_weight(interaction.interaction_type);
    }
    Some(scores)
}

/// User-based collaborative filtering over the interaction source
///
/// Candidate neighbours come from the inverted product → users index: a user
/// with no product in common has similarity 0 and could never pass the
/// threshold, so scanning only the shortlist gives the same scores as an
/// all-pairs scan. Histories are fetched in batches and scored with bounded
/// concurrency.
#[derive(Clone)]
pub struct CollaborativeScorer {
    interactions: Arc<dyn InteractionSource>,
    concurrency: usize,
}

impl CollaborativeScorer {
    pub fn new(interactions: Arc<dyn InteractionSource>, concurrency: usize) -> Self {
        Self {
            interactions,
            concurrency: concurrency.max(1),
        }
    }

    /// Scores candidate products for `user_id` given their own history
    ///
    /// Dropping the returned future discards all partial work.
    #[instrument(skip(self, target), fields(history = target.len()))]
    pub async fn score(&self, user_id: UserId, target: &[Interaction]) -> AppResult<ScoreMap> {
        let target_products = similarity::product_set(target);
        if target_products.is_empty() {
            return Ok(ScoreMap::new());
        }

        let mut product_ids: Vec<ProductId> = target_products.iter().copied().collect();
        product_ids.sort_unstable();

        let mut shortlist: Vec<UserId> = self
            .interactions
            .users_interacted_with(&product_ids)
            .await?
            .into_iter()
            .filter(|&other| other != user_id)
            .collect();
        shortlist.sort_unstable();

        debug!(candidates = shortlist.len(), "Collaborative shortlist built");

        let chunks: Vec<Vec<UserId>> = shortlist
            .chunks(HISTORY_BATCH_SIZE)
            .map(<[UserId]>::to_vec)
            .collect();
        let source = Arc::clone(&self.interactions);
        let target_products = Arc::new(target_products);

        let batches: Vec<Vec<(UserId, ScoreMap)>> = stream::iter(chunks)
            .map(move |batch| {
                let source = Arc::clone(&source);
                let target_products = Arc::clone(&target_products);
                async move {
                    let histories = source.interactions_for_users(&batch).await?;
                    let contributions: Vec<(UserId, ScoreMap)> = histories
                        .into_iter()
                        .filter_map(|(other, history)| {
                            neighbour_scores(&target_products, &history)
                                .map(|scores| (other, scores))
                        })
                        .collect();
                    AppResult::Ok(contributions)
                }
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let mut partials: Vec<(UserId, ScoreMap)> = batches.into_iter().flatten().collect();

        // Batches finish in arbitrary order; merge by user id so float sums
        // are reproducible.
        partials.sort_unstable_by_key(|(other, _)| *other);

        let neighbours = partials.len();
        let mut scores = ScoreMap::new();
        for (_, partial) in partials {
            merge_scores(&mut scores, partial);
        }

        debug!(
            neighbours,
            candidates = scores.len(),
            "Collaborative scoring finished"
        );

        Ok(scores)
    }
}
