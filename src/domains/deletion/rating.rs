use crate::errors::DomainResult;
use crate::store::records::{decode, RatingAggregate, ReviewRecord};
use crate::store::{Collection, DocRef, DocumentStore, WriteOp};
use log::{debug, warn};
use std::sync::Arc;

/// Recomputes a user's aggregate rating from their current review set and
/// writes it back onto the user document.
///
/// Idempotent by construction: the aggregate is always derived from the
/// remaining reviews, so recomputing converges to the same value no matter
/// how often it runs. Patching a user document that is itself gone is a
/// tolerated no-op.
pub struct RatingRecalculator {
    store: Arc<dyn DocumentStore>,
}

impl RatingRecalculator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn recalculate(&self, user_id: &str) -> DomainResult<RatingAggregate> {
        let reviews = self
            .store
            .query_eq(Collection::Reviews, "targetUserId", user_id)
            .await?;

        let mut ratings = Vec::with_capacity(reviews.len());
        for doc in &reviews {
            match decode::<ReviewRecord>(doc) {
                Ok(review) => ratings.push(review.rating),
                Err(e) => warn!("Skipping unreadable review {}: {}", doc.doc_ref(), e),
            }
        }

        let aggregate = if ratings.is_empty() {
            RatingAggregate {
                average: 0.0,
                count: 0,
            }
        } else {
            let sum: f64 = ratings.iter().sum();
            RatingAggregate {
                average: round_to_tenth(sum / ratings.len() as f64),
                count: ratings.len() as u64,
            }
        };

        let mut fields = serde_json::Map::new();
        fields.insert(
            "rating".to_string(),
            serde_json::json!({"average": aggregate.average, "count": aggregate.count}),
        );
        self.store
            .commit(&[WriteOp::Patch {
                target: DocRef::new(Collection::Users, user_id),
                fields,
            }])
            .await?;

        debug!(
            "Recalculated rating for {}: average {} over {} reviews",
            user_id, aggregate.average, aggregate.count
        );
        Ok(aggregate)
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
