use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use bifrost_provider_core::Credential;
use rand::Rng;
use tokio::sync::RwLock;

use crate::error::Error;

/// An immutable, insertion-ordered snapshot of one provider's credentials.
/// Selection reads this without taking any lock; writers swap a whole new
/// snapshot in under a short exclusive lock on the outer map.
struct CredentialSnapshot {
    credentials: Vec<Credential>,
}

/// The weighted, model-filtered credential selector.
///
/// Deterministic under a fixed RNG seed; expected selection frequency
/// proportional to weight; O(n) per selection where n is the provider's
/// credential count.
#[derive(Default)]
pub struct WeightedCredentialPool {
    by_provider: RwLock<HashMap<String, Arc<ArcSwap<CredentialSnapshot>>>>,
}

impl WeightedCredentialPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic with respect to `select`: readers either see the old snapshot
    /// in full or the new one in full, never a partial update.
    pub async fn set_credentials(&self, provider: impl Into<String>, credentials: Vec<Credential>) {
        let provider = provider.into();
        let snapshot = Arc::new(CredentialSnapshot { credentials });
        let mut guard = self.by_provider.write().await;
        match guard.get(&provider) {
            Some(slot) => slot.store(snapshot),
            None => {
                guard.insert(provider, Arc::new(ArcSwap::new(snapshot)));
            }
        }
    }

    pub async fn select(&self, provider: &str, model: &str) -> Result<Credential, Error> {
        let slot = {
            let guard = self.by_provider.read().await;
            guard.get(provider).cloned()
        };
        let Some(slot) = slot else {
            return Err(Error::no_credential(provider, model));
        };
        let snapshot = slot.load();

        let candidates: Vec<&Credential> = snapshot
            .credentials
            .iter()
            .filter(|c| c.supports_model(model))
            .collect();

        if candidates.is_empty() {
            return Err(Error::no_credential(provider, model));
        }

        let sum: f64 = candidates.iter().map(|c| c.weight).sum();
        let chosen = if sum <= 0.0 {
            candidates[0]
        } else {
            let sample = rand::rng().random_range(0.0..sum);
            pick_weighted(&candidates, sample, sum)
        };
        Ok(chosen.clone())
    }
}

/// Pure walk over the model-filtered candidate list: accumulate weights in
/// insertion order and return the first whose running total exceeds
/// `sample`. Kept separate from `select` so selection convergence
/// can be tested by feeding a stream of samples without touching `rand`.
fn pick_weighted<'a>(candidates: &[&'a Credential], sample: f64, sum: f64) -> &'a Credential {
    let mut running = 0.0;
    for candidate in candidates {
        running += candidate.weight;
        if sample < running {
            return candidate;
        }
    }
    // Floating-point rounding can leave `sample` fractionally past the last
    // boundary; fall back to the final candidate rather than panic.
    debug_assert!(sample <= sum + f64::EPSILON);
    candidates[candidates.len() - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(weight: f64, models: &[&str]) -> Credential {
        Credential::new("secret", weight).with_models(models.iter().copied())
    }

    #[tokio::test]
    async fn filters_to_supported_models() {
        let pool = WeightedCredentialPool::new();
        pool.set_credentials(
            "openai",
            vec![credential(1.0, &["gpt-4o"]), credential(1.0, &["gpt-3.5"])],
        )
        .await;
        for _ in 0..20 {
            let chosen = pool.select("openai", "gpt-4o").await.unwrap();
            assert!(chosen.supports_model("gpt-4o"));
        }
    }

    #[tokio::test]
    async fn no_match_is_no_credential_error() {
        let pool = WeightedCredentialPool::new();
        pool.set_credentials("openai", vec![credential(1.0, &["gpt-3.5"])]).await;
        let err = pool.select("openai", "gpt-4o").await.unwrap_err();
        assert_eq!(err.kind(), "no_credential");
    }

    #[tokio::test]
    async fn zero_weight_credential_is_never_selected() {
        let pool = WeightedCredentialPool::new();
        pool.set_credentials(
            "openai",
            vec![credential(0.0, &["gpt-4o"]), credential(1.0, &["gpt-4o"])],
        )
        .await;
        for _ in 0..50 {
            let chosen = pool.select("openai", "gpt-4o").await.unwrap();
            assert!(chosen.weight > 0.0);
        }
    }

    #[tokio::test]
    async fn all_zero_weights_pick_first_by_insertion_order() {
        let pool = WeightedCredentialPool::new();
        let first = credential(0.0, &["gpt-4o"]);
        let first_id = first.id;
        pool.set_credentials("openai", vec![first, credential(0.0, &["gpt-4o"])])
            .await;
        for _ in 0..10 {
            let chosen = pool.select("openai", "gpt-4o").await.unwrap();
            assert_eq!(chosen.id, first_id);
        }
    }

    #[test]
    fn weighted_walk_converges_to_weight_ratio() {
        let a = credential(0.6, &[]);
        let b = credential(0.3, &[]);
        let c = credential(0.1, &[]);
        let candidates = vec![&a, &b, &c];
        let sum = 1.0;
        let mut counts = [0u32; 3];
        let trials = 100_000;
        for i in 0..trials {
            // Deterministic low-discrepancy sweep over [0, 1) in place of a
            // live RNG: exercises the same accumulation logic `select` uses.
            let sample = (i as f64 + 0.5) / trials as f64;
            let chosen = pick_weighted(&candidates, sample, sum);
            if std::ptr::eq(chosen, &a) {
                counts[0] += 1;
            } else if std::ptr::eq(chosen, &b) {
                counts[1] += 1;
            } else {
                counts[2] += 1;
            }
        }
        let observed = [
            counts[0] as f64 / trials as f64,
            counts[1] as f64 / trials as f64,
            counts[2] as f64 / trials as f64,
        ];
        assert!((observed[0] - 0.6).abs() < 0.01);
        assert!((observed[1] - 0.3).abs() < 0.01);
        assert!((observed[2] - 0.1).abs() < 0.01);
    }
}
