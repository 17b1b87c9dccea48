use std::env;

/// Hard upper bound the store places on a single batched commit.
pub const STORE_COMMIT_LIMIT: usize = 500;

/// Tunable limits for the deletion and integrity engine.
///
/// Defaults match the limits observed against the production store: 500
/// operations per commit for same-collection account-deletion passes, 400 for
/// multi-collection integrity passes, 100 concurrent existence lookups and
/// 100 asset ids per bulk-delete call.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Chunk size for account-deletion document batches.
    pub deletion_batch_limit: usize,

    /// Chunk size for integrity repair batches.
    pub integrity_batch_limit: usize,

    /// Maximum concurrent existence lookups within one pass.
    pub existence_fanout: usize,

    /// Asset ids per object-storage bulk-delete call.
    pub asset_delete_chunk: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deletion_batch_limit: 500,
            integrity_batch_limit: 400,
            existence_fanout: 100,
            asset_delete_chunk: 100,
        }
    }
}

impl EngineConfig {
    /// Build a config from the environment, falling back to defaults.
    ///
    /// Recognised variables: `EXCHANGE_DELETION_BATCH_LIMIT`,
    /// `EXCHANGE_INTEGRITY_BATCH_LIMIT`, `EXCHANGE_EXISTENCE_FANOUT`,
    /// `EXCHANGE_ASSET_DELETE_CHUNK`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            deletion_batch_limit: env_usize(
                "EXCHANGE_DELETION_BATCH_LIMIT",
                defaults.deletion_batch_limit,
            ),
            integrity_batch_limit: env_usize(
                "EXCHANGE_INTEGRITY_BATCH_LIMIT",
                defaults.integrity_batch_limit,
            ),
            existence_fanout: env_usize("EXCHANGE_EXISTENCE_FANOUT", defaults.existence_fanout),
            asset_delete_chunk: env_usize(
                "EXCHANGE_ASSET_DELETE_CHUNK",
                defaults.asset_delete_chunk,
            ),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    match env::var(key) {
        Ok(raw) => match raw.parse::<usize>() {
            Ok(value) if value > 0 => value,
            _ => {
                log::warn!("Ignoring invalid value for {}: {:?}", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_store_limits() {
        let config = EngineConfig::default();
        assert_eq!(config.deletion_batch_limit, STORE_COMMIT_LIMIT);
        assert_eq!(config.integrity_batch_limit, 400);
        assert_eq!(config.existence_fanout, 100);
        assert_eq!(config.asset_delete_chunk, 100);
    }
}
