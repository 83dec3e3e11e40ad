//! Content-addressed identity of a cacheable query result.

use ahash::AHasher;
use resultcache_core::{ExecutionSettings, Schema};
use std::hash::{Hash, Hasher};

/// Mixing coefficient applied per component when folding the fingerprint's
/// parts into one hash.
const COMPONENT_COEFFICIENT: u64 = 9273;

/// Identity of a query result: structural AST hash, output schema, execution
/// settings, and optional user.
///
/// Two fingerprints are equal iff all four components are equal. The
/// combined hash is computed once at construction; settings are folded in
/// order-sensitively (see [`ExecutionSettings::stable_hash`]).
///
/// Fingerprint equality implies result equivalence only under the current
/// catalog state: nothing here detects stale data, so callers must keep
/// non-deterministic or catalog-dependent queries out of the cache or give
/// them a short residency.
#[derive(Debug, Clone)]
pub struct QueryFingerprint {
    ast_hash: u64,
    schema: Schema,
    settings: ExecutionSettings,
    user: Option<String>,
    hash: u64,
}

impl QueryFingerprint {
    /// Builds a fingerprint from the query's AST, hashing its structure.
    pub fn new(
        ast: &impl Hash,
        schema: &Schema,
        settings: &ExecutionSettings,
        user: Option<&str>,
    ) -> Self {
        let mut hasher = AHasher::default();
        ast.hash(&mut hasher);
        Self::from_ast_hash(hasher.finish(), schema, settings, user)
    }

    /// Builds a fingerprint from a precomputed AST tree hash.
    pub fn from_ast_hash(
        ast_hash: u64,
        schema: &Schema,
        settings: &ExecutionSettings,
        user: Option<&str>,
    ) -> Self {
        let mut hasher = AHasher::default();
        schema.describe().hash(&mut hasher);
        let schema_hash = hasher.finish();

        let user_hash = user.map_or(0, |u| {
            let mut hasher = AHasher::default();
            u.hash(&mut hasher);
            hasher.finish()
        });

        let c = COMPONENT_COEFFICIENT;
        let hash = ast_hash
            .wrapping_add(schema_hash.wrapping_mul(c))
            .wrapping_add(settings.stable_hash().wrapping_mul(c.wrapping_mul(c)))
            .wrapping_add(user_hash.wrapping_mul(c.wrapping_mul(c).wrapping_mul(c)));

        Self {
            ast_hash,
            schema: schema.clone(),
            settings: settings.clone(),
            user: user.map(str::to_owned),
            hash,
        }
    }

    pub fn ast_hash(&self) -> u64 {
        self.ast_hash
    }

    /// The output row header this result was keyed under.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

impl PartialEq for QueryFingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.ast_hash == other.ast_hash
            && self.schema == other.schema
            && self.settings == other.settings
            && self.user == other.user
    }
}

impl Eq for QueryFingerprint {}

impl Hash for QueryFingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}
