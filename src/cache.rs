use std::collections::HashMap;

use parking_lot::RwLock;

use crate::data::{FitContext, ModelFamily};
use crate::fit::FittedModel;
use crate::types::Compound;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    family: ModelFamily,
    circuit: String,
    season: u16,
    compound: Compound,
}

impl CacheKey {
    fn new(family: ModelFamily, ctx: &FitContext) -> Self {
        CacheKey {
            family,
            circuit: ctx.circuit.to_lowercase(),
            season: ctx.season,
            compound: ctx.compound,
        }
    }
}

struct CacheEntry {
    dataset_version: u64,
    model: FittedModel,
}

/// Fitted-model cache keyed by (family, context), versioned against the
/// data provider. An entry fitted against an older dataset version is a
/// miss, never a stale hit.
#[derive(Default)]
pub struct ModelCache {
    inner: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl ModelCache {
    pub fn new() -> Self {
        ModelCache::default()
    }

    pub fn get(
        &self,
        family: ModelFamily,
        ctx: &FitContext,
        dataset_version: u64,
    ) -> Option<FittedModel> {
        let key = CacheKey::new(family, ctx);
        let inner = self.inner.read();
        inner
            .get(&key)
            .filter(|entry| entry.dataset_version == dataset_version)
            .map(|entry| entry.model.clone())
    }

    pub fn put(
        &self,
        family: ModelFamily,
        ctx: &FitContext,
        dataset_version: u64,
        model: FittedModel,
    ) {
        let key = CacheKey::new(family, ctx);
        self.inner.write().insert(
            key,
            CacheEntry {
                dataset_version,
                model,
            },
        );
    }

    pub fn invalidate_all(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
