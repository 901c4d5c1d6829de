//! Generation-counter cache tags.
//!
//! [`TagRegistry`] is the process-local receiver of invalidation signals.
//! Each tag carries a generation number that `invalidate` bumps; a cache
//! layer stores the generation alongside each entry and treats the entry
//! as stale once the registry's generation has moved past it.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use context_relay_core::cache::CacheInvalidator;

#[derive(Debug, Default)]
pub struct TagRegistry {
    generations: RwLock<HashMap<String, u64>>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation of `tag`; tags never invalidated are at 0.
    pub fn generation(&self, tag: &str) -> u64 {
        self.generations
            .read()
            .map(|g| g.get(tag).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Is an entry cached at `generation` under `tag` still valid?
    pub fn is_fresh(&self, tag: &str, generation: u64) -> bool {
        self.generation(tag) == generation
    }
}

impl CacheInvalidator for TagRegistry {
    fn invalidate(&self, tag: &str) {
        let mut generations = match self.generations.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let generation = generations.entry(tag.to_string()).or_insert(0);
        *generation += 1;
        debug!(tag, generation = *generation, "cache tag invalidated");
    }
}
