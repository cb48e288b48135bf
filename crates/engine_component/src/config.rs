//! Registry configuration.

/// Sizing hints for a [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Entity ids the liveness bitset has room for up front.
    pub entity_capacity: usize,
    /// Records each lazily created pool has room for up front.
    pub pool_capacity: usize,
}

impl RegistryConfig {
    /// Create a config with the default sizing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the entity capacity.
    #[must_use]
    pub fn with_entity_capacity(mut self, capacity: usize) -> Self {
        self.entity_capacity = capacity;
        self
    }

    /// Override the per-pool capacity.
    #[must_use]
    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 256,
            pool_capacity: 64,
        }
    }
}
