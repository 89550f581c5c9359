//! # World Configuration
//!
//! Loaded once when a world is built, either in code or from a TOML file:
//!
//! ```toml
//! max_component_types = 256
//! entity_capacity = 100000
//! store_capacity = 1024
//! gc_interval = 600
//! stable_id_seed = 42
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default ceiling on distinct component types per world.
pub const DEFAULT_MAX_COMPONENT_TYPES: usize = 256;

/// Hard upper bound accepted for `max_component_types`.
pub const COMPONENT_TYPES_LIMIT: usize = 4096;

/// Tunables for a [`World`](crate::World).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Maximum number of distinct component types. Registering one more is fatal.
    pub max_component_types: usize,
    /// Initial reservation of the entity table.
    pub entity_capacity: usize,
    /// Initial reservation of every component store.
    pub store_capacity: usize,
    /// Run garbage collection every N steps. `0` means only on explicit `gc()`.
    pub gc_interval: u32,
    /// Seed for the stable-id generator. Derived from the clock when absent.
    pub stable_id_seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            max_component_types: DEFAULT_MAX_COMPONENT_TYPES,
            entity_capacity: 0,
            store_capacity: 0,
            gc_interval: 0,
            stable_id_seed: None,
        }
    }
}

impl WorldConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML and
    /// [`ConfigError::Invalid`] when a value is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_component_types == 0 || self.max_component_types > COMPONENT_TYPES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_component_types must be in 1..={COMPONENT_TYPES_LIMIT}, got {}",
                self.max_component_types
            )));
        }
        Ok(())
    }

    /// Returns the config with a fixed stable-id seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.stable_id_seed = Some(seed);
        self
    }

    /// Returns the config with a different component type ceiling.
    #[must_use]
    pub fn with_max_component_types(mut self, max: usize) -> Self {
        self.max_component_types = max;
        self
    }

    /// Returns the config with automatic garbage collection every `steps` steps.
    #[must_use]
    pub fn with_gc_interval(mut self, steps: u32) -> Self {
        self.gc_interval = steps;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorldConfig::default();
        assert_eq!(config.max_component_types, 256);
        assert_eq!(config.gc_interval, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_file() {
        let config = WorldConfig::from_toml_str("gc_interval = 10\nstable_id_seed = 7\n").unwrap();
        assert_eq!(config.gc_interval, 10);
        assert_eq!(config.stable_id_seed, Some(7));
        assert_eq!(config.max_component_types, DEFAULT_MAX_COMPONENT_TYPES);
    }

    #[test]
    fn test_rejects_out_of_range() {
        let err = WorldConfig::from_toml_str("max_component_types = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let err = WorldConfig::from_toml_str("max_components = 12").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
