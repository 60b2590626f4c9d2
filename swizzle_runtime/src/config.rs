//! Runtime configuration parameters.
//!
//! Defaults favour safety: cached dispatch, serialized multi-step mutations,
//! and refusal to silently change a pseudo-property's storage kind.

use thiserror::Error;

/// What to do when a pseudo-property is added again with a different kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyRedefinition {
    /// Fail with `PropertyKindConflict`.
    #[default]
    Reject,
    /// Re-install; the last adder wins.
    Overwrite,
}

/// Configuration for a [`Runtime`](crate::Runtime).
///
/// # Example
///
/// ```ignore
/// use swizzle_runtime::{PropertyRedefinition, Runtime, RuntimeConfig};
///
/// let runtime = Runtime::new(RuntimeConfig {
///     property_redefinition: PropertyRedefinition::Overwrite,
///     ..Default::default()
/// })?;
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    // =========================================================================
    // Dispatch
    // =========================================================================
    /// Memoize method resolution per (class, dispatch kind, selector).
    ///
    /// Every class-table mutation invalidates the affected entries, so this
    /// never changes observable behavior.
    ///
    /// Default: true
    pub method_cache: bool,

    // =========================================================================
    // Mutation
    // =========================================================================
    /// Hold a runtime-wide reentrant lock across multi-step mutations
    /// (override, pseudo-property install, isolation, observation).
    ///
    /// Single table writes are atomic either way. Disable only when all
    /// mutation happens on one thread during setup.
    ///
    /// Default: true
    pub serialize_mutations: bool,

    /// Policy for adding a pseudo-property under a name already installed
    /// with a different kind on the same class.
    ///
    /// Default: `Reject`
    pub property_redefinition: PropertyRedefinition,

    // =========================================================================
    // Naming
    // =========================================================================
    /// Name of the root class every other class descends from.
    ///
    /// Default: "Object"
    pub root_class_name: String,

    /// Infix used for per-instance isolated classes: `<Class><infix><id>`.
    ///
    /// Default: "_Isolated_"
    pub isolated_class_infix: String,

    /// Infix used for per-instance change-notification classes.
    ///
    /// Default: "_Notifying_"
    pub notifying_class_infix: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            method_cache: true,
            serialize_mutations: true,
            property_redefinition: PropertyRedefinition::Reject,
            root_class_name: "Object".to_string(),
            isolated_class_infix: "_Isolated_".to_string(),
            notifying_class_infix: "_Notifying_".to_string(),
        }
    }
}

/// Invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("root class name must not be empty")]
    EmptyRootClassName,

    #[error("{field} must not be empty")]
    EmptyInfix { field: &'static str },

    #[error("isolated and notifying class infixes must differ (both {0:?})")]
    DuplicateInfix(String),
}

impl RuntimeConfig {
    /// Configuration for tests that want every lookup to walk the hierarchy.
    pub fn uncached() -> Self {
        Self {
            method_cache: false,
            ..Default::default()
        }
    }

    /// Check the configuration for inconsistencies.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root_class_name.trim().is_empty() {
            return Err(ConfigError::EmptyRootClassName);
        }
        if self.isolated_class_infix.is_empty() {
            return Err(ConfigError::EmptyInfix {
                field: "isolated_class_infix",
            });
        }
        if self.notifying_class_infix.is_empty() {
            return Err(ConfigError::EmptyInfix {
                field: "notifying_class_infix",
            });
        }
        if self.isolated_class_infix == self.notifying_class_infix {
            return Err(ConfigError::DuplicateInfix(
                self.isolated_class_infix.clone(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.method_cache);
        assert!(config.serialize_mutations);
        assert_eq!(config.property_redefinition, PropertyRedefinition::Reject);
    }

    #[test]
    fn test_uncached_config() {
        let config = RuntimeConfig::uncached();
        assert!(!config.method_cache);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_root_name_rejected() {
        let config = RuntimeConfig {
            root_class_name: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyRootClassName));
    }

    #[test]
    fn test_identical_infixes_rejected() {
        let config = RuntimeConfig {
            notifying_class_infix: "_Isolated_".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateInfix(_))
        ));
    }
}
