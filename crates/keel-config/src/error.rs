//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while resolving, loading or validating properties.
///
/// Every variant that concerns a single property carries the full key
/// (namespace prefix included) so that misconfiguration can be diagnosed
/// without reading the resolution internals.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A `${name}` placeholder matched no system property, environment
    /// variable or `$var.` declaration.
    #[error("unresolved variable '{name}' referenced in the value of property '{key}'")]
    UnresolvedVariable {
        /// Name of the variable.
        name: String,
        /// Key whose value contains the placeholder.
        key: String,
    },

    /// The same key was introduced by more than one merged source.
    #[error("duplicate property '{key}' introduced by included file {}", .file.display())]
    DuplicateKey {
        /// The conflicting key.
        key: String,
        /// The included file that brought the key in a second time.
        file: PathBuf,
    },

    /// A file includes itself, directly or through other includes.
    #[error("include cycle detected: {} is already being included (chain: {})", .path.display(), format_chain(.chain))]
    IncludeCycle {
        /// The file that closes the cycle.
        path: PathBuf,
        /// The inclusion chain, outermost file first.
        chain: Vec<PathBuf>,
    },

    /// A mandatory property is absent.
    #[error("mandatory property '{key}' is not set")]
    MissingMandatoryProperty {
        /// The missing key.
        key: String,
    },

    /// A value cannot be parsed as the declared type.
    #[error("value '{value}' of property '{key}' is invalid, expected {expected}")]
    InvalidPropertyType {
        /// The offending key.
        key: String,
        /// The value, masked for secret properties.
        value: String,
        /// Description of the expected type.
        expected: String,
    },

    /// A numeric value lies outside the declared bounds.
    #[error("value '{value}' of property '{key}' is out of range, expected {constraint}")]
    OutOfRange {
        /// The offending key.
        key: String,
        /// The value, masked for secret properties.
        value: String,
        /// The violated range.
        constraint: String,
    },

    /// A value is not one of the declared enumeration constants.
    #[error("value '{value}' of property '{key}' is not one of {}", format_list(.allowed))]
    InvalidEnumValue {
        /// The offending key.
        key: String,
        /// The value, masked for secret properties.
        value: String,
        /// The accepted constants.
        allowed: Vec<String>,
    },

    /// A value does not name an implementation of the declared class family.
    #[error("value '{value}' of property '{key}' does not name a known implementation of {base}")]
    InvalidClassValue {
        /// The offending key.
        key: String,
        /// The value, masked for secret properties.
        value: String,
        /// Name of the base class.
        base: String,
    },

    /// A list element key has an illegal suffix.
    #[error("invalid list element key '{key}': {reason}")]
    InvalidListKey {
        /// The offending key.
        key: String,
        /// Explanation of why the key is invalid.
        reason: String,
    },

    /// A key inside the schema namespace is not described by the schema.
    #[error("unknown property '{key}'")]
    UnknownProperty {
        /// The unknown key.
        key: String,
    },

    /// A descriptor or schema violates its own invariants.
    #[error("invalid definition of property '{key}': {reason}")]
    InvalidDescriptor {
        /// Key the descriptor is registered under (empty before registration).
        key: String,
        /// Explanation of the violated invariant.
        reason: String,
    },

    /// A property source is syntactically malformed.
    #[error("malformed property source {}:{line}: {reason}", .path.display())]
    Parse {
        /// Path of the source, or `<memory>` for in-memory sources.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Explanation of the syntax error.
        reason: String,
    },

    /// A property source could not be read.
    #[error("failed to read property file {}", .path.display())]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Create a new unresolved variable error.
    pub fn unresolved_variable(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self::UnresolvedVariable {
            name: name.into(),
            key: key.into(),
        }
    }

    /// Create a new duplicate key error.
    pub fn duplicate_key(key: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self::DuplicateKey {
            key: key.into(),
            file: file.into(),
        }
    }

    /// Create a new missing mandatory property error.
    pub fn missing_mandatory(key: impl Into<String>) -> Self {
        Self::MissingMandatoryProperty { key: key.into() }
    }

    /// Create a new invalid type error.
    pub fn invalid_type(
        key: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidPropertyType {
            key: key.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create a new out of range error.
    pub fn out_of_range(
        key: impl Into<String>,
        value: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        Self::OutOfRange {
            key: key.into(),
            value: value.into(),
            constraint: constraint.into(),
        }
    }

    /// Create a new invalid list key error.
    pub fn invalid_list_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidListKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a new unknown property error.
    pub fn unknown_property(key: impl Into<String>) -> Self {
        Self::UnknownProperty { key: key.into() }
    }

    /// Create a new invalid descriptor error.
    pub fn invalid_descriptor(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a new parse error.
    pub fn parse(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Create a new I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The property key this error concerns, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::UnresolvedVariable { key, .. }
            | Self::DuplicateKey { key, .. }
            | Self::MissingMandatoryProperty { key }
            | Self::InvalidPropertyType { key, .. }
            | Self::OutOfRange { key, .. }
            | Self::InvalidEnumValue { key, .. }
            | Self::InvalidClassValue { key, .. }
            | Self::InvalidListKey { key, .. }
            | Self::UnknownProperty { key }
            | Self::InvalidDescriptor { key, .. } => Some(key),
            Self::IncludeCycle { .. } | Self::Parse { .. } | Self::Io { .. } => None,
        }
    }
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn format_list(values: &[String]) -> String {
    format!("[{}]", values.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_variable_error() {
        let err = ConfigError::unresolved_variable("var2", "p");
        let msg = err.to_string();
        assert!(msg.contains("var2"));
        assert!(msg.contains("'p'"));
        assert_eq!(err.key(), Some("p"));
    }

    #[test]
    fn test_duplicate_key_error() {
        let err = ConfigError::duplicate_key("regular.property", "/etc/keel/dup.properties");
        let msg = err.to_string();
        assert!(msg.contains("duplicate"));
        assert!(msg.contains("regular.property"));
        assert!(msg.contains("/etc/keel/dup.properties"));
    }

    #[test]
    fn test_include_cycle_error() {
        let err = ConfigError::IncludeCycle {
            path: PathBuf::from("a.properties"),
            chain: vec![PathBuf::from("a.properties"), PathBuf::from("b.properties")],
        };
        let msg = err.to_string();
        assert!(msg.contains("a.properties -> b.properties"));
        assert_eq!(err.key(), None);
    }

    #[test]
    fn test_invalid_type_error() {
        let err = ConfigError::invalid_type("pool.size", "many", "integer number");
        let msg = err.to_string();
        assert!(msg.contains("pool.size"));
        assert!(msg.contains("many"));
        assert!(msg.contains("integer number"));
    }

    #[test]
    fn test_invalid_enum_error() {
        let err = ConfigError::InvalidEnumValue {
            key: "truststore.type".to_string(),
            value: "pem".to_string(),
            allowed: vec!["KEYSTORE".to_string(), "OPENSSL".to_string()],
        };
        assert!(err.to_string().contains("[KEYSTORE, OPENSSL]"));
    }

    #[test]
    fn test_parse_error() {
        let err = ConfigError::parse("base.properties", 7, "malformed \\uXXXX escape");
        let msg = err.to_string();
        assert!(msg.contains("base.properties:7"));
        assert!(msg.contains("escape"));
    }

    #[test]
    fn test_io_error_has_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ConfigError::io("/missing.properties", io);
        assert!(err.to_string().contains("/missing.properties"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
