//! Reserved key namespaces.
//!
//! Two key prefixes carry meaning for the resolution pipeline:
//!
//! - `$var.<name>` declares a configuration variable usable as `${name}`.
//! - `$include.<label>` names a property file to merge into the set.
//!
//! Keys are classified once with [`KeyKind::classify`] and the pipeline
//! dispatches on the resulting tag.

/// Prefix of configuration variable declarations.
pub const VARIABLE_PREFIX: &str = "$var.";

/// Prefix of include directives.
pub const INCLUDE_PREFIX: &str = "$include.";

/// The role a key plays in the resolution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind<'a> {
    /// `$var.<name>`: declares the variable `name`.
    Variable(&'a str),
    /// `$include.<label>`: the value is the path of a file to include.
    Include(&'a str),
    /// Any other key.
    Regular,
}

impl<'a> KeyKind<'a> {
    /// Classify a key.
    ///
    /// ```
    /// use keel_config::KeyKind;
    ///
    /// assert_eq!(KeyKind::classify("$var.home"), KeyKind::Variable("home"));
    /// assert_eq!(KeyKind::classify("$include.1"), KeyKind::Include("1"));
    /// assert_eq!(KeyKind::classify("truststore.type"), KeyKind::Regular);
    /// ```
    pub fn classify(key: &'a str) -> Self {
        if let Some(name) = key.strip_prefix(VARIABLE_PREFIX) {
            Self::Variable(name)
        } else if let Some(label) = key.strip_prefix(INCLUDE_PREFIX) {
            Self::Include(label)
        } else {
            Self::Regular
        }
    }

    /// Whether the key is a variable declaration.
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }

    /// Whether the key is an include directive.
    pub fn is_include(&self) -> bool {
        matches!(self, Self::Include(_))
    }
}
