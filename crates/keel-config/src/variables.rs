//! `${name}` placeholder substitution.
//!
//! A placeholder is resolved against three sources, highest precedence first:
//!
//! 1. system properties: an explicit, process-scoped [`SystemProperties`] map
//! 2. the environment (by default the process environment)
//! 3. configuration variables declared in the same set as `$var.<name>`
//!
//! Deployment context therefore always overrides the static defaults declared
//! in the configuration itself.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::keys::{KeyKind, VARIABLE_PREFIX};
use crate::{ConfigError, ConfigResult, Properties};

/// A source of variable values.
pub trait VariableSource: Send + Sync {
    /// Look up the value of a variable.
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Variables taken from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl VariableSource for ProcessEnvironment {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl VariableSource for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl VariableSource for BTreeMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Explicit, process-scoped variable definitions.
///
/// These take precedence over the environment. The CLI fills them from
/// `-D name=value` flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemProperties {
    values: IndexMap<String, String>,
}

impl SystemProperties {
    /// Create an empty set of system properties.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a property.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Define a property, replacing any previous definition.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Parse a `name=value` definition.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDescriptor`] when the definition has no
    /// `=` or an empty name.
    pub fn parse_definition(definition: &str) -> ConfigResult<(String, String)> {
        match definition.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok((name.trim().to_string(), value.to_string()))
            }
            _ => Err(ConfigError::invalid_descriptor(
                definition,
                "system property definitions must have the form name=value",
            )),
        }
    }

    /// Get a property.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Number of defined properties.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no property is defined.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SystemProperties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl VariableSource for SystemProperties {
    fn lookup(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// Which source a variable was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableOrigin {
    /// A system property.
    SystemProperty,
    /// An environment variable.
    Environment,
    /// A `$var.` declaration in the property set.
    Configuration,
}

impl fmt::Display for VariableOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SystemProperty => write!(f, "system property"),
            Self::Environment => write!(f, "environment"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Resolves `${name}` placeholders in property values.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use keel_config::{Properties, VariableResolver};
///
/// let props: Properties = [("$var.home", "/opt/grid"), ("truststore.path", "${home}/trust.jks")]
///     .into_iter()
///     .collect();
///
/// let resolver = VariableResolver::new().with_environment(HashMap::new());
/// let resolved = resolver.resolve(&props).unwrap();
///
/// assert_eq!(resolved.get("truststore.path"), Some("/opt/grid/trust.jks"));
/// assert!(!resolved.contains_key("$var.home"));
/// ```
#[derive(Clone)]
pub struct VariableResolver {
    system: Arc<dyn VariableSource>,
    environment: Arc<dyn VariableSource>,
}

impl Default for VariableResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VariableResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableResolver").finish_non_exhaustive()
    }
}

impl VariableResolver {
    /// Create a resolver with no system properties that reads the process
    /// environment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: Arc::new(SystemProperties::new()),
            environment: Arc::new(ProcessEnvironment),
        }
    }

    /// Use the given system properties.
    #[must_use]
    pub fn with_system_properties(mut self, source: impl VariableSource + 'static) -> Self {
        self.system = Arc::new(source);
        self
    }

    /// Use the given environment instead of the process environment.
    #[must_use]
    pub fn with_environment(mut self, source: impl VariableSource + 'static) -> Self {
        self.environment = Arc::new(source);
        self
    }

    /// Resolve every value of `properties`.
    ///
    /// Returns a new set without the `$var.` declarations; the input is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnresolvedVariable`] for the first placeholder
    /// that matches no source.
    pub fn resolve(&self, properties: &Properties) -> ConfigResult<Properties> {
        let mut resolved = match properties.origin() {
            Some(origin) => Properties::with_origin(origin),
            None => Properties::new(),
        };

        for (key, value) in properties.iter() {
            if KeyKind::classify(key).is_variable() {
                continue;
            }
            let value = self.resolve_value(key, value, properties)?;
            resolved.insert(key, value);
        }

        Ok(resolved)
    }

    /// Substitute the placeholders of a single value.
    ///
    /// `context` supplies the `$var.` declarations; `key` is only used for
    /// error reporting. Substituted text is not scanned again, and an
    /// unterminated `${` is kept literally.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnresolvedVariable`] when a placeholder matches
    /// no source.
    pub fn resolve_value(&self, key: &str, value: &str, context: &Properties) -> ConfigResult<String> {
        let mut out = String::with_capacity(value.len());
        let mut rest = value;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };

            let name = &after[..end];
            let (resolved, origin) = self
                .resolve_variable(name, context)
                .ok_or_else(|| ConfigError::unresolved_variable(name, key))?;
            debug!(variable = name, key, %origin, "resolved variable");
            out.push_str(&resolved);
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }

    /// Look a variable up in precedence order.
    pub fn resolve_variable(&self, name: &str, context: &Properties) -> Option<(String, VariableOrigin)> {
        if let Some(value) = self.system.lookup(name) {
            return Some((value, VariableOrigin::SystemProperty));
        }
        if let Some(value) = self.environment.lookup(name) {
            return Some((value, VariableOrigin::Environment));
        }
        context
            .get(&format!("{VARIABLE_PREFIX}{name}"))
            .map(|value| (value.to_string(), VariableOrigin::Configuration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(env: &[(&str, &str)]) -> VariableResolver {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        VariableResolver::new().with_environment(env)
    }

    fn props(entries: &[(&str, &str)]) -> Properties {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_resolve_config_variable() {
        let input = props(&[("$var.var1", "Dynamic"), ("p", "some${var1}Value")]);
        let resolved = resolver(&[]).resolve(&input).unwrap();
        assert_eq!(resolved.get("p"), Some("someDynamicValue"));
        assert!(!resolved.contains_key("$var.var1"));
    }

    #[test]
    fn test_unknown_variable_fails() {
        let input = props(&[("p", "some${var2}Value")]);
        let err = resolver(&[]).resolve(&input).unwrap_err();
        match err {
            ConfigError::UnresolvedVariable { name, key } => {
                assert_eq!(name, "var2");
                assert_eq!(key, "p");
            }
            other => panic!("expected unresolved variable, got {other:?}"),
        }
    }

    #[test]
    fn test_environment_variable_used() {
        let input = props(&[("p", "some${HOME_DIR}Value")]);
        let resolved = resolver(&[("HOME_DIR", "/home/grid")]).resolve(&input).unwrap();
        assert_eq!(resolved.get("p"), Some("some/home/gridValue"));
    }

    #[test]
    fn test_system_property_overrides_environment_and_config() {
        let input = props(&[("$var.version", "CONFIG-DEFINED"), ("p", "v${version}")]);
        let resolver = resolver(&[("version", "ENV")])
            .with_system_properties(SystemProperties::new().with("version", "SYSTEM"));
        let resolved = resolver.resolve(&input).unwrap();
        assert_eq!(resolved.get("p"), Some("vSYSTEM"));
    }

    #[test]
    fn test_environment_overrides_config() {
        let input = props(&[("$var.version", "CONFIG-DEFINED"), ("p", "v${version}")]);
        let resolved = resolver(&[("version", "ENV")]).resolve(&input).unwrap();
        assert_eq!(resolved.get("p"), Some("vENV"));
    }

    #[test]
    fn test_resolve_variable_reports_origin() {
        let context = props(&[("$var.a", "1")]);
        let resolver = resolver(&[("b", "2")])
            .with_system_properties(SystemProperties::new().with("c", "3"));
        assert_eq!(
            resolver.resolve_variable("a", &context),
            Some(("1".to_string(), VariableOrigin::Configuration))
        );
        assert_eq!(
            resolver.resolve_variable("b", &context),
            Some(("2".to_string(), VariableOrigin::Environment))
        );
        assert_eq!(
            resolver.resolve_variable("c", &context),
            Some(("3".to_string(), VariableOrigin::SystemProperty))
        );
        assert_eq!(resolver.resolve_variable("d", &context), None);
    }

    #[test]
    fn test_multiple_placeholders_in_one_value() {
        let input = props(&[("$var.host", "grid.example.org"), ("url", "https://${host}:${PORT}/")]);
        let resolved = resolver(&[("PORT", "8443")]).resolve(&input).unwrap();
        assert_eq!(resolved.get("url"), Some("https://grid.example.org:8443/"));
    }

    #[test]
    fn test_substitution_is_single_pass() {
        let input = props(&[("$var.a", "${b}"), ("$var.b", "never"), ("p", "${a}")]);
        let resolved = resolver(&[]).resolve(&input).unwrap();
        assert_eq!(resolved.get("p"), Some("${b}"));
    }

    #[test]
    fn test_literal_dollar_passes_through() {
        let input = props(&[("price", "$5 and $ {x} and $$"), ("open", "tail ${unterminated")]);
        let resolved = resolver(&[]).resolve(&input).unwrap();
        assert_eq!(resolved.get("price"), Some("$5 and $ {x} and $$"));
        assert_eq!(resolved.get("open"), Some("tail ${unterminated"));
    }

    #[test]
    fn test_input_is_not_modified() {
        let input = props(&[("$var.x", "1"), ("p", "${x}")]);
        let before = input.clone();
        let _ = resolver(&[]).resolve(&input).unwrap();
        assert_eq!(input, before);
    }

    #[test]
    fn test_origin_is_preserved() {
        let mut input = props(&[("a", "1")]);
        input.set_origin("/etc/keel/base.properties");
        let resolved = resolver(&[]).resolve(&input).unwrap();
        assert_eq!(
            resolved.origin(),
            Some(std::path::Path::new("/etc/keel/base.properties"))
        );
    }

    #[test]
    fn test_parse_system_property_definition() {
        assert_eq!(
            SystemProperties::parse_definition("a.b=c=d").unwrap(),
            ("a.b".to_string(), "c=d".to_string())
        );
        assert!(SystemProperties::parse_definition("novalue").is_err());
        assert!(SystemProperties::parse_definition("=x").is_err());
    }
}
