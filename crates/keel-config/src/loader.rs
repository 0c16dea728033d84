//! The resolution pipeline.
//!
//! [`ConfigLoader`] turns a raw property source into a
//! [`ResolvedConfiguration`]:
//!
//! 1. include directives are expanded ([`IncludeProcessor`])
//! 2. placeholders are substituted and `$var.` declarations dropped
//!    ([`VariableResolver`])
//! 3. the result is bound to the schema, and validated eagerly when
//!    [`ValidationMode::Eager`] is selected
//!
//! Any error aborts the load.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    ConfigResult, IncludeProcessor, Properties, PropertySchema, ResolvedConfiguration, SystemProperties,
    VariableResolver, VariableSource,
};

/// When the loaded configuration is checked against the schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationMode {
    /// Each key is checked when a getter reads it.
    #[default]
    Lazy,
    /// Everything is checked during the load, which fails on the first
    /// violation.
    Eager,
}

/// A raw property source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// A property file.
    File(PathBuf),
    /// Property file content without a backing file.
    Text(String),
    /// An already parsed property set.
    Properties(Properties),
}

impl ConfigSource {
    /// A source reading `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// A source parsing `content`.
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    fn read(&self) -> ConfigResult<Properties> {
        match self {
            Self::File(path) => Properties::load(path),
            Self::Text(content) => Properties::parse(content),
            Self::Properties(properties) => Ok(properties.clone()),
        }
    }
}

impl From<PathBuf> for ConfigSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<&Path> for ConfigSource {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

impl From<Properties> for ConfigSource {
    fn from(properties: Properties) -> Self {
        Self::Properties(properties)
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Text(_) => f.write_str("<text>"),
            Self::Properties(properties) => match properties.origin() {
                Some(origin) => write!(f, "{}", origin.display()),
                None => f.write_str("<memory>"),
            },
        }
    }
}

/// Runs the resolution pipeline and binds the result to a schema.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use std::sync::Arc;
/// use keel_config::{ConfigLoader, ConfigSource, PropertyDescriptor, PropertySchema, ValidationMode};
///
/// let schema = PropertySchema::builder()
///     .property("pool.size", PropertyDescriptor::with_default("8").build()?)
///     .build()?;
///
/// let config = ConfigLoader::new(Arc::new(schema))
///     .with_environment(HashMap::from([("POOL".to_string(), "32".to_string())]))
///     .with_validation(ValidationMode::Eager)
///     .load(ConfigSource::text("pool.size = ${POOL}\n"))?;
///
/// assert_eq!(config.get_int("pool.size")?, Some(32));
/// # Ok::<(), keel_config::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    schema: Arc<PropertySchema>,
    resolver: VariableResolver,
    validation: ValidationMode,
}

impl ConfigLoader {
    /// Create a loader for `schema` with the default resolver and lazy
    /// validation.
    #[must_use]
    pub fn new(schema: Arc<PropertySchema>) -> Self {
        Self {
            schema,
            resolver: VariableResolver::new(),
            validation: ValidationMode::default(),
        }
    }

    /// Use the given resolver for include paths and values.
    #[must_use]
    pub fn with_resolver(mut self, resolver: VariableResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Resolve placeholders against the given system properties first.
    #[must_use]
    pub fn with_system_properties(mut self, system: SystemProperties) -> Self {
        self.resolver = self.resolver.with_system_properties(system);
        self
    }

    /// Resolve placeholders against the given environment instead of the
    /// process environment.
    #[must_use]
    pub fn with_environment(mut self, environment: impl VariableSource + 'static) -> Self {
        self.resolver = self.resolver.with_environment(environment);
        self
    }

    /// Select when the configuration is validated.
    #[must_use]
    pub fn with_validation(mut self, validation: ValidationMode) -> Self {
        self.validation = validation;
        self
    }

    /// The schema results are bound to.
    pub fn schema(&self) -> &Arc<PropertySchema> {
        &self.schema
    }

    /// The resolver.
    pub fn resolver(&self) -> &VariableResolver {
        &self.resolver
    }

    /// The validation mode.
    pub fn validation(&self) -> ValidationMode {
        self.validation
    }

    /// Expand includes and substitute placeholders without binding to the
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns the first I/O, parse, include or variable error.
    pub fn resolve(&self, properties: &Properties) -> ConfigResult<Properties> {
        let merged = IncludeProcessor::new(self.resolver.clone()).process(properties)?;
        debug!(properties = merged.len(), "includes expanded");
        let resolved = self.resolver.resolve(&merged)?;
        debug!(properties = resolved.len(), "variables resolved");
        Ok(resolved)
    }

    /// Load a source with the configured validation mode.
    ///
    /// # Errors
    ///
    /// Returns the first error of any pipeline stage, or of validation in
    /// eager mode.
    pub fn load(&self, source: impl Into<ConfigSource>) -> ConfigResult<ResolvedConfiguration> {
        self.load_with(source.into(), self.validation)
    }

    /// Load a property file.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn load_file(&self, path: impl AsRef<Path>) -> ConfigResult<ResolvedConfiguration> {
        self.load(path.as_ref())
    }

    pub(crate) fn load_with(
        &self,
        source: ConfigSource,
        validation: ValidationMode,
    ) -> ConfigResult<ResolvedConfiguration> {
        let raw = source.read()?;
        let resolved = self.resolve(&raw)?;
        let config = ResolvedConfiguration::new(resolved, Arc::clone(&self.schema));

        if validation == ValidationMode::Eager {
            config.validate()?;
        }

        info!(
            source = %source,
            properties = config.properties().len(),
            validation = ?validation,
            "configuration loaded"
        );
        Ok(config)
    }
}
