//! Property resolution and validation for Keel.
//!
//! This crate turns a raw, possibly multi-file, possibly variable-laden
//! property set into a resolved, type-checked configuration:
//! - `key=value` property files ([`Properties`])
//! - `${name}` placeholders resolved against system properties, the
//!   environment and `$var.` declarations ([`VariableResolver`])
//! - recursive `$include.` directives ([`IncludeProcessor`])
//! - typed metadata and validation ([`PropertySchema`], [`PropertyDescriptor`])
//! - reload on file modification ([`ConfigurationStore`])
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use keel_config::{ConfigurationStore, PropertyDescriptor, PropertySchema};
//!
//! # fn main() -> Result<(), keel_config::ConfigError> {
//! let schema = PropertySchema::builder()
//!     .prefix("truststore.")
//!     .property(
//!         "type",
//!         PropertyDescriptor::builder()
//!             .enumeration(["keystore", "openssl", "directory"])
//!             .required()
//!             .build()?,
//!     )
//!     .property("updateInterval", PropertyDescriptor::with_default("600").updateable().build()?)
//!     .build()?;
//!
//! let store = ConfigurationStore::open("/etc/keel/truststore.properties", Arc::new(schema))?;
//! let config = store.current();
//! println!("truststore type: {:?}", config.get_enum_name("type")?);
//! # Ok(())
//! # }
//! ```
//!
//! # Property File Format
//!
//! ```text
//! $var.base = /opt/keel
//! $include.common = common.properties
//!
//! truststore.type = keystore
//! truststore.keystorePath = ${base}/truststore.jks
//! ```
//!
//! Keys under `$var.` declare variables and are removed from the resolved
//! set. Keys under `$include.` name files, relative to the including file,
//! whose properties are merged in; a key introduced twice is an error.

#![warn(missing_docs)]

mod descriptor;
mod error;
mod group;
mod includes;
mod keys;
mod loader;
mod properties;
mod resolved;
mod schema;
mod store;
mod variables;

pub use descriptor::{
    parse_bool, ClassFamily, DescriptorBuilder, DocumentationCategory, FloatRange, IntegerRange,
    PropertyDescriptor, PropertyType, TypedValue, SECRET_MASK,
};
pub use error::{ConfigError, ConfigResult};
pub use group::PropertyGroup;
pub use includes::IncludeProcessor;
pub use keys::{KeyKind, INCLUDE_PREFIX, VARIABLE_PREFIX};
pub use loader::{ConfigLoader, ConfigSource, ValidationMode};
pub use properties::Properties;
pub use resolved::ResolvedConfiguration;
pub use schema::{DescriptorMatch, PropertySchema, SchemaBuilder};
pub use store::{ChangeListener, ConfigChange, ConfigurationStore, ConfigurationStoreBuilder, FileBinding};
pub use variables::{ProcessEnvironment, SystemProperties, VariableOrigin, VariableResolver, VariableSource};
