//! The property schema.
//!
//! A [`PropertySchema`] maps keys, relative to an optional namespace prefix, to
//! their [`PropertyDescriptor`]. It is built once and shared read-only.

use indexmap::IndexMap;

use crate::{ConfigError, ConfigResult, PropertyDescriptor, PropertyType};

/// How a key matched the schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DescriptorMatch<'a> {
    /// The key has its own descriptor.
    Exact(&'a PropertyDescriptor),
    /// The key is an element of the list `list`.
    ListElement {
        /// Key of the list descriptor.
        list: &'a str,
        /// The list descriptor.
        descriptor: &'a PropertyDescriptor,
    },
    /// The key is `<list><id>.<subkey>` of a structured list.
    StructuredEntry {
        /// Key of the structured list descriptor.
        list: &'a str,
        /// The entry sub-key.
        subkey: &'a str,
        /// The entry descriptor declared for the sub-key.
        descriptor: &'a PropertyDescriptor,
    },
    /// The key is a sub-key of a descriptor accepting sub-keys.
    Subkey {
        /// Key of the parent descriptor.
        parent: &'a str,
        /// The parent descriptor.
        descriptor: &'a PropertyDescriptor,
    },
}

impl<'a> DescriptorMatch<'a> {
    /// The matched descriptor.
    pub fn descriptor(&self) -> &'a PropertyDescriptor {
        match *self {
            Self::Exact(descriptor)
            | Self::ListElement { descriptor, .. }
            | Self::StructuredEntry { descriptor, .. }
            | Self::Subkey { descriptor, .. } => descriptor,
        }
    }
}

/// An immutable registry of property descriptors.
///
/// # Example
///
/// ```
/// use keel_config::{PropertyDescriptor, PropertySchema};
///
/// let schema = PropertySchema::builder()
///     .prefix("truststore.")
///     .property("type", PropertyDescriptor::builder().enumeration(["keystore", "openssl"]).required().build()?)
///     .property("crlLocations.", PropertyDescriptor::builder().list(false).build()?)
///     .build()?;
///
/// assert_eq!(schema.full_key("type"), "truststore.type");
/// assert!(schema.lookup("crlLocations.1").is_some());
/// assert!(schema.lookup("typo").is_none());
/// # Ok::<(), keel_config::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySchema {
    prefix: String,
    descriptors: IndexMap<String, PropertyDescriptor>,
}

impl PropertySchema {
    /// Start an empty schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// A schema without descriptors or prefix.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A builder seeded with this schema.
    pub fn to_builder(&self) -> SchemaBuilder {
        SchemaBuilder {
            prefix: self.prefix.clone(),
            descriptors: self.descriptors.clone(),
        }
    }

    /// The namespace prefix of all keys.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Prepend the namespace prefix.
    pub fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    /// Strip the namespace prefix from a full key.
    pub fn relative_key<'k>(&self, full_key: &'k str) -> Option<&'k str> {
        full_key.strip_prefix(self.prefix.as_str())
    }

    /// The descriptor registered under `key`.
    pub fn get(&self, key: &str) -> Option<&PropertyDescriptor> {
        self.descriptors.get(key)
    }

    /// All descriptors, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyDescriptor)> {
        self.descriptors.iter().map(|(k, d)| (k.as_str(), d))
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the schema has no descriptors.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// The entry descriptors of the structured list `list`.
    pub fn structured_list_entries<'s>(
        &'s self,
        list: &'s str,
    ) -> impl Iterator<Item = (&'s str, &'s PropertyDescriptor)> + 's {
        self.iter()
            .filter(move |(_, d)| d.structured_list_id() == Some(list))
    }

    /// Find the descriptor governing a relative key.
    ///
    /// Exact descriptors win over list elements, which win over sub-keys. Among
    /// list and sub-key descriptors the longest matching key wins.
    pub fn lookup(&self, key: &str) -> Option<DescriptorMatch<'_>> {
        if let Some(descriptor) = self.get(key).filter(|d| !d.is_structured_list_entry()) {
            return Some(DescriptorMatch::Exact(descriptor));
        }

        let list = self
            .iter()
            .filter(|(list, d)| d.property_type().is_list() && key.len() > list.len() && key.starts_with(*list))
            .max_by_key(|(list, _)| list.len());

        if let Some((list, descriptor)) = list {
            if descriptor.property_type() == PropertyType::List {
                return Some(DescriptorMatch::ListElement { list, descriptor });
            }
            let rest = &key[list.len()..];
            let (_, subkey) = rest.split_once('.')?;
            return self
                .structured_list_entries(list)
                .find(|(entry, _)| *entry == subkey)
                .map(|(subkey, descriptor)| DescriptorMatch::StructuredEntry {
                    list,
                    subkey,
                    descriptor,
                });
        }

        self.iter()
            .filter(|(parent, d)| d.can_have_subkeys() && is_subkey(parent, key))
            .max_by_key(|(parent, _)| parent.len())
            .map(|(parent, descriptor)| DescriptorMatch::Subkey { parent, descriptor })
    }
}

fn is_subkey(parent: &str, key: &str) -> bool {
    match key.strip_prefix(parent) {
        Some(rest) if parent.ends_with('.') => !rest.is_empty(),
        Some(rest) => rest.len() > 1 && rest.starts_with('.'),
        None => false,
    }
}

/// Builder for [`PropertySchema`].
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct SchemaBuilder {
    prefix: String,
    descriptors: IndexMap<String, PropertyDescriptor>,
}

impl SchemaBuilder {
    /// Set the namespace prefix, e.g. `truststore.`.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Register a descriptor, replacing any previous one for the key.
    pub fn property(mut self, key: impl Into<String>, descriptor: PropertyDescriptor) -> Self {
        self.descriptors.insert(key.into(), descriptor);
        self
    }

    /// Register several descriptors.
    pub fn properties<I, K>(mut self, descriptors: I) -> Self
    where
        I: IntoIterator<Item = (K, PropertyDescriptor)>,
        K: Into<String>,
    {
        self.descriptors
            .extend(descriptors.into_iter().map(|(k, d)| (k.into(), d)));
        self
    }

    /// Remove the descriptor of a key.
    pub fn remove(mut self, key: &str) -> Self {
        self.descriptors.shift_remove(key);
        self
    }

    /// Check the schema and build it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDescriptor`] when a structured-list entry
    /// references a list that is not declared as a structured list, or a key
    /// is empty.
    pub fn build(self) -> ConfigResult<PropertySchema> {
        for (key, descriptor) in &self.descriptors {
            if key.is_empty() {
                return Err(ConfigError::invalid_descriptor(
                    self.prefix.as_str(),
                    "property keys must not be empty",
                ));
            }
            if let Some(list) = descriptor.structured_list_id() {
                let declared = self
                    .descriptors
                    .get(list)
                    .is_some_and(|d| d.property_type() == PropertyType::StructuredList);
                if !declared {
                    return Err(ConfigError::invalid_descriptor(
                        format!("{}{key}", self.prefix),
                        format!("structured list entry refers to undeclared structured list '{list}'"),
                    ));
                }
            }
        }

        Ok(PropertySchema {
            prefix: self.prefix,
            descriptors: self.descriptors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string() -> PropertyDescriptor {
        PropertyDescriptor::builder().build().unwrap()
    }

    fn sample() -> PropertySchema {
        PropertySchema::builder()
            .prefix("truststore.")
            .property("type", string())
            .property("crlLocations.", PropertyDescriptor::builder().list(true).build().unwrap())
            .property("directory.", PropertyDescriptor::builder().structured_list(false).build().unwrap())
            .property(
                "path",
                PropertyDescriptor::builder()
                    .structured_list_entry("directory.")
                    .required()
                    .build()
                    .unwrap(),
            )
            .property("extra", PropertyDescriptor::builder().can_have_subkeys().build().unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_exact_lookup() {
        let schema = sample();
        assert!(matches!(schema.lookup("type"), Some(DescriptorMatch::Exact(_))));
    }

    #[test]
    fn test_list_element_lookup() {
        let schema = sample();
        match schema.lookup("crlLocations.3") {
            Some(DescriptorMatch::ListElement { list, .. }) => assert_eq!(list, "crlLocations."),
            other => panic!("expected list element, got {other:?}"),
        }
    }

    #[test]
    fn test_structured_entry_lookup() {
        let schema = sample();
        match schema.lookup("directory.main.path") {
            Some(DescriptorMatch::StructuredEntry { list, subkey, descriptor }) => {
                assert_eq!(list, "directory.");
                assert_eq!(subkey, "path");
                assert!(descriptor.is_mandatory());
            }
            other => panic!("expected structured entry, got {other:?}"),
        }
        assert!(schema.lookup("directory.main.unknown").is_none());
        assert!(schema.lookup("directory.main").is_none());
    }

    #[test]
    fn test_entry_descriptor_is_not_exact_match() {
        assert!(sample().lookup("path").is_none());
    }

    #[test]
    fn test_subkey_lookup() {
        let schema = sample();
        assert!(matches!(
            schema.lookup("extra.anything.goes"),
            Some(DescriptorMatch::Subkey { parent: "extra", .. })
        ));
        assert!(schema.lookup("extras").is_none());
    }

    #[test]
    fn test_structured_entry_requires_declared_list() {
        let err = PropertySchema::builder()
            .property("path", PropertyDescriptor::builder().structured_list_entry("missing.").build().unwrap())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("missing."));

        let err = PropertySchema::builder()
            .property("plain.", PropertyDescriptor::builder().list(false).build().unwrap())
            .property("path", PropertyDescriptor::builder().structured_list_entry("plain.").build().unwrap())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDescriptor { .. }));
    }

    #[test]
    fn test_to_builder_leaves_original_untouched() {
        let original = sample();
        let derived = original
            .to_builder()
            .property("type", PropertyDescriptor::with_default("keystore").build().unwrap())
            .build()
            .unwrap();

        assert!(original.get("type").unwrap().default_value().is_none());
        assert_eq!(derived.get("type").unwrap().default_value(), Some("keystore"));
        assert_eq!(derived.prefix(), "truststore.");
    }

    #[test]
    fn test_relative_key() {
        let schema = sample();
        assert_eq!(schema.relative_key("truststore.type"), Some("type"));
        assert_eq!(schema.relative_key("credential.path"), None);
    }
}
