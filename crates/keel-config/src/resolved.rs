//! Resolved configuration bound to a schema.
//!
//! Getters take keys relative to the schema prefix and report errors with the
//! full key. Each getter validates only the key it reads; call
//! [`ResolvedConfiguration::validate`] to check everything at once.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::schema::DescriptorMatch;
use crate::{ConfigError, ConfigResult, Properties, PropertyDescriptor, PropertySchema, PropertyType, TypedValue};

/// A fully substituted property set paired with its schema.
#[derive(Debug, Clone)]
pub struct ResolvedConfiguration {
    properties: Properties,
    schema: Arc<PropertySchema>,
}

impl ResolvedConfiguration {
    /// Bind resolved properties to a schema.
    pub fn new(properties: Properties, schema: Arc<PropertySchema>) -> Self {
        Self { properties, schema }
    }

    /// The resolved properties.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// The schema.
    pub fn schema(&self) -> &Arc<PropertySchema> {
        &self.schema
    }

    /// The raw value of a relative key, without validation.
    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.properties.get(&self.schema.full_key(key))
    }

    /// Whether a value is present for the relative key.
    pub fn is_set(&self, key: &str) -> bool {
        self.properties.contains_key(&self.schema.full_key(key))
    }

    /// The value as text, after checking it against its descriptor.
    ///
    /// Falls back to the default when the key is absent.
    pub fn get_string(&self, key: &str) -> ConfigResult<Option<String>> {
        let (full_key, descriptor) = self.scalar(key)?;
        if descriptor.property_type().is_list() {
            return Err(self.wrong_type(&full_key, descriptor, "single value"));
        }
        match self.effective_value(&full_key, descriptor)? {
            Some(value) => {
                descriptor.parse_value(&full_key, value)?;
                Ok(Some(value.to_string()))
            }
            None => Ok(None),
        }
    }

    /// A 32-bit integer value.
    pub fn get_int(&self, key: &str) -> ConfigResult<Option<i32>> {
        match self.typed_scalar(key, &[PropertyType::Int], "integer number")? {
            Some(TypedValue::Int(value)) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// A 64-bit integer value. Int properties are widened.
    pub fn get_long(&self, key: &str) -> ConfigResult<Option<i64>> {
        match self.typed_scalar(key, &[PropertyType::Long, PropertyType::Int], "integer number")? {
            Some(TypedValue::Long(value)) => Ok(Some(value)),
            Some(TypedValue::Int(value)) => Ok(Some(i64::from(value))),
            _ => Ok(None),
        }
    }

    /// A floating point value.
    pub fn get_float(&self, key: &str) -> ConfigResult<Option<f64>> {
        match self.typed_scalar(key, &[PropertyType::Float], "floating point number")? {
            Some(TypedValue::Float(value)) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// A boolean value.
    pub fn get_bool(&self, key: &str) -> ConfigResult<Option<bool>> {
        match self.typed_scalar(key, &[PropertyType::Boolean], "[true, false]")? {
            Some(TypedValue::Boolean(value)) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// A filesystem path. String properties are accepted too.
    pub fn get_path(&self, key: &str) -> ConfigResult<Option<PathBuf>> {
        match self.typed_scalar(key, &[PropertyType::Path, PropertyType::String], "filesystem path")? {
            Some(TypedValue::Path(path)) => Ok(Some(path)),
            Some(TypedValue::String(value)) => Ok(Some(PathBuf::from(value.trim()))),
            _ => Ok(None),
        }
    }

    /// The name of the selected enumeration constant.
    pub fn get_enum_name(&self, key: &str) -> ConfigResult<Option<String>> {
        match self.typed_scalar(key, &[PropertyType::Enum], "enumerated value")? {
            Some(TypedValue::Enum(name)) => Ok(Some(name)),
            _ => Ok(None),
        }
    }

    /// The selected enumeration constant, converted with [`FromStr`].
    ///
    /// ```
    /// use std::str::FromStr;
    /// use std::sync::Arc;
    /// use keel_config::{Properties, PropertyDescriptor, PropertySchema, ResolvedConfiguration};
    ///
    /// #[derive(Debug, PartialEq)]
    /// enum StoreType { Keystore, Openssl }
    ///
    /// impl FromStr for StoreType {
    ///     type Err = String;
    ///     fn from_str(s: &str) -> Result<Self, Self::Err> {
    ///         match s {
    ///             "keystore" => Ok(Self::Keystore),
    ///             "openssl" => Ok(Self::Openssl),
    ///             other => Err(other.to_string()),
    ///         }
    ///     }
    /// }
    ///
    /// let schema = PropertySchema::builder()
    ///     .property("type", PropertyDescriptor::builder().enumeration(["keystore", "openssl"]).build()?)
    ///     .build()?;
    /// let props: Properties = [("type", "openssl")].into_iter().collect();
    /// let config = ResolvedConfiguration::new(props, Arc::new(schema));
    ///
    /// assert_eq!(config.get_enum::<StoreType>("type")?, Some(StoreType::Openssl));
    /// # Ok::<(), keel_config::ConfigError>(())
    /// ```
    pub fn get_enum<T: FromStr>(&self, key: &str) -> ConfigResult<Option<T>> {
        let Some(name) = self.get_enum_name(key)? else {
            return Ok(None);
        };
        let (full_key, descriptor) = self.scalar(key)?;
        T::from_str(&name)
            .map(Some)
            .map_err(|_| ConfigError::invalid_type(full_key, name, descriptor.type_description()))
    }

    /// The selected class family implementation.
    pub fn get_class(&self, key: &str) -> ConfigResult<Option<String>> {
        match self.typed_scalar(key, &[PropertyType::Class], "class name")? {
            Some(TypedValue::Class(name)) => Ok(Some(name)),
            _ => Ok(None),
        }
    }

    /// The values of a list, ordered by index (numerical lists) or by suffix.
    ///
    /// A mandatory list without elements is reported as missing.
    pub fn get_list(&self, key: &str) -> ConfigResult<Vec<String>> {
        let (full_key, descriptor) = self.list_descriptor(key, PropertyType::List)?;
        let mut elements = Vec::new();
        for (element_key, value) in self.properties.iter() {
            let Some(suffix) = element_key.strip_prefix(full_key.as_str()).filter(|s| !s.is_empty()) else {
                continue;
            };
            let order = list_order(element_key, suffix, descriptor.numerical_list_keys())?;
            elements.push((order, value.to_string()));
        }
        if elements.is_empty() && descriptor.is_mandatory() {
            return Err(ConfigError::missing_mandatory(full_key));
        }
        elements.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(elements.into_iter().map(|(_, value)| value).collect())
    }

    /// The distinct entry prefixes `<list><id>.` of a structured list, in
    /// list order and relative to the schema prefix.
    pub fn get_structured_list_keys(&self, key: &str) -> ConfigResult<Vec<String>> {
        let (full_key, descriptor) = self.list_descriptor(key, PropertyType::StructuredList)?;
        let mut ids = BTreeMap::new();
        for element_key in self.properties.keys() {
            let Some(rest) = element_key.strip_prefix(full_key.as_str()).filter(|s| !s.is_empty()) else {
                continue;
            };
            let Some((id, _)) = rest.split_once('.').filter(|(id, subkey)| !id.is_empty() && !subkey.is_empty()) else {
                return Err(ConfigError::invalid_list_key(
                    element_key,
                    format!("structured list entries must have the form {full_key}<id>.<subkey>"),
                ));
            };
            let order = list_order(element_key, id, descriptor.numerical_list_keys())?;
            ids.entry(order).or_insert_with(|| format!("{key}{id}."));
        }
        if ids.is_empty() && descriptor.is_mandatory() {
            return Err(ConfigError::missing_mandatory(full_key));
        }
        Ok(ids.into_values().collect())
    }

    /// The value of `<key>.<subkey>` for a property accepting sub-keys.
    pub fn get_subkey_value(&self, key: &str, subkey: &str) -> ConfigResult<Option<String>> {
        let full_key = self.schema.full_key(key);
        let descriptor = self
            .schema
            .get(key)
            .ok_or_else(|| ConfigError::unknown_property(&full_key))?;
        if !descriptor.can_have_subkeys() {
            return Err(ConfigError::invalid_list_key(
                format!("{full_key}.{subkey}"),
                format!("property '{full_key}' does not accept sub-keys"),
            ));
        }
        let separator = if key.ends_with('.') { "" } else { "." };
        Ok(self
            .properties
            .get(&format!("{full_key}{separator}{subkey}"))
            .map(str::to_string))
    }

    /// The value converted according to its descriptor's type.
    pub fn get_typed(&self, key: &str) -> ConfigResult<Option<TypedValue>> {
        let (full_key, descriptor) = self.scalar(key)?;
        match descriptor.property_type() {
            PropertyType::List => self.get_list(key).map(|v| Some(TypedValue::List(v))),
            PropertyType::StructuredList => self
                .get_structured_list_keys(key)
                .map(|v| Some(TypedValue::StructuredList(v))),
            _ => self
                .effective_value(&full_key, descriptor)?
                .map(|value| descriptor.parse_value(&full_key, value))
                .transpose(),
        }
    }

    /// Check every property against the schema.
    ///
    /// Under a non-empty prefix, keys in the namespace that no descriptor
    /// covers are rejected. Then every descriptor is checked in registration
    /// order, including the entry descriptors of each structured list entry.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.schema.prefix().is_empty() {
            for full_key in self.properties.keys() {
                if let Some(relative) = self.schema.relative_key(full_key) {
                    if self.schema.lookup(relative).is_none() {
                        return Err(ConfigError::unknown_property(full_key));
                    }
                }
            }
        }

        for (key, descriptor) in self.schema.iter() {
            if descriptor.is_structured_list_entry() {
                continue;
            }
            match descriptor.property_type() {
                PropertyType::List => {
                    self.get_list(key)?;
                }
                PropertyType::StructuredList => {
                    for entry in self.get_structured_list_keys(key)? {
                        for (subkey, entry_descriptor) in self.schema.structured_list_entries(key) {
                            let full_key = self.schema.full_key(&format!("{entry}{subkey}"));
                            if let Some(value) = self.effective_value(&full_key, entry_descriptor)? {
                                entry_descriptor.parse_value(&full_key, value)?;
                            }
                        }
                    }
                }
                _ => {
                    let full_key = self.schema.full_key(key);
                    if let Some(value) = self.effective_value(&full_key, descriptor)? {
                        descriptor.parse_value(&full_key, value)?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Full keys whose value differs from `previous`, including added and
    /// removed keys. Keys present in both come in this configuration's order.
    pub fn changed_keys(&self, previous: &ResolvedConfiguration) -> Vec<String> {
        let mut changed: Vec<String> = self
            .properties
            .iter()
            .filter(|(key, value)| previous.properties.get(key) != Some(*value))
            .map(|(key, _)| key.to_string())
            .collect();
        changed.extend(
            previous
                .properties
                .keys()
                .filter(|key| !self.properties.contains_key(key))
                .map(str::to_string),
        );
        changed
    }

    /// The descriptor governing a full key, if the key is in the namespace.
    pub fn descriptor_for(&self, full_key: &str) -> Option<&PropertyDescriptor> {
        let relative = self.schema.relative_key(full_key)?;
        self.schema.lookup(relative).map(|m| m.descriptor())
    }

    fn scalar(&self, key: &str) -> ConfigResult<(String, &PropertyDescriptor)> {
        let full_key = self.schema.full_key(key);
        match self.schema.lookup(key) {
            Some(DescriptorMatch::Exact(descriptor) | DescriptorMatch::StructuredEntry { descriptor, .. }) => {
                Ok((full_key, descriptor))
            }
            Some(DescriptorMatch::ListElement { .. } | DescriptorMatch::Subkey { .. }) => {
                Ok((full_key, &PLAIN_STRING))
            }
            None => Err(ConfigError::unknown_property(full_key)),
        }
    }

    fn typed_scalar(
        &self,
        key: &str,
        accepted: &[PropertyType],
        expected: &str,
    ) -> ConfigResult<Option<TypedValue>> {
        let (full_key, descriptor) = self.scalar(key)?;
        if !accepted.contains(&descriptor.property_type()) {
            return Err(self.wrong_type(&full_key, descriptor, expected));
        }
        self.effective_value(&full_key, descriptor)?
            .map(|value| descriptor.parse_value(&full_key, value))
            .transpose()
    }

    fn list_descriptor(&self, key: &str, list_type: PropertyType) -> ConfigResult<(String, &PropertyDescriptor)> {
        let full_key = self.schema.full_key(key);
        let descriptor = self
            .schema
            .get(key)
            .ok_or_else(|| ConfigError::unknown_property(&full_key))?;
        if descriptor.property_type() != list_type {
            let expected = if list_type == PropertyType::List {
                "list of properties with a common prefix"
            } else {
                "Structured list"
            };
            return Err(self.wrong_type(&full_key, descriptor, expected));
        }
        Ok((full_key, descriptor))
    }

    fn effective_value<'s>(
        &'s self,
        full_key: &str,
        descriptor: &'s PropertyDescriptor,
    ) -> ConfigResult<Option<&'s str>> {
        match self.properties.get(full_key) {
            Some(value) => Ok(Some(value)),
            None if descriptor.is_mandatory() => Err(ConfigError::missing_mandatory(full_key)),
            None => Ok(descriptor.default_value()),
        }
    }

    fn wrong_type(&self, full_key: &str, descriptor: &PropertyDescriptor, expected: &str) -> ConfigError {
        let value = self
            .properties
            .get(full_key)
            .map_or_else(String::new, |v| descriptor.display_value(v).to_string());
        ConfigError::invalid_type(
            full_key,
            value,
            format!("{expected}, but the property is declared as {}", descriptor.property_type()),
        )
    }
}

/// Descriptor of list elements and sub-keys, which are plain strings.
static PLAIN_STRING: PropertyDescriptor = PropertyDescriptor::PLAIN;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum ListOrder {
    Index(u64),
    Suffix(String),
}

fn list_order(element_key: &str, suffix: &str, numerical: bool) -> ConfigResult<ListOrder> {
    if !numerical {
        return Ok(ListOrder::Suffix(suffix.to_string()));
    }
    suffix.parse::<u64>().map(ListOrder::Index).map_err(|_| {
        ConfigError::invalid_list_key(
            element_key,
            format!("list elements must be indexed with non-negative integers, found '{suffix}'"),
        )
    })
}
