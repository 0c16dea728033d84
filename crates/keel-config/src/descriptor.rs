//! Property metadata.
//!
//! A [`PropertyDescriptor`] describes one key (or key pattern) of a
//! [`PropertySchema`](crate::PropertySchema): its type, default, bounds and
//! documentation. Descriptors are assembled with a [`DescriptorBuilder`] whose
//! [`build`](DescriptorBuilder::build) checks every cross-field rule at once, and
//! are never mutated afterwards. Use [`PropertyDescriptor::to_builder`] to derive
//! a specialised copy.
//!
//! # Example
//!
//! ```
//! use keel_config::{PropertyDescriptor, PropertyType};
//!
//! let pool_size = PropertyDescriptor::with_default("16")
//!     .positive()
//!     .description("Size of the worker pool")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(pool_size.property_type(), PropertyType::Int);
//! assert_eq!(pool_size.type_description(), "integer >= 1");
//! ```

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::{ConfigError, ConfigResult};

/// Replacement text for secret values in errors and logs.
pub const SECRET_MASK: &str = "***";

/// The type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// 64-bit floating point number.
    Float,
    /// `true`/`yes` or `false`/`no`, case-insensitive.
    Boolean,
    /// Free text.
    String,
    /// Filesystem path.
    Path,
    /// One of a declared set of names.
    Enum,
    /// Name of an implementation registered in a [`ClassFamily`].
    Class,
    /// Values of all keys sharing the property's key as prefix.
    List,
    /// Entries with sub-keys described by structured-list entry descriptors.
    StructuredList,
}

impl PropertyType {
    /// Whether bounds can be declared for this type.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Long | Self::Float)
    }

    /// Whether the property addresses a group of keys rather than one value.
    pub fn is_list(self) -> bool {
        matches!(self, Self::List | Self::StructuredList)
    }

    /// Infer a type from a literal: int, then long, then float, then
    /// boolean, falling back to string.
    ///
    /// ```
    /// use keel_config::PropertyType;
    ///
    /// assert_eq!(PropertyType::infer("42"), PropertyType::Int);
    /// assert_eq!(PropertyType::infer("9000000000"), PropertyType::Long);
    /// assert_eq!(PropertyType::infer("0.5"), PropertyType::Float);
    /// assert_eq!(PropertyType::infer("YES"), PropertyType::Boolean);
    /// assert_eq!(PropertyType::infer("keystore"), PropertyType::String);
    /// ```
    pub fn infer(literal: &str) -> Self {
        if literal.parse::<i32>().is_ok() {
            Self::Int
        } else if literal.parse::<i64>().is_ok() {
            Self::Long
        } else if parse_float(literal).is_some() {
            Self::Float
        } else if parse_bool(literal).is_some() {
            Self::Boolean
        } else {
            Self::String
        }
    }

    fn expected(self) -> &'static str {
        match self {
            Self::Int | Self::Long => "integer number",
            Self::Float => "floating point number",
            Self::Boolean => "[true, false]",
            Self::String => "string",
            Self::Path => "filesystem path",
            Self::Enum => "enumerated value",
            Self::Class => "class name",
            Self::List => "list of properties with a common prefix",
            Self::StructuredList => "Structured list",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Path => "path",
            Self::Enum => "enum",
            Self::Class => "class",
            Self::List => "list",
            Self::StructuredList => "structured-list",
        };
        f.write_str(name)
    }
}

/// Finite floating point numbers only; `inf` and `NaN` are rejected.
fn parse_float(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a boolean property value.
///
/// Accepts `true`/`yes` and `false`/`no`, case-insensitive.
pub fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") || value.eq_ignore_ascii_case("no") {
        Some(false)
    } else {
        None
    }
}

/// A named base type and the implementation names assignable to it.
///
/// ```
/// use keel_config::ClassFamily;
///
/// let family = ClassFamily::new("CredentialProvider")
///     .with_implementation("KeystoreCredential")
///     .with_implementation("PemCredential");
///
/// assert!(family.contains("PemCredential"));
/// assert!(!family.contains("String"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassFamily {
    base: String,
    implementations: BTreeSet<String>,
}

impl ClassFamily {
    /// Create a family without implementations.
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            implementations: BTreeSet::new(),
        }
    }

    /// Register an implementation.
    #[must_use]
    pub fn with_implementation(mut self, name: impl Into<String>) -> Self {
        self.implementations.insert(name.into());
        self
    }

    /// Name of the base type.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Registered implementation names, sorted.
    pub fn implementations(&self) -> impl Iterator<Item = &str> {
        self.implementations.iter().map(String::as_str)
    }

    /// Whether `name` is a registered implementation.
    pub fn contains(&self, name: &str) -> bool {
        self.implementations.contains(name)
    }
}

/// A documentation section grouping related properties.
///
/// Categories order by their sort key, falling back to the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DocumentationCategory {
    name: String,
    sort_key: Option<String>,
}

impl DocumentationCategory {
    /// Create a category ordered by its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sort_key: None,
        }
    }

    /// Create a category with an explicit sort key.
    pub fn with_sort_key(name: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sort_key: Some(sort_key.into()),
        }
    }

    /// The category name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The explicit sort key.
    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    fn ordering_key(&self) -> &str {
        self.sort_key.as_deref().unwrap_or(&self.name)
    }
}

impl Ord for DocumentationCategory {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordering_key()
            .cmp(other.ordering_key())
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.sort_key.cmp(&other.sort_key))
    }
}

impl PartialOrd for DocumentationCategory {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Declared bounds of an integer property.
///
/// Absent bounds fall back to the intrinsic range of the type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegerRange {
    /// Inclusive lower bound.
    pub min: Option<i64>,
    /// Inclusive upper bound.
    pub max: Option<i64>,
}

impl IntegerRange {
    fn is_declared(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }
}

/// Declared bounds of a floating point property.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FloatRange {
    /// Lower bound.
    pub min: Option<f64>,
    /// Whether the lower bound itself is excluded.
    pub min_exclusive: bool,
    /// Inclusive upper bound.
    pub max: Option<f64>,
}

impl FloatRange {
    fn is_declared(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    fn contains(&self, value: f64) -> bool {
        let above = match self.min {
            Some(min) if self.min_exclusive => value > min,
            Some(min) => value >= min,
            None => true,
        };
        let below = self.max.map_or(true, |max| value <= max);
        above && below
    }
}

/// A value converted according to its descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// An `int` value.
    Int(i32),
    /// A `long` value.
    Long(i64),
    /// A `float` value.
    Float(f64),
    /// A `boolean` value.
    Boolean(bool),
    /// A `string` value.
    String(String),
    /// A `path` value.
    Path(PathBuf),
    /// The name of an enumeration constant.
    Enum(String),
    /// The name of a class family implementation.
    Class(String),
    /// Values of a list, in list order.
    List(Vec<String>),
    /// Entry prefixes of a structured list, in list order.
    StructuredList(Vec<String>),
}

impl TypedValue {
    /// The type tag of the value.
    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Int(_) => PropertyType::Int,
            Self::Long(_) => PropertyType::Long,
            Self::Float(_) => PropertyType::Float,
            Self::Boolean(_) => PropertyType::Boolean,
            Self::String(_) => PropertyType::String,
            Self::Path(_) => PropertyType::Path,
            Self::Enum(_) => PropertyType::Enum,
            Self::Class(_) => PropertyType::Class,
            Self::List(_) => PropertyType::List,
            Self::StructuredList(_) => PropertyType::StructuredList,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignConstraint {
    Positive,
    NonNegative,
}

/// Metadata of one property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    property_type: PropertyType,
    default: Option<String>,
    mandatory: bool,
    int_range: IntegerRange,
    float_range: FloatRange,
    enum_values: Vec<String>,
    class_family: Option<ClassFamily>,
    numerical_list_keys: bool,
    structured_list_id: Option<String>,
    can_have_subkeys: bool,
    description: Option<String>,
    category: Option<DocumentationCategory>,
    sort_key: Option<String>,
    hidden: bool,
    deprecated: bool,
    updateable: bool,
    secret: bool,
}

impl Default for PropertyDescriptor {
    fn default() -> Self {
        Self::PLAIN
    }
}

impl PropertyDescriptor {
    /// An optional string property without a default.
    pub(crate) const PLAIN: Self = Self {
        property_type: PropertyType::String,
        default: None,
        mandatory: false,
        int_range: IntegerRange { min: None, max: None },
        float_range: FloatRange {
            min: None,
            min_exclusive: false,
            max: None,
        },
        enum_values: Vec::new(),
        class_family: None,
        numerical_list_keys: false,
        structured_list_id: None,
        can_have_subkeys: false,
        description: None,
        category: None,
        sort_key: None,
        hidden: false,
        deprecated: false,
        updateable: false,
        secret: false,
    };

    /// Start an optional string property without a default.
    pub fn builder() -> DescriptorBuilder {
        DescriptorBuilder {
            descriptor: Self::PLAIN,
            sign: None,
        }
    }

    /// Start a property with a default, inferring the type from the literal.
    ///
    /// See [`PropertyType::infer`].
    pub fn with_default(literal: impl Into<String>) -> DescriptorBuilder {
        let literal = literal.into();
        Self::builder()
            .of_type(PropertyType::infer(&literal))
            .default(literal)
    }

    /// Start a mandatory string property.
    pub fn mandatory() -> DescriptorBuilder {
        Self::builder().required()
    }

    /// A builder seeded with this descriptor's state.
    pub fn to_builder(&self) -> DescriptorBuilder {
        DescriptorBuilder {
            descriptor: self.clone(),
            sign: None,
        }
    }

    /// The property type.
    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    /// The default literal.
    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Whether the property must be set.
    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    /// Declared integer bounds.
    pub fn integer_range(&self) -> IntegerRange {
        self.int_range
    }

    /// Declared floating point bounds.
    pub fn float_range(&self) -> FloatRange {
        self.float_range
    }

    /// Enumeration constants, in declaration order.
    pub fn enum_values(&self) -> &[String] {
        &self.enum_values
    }

    /// The class family of a class property.
    pub fn class_family(&self) -> Option<&ClassFamily> {
        self.class_family.as_ref()
    }

    /// Whether list element keys must be non-negative integers.
    pub fn numerical_list_keys(&self) -> bool {
        self.numerical_list_keys
    }

    /// The structured list this descriptor is an entry of.
    pub fn structured_list_id(&self) -> Option<&str> {
        self.structured_list_id.as_deref()
    }

    /// Whether the descriptor describes sub-keys of structured list entries.
    pub fn is_structured_list_entry(&self) -> bool {
        self.structured_list_id.is_some()
    }

    /// Whether arbitrary sub-keys are accepted under the property key.
    pub fn can_have_subkeys(&self) -> bool {
        self.can_have_subkeys
    }

    /// Human readable description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Documentation category.
    pub fn category(&self) -> Option<&DocumentationCategory> {
        self.category.as_ref()
    }

    /// Documentation sort key.
    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    /// Whether the property is left out of documentation.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Whether the property is deprecated.
    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    /// Whether a changed value takes effect without a restart.
    pub fn is_updateable(&self) -> bool {
        self.updateable
    }

    /// Whether the value is masked in errors and logs.
    pub fn is_secret(&self) -> bool {
        self.secret
    }

    /// The value as it may be shown in errors and logs.
    pub fn display_value<'a>(&self, value: &'a str) -> &'a str {
        if self.secret {
            SECRET_MASK
        } else {
            value
        }
    }

    /// Human readable description of the accepted values.
    pub fn type_description(&self) -> String {
        match self.property_type {
            PropertyType::Int | PropertyType::Long => {
                let (lo, hi) = self.intrinsic_limits();
                let min = self.int_range.min.filter(|min| *min != lo);
                let max = self.int_range.max.filter(|max| *max != hi);
                match (min, max) {
                    (None, None) => "integer number".to_string(),
                    (Some(min), Some(max)) => format!("integer [{min} -- {max}]"),
                    (Some(min), None) => format!("integer >= {min}"),
                    (None, Some(max)) => format!("integer <= {max}"),
                }
            }
            PropertyType::Float => {
                let range = self.float_range;
                match (range.min, range.max) {
                    (None, None) => "floating point number".to_string(),
                    (Some(min), Some(max)) => {
                        format!("floating [{} -- {}]", fmt_float(min), fmt_float(max))
                    }
                    (Some(min), None) if range.min_exclusive => format!("floating > {}", fmt_float(min)),
                    (Some(min), None) => format!("floating >= {}", fmt_float(min)),
                    (None, Some(max)) => format!("floating <= {}", fmt_float(max)),
                }
            }
            PropertyType::Enum => format!("[{}]", self.enum_values.join(", ")),
            PropertyType::Class => {
                let base = self.class_family.as_ref().map_or("", ClassFamily::base);
                format!("Class extending {base}")
            }
            other => other.expected().to_string(),
        }
    }

    /// Convert a single value according to the descriptor.
    ///
    /// `key` is the full key and is only used for error reporting. List types
    /// address a group of keys and are converted by
    /// [`ResolvedConfiguration`](crate::ResolvedConfiguration) instead.
    ///
    /// # Errors
    ///
    /// Returns the type, range, enum or class error the value violates. Secret
    /// values are masked in the error.
    pub fn parse_value(&self, key: &str, value: &str) -> ConfigResult<TypedValue> {
        let shown = || self.display_value(value).to_string();
        let type_error = || ConfigError::invalid_type(key, shown(), self.property_type.expected());

        match self.property_type {
            PropertyType::Int => {
                let parsed: i32 = value.trim().parse().map_err(|_| type_error())?;
                self.check_integer(key, value, i64::from(parsed))?;
                Ok(TypedValue::Int(parsed))
            }
            PropertyType::Long => {
                let parsed: i64 = value.trim().parse().map_err(|_| type_error())?;
                self.check_integer(key, value, parsed)?;
                Ok(TypedValue::Long(parsed))
            }
            PropertyType::Float => {
                let parsed = parse_float(value.trim()).ok_or_else(type_error)?;
                if !self.float_range.contains(parsed) {
                    return Err(ConfigError::out_of_range(key, shown(), self.type_description()));
                }
                Ok(TypedValue::Float(parsed))
            }
            PropertyType::Boolean => parse_bool(value).map(TypedValue::Boolean).ok_or_else(type_error),
            PropertyType::String => Ok(TypedValue::String(value.to_string())),
            PropertyType::Path => Ok(TypedValue::Path(PathBuf::from(value.trim()))),
            PropertyType::Enum => {
                let name = value.trim();
                if self.enum_values.iter().any(|allowed| allowed == name) {
                    Ok(TypedValue::Enum(name.to_string()))
                } else {
                    Err(ConfigError::InvalidEnumValue {
                        key: key.to_string(),
                        value: shown(),
                        allowed: self.enum_values.clone(),
                    })
                }
            }
            PropertyType::Class => {
                let name = value.trim();
                match &self.class_family {
                    Some(family) if family.contains(name) => Ok(TypedValue::Class(name.to_string())),
                    family => Err(ConfigError::InvalidClassValue {
                        key: key.to_string(),
                        value: shown(),
                        base: family.as_ref().map_or_else(String::new, |f| f.base().to_string()),
                    }),
                }
            }
            PropertyType::List | PropertyType::StructuredList => Err(type_error()),
        }
    }

    fn intrinsic_limits(&self) -> (i64, i64) {
        match self.property_type {
            PropertyType::Int => (i64::from(i32::MIN), i64::from(i32::MAX)),
            _ => (i64::MIN, i64::MAX),
        }
    }

    fn check_integer(&self, key: &str, value: &str, parsed: i64) -> ConfigResult<()> {
        let (lo, hi) = self.intrinsic_limits();
        let min = self.int_range.min.unwrap_or(lo);
        let max = self.int_range.max.unwrap_or(hi);
        if parsed < min || parsed > max {
            return Err(ConfigError::out_of_range(
                key,
                self.display_value(value),
                self.type_description(),
            ));
        }
        Ok(())
    }
}

fn fmt_float(value: f64) -> String {
    format!("{value:?}")
}

/// Builder for [`PropertyDescriptor`].
///
/// Setters only record state; every rule is checked by [`build`](Self::build),
/// so the order of calls does not matter.
#[derive(Debug, Clone)]
#[must_use]
pub struct DescriptorBuilder {
    descriptor: PropertyDescriptor,
    sign: Option<SignConstraint>,
}

impl DescriptorBuilder {
    /// Set the type.
    pub fn of_type(mut self, property_type: PropertyType) -> Self {
        self.descriptor.property_type = property_type;
        self
    }

    /// Make the property a 32-bit integer.
    pub fn int(self) -> Self {
        self.of_type(PropertyType::Int)
    }

    /// Make the property a 64-bit integer.
    pub fn long(self) -> Self {
        self.of_type(PropertyType::Long)
    }

    /// Make the property a floating point number.
    pub fn float(self) -> Self {
        self.of_type(PropertyType::Float)
    }

    /// Make the property a boolean.
    pub fn boolean(self) -> Self {
        self.of_type(PropertyType::Boolean)
    }

    /// Make the property a string.
    pub fn string(self) -> Self {
        self.of_type(PropertyType::String)
    }

    /// Make the property a filesystem path.
    pub fn path(self) -> Self {
        self.of_type(PropertyType::Path)
    }

    /// Make the property an enumeration of the given constants.
    pub fn enumeration<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.descriptor.enum_values = values.into_iter().map(Into::into).collect();
        self.of_type(PropertyType::Enum)
    }

    /// Make the property name an implementation of `family`.
    pub fn class(mut self, family: ClassFamily) -> Self {
        self.descriptor.class_family = Some(family);
        self.of_type(PropertyType::Class)
    }

    /// Make the property a list; `numerical` requires integer element suffixes.
    pub fn list(mut self, numerical: bool) -> Self {
        self.descriptor.numerical_list_keys = numerical;
        self.of_type(PropertyType::List)
    }

    /// Make the property a structured list.
    pub fn structured_list(mut self, numerical: bool) -> Self {
        self.descriptor.numerical_list_keys = numerical;
        self.of_type(PropertyType::StructuredList)
    }

    /// Describe the sub-key of every entry of the structured list `list_id`.
    pub fn structured_list_entry(mut self, list_id: impl Into<String>) -> Self {
        self.descriptor.structured_list_id = Some(list_id.into());
        self
    }

    /// Accept arbitrary sub-keys under the property key.
    pub fn can_have_subkeys(mut self) -> Self {
        self.descriptor.can_have_subkeys = true;
        self
    }

    /// Set the default literal.
    pub fn default(mut self, literal: impl Into<String>) -> Self {
        self.descriptor.default = Some(literal.into());
        self
    }

    /// Remove the default.
    pub fn no_default(mut self) -> Self {
        self.descriptor.default = None;
        self
    }

    /// Make the property mandatory.
    pub fn required(mut self) -> Self {
        self.descriptor.mandatory = true;
        self
    }

    /// Make the property optional.
    pub fn optional(mut self) -> Self {
        self.descriptor.mandatory = false;
        self
    }

    /// Set inclusive integer bounds.
    pub fn bounds(mut self, min: i64, max: i64) -> Self {
        self.descriptor.int_range = IntegerRange {
            min: Some(min),
            max: Some(max),
        };
        self
    }

    /// Set an inclusive integer lower bound.
    pub fn min(mut self, min: i64) -> Self {
        self.descriptor.int_range.min = Some(min);
        self
    }

    /// Set an inclusive integer upper bound.
    pub fn max(mut self, max: i64) -> Self {
        self.descriptor.int_range.max = Some(max);
        self
    }

    /// Set inclusive floating point bounds.
    pub fn float_bounds(mut self, min: f64, max: f64) -> Self {
        self.descriptor.float_range = FloatRange {
            min: Some(min),
            min_exclusive: false,
            max: Some(max),
        };
        self
    }

    /// Set an inclusive floating point lower bound.
    pub fn float_min(mut self, min: f64) -> Self {
        self.descriptor.float_range.min = Some(min);
        self.descriptor.float_range.min_exclusive = false;
        self
    }

    /// Set an inclusive floating point upper bound.
    pub fn float_max(mut self, max: f64) -> Self {
        self.descriptor.float_range.max = Some(max);
        self
    }

    /// Require a value above zero (`>= 1` for integers, `> 0` for floats).
    pub fn positive(mut self) -> Self {
        self.sign = Some(SignConstraint::Positive);
        self
    }

    /// Require a value of zero or more.
    pub fn non_negative(mut self) -> Self {
        self.sign = Some(SignConstraint::NonNegative);
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.descriptor.description = Some(description.into());
        self
    }

    /// Set the documentation category.
    pub fn category(mut self, category: DocumentationCategory) -> Self {
        self.descriptor.category = Some(category);
        self
    }

    /// Set the documentation sort key.
    pub fn sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.descriptor.sort_key = Some(sort_key.into());
        self
    }

    /// Leave the property out of documentation.
    pub fn hidden(mut self) -> Self {
        self.descriptor.hidden = true;
        self
    }

    /// Mark the property deprecated. Deprecated properties are hidden.
    pub fn deprecated(mut self) -> Self {
        self.descriptor.deprecated = true;
        self
    }

    /// Allow the value to change without a restart.
    pub fn updateable(mut self) -> Self {
        self.descriptor.updateable = true;
        self
    }

    /// Mask the value in errors and logs.
    pub fn secret(mut self) -> Self {
        self.descriptor.secret = true;
        self
    }

    /// Check all rules and produce the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDescriptor`] when:
    /// - the property is both mandatory and has a default
    /// - bounds are declared for a type they do not apply to, or are inverted
    /// - an enumeration has no constants, or a class property no family
    /// - the default is not a valid value of the type
    pub fn build(self) -> ConfigResult<PropertyDescriptor> {
        let mut descriptor = self.descriptor;
        let ty = descriptor.property_type;
        let invalid = |reason: String| ConfigError::invalid_descriptor("", reason);

        if descriptor.mandatory && descriptor.default.is_some() {
            return Err(invalid(
                "a property can not have a default value and be mandatory at the same time".into(),
            ));
        }

        if let Some(sign) = self.sign {
            let (int_min, exclusive) = match sign {
                SignConstraint::Positive => (1, true),
                SignConstraint::NonNegative => (0, false),
            };
            match ty {
                PropertyType::Int | PropertyType::Long => descriptor.int_range.min = Some(int_min),
                PropertyType::Float => {
                    descriptor.float_range.min = Some(0.0);
                    descriptor.float_range.min_exclusive = exclusive;
                }
                _ => {
                    return Err(invalid(format!(
                        "sign constraints can only be set for numeric properties, not {ty}"
                    )));
                }
            }
        }

        if descriptor.int_range.is_declared() && !matches!(ty, PropertyType::Int | PropertyType::Long) {
            return Err(invalid(format!("integer bounds can only be set for int or long properties, not {ty}")));
        }
        if descriptor.float_range.is_declared() && ty != PropertyType::Float {
            return Err(invalid(format!("floating point bounds can only be set for float properties, not {ty}")));
        }
        if let (Some(min), Some(max)) = (descriptor.int_range.min, descriptor.int_range.max) {
            if min > max {
                return Err(invalid(format!("lower bound {min} is greater than upper bound {max}")));
            }
        }
        if let (Some(min), Some(max)) = (descriptor.float_range.min, descriptor.float_range.max) {
            if min > max || min.is_nan() || max.is_nan() {
                return Err(invalid(format!(
                    "lower bound {} is not below upper bound {}",
                    fmt_float(min),
                    fmt_float(max)
                )));
            }
        }
        if ty == PropertyType::Int {
            let (lo, hi) = descriptor.intrinsic_limits();
            let outside = |bound: Option<i64>| bound.is_some_and(|b| b < lo || b > hi);
            if outside(descriptor.int_range.min) || outside(descriptor.int_range.max) {
                return Err(invalid("integer bounds exceed the range of an int property".into()));
            }
        }

        match ty {
            PropertyType::Enum if descriptor.enum_values.is_empty() => {
                return Err(invalid("an enum property needs at least one constant".into()));
            }
            PropertyType::Class if descriptor.class_family.is_none() => {
                return Err(invalid("a class property needs a class family".into()));
            }
            _ => {}
        }

        if let Some(default) = &descriptor.default {
            if ty.is_list() {
                return Err(invalid(format!("a {ty} property can not have a default value")));
            }
            if let Err(err) = descriptor.parse_value("", default) {
                return Err(invalid(format!(
                    "default value must be a valid value of its type {ty}: {err}"
                )));
            }
        }

        if descriptor.deprecated {
            descriptor.hidden = true;
        }

        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_inference() {
        assert_eq!(PropertyType::infer("-2147483648"), PropertyType::Int);
        assert_eq!(PropertyType::infer("2147483648"), PropertyType::Long);
        assert_eq!(PropertyType::infer("1e3"), PropertyType::Float);
        assert_eq!(PropertyType::infer("No"), PropertyType::Boolean);
        assert_eq!(PropertyType::infer(""), PropertyType::String);
    }

    #[test]
    fn test_with_default_infers_type() {
        let descriptor = PropertyDescriptor::with_default("true").build().unwrap();
        assert_eq!(descriptor.property_type(), PropertyType::Boolean);
        assert_eq!(descriptor.default_value(), Some("true"));
    }

    #[test]
    fn test_mandatory_and_default_are_exclusive() {
        let err = PropertyDescriptor::with_default("5")
            .required()
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDescriptor { .. }));

        let err = PropertyDescriptor::mandatory().default("x").build().unwrap_err();
        assert!(err.to_string().contains("mandatory"));
    }

    #[test]
    fn test_bounds_only_for_numeric_types() {
        let err = PropertyDescriptor::builder().string().bounds(1, 5).build().unwrap_err();
        assert!(err.to_string().contains("integer bounds"));

        let err = PropertyDescriptor::builder().int().float_min(0.5).build().unwrap_err();
        assert!(err.to_string().contains("floating point bounds"));

        let err = PropertyDescriptor::builder().path().positive().build().unwrap_err();
        assert!(err.to_string().contains("numeric"));
    }

    #[test]
    fn test_builder_order_does_not_matter() {
        let a = PropertyDescriptor::builder().bounds(1, 10).long().build().unwrap();
        let b = PropertyDescriptor::builder().long().bounds(1, 10).build().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        assert!(PropertyDescriptor::builder().int().bounds(10, 1).build().is_err());
        assert!(PropertyDescriptor::builder().float().float_bounds(2.0, 1.0).build().is_err());
    }

    #[test]
    fn test_int_bounds_must_fit_int() {
        assert!(PropertyDescriptor::builder().int().max(5_000_000_000).build().is_err());
        assert!(PropertyDescriptor::builder().long().max(5_000_000_000).build().is_ok());
    }

    #[test]
    fn test_default_must_match_type() {
        assert!(PropertyDescriptor::builder().int().default("abc").build().is_err());
        assert!(PropertyDescriptor::builder().int().default("3000000000").build().is_err());
        assert!(PropertyDescriptor::builder().long().default("3000000000").build().is_ok());
        assert!(PropertyDescriptor::builder().boolean().default("maybe").build().is_err());
        assert!(PropertyDescriptor::builder()
            .enumeration(["A", "B"])
            .default("C")
            .build()
            .is_err());
    }

    #[test]
    fn test_class_default_must_be_in_family() {
        let family = ClassFamily::new("Validator").with_implementation("StrictValidator");
        assert!(PropertyDescriptor::builder()
            .class(family.clone())
            .default("StrictValidator")
            .build()
            .is_ok());
        assert!(PropertyDescriptor::builder()
            .class(family)
            .default("Unknown")
            .build()
            .is_err());
        assert!(PropertyDescriptor::builder()
            .of_type(PropertyType::Class)
            .build()
            .is_err());
    }

    #[test]
    fn test_empty_enum_rejected() {
        let values: Vec<String> = Vec::new();
        assert!(PropertyDescriptor::builder().enumeration(values).build().is_err());
    }

    #[test]
    fn test_deprecated_implies_hidden() {
        let descriptor = PropertyDescriptor::builder().deprecated().build().unwrap();
        assert!(descriptor.is_deprecated());
        assert!(descriptor.is_hidden());
    }

    #[test]
    fn test_type_descriptions() {
        let describe = |builder: DescriptorBuilder| builder.build().unwrap().type_description();

        assert_eq!(describe(PropertyDescriptor::builder()), "string");
        assert_eq!(describe(PropertyDescriptor::builder().boolean()), "[true, false]");
        assert_eq!(
            describe(PropertyDescriptor::builder().enumeration(["KEYSTORE", "OPENSSL", "DIRECTORY"])),
            "[KEYSTORE, OPENSSL, DIRECTORY]"
        );
        assert_eq!(describe(PropertyDescriptor::builder().int()), "integer number");
        assert_eq!(describe(PropertyDescriptor::builder().long().bounds(1, 10)), "integer [1 -- 10]");
        assert_eq!(describe(PropertyDescriptor::builder().int().non_negative()), "integer >= 0");
        assert_eq!(describe(PropertyDescriptor::builder().int().max(100)), "integer <= 100");
        assert_eq!(describe(PropertyDescriptor::builder().float()), "floating point number");
        assert_eq!(
            describe(PropertyDescriptor::builder().float().float_bounds(0.5, 1.5)),
            "floating [0.5 -- 1.5]"
        );
        assert_eq!(describe(PropertyDescriptor::builder().float().positive()), "floating > 0.0");
        assert_eq!(describe(PropertyDescriptor::builder().float().non_negative()), "floating >= 0.0");
        assert_eq!(describe(PropertyDescriptor::builder().float().float_max(2.0)), "floating <= 2.0");
        assert_eq!(describe(PropertyDescriptor::builder().path()), "filesystem path");
        assert_eq!(
            describe(PropertyDescriptor::builder().list(true)),
            "list of properties with a common prefix"
        );
        assert_eq!(
            describe(PropertyDescriptor::builder().class(ClassFamily::new("Credential"))),
            "Class extending Credential"
        );
        assert_eq!(describe(PropertyDescriptor::builder().structured_list(false)), "Structured list");
    }

    #[test]
    fn test_parse_int_respects_bounds() {
        let descriptor = PropertyDescriptor::builder().int().bounds(1, 10).build().unwrap();
        assert_eq!(descriptor.parse_value("k", " 7 ").unwrap(), TypedValue::Int(7));

        let err = descriptor.parse_value("k", "11").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { ref constraint, .. } if constraint == "integer [1 -- 10]"));

        let err = descriptor.parse_value("k", "seven").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPropertyType { ref expected, .. } if expected == "integer number"));
    }

    #[test]
    fn test_parse_int_overflow_is_type_error() {
        let descriptor = PropertyDescriptor::builder().int().build().unwrap();
        let err = descriptor.parse_value("k", "3000000000").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPropertyType { .. }));
    }

    #[test]
    fn test_positive_float_excludes_zero() {
        let descriptor = PropertyDescriptor::builder().float().positive().build().unwrap();
        assert!(descriptor.parse_value("k", "0").is_err());
        assert_eq!(descriptor.parse_value("k", "0.001").unwrap(), TypedValue::Float(0.001));
    }

    #[test]
    fn test_parse_bool_variants() {
        let descriptor = PropertyDescriptor::builder().boolean().build().unwrap();
        assert_eq!(descriptor.parse_value("k", "YES").unwrap(), TypedValue::Boolean(true));
        assert_eq!(descriptor.parse_value("k", "no").unwrap(), TypedValue::Boolean(false));
        assert!(descriptor.parse_value("k", "1").is_err());
    }

    #[test]
    fn test_enum_is_case_sensitive() {
        let descriptor = PropertyDescriptor::builder()
            .enumeration(["KEYSTORE", "OPENSSL"])
            .build()
            .unwrap();
        assert_eq!(
            descriptor.parse_value("k", "OPENSSL").unwrap(),
            TypedValue::Enum("OPENSSL".into())
        );
        let err = descriptor.parse_value("truststore.type", "openssl").unwrap_err();
        match err {
            ConfigError::InvalidEnumValue { key, allowed, .. } => {
                assert_eq!(key, "truststore.type");
                assert_eq!(allowed, vec!["KEYSTORE", "OPENSSL"]);
            }
            other => panic!("expected enum error, got {other:?}"),
        }
    }

    #[test]
    fn test_secret_value_masked_in_errors() {
        let descriptor = PropertyDescriptor::builder().int().secret().build().unwrap();
        let err = descriptor.parse_value("credential.pin", "hunter2").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(SECRET_MASK));
        assert!(!msg.contains("hunter2"));
    }

    #[test]
    fn test_to_builder_specialises_copy() {
        let original = PropertyDescriptor::with_default("10").build().unwrap();
        let derived = original.to_builder().updateable().max(20).build().unwrap();

        assert!(!original.is_updateable());
        assert!(derived.is_updateable());
        assert_eq!(derived.default_value(), Some("10"));
        assert_eq!(derived.integer_range().max, Some(20));
        assert_eq!(original.integer_range().max, None);
    }

    #[test]
    fn test_category_ordering() {
        let mut categories = vec![
            DocumentationCategory::new("Truststore"),
            DocumentationCategory::with_sort_key("Credential", "0"),
            DocumentationCategory::new("Client"),
        ];
        categories.sort();
        let names: Vec<_> = categories.iter().map(DocumentationCategory::name).collect();
        assert_eq!(names, vec!["Credential", "Client", "Truststore"]);
    }

    #[test]
    fn test_entry_points_start_from_plain_descriptor() {
        let plain = PropertyDescriptor::builder().build().unwrap();
        assert_eq!(plain.property_type(), PropertyType::String);
        assert!(!plain.is_mandatory());
        assert!(plain.default_value().is_none());

        let mandatory = PropertyDescriptor::mandatory().build().unwrap();
        assert!(mandatory.is_mandatory());

        let defaulted = PropertyDescriptor::with_default("30").build().unwrap();
        assert_eq!(defaulted.property_type(), PropertyType::Int);
        assert_eq!(defaulted.default_value(), Some("30"));
    }

    #[test]
    fn test_non_finite_floats_are_rejected() {
        assert_eq!(PropertyType::infer("nan"), PropertyType::String);
        assert_eq!(PropertyType::infer("inf"), PropertyType::String);
        assert_eq!(PropertyType::infer("-Infinity"), PropertyType::String);
        assert_eq!(PropertyType::infer("1.5e3"), PropertyType::Float);

        let ratio = PropertyDescriptor::builder().float().build().unwrap();
        for value in ["inf", "-inf", "NaN", "infinity"] {
            assert!(matches!(
                ratio.parse_value("ratio", value),
                Err(ConfigError::InvalidPropertyType { .. })
            ));
        }
        assert_eq!(ratio.parse_value("ratio", " 0.25 ").unwrap(), TypedValue::Float(0.25));
    }
}
