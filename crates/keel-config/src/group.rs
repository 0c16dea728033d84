//! Selecting groups of properties by key.

use regex::Regex;

use crate::{ConfigError, ConfigResult, Properties};

#[derive(Debug, Clone)]
enum KeyFilter {
    Prefixes(Vec<String>),
    Patterns(Vec<Regex>),
}

/// A view of the properties whose keys match a set of prefixes or regular
/// expressions.
///
/// Regular expressions must match the whole key.
///
/// ```
/// use keel_config::{Properties, PropertyGroup};
///
/// let props: Properties = [
///     ("client.http.timeout", "30"),
///     ("client.http.proxy", "none"),
///     ("server.port", "8080"),
/// ]
/// .into_iter()
/// .collect();
///
/// let group = PropertyGroup::with_prefixes(["client."]);
/// assert_eq!(group.filter(&props).len(), 2);
/// assert_eq!(group.filter_containing(&props, "proxy").len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct PropertyGroup {
    filter: KeyFilter,
}

impl PropertyGroup {
    /// Accept keys starting with any of the prefixes.
    pub fn with_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            filter: KeyFilter::Prefixes(prefixes.into_iter().map(Into::into).collect()),
        }
    }

    /// Accept keys fully matching any of the regular expressions.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDescriptor`] for an invalid expression.
    pub fn with_patterns<I, S>(patterns: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(&format!("^(?:{pattern})$"))
                    .map_err(|e| ConfigError::invalid_descriptor(pattern, e.to_string()))
            })
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(Self {
            filter: KeyFilter::Patterns(patterns),
        })
    }

    /// Whether a key belongs to the group.
    pub fn matches(&self, key: &str) -> bool {
        match &self.filter {
            KeyFilter::Prefixes(prefixes) => prefixes.iter().any(|p| key.starts_with(p.as_str())),
            KeyFilter::Patterns(patterns) => patterns.iter().any(|p| p.is_match(key)),
        }
    }

    /// Keys of `properties` in the group, in set order.
    pub fn keys<'p>(&'p self, properties: &'p Properties) -> impl Iterator<Item = &'p str> + 'p {
        properties.keys().filter(move |key| self.matches(key))
    }

    /// The properties in the group.
    pub fn filter(&self, properties: &Properties) -> Properties {
        properties
            .iter()
            .filter(|(key, _)| self.matches(key))
            .collect()
    }

    /// The properties in the group whose key also contains `fragment`.
    pub fn filter_containing(&self, properties: &Properties, fragment: &str) -> Properties {
        properties
            .iter()
            .filter(|(key, _)| self.matches(key) && key.contains(fragment))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> Properties {
        [
            ("container.security.credential.path", "/a"),
            ("container.security.truststore.type", "keystore"),
            ("container.client.http.timeout", "10"),
            ("other", "x"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_prefix_filter() {
        let group = PropertyGroup::with_prefixes(["container.security.", "other"]);
        let keys: Vec<_> = group.keys(&props()).map(str::to_string).collect();
        assert_eq!(
            keys,
            vec![
                "container.security.credential.path",
                "container.security.truststore.type",
                "other"
            ]
        );
    }

    #[test]
    fn test_regex_filter_matches_whole_key() {
        let group = PropertyGroup::with_patterns([r"container\.\w+\.credential\..*"]).unwrap();
        let filtered = group.filter(&props());
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get("container.security.credential.path"), Some("/a"));

        let partial = PropertyGroup::with_patterns(["security"]).unwrap();
        assert!(partial.filter(&props()).is_empty());
    }

    #[test]
    fn test_filter_containing() {
        let group = PropertyGroup::with_prefixes(["container."]);
        let filtered = group.filter_containing(&props(), "truststore");
        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("container.security.truststore.type"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(PropertyGroup::with_patterns(["(unclosed"]).is_err());
    }
}
