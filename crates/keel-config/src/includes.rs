//! Recursive `$include.` expansion.
//!
//! Every `$include.<label>` key names a property file that is merged into the
//! including set. Include paths may contain `${...}` placeholders; they are
//! resolved with the configured [`VariableResolver`] against the keys
//! accumulated so far, so a `$var.` declared in the including file can select
//! the file to include.
//!
//! Regular keys of a set are taken first, then its includes are expanded in
//! declaration order, depth-first. A key introduced twice is an error, and so is
//! a file that includes itself through the current chain.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::keys::KeyKind;
use crate::{ConfigError, ConfigResult, Properties, VariableResolver};

/// Expands include directives into one flat property set.
#[derive(Debug, Clone, Default)]
pub struct IncludeProcessor {
    resolver: VariableResolver,
}

impl IncludeProcessor {
    /// Create a processor resolving include paths with `resolver`.
    #[must_use]
    pub fn new(resolver: VariableResolver) -> Self {
        Self { resolver }
    }

    /// The resolver used for include paths.
    pub fn resolver(&self) -> &VariableResolver {
        &self.resolver
    }

    /// Expand every include directive of `properties`.
    ///
    /// Relative include paths are resolved against the directory of the
    /// including file, or the working directory when the set has no origin.
    /// The returned set has the origin of the input and no include keys left.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::DuplicateKey`] when an included file brings in a key
    ///   that is already present
    /// - [`ConfigError::IncludeCycle`] when a file is included from itself
    /// - [`ConfigError::UnresolvedVariable`] when an include path references an
    ///   unknown variable
    /// - [`ConfigError::Io`] / [`ConfigError::Parse`] when an included file
    ///   cannot be read
    pub fn process(&self, properties: &Properties) -> ConfigResult<Properties> {
        let mut chain = Vec::new();
        if let Some(origin) = properties.origin() {
            if let Ok(canonical) = fs::canonicalize(origin) {
                chain.push(canonical);
            }
        }
        self.expand(properties, &mut chain)
    }

    fn expand(&self, properties: &Properties, chain: &mut Vec<PathBuf>) -> ConfigResult<Properties> {
        let mut merged = match properties.origin() {
            Some(origin) => Properties::with_origin(origin),
            None => Properties::new(),
        };
        let mut includes = Vec::new();

        for (key, value) in properties.iter() {
            if KeyKind::classify(key).is_include() {
                includes.push((key, value));
            } else {
                merged.insert(key, value);
            }
        }

        for (key, raw_path) in includes {
            let resolved = self.resolver.resolve_value(key, raw_path, &merged)?;
            let path = resolve_include_path(properties.origin(), &resolved);
            let canonical = fs::canonicalize(&path).map_err(|e| ConfigError::io(&path, e))?;

            if chain.contains(&canonical) {
                return Err(ConfigError::IncludeCycle {
                    path: canonical,
                    chain: chain.clone(),
                });
            }

            debug!(directive = key, path = %path.display(), depth = chain.len(), "including property file");

            let included = Properties::load(&path)?;
            chain.push(canonical);
            let expanded = self.expand(&included, chain);
            chain.pop();

            for (included_key, value) in expanded?.iter() {
                if merged.contains_key(included_key) {
                    return Err(ConfigError::duplicate_key(included_key, &path));
                }
                merged.insert(included_key, value);
            }
        }

        Ok(merged)
    }
}

fn resolve_include_path(origin: Option<&Path>, value: &str) -> PathBuf {
    let path = Path::new(value.trim());
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match origin.and_then(Path::parent) {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn processor() -> IncludeProcessor {
        IncludeProcessor::new(VariableResolver::new().with_environment(HashMap::new()))
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_set_without_includes_is_unchanged() {
        let props: Properties = [("a", "1"), ("$var.x", "y")].into_iter().collect();
        let processed = processor().process(&props).unwrap();
        assert_eq!(processed, props);
    }

    #[test]
    fn test_recursive_include() {
        let dir = TempDir::new().unwrap();
        write(&dir, "c.properties", "regular.property3=value3\n");
        write(
            &dir,
            "b.properties",
            "regular.property2=value2\n$include.c=c.properties\n",
        );
        let base = write(
            &dir,
            "base.properties",
            "$include.b=b.properties\nregular.property=value1\n",
        );

        let props = Properties::load(&base).unwrap();
        let processed = processor().process(&props).unwrap();

        assert_eq!(processed.get("regular.property"), Some("value1"));
        assert_eq!(processed.get("regular.property2"), Some("value2"));
        assert_eq!(processed.get("regular.property3"), Some("value3"));
        assert_eq!(processed.len(), 3);
        assert_eq!(processed.origin(), Some(base.as_path()));
    }

    #[test]
    fn test_regular_keys_come_before_included_keys() {
        let dir = TempDir::new().unwrap();
        write(&dir, "child.properties", "b=2\n");
        let base = write(&dir, "base.properties", "$include.1=child.properties\na=1\n");

        let processed = processor().process(&Properties::load(&base).unwrap()).unwrap();
        let keys: Vec<_> = processed.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_include_path_with_variable() {
        let dir = TempDir::new().unwrap();
        write(&dir, "dynamic.properties", "regular.property3=Dynamic\n");
        let base = write(
            &dir,
            "base.properties",
            "$var.name=dynamic\n$include.x=${name}.properties\nregular.property=value1\n",
        );

        let processed = processor().process(&Properties::load(&base).unwrap()).unwrap();
        assert_eq!(processed.get("regular.property3"), Some("Dynamic"));
        assert_eq!(processed.get("$var.name"), Some("dynamic"));
    }

    #[test]
    fn test_duplicate_key_in_include_fails() {
        let dir = TempDir::new().unwrap();
        let child = write(&dir, "dup.properties", "regular.property=value2\n");
        let base = write(
            &dir,
            "base.properties",
            "regular.property=value1\n$include.1=dup.properties\n",
        );

        let err = processor()
            .process(&Properties::load(&base).unwrap())
            .unwrap_err();
        match &err {
            ConfigError::DuplicateKey { key, file } => {
                assert_eq!(key, "regular.property");
                assert_eq!(file, &child);
            }
            other => panic!("expected duplicate key, got {other:?}"),
        }
        assert!(err.to_string().contains("regular.property"));
    }

    #[test]
    fn test_duplicate_between_sibling_includes_fails() {
        let dir = TempDir::new().unwrap();
        write(&dir, "one.properties", "shared=1\n");
        write(&dir, "two.properties", "shared=2\n");
        let base = write(
            &dir,
            "base.properties",
            "$include.1=one.properties\n$include.2=two.properties\n",
        );

        let err = processor()
            .process(&Properties::load(&base).unwrap())
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateKey { ref key, .. } if key == "shared"));
    }

    #[test]
    fn test_self_include_is_a_cycle() {
        let dir = TempDir::new().unwrap();
        let base = write(&dir, "base.properties", "a=1\n$include.self=base.properties\n");

        let err = processor()
            .process(&Properties::load(&base).unwrap())
            .unwrap_err();
        assert!(matches!(err, ConfigError::IncludeCycle { .. }));
    }

    #[test]
    fn test_indirect_cycle() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.properties", "a=1\n$include.b=b.properties\n");
        write(&dir, "b.properties", "b=1\n$include.a=a.properties\n");
        let base = dir.path().join("a.properties");

        let err = processor()
            .process(&Properties::load(&base).unwrap())
            .unwrap_err();
        match err {
            ConfigError::IncludeCycle { path, chain } => {
                assert!(path.ends_with("a.properties"));
                assert_eq!(chain.len(), 2);
            }
            other => panic!("expected include cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_include_is_io_error() {
        let dir = TempDir::new().unwrap();
        let base = write(&dir, "base.properties", "$include.1=missing.properties\n");

        let err = processor()
            .process(&Properties::load(&base).unwrap())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_unresolved_include_variable() {
        let props: Properties = [("$include.1", "${nowhere}/x.properties")].into_iter().collect();
        let err = processor().process(&props).unwrap_err();
        assert!(
            matches!(err, ConfigError::UnresolvedVariable { ref name, ref key } if name == "nowhere" && key == "$include.1")
        );
    }

    #[test]
    fn test_absolute_include_from_memory_set() {
        let dir = TempDir::new().unwrap();
        let child = write(&dir, "child.properties", "b=2\n");
        let props: Properties = [("a", "1"), ("$include.1", child.to_str().unwrap())]
            .into_iter()
            .collect();

        let processed = processor().process(&props).unwrap();
        assert_eq!(processed.get("b"), Some("2"));
        assert!(processed.origin().is_none());
    }

    #[test]
    fn test_resolve_include_path() {
        let origin = Path::new("/etc/keel/base.properties");
        assert_eq!(
            resolve_include_path(Some(origin), "child.properties"),
            PathBuf::from("/etc/keel/child.properties")
        );
        assert_eq!(
            resolve_include_path(Some(origin), "/opt/other.properties"),
            PathBuf::from("/opt/other.properties")
        );
        assert_eq!(
            resolve_include_path(None, "child.properties"),
            PathBuf::from("child.properties")
        );
    }
}
