//! Bundle components: the loaders that turn a bundle's files into values.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use quire_shared::{QuireError, Result};

/// One file a component owns in a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentFile {
    /// Extension without the leading dot; empty when the file has none.
    pub extension: String,
    pub path: PathBuf,
}

impl ComponentFile {
    pub fn read_to_string(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).map_err(|e| QuireError::io(&self.path, e))
    }

    pub fn open(&self) -> Result<std::fs::File> {
        std::fs::File::open(&self.path).map_err(|e| QuireError::io(&self.path, e))
    }
}

/// The files a component owns in one bundle, keyed by basename.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentFiles {
    files: BTreeMap<String, ComponentFile>,
}

impl ComponentFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file unless its basename is already taken.
    ///
    /// Returns `false` (and keeps the existing file) on a repeat basename.
    pub fn insert(&mut self, basename: impl Into<String>, file: ComponentFile) -> bool {
        match self.files.entry(basename.into()) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(file);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, basename: &str) -> Option<&ComponentFile> {
        self.files.get(basename)
    }

    /// The first present file among `basenames`, in the given order.
    pub fn first_of(&self, basenames: &[&str]) -> Option<(&str, &ComponentFile)> {
        basenames
            .iter()
            .find_map(|b| self.files.get_key_value(*b))
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ComponentFile)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A loaded component value of any type.
///
/// Values remember how to serialize themselves so templates can see them.
pub struct ComponentValue {
    value: Box<dyn Any + Send + Sync>,
    to_json: fn(&(dyn Any + Send + Sync)) -> Value,
}

impl ComponentValue {
    pub fn new<T: Any + Send + Sync + Serialize>(value: T) -> Self {
        Self {
            value: Box::new(value),
            to_json: |v| {
                v.downcast_ref::<T>()
                    .and_then(|t| serde_json::to_value(t).ok())
                    .unwrap_or(Value::Null)
            },
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.value.downcast_mut::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn to_json(&self) -> Value {
        (self.to_json)(&*self.value)
    }
}

impl fmt::Debug for ComponentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentValue({})", self.to_json())
    }
}

/// Sibling components already loaded for the bundle being assembled.
///
/// A declared dependency that is missing here simply was not available for
/// this bundle; loaders must treat that as "no value", not as an error.
#[derive(Debug, Default)]
pub struct ComponentDeps<'a> {
    values: BTreeMap<&'a str, &'a ComponentValue>,
}

impl<'a> ComponentDeps<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &'a str, value: &'a ComponentValue) {
        self.values.insert(name, value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// The dependency's value, if loaded and of type `T`.
    pub fn get<T: Any>(&self, name: &str) -> Option<&'a T> {
        self.values.get(name).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A pluggable bundle loader.
pub trait Component: Send + Sync {
    /// Build this component's value for one bundle.
    ///
    /// `Ok(None)` means "not applicable to this bundle": the component is
    /// left out of the bundle without failing assembly.
    fn load(&self, deps: &ComponentDeps<'_>, files: &ComponentFiles)
    -> Result<Option<ComponentValue>>;
}

/// Split a file name into `(basename, extension)` at the last dot.
///
/// Leading dots belong to the basename (`.hidden` has no extension).
pub fn split_file_name(file_name: &str) -> (String, String) {
    let path = Path::new(file_name);
    let basename = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let extension = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    (basename, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_uses_last_dot() {
        assert_eq!(split_file_name("post.draft.md"), ("post.draft".into(), "md".into()));
        assert_eq!(split_file_name("meta.yaml"), ("meta".into(), "yaml".into()));
        assert_eq!(split_file_name("README"), ("README".into(), String::new()));
        assert_eq!(split_file_name(".hidden"), (".hidden".into(), String::new()));
    }

    #[test]
    fn first_file_for_a_basename_is_kept() {
        let mut files = ComponentFiles::new();
        assert!(files.insert(
            "body",
            ComponentFile {
                extension: "md".into(),
                path: "a/body.md".into(),
            }
        ));
        assert!(!files.insert(
            "body",
            ComponentFile {
                extension: "txt".into(),
                path: "a/body.txt".into(),
            }
        ));
        assert_eq!(files.len(), 1);
        assert_eq!(files.get("body").unwrap().extension, "md");
        assert_eq!(files.first_of(&["content", "body"]).unwrap().0, "body");
    }

    #[test]
    fn values_downcast_and_serialize() {
        let mut v = ComponentValue::new(String::from("Hello"));
        assert!(v.is::<String>());
        assert!(v.downcast_ref::<u32>().is_none());
        v.downcast_mut::<String>().unwrap().push('!');
        assert_eq!(v.to_json(), Value::String("Hello!".into()));
    }

    #[test]
    fn deps_lookup_is_typed() {
        let title = ComponentValue::new(String::from("T"));
        let mut deps = ComponentDeps::new();
        deps.insert("title", &title);
        assert_eq!(deps.get::<String>("title").map(String::as_str), Some("T"));
        assert!(deps.get::<u64>("title").is_none());
        assert!(deps.get::<String>("content").is_none());
        assert_eq!(deps.names().collect::<Vec<_>>(), vec!["title"]);
    }
}
