//! Error types for quire.
//!
//! Library crates use [`QuireError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Top-level error type for all quire operations.
#[derive(Debug, thiserror::Error)]
pub enum QuireError {
    /// No site configuration document could be found.
    #[error("no configuration file found: looking for site.yaml or site.toml in {path:?}")]
    ConfigurationMissing { path: PathBuf },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A component claims basenames that earlier components already own.
    #[error(
        "bundle conflict: component `{current}` claims basenames [{}] already owned by {}",
        .basenames.join(", "),
        describe_owners(.previous)
    )]
    BasenameConflict {
        /// Every overlapping basename, sorted.
        basenames: Vec<String>,
        /// Earlier owner -> the overlapping basenames it holds.
        previous: BTreeMap<String, Vec<String>>,
        current: String,
    },

    /// A dependency cycle among loaded components.
    #[error("component dependency cycle among: {}", components.join(", "))]
    ComponentCycle { components: Vec<String> },

    /// A plugin was requested while it was still being constructed.
    #[error("plugin construction cycle: {}", chain.join(" -> "))]
    ConstructionCycle { chain: Vec<String> },

    /// A plugin dependency names a plugin that is not registered.
    #[error("unknown plugin: {name}")]
    UnknownPlugin { name: String },

    /// A lookup expected exactly one bundle.
    #[error("found {found} bundles matching {criteria} (expected exactly one)")]
    BundleLookup { criteria: String, found: usize },

    /// A pipeline stage names an operation that is not registered.
    #[error("unknown pipeline operation: {name}")]
    UnknownOperation { name: String },

    /// A pipeline stage failed.
    #[error("pipeline `{pipeline}` stage {stage} failed: {source}")]
    Stage {
        pipeline: String,
        stage: usize,
        source: Box<QuireError>,
    },

    /// Assembling a bundle failed.
    #[error("bundle `{key}` failed: {source}")]
    Bundle {
        key: String,
        source: Box<QuireError>,
    },

    /// Content or metadata parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Template rendering error.
    #[error("render error: {message}")]
    Render { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

fn describe_owners(previous: &BTreeMap<String, Vec<String>>) -> String {
    previous
        .iter()
        .map(|(owner, basenames)| format!("`{owner}` ({})", basenames.join(", ")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, QuireError>;

impl QuireError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a render error from any displayable message.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the failing bundle key.
    pub fn in_bundle(self, key: impl Into<String>) -> Self {
        Self::Bundle {
            key: key.into(),
            source: Box::new(self),
        }
    }

    /// Attach the failing pipeline name and stage index.
    pub fn in_stage(self, pipeline: impl Into<String>, stage: usize) -> Self {
        Self::Stage {
            pipeline: pipeline.into(),
            stage,
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = QuireError::config("bundle_dirs must not be empty");
        assert_eq!(err.to_string(), "config error: bundle_dirs must not be empty");

        let err = QuireError::validation("bad meta");
        assert!(err.to_string().contains("bad meta"));
    }

    #[test]
    fn basename_conflict_names_everything() {
        let err = QuireError::BasenameConflict {
            basenames: vec!["index".into(), "list".into(), "main".into()],
            previous: BTreeMap::from([
                ("page".to_string(), vec!["index".to_string(), "main".to_string()]),
                ("listing".to_string(), vec!["list".to_string()]),
            ]),
            current: "post".into(),
        };
        assert_eq!(
            err.to_string(),
            "bundle conflict: component `post` claims basenames [index, list, main] \
             already owned by `listing` (list), `page` (index, main)"
        );
    }

    #[test]
    fn stage_error_wraps_source() {
        let err = QuireError::UnknownOperation { name: "frobnicate".into() }.in_stage("posts", 2);
        let msg = err.to_string();
        assert!(msg.contains("`posts` stage 2"));
        assert!(msg.contains("frobnicate"));
    }
}
