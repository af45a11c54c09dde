//! Shared types, error model, and configuration for quire.
//!
//! This crate is the foundation depended on by all other quire crates.
//! It provides:
//! - [`QuireError`]: the unified error type
//! - [`Meta`]: the layered per-bundle metadata view
//! - Configuration ([`SiteConfig`], [`PipelineDef`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    PACK_CONTENT_DIR, PACK_TEMPLATE_DIR, PackSource, PipelineDef, PipelineStage, SiteConfig,
    TOML_CONFIG_FILE, YAML_CONFIG_FILE, config_file_path, load_config, load_config_from,
    lookup_path,
};
pub use error::{QuireError, Result};
pub use types::{
    META_DIRECTORY, META_KEY, Meta, MetaData, RECENT_FIELDS, TIMESTAMP_FORMAT, format_timestamp,
    now_minute, parse_timestamp,
};
