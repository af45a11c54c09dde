//! Bundle assembly and query pipelines for quire.
//!
//! Plugins are registered statically and built once per engine. Component
//! plugins are ordered by their declared dependencies, claim file basenames,
//! and load each bundle directory into typed values. Pipelines then filter,
//! sort and render the assembled bundles.

pub mod assembler;
pub mod builtin;
pub mod capability;
pub mod component;
pub mod discovery;
pub mod engine;
pub mod ignore;
pub mod order;
pub mod plugin;
pub mod query;
pub mod scaffold;

pub use assembler::{Bundle, BundleAssembler, BundleFile};
pub use capability::{
    BundleDiscovery, Content, ContentParser, DiscoveryContext, EngineHook, HookContext,
    TemplateRef, TemplateRenderer, TemplateSource,
};
pub use component::{Component, ComponentDeps, ComponentFile, ComponentFiles, ComponentValue};
pub use discovery::{bundles_under, walk_bundle_dirs};
pub use engine::{BuildSummary, Engine, ProgressReporter, SilentProgress};
pub use ignore::IgnoreFilter;
pub use order::{BasenameOwnership, ComponentSet};
pub use plugin::{
    Capability, ComponentSpec, EngineHandle, Plugin, PluginContext, PluginDescriptor,
    PluginInstance, PluginRegistry,
};
pub use query::{BundleStream, Operation, QueryContext, QueryPipeline};
pub use scaffold::init_site;
