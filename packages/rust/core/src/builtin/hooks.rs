//! The `output-dir` engine hook.

use std::sync::Arc;

use tracing::info;

use quire_shared::{QuireError, Result};

use crate::capability::{EngineHook, HookContext};
use crate::plugin::{Capability, Plugin, PluginContext, PluginDescriptor};

pub const OUTPUT_DIR: PluginDescriptor = PluginDescriptor {
    name: "output-dir",
    capabilities: &[Capability::EngineHook],
    dependencies: &[],
    config: &[],
    is_abstract: false,
    component: None,
    construct: build_output_dir,
};

fn build_output_dir(_ctx: PluginContext<'_>) -> Result<Arc<dyn Plugin>> {
    Ok(Arc::new(OutputDirHook))
}

/// Creates the output directory before pipelines run, reports totals after.
pub struct OutputDirHook;

impl EngineHook for OutputDirHook {
    fn initialize(&self, ctx: HookContext<'_>) -> Result<()> {
        std::fs::create_dir_all(ctx.output_dir).map_err(|e| QuireError::io(ctx.output_dir, e))?;
        info!(output = %ctx.output_dir.display(), "output directory ready");
        Ok(())
    }

    fn finalize(&self, ctx: HookContext<'_>) -> Result<()> {
        info!(
            bundles = ctx.bundles.len(),
            pipelines = ctx.config.entries.len(),
            output = %ctx.output_dir.display(),
            "build finished"
        );
        Ok(())
    }
}

impl Plugin for OutputDirHook {
    fn as_engine_hook(&self) -> Option<&dyn EngineHook> {
        Some(self)
    }
}
