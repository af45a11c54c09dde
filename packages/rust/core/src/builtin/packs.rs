//! The `packs` bundle finder: bundles from each configured pack's `content/`.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use quire_shared::{PACK_CONTENT_DIR, Result};

use crate::capability::{BundleDiscovery, DiscoveryContext};
use crate::discovery::bundles_under;
use crate::plugin::{Capability, Plugin, PluginContext, PluginDescriptor};

pub const PACKS: PluginDescriptor = PluginDescriptor {
    name: "packs",
    capabilities: &[Capability::BundleDiscovery],
    dependencies: &[],
    config: &[],
    is_abstract: false,
    component: None,
    construct: build_packs,
};

fn build_packs(_ctx: PluginContext<'_>) -> Result<Arc<dyn Plugin>> {
    Ok(Arc::new(PackFinder))
}

pub struct PackFinder;

impl BundleDiscovery for PackFinder {
    fn find_bundles(&self, ctx: DiscoveryContext<'_>) -> Result<Vec<(String, PathBuf)>> {
        let mut found = Vec::new();
        for pack in ctx.config.pack_dirs(ctx.src_path) {
            if !pack.is_dir() {
                warn!(pack = %pack.display(), "pack directory does not exist, skipping");
                continue;
            }
            let content = pack.join(PACK_CONTENT_DIR);
            if !content.is_dir() {
                continue;
            }
            let bundles = bundles_under(&content, ctx.ignore)?;
            debug!(pack = %pack.display(), bundles = bundles.len(), "pack bundles found");
            found.extend(bundles);
        }
        Ok(found)
    }
}

impl Plugin for PackFinder {
    fn as_bundle_discovery(&self) -> Option<&dyn BundleDiscovery> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignore::IgnoreFilter;
    use quire_shared::{PackSource, SiteConfig};

    #[test]
    fn packs_contribute_in_numeric_order() {
        let root = std::env::temp_dir().join(format!("quire-packs-test-{}", uuid::Uuid::now_v7()));
        for rel in [
            "20-extra/content/about/body.md",
            "10-base/content/about/body.md",
            "10-base/content/home/body.md",
            "10-base/templates/page.html",
        ] {
            let path = root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "x").unwrap();
        }

        let config = SiteConfig {
            packs: vec![
                PackSource::Dir(PathBuf::from("20-extra")),
                PackSource::Dir(PathBuf::from("10-base")),
                PackSource::Dir(PathBuf::from("gone")),
            ],
            ..SiteConfig::default()
        };
        let ignore = IgnoreFilter::default();
        let found = PackFinder
            .find_bundles(DiscoveryContext {
                src_path: &root,
                config: &config,
                ignore: &ignore,
            })
            .unwrap();

        let pairs: Vec<(&str, PathBuf)> = found
            .iter()
            .map(|(k, d)| (k.as_str(), d.strip_prefix(&root).unwrap().to_path_buf()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("about", PathBuf::from("10-base/content/about")),
                ("home", PathBuf::from("10-base/content/home")),
                ("about", PathBuf::from("20-extra/content/about")),
            ]
        );

        let _ = std::fs::remove_dir_all(&root);
    }
}
