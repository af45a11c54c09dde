//! Plugins that ship with quire.
//!
//! Each submodule exposes `const` descriptors; [`descriptors`] lists them in
//! registration order, which is also the discovery order used to break ties
//! between independent components.

pub mod components;
pub mod hooks;
pub mod packs;
pub mod parsers;
pub mod renderer;

use crate::plugin::PluginDescriptor;

/// Every built-in plugin, in registration order.
pub fn descriptors() -> Vec<PluginDescriptor> {
    vec![
        components::META,
        components::CONTENT,
        components::TITLE,
        components::TEMPLATE,
        parsers::TEXT,
        parsers::MARKDOWN_SOURCE,
        parsers::HTML,
        renderer::TEMPLATES,
        hooks::OUTPUT_DIR,
        packs::PACKS,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn builtin_names_are_unique() {
        let all = descriptors();
        let names: HashSet<&str> = all.iter().map(|d| d.name).collect();
        assert_eq!(names.len(), all.len());
    }

    #[test]
    fn builtin_dependencies_are_registered() {
        let all = descriptors();
        for descriptor in &all {
            for (_, target) in descriptor.dependencies {
                assert!(
                    all.iter().any(|d| d.name == *target),
                    "{} depends on unregistered {target}",
                    descriptor.name
                );
            }
        }
    }
}
