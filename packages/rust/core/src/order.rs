//! Component load order and basename ownership.
//!
//! Components are ordered so every component loads after the components it
//! depends on. Dependencies on components that are not loaded are dropped
//! from the graph; a cycle among loaded components is a startup error.
//! Basenames are then claimed in that order, and any overlap is fatal.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use quire_shared::{QuireError, Result};

use crate::component::Component;
use crate::plugin::{Plugin, PluginInstance};

/// A component ready to load, with its dependency list already filtered.
#[derive(Clone)]
pub struct OrderedComponent {
    pub name: &'static str,
    pub basenames: Vec<&'static str>,
    /// Dependencies that name loaded components.
    pub depends_on: Vec<&'static str>,
    plugin: Arc<dyn Plugin>,
}

impl OrderedComponent {
    pub fn component(&self) -> Option<&dyn Component> {
        self.plugin.as_component()
    }
}

impl std::fmt::Debug for OrderedComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderedComponent")
            .field("name", &self.name)
            .field("basenames", &self.basenames)
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}

/// Basename → owning component name.
#[derive(Debug, Clone, Default)]
pub struct BasenameOwnership {
    owners: BTreeMap<&'static str, &'static str>,
}

impl BasenameOwnership {
    pub fn owner(&self, basename: &str) -> Option<&'static str> {
        self.owners.get(basename).copied()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.owners.iter().map(|(b, c)| (*b, *c))
    }

    /// Claim every basename for `component`, failing on any overlap.
    ///
    /// The error groups the overlapping basenames under each earlier owner.
    fn claim(&mut self, component: &'static str, basenames: &[&'static str]) -> Result<()> {
        let mut previous: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut overlapping: BTreeSet<&'static str> = BTreeSet::new();
        for b in basenames {
            if let Some(owner) = self.owners.get(b) {
                if overlapping.insert(*b) {
                    previous.entry(owner.to_string()).or_default().push(b.to_string());
                }
            }
        }

        if !overlapping.is_empty() {
            for claimed in previous.values_mut() {
                claimed.sort();
            }
            return Err(QuireError::BasenameConflict {
                basenames: overlapping.iter().map(|b| b.to_string()).collect(),
                previous,
                current: component.to_string(),
            });
        }

        for b in basenames {
            self.owners.insert(*b, component);
        }
        Ok(())
    }
}

/// The loaded components in load order, plus who owns which basename.
#[derive(Debug, Clone, Default)]
pub struct ComponentSet {
    ordered: Vec<OrderedComponent>,
    ownership: BasenameOwnership,
}

impl ComponentSet {
    /// Order `instances` and compute basename ownership.
    ///
    /// `instances` must come from the component capability query; discovery
    /// order breaks ties between independent components.
    #[instrument(skip_all, fields(components = instances.len()))]
    pub fn resolve(instances: &[PluginInstance]) -> Result<Self> {
        let mut nodes: Vec<OrderedComponent> = Vec::with_capacity(instances.len());
        for instance in instances {
            let Some(spec) = instance.descriptor.component else {
                return Err(QuireError::validation(format!(
                    "plugin `{}` provides components but declares no component spec",
                    instance.name()
                )));
            };
            if instance.plugin.as_component().is_none() {
                return Err(QuireError::validation(format!(
                    "plugin `{}` provides components but does not implement a loader",
                    instance.name()
                )));
            }
            let mut basenames: Vec<&'static str> = Vec::with_capacity(spec.basenames.len());
            for b in spec.basenames {
                if !basenames.contains(b) {
                    basenames.push(*b);
                }
            }
            nodes.push(OrderedComponent {
                name: instance.name(),
                basenames,
                depends_on: spec.depends_on.to_vec(),
                plugin: Arc::clone(&instance.plugin),
            });
        }

        let index: HashMap<&'static str, usize> =
            nodes.iter().enumerate().map(|(i, n)| (n.name, i)).collect();

        for node in &mut nodes {
            let name = node.name;
            node.depends_on.retain(|dep| {
                let known = index.contains_key(dep);
                if !known {
                    debug!(
                        component = name,
                        dependency = *dep,
                        "dropping dependency on unloaded component"
                    );
                }
                known
            });
            node.depends_on.dedup();
        }

        let order = topological_order(&nodes, &index)?;
        let ordered: Vec<OrderedComponent> = order.into_iter().map(|i| nodes[i].clone()).collect();

        let mut ownership = BasenameOwnership::default();
        for component in &ordered {
            ownership.claim(component.name, &component.basenames)?;
        }

        debug!(
            order = ?ordered.iter().map(|c| c.name).collect::<Vec<_>>(),
            basenames = ownership.len(),
            "component order resolved"
        );

        Ok(Self { ordered, ownership })
    }

    /// Components in load order.
    pub fn ordered(&self) -> &[OrderedComponent] {
        &self.ordered
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.ordered.iter().map(|c| c.name)
    }

    pub fn get(&self, name: &str) -> Option<&OrderedComponent> {
        self.ordered.iter().find(|c| c.name == name)
    }

    pub fn ownership(&self) -> &BasenameOwnership {
        &self.ownership
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

/// Kahn's algorithm; the lowest discovery index among ready nodes goes first.
fn topological_order(
    nodes: &[OrderedComponent],
    index: &HashMap<&'static str, usize>,
) -> Result<Vec<usize>> {
    let mut in_degree: Vec<usize> = nodes.iter().map(|n| n.depends_on.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, node) in nodes.iter().enumerate() {
        for dep in &node.depends_on {
            dependents[index[dep]].push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|i| in_degree[*i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < nodes.len() {
        let components: Vec<String> = (0..nodes.len())
            .filter(|i| in_degree[*i] > 0)
            .map(|i| nodes[i].name.to_string())
            .collect();
        warn!(?components, "component dependency cycle");
        return Err(QuireError::ComponentCycle { components });
    }

    Ok(order)
}
