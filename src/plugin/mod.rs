//! Plugins: request handlers, dependency ordering, tag routing.
//!
//! Each [`Plugin`] declares the tags it claims and the plugins it depends on.
//! [`PluginRegistry::new`] orders plugins topologically and builds the
//! tag → plugin table, rejecting duplicate names, duplicate tag claims,
//! missing dependencies, and cycles.

pub mod boundary;
pub mod context;
pub mod core;
pub mod portal;
pub mod reactive;

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{ConfigError, RenderError};
use crate::request::{Request, Response};
use crate::scope::Scope;

pub use self::boundary::BoundaryPlugin;
pub use self::context::ContextPlugin;
pub use self::core::CorePlugin;
pub use self::portal::PortalPlugin;
pub use self::reactive::ReactivePlugin;

// ---------------------------------------------------------------------------
// Plugin trait
// ---------------------------------------------------------------------------

/// A handler for one or more request tags.
pub trait Plugin {
    /// Unique plugin name, used for dependency declarations.
    fn name(&self) -> &'static str;

    /// Tags this plugin claims.
    fn handles(&self) -> &[&'static str];

    /// Names of plugins that must be installed (and ordered) before this one.
    fn dependencies(&self) -> &[&'static str] {
        &[]
    }

    /// Apply `request` in `scope`. The response is fed back to the builder.
    fn handle(&self, request: Request, scope: &mut Scope<'_>) -> Result<Response, RenderError>;
}

/// The plugins every engine gets unless built with
/// [`EngineBuilder::without_default_plugins`](crate::engine::EngineBuilder::without_default_plugins).
pub fn default_plugins() -> Vec<Rc<dyn Plugin>> {
    vec![
        Rc::new(CorePlugin),
        Rc::new(ReactivePlugin),
        Rc::new(PortalPlugin),
        Rc::new(BoundaryPlugin),
        Rc::new(ContextPlugin),
    ]
}

// ---------------------------------------------------------------------------
// PluginRegistry
// ---------------------------------------------------------------------------

/// Dependency-ordered plugin set with a tag routing table.
pub struct PluginRegistry {
    plugins: Vec<Rc<dyn Plugin>>,
    by_tag: HashMap<&'static str, usize>,
}

impl PluginRegistry {
    /// Order `plugins` by dependency and index their tags.
    ///
    /// Registration order is kept wherever dependencies allow.
    pub fn new(plugins: Vec<Rc<dyn Plugin>>) -> Result<Self, ConfigError> {
        let mut index_of: HashMap<&'static str, usize> = HashMap::new();
        for (i, plugin) in plugins.iter().enumerate() {
            if index_of.insert(plugin.name(), i).is_some() {
                return Err(ConfigError::DuplicatePlugin(plugin.name().to_string()));
            }
        }
        for plugin in &plugins {
            for dep in plugin.dependencies() {
                if !index_of.contains_key(dep) {
                    return Err(ConfigError::MissingDependency {
                        plugin: plugin.name().to_string(),
                        dependency: dep.to_string(),
                    });
                }
            }
        }

        let order = topological_order(&plugins, &index_of)?;
        let plugins: Vec<Rc<dyn Plugin>> = order.into_iter().map(|i| plugins[i].clone()).collect();

        let mut by_tag: HashMap<&'static str, usize> = HashMap::new();
        for (i, plugin) in plugins.iter().enumerate() {
            for &tag in plugin.handles() {
                if let Some(&first) = by_tag.get(tag) {
                    return Err(ConfigError::DuplicateTag {
                        tag: tag.to_string(),
                        first: plugins[first].name().to_string(),
                        second: plugin.name().to_string(),
                    });
                }
                by_tag.insert(tag, i);
            }
        }

        Ok(Self { plugins, by_tag })
    }

    /// The plugin claiming `tag`.
    pub fn claim(&self, tag: &str) -> Option<&Rc<dyn Plugin>> {
        self.by_tag.get(tag).map(|&i| &self.plugins[i])
    }

    /// Plugin names in dependency order.
    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// Kahn's algorithm, always taking the lowest ready registration index.
fn topological_order(
    plugins: &[Rc<dyn Plugin>],
    index_of: &HashMap<&'static str, usize>,
) -> Result<Vec<usize>, ConfigError> {
    let n = plugins.len();
    let mut remaining_deps: Vec<usize> = plugins.iter().map(|p| p.dependencies().len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, plugin) in plugins.iter().enumerate() {
        for dep in plugin.dependencies() {
            dependents[index_of[dep]].push(i);
        }
    }

    let mut done = vec![false; n];
    let mut order = Vec::with_capacity(n);
    while order.len() < n {
        let Some(next) = (0..n).find(|&i| !done[i] && remaining_deps[i] == 0) else {
            let stuck = (0..n)
                .filter(|&i| !done[i])
                .map(|i| plugins[i].name().to_string())
                .collect();
            return Err(ConfigError::DependencyCycle(stuck));
        };
        done[next] = true;
        order.push(next);
        for &d in &dependents[next] {
            remaining_deps[d] -= 1;
        }
    }
    Ok(order)
}

// ===========================================================================
// Tests
// ===========================================================================
