//! Dependency resolution using topological sort
//!
//! Two graphs are built over the pending steps, stored in a petgraph arena
//! with integer node indices:
//!
//! - the removal graph holds deletes and extension uninstalls; an item is
//!   removed before anything it depends on
//! - the addition graph holds extension installs, creates, renames and
//!   updates; an item is added after everything it depends on
//!
//! The plan is the ordered removal graph followed by the ordered addition
//! graph. Independent steps keep their changelist order: Kahn's algorithm
//! always picks the ready node inserted first.

use crate::comparer::{Changelist, ExtensionChangelist, StorageComparer};
use crate::error::{ImportError, Result};
use crate::lifecycle::ExtensionLifecycle;
use crate::step::ImportStep;
use cfgsync_core::types::{Dependencies, DependencyKind, ExtensionRef};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Config(String),
    Extension(ExtensionRef),
}

impl NodeKey {
    fn for_dependency(kind: DependencyKind, name: &str) -> Option<Self> {
        match kind {
            DependencyKind::Module => Some(Self::Extension(ExtensionRef::module(name))),
            DependencyKind::Theme => Some(Self::Extension(ExtensionRef::theme(name))),
            DependencyKind::Config => Some(Self::Config(name.to_string())),
            // Content is never created by an import
            DependencyKind::Content => None,
        }
    }
}

/// Steps with "must run before" edges
#[derive(Default)]
struct StepGraph {
    graph: DiGraph<ImportStep, ()>,
    index: HashMap<NodeKey, NodeIndex>,
}

impl StepGraph {
    fn add(&mut self, key: NodeKey, step: ImportStep) {
        if self.index.contains_key(&key) {
            return;
        }
        let node = self.graph.add_node(step);
        self.index.insert(key, node);
    }

    /// Require `first` to run before `then` when both are in the graph
    fn before(&mut self, first: &NodeKey, then: &NodeKey) {
        if let (Some(&a), Some(&b)) = (self.index.get(first), self.index.get(then)) {
            self.graph.update_edge(a, b, ());
        }
    }

    fn order(&self) -> std::result::Result<Vec<ImportStep>, Vec<String>> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut ordered = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse(i)) = ready.pop() {
            let node = NodeIndex::new(i);
            ordered.push(self.graph[node].clone());
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                in_degree[next.index()] -= 1;
                if in_degree[next.index()] == 0 {
                    ready.push(Reverse(next.index()));
                }
            }
        }

        if ordered.len() < self.graph.node_count() {
            return Err(self.cycles());
        }
        Ok(ordered)
    }

    fn cycles(&self) -> Vec<String> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut members: Vec<String> =
                    scc.iter().map(|n| self.graph[*n].subject()).collect();
                members.sort();
                members.join(", ")
            })
            .collect()
    }
}

/// Orders changelist items and extension changes into import steps
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver {
    /// Dependencies of documents being written, from the source
    source: HashMap<String, Dependencies>,
    /// Dependencies of documents being deleted, from the target
    target: HashMap<String, Dependencies>,
    /// Dependencies of extensions being installed or uninstalled
    extensions: HashMap<ExtensionRef, Vec<ExtensionRef>>,
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the dependencies of every pending item
    ///
    /// Malformed dependency sections count as no dependencies here; the
    /// validation pipeline reports them.
    pub fn from_comparer(
        comparer: &StorageComparer,
        extension_changes: &ExtensionChangelist,
        lifecycle: Option<&dyn ExtensionLifecycle>,
    ) -> Result<Self> {
        let changelist = comparer.changelist();
        let mut resolver = Self::new();

        for name in changelist.written_names() {
            if let Some(doc) = comparer.source_document(name) {
                resolver
                    .source
                    .insert(name.to_string(), parsed_dependencies(doc));
            }
        }
        for name in &changelist.delete {
            if let Some(doc) = comparer.target_document(name) {
                resolver.target.insert(name.clone(), parsed_dependencies(doc));
            }
        }

        if let Some(lifecycle) = lifecycle {
            for ext in extension_changes
                .install
                .iter()
                .chain(extension_changes.uninstall.iter())
            {
                let info = lifecycle.info(ext).map_err(ImportError::lifecycle)?;
                if let Some(info) = info {
                    resolver.extensions.insert(ext.clone(), info.dependencies);
                }
            }
        }

        Ok(resolver)
    }

    /// Declare the source dependencies of a document being written
    pub fn with_source_dependencies(mut self, name: impl Into<String>, deps: Dependencies) -> Self {
        self.source.insert(name.into(), deps);
        self
    }

    /// Declare the target dependencies of a document being deleted
    pub fn with_target_dependencies(mut self, name: impl Into<String>, deps: Dependencies) -> Self {
        self.target.insert(name.into(), deps);
        self
    }

    /// Declare the dependencies of an extension
    pub fn with_extension_dependencies(
        mut self,
        extension: ExtensionRef,
        deps: Vec<ExtensionRef>,
    ) -> Self {
        self.extensions.insert(extension, deps);
        self
    }

    /// Produce the ordered step list
    ///
    /// Fails with [`ImportError::DependencyCycle`] naming the members of
    /// every cycle found in either graph.
    pub fn resolve(
        &self,
        changelist: &Changelist,
        extension_changes: &ExtensionChangelist,
    ) -> Result<Vec<ImportStep>> {
        let removal = self.removal_graph(changelist, extension_changes);
        let addition = self.addition_graph(changelist, extension_changes);

        let (removal, addition) = match (removal.order(), addition.order()) {
            (Ok(removal), Ok(addition)) => (removal, addition),
            (removal, addition) => {
                let cycles = removal
                    .err()
                    .into_iter()
                    .chain(addition.err())
                    .flatten()
                    .collect();
                return Err(ImportError::DependencyCycle { cycles });
            }
        };

        debug!(
            "Resolved {} removal and {} addition steps",
            removal.len(),
            addition.len()
        );
        Ok(removal.into_iter().chain(addition).collect())
    }

    fn removal_graph(&self, changelist: &Changelist, extensions: &ExtensionChangelist) -> StepGraph {
        let mut graph = StepGraph::default();

        for name in &changelist.delete {
            graph.add(
                NodeKey::Config(name.clone()),
                ImportStep::Delete { name: name.clone() },
            );
        }
        for ext in &extensions.uninstall {
            graph.add(
                NodeKey::Extension(ext.clone()),
                ImportStep::Uninstall {
                    extension: ext.clone(),
                },
            );
        }

        // Dependents go first
        for name in &changelist.delete {
            let Some(deps) = self.target.get(name) else {
                continue;
            };
            let dependent = NodeKey::Config(name.clone());
            for (kind, dep) in deps.iter() {
                if let Some(dependency) = NodeKey::for_dependency(kind, dep) {
                    graph.before(&dependent, &dependency);
                }
            }
        }
        for ext in &extensions.uninstall {
            let dependent = NodeKey::Extension(ext.clone());
            for dep in self.extensions.get(ext).into_iter().flatten() {
                graph.before(&dependent, &NodeKey::Extension(dep.clone()));
            }
        }

        graph
    }

    fn addition_graph(&self, changelist: &Changelist, extensions: &ExtensionChangelist) -> StepGraph {
        let mut graph = StepGraph::default();

        for ext in &extensions.install {
            graph.add(
                NodeKey::Extension(ext.clone()),
                ImportStep::Install {
                    extension: ext.clone(),
                },
            );
        }
        for name in &changelist.create {
            graph.add(
                NodeKey::Config(name.clone()),
                ImportStep::Create { name: name.clone() },
            );
        }
        for rename in &changelist.rename {
            graph.add(
                NodeKey::Config(rename.to.clone()),
                ImportStep::Rename {
                    from: rename.from.clone(),
                    to: rename.to.clone(),
                },
            );
        }
        for name in &changelist.update {
            graph.add(
                NodeKey::Config(name.clone()),
                ImportStep::Update { name: name.clone() },
            );
        }

        // Dependencies go first
        for ext in &extensions.install {
            let dependent = NodeKey::Extension(ext.clone());
            for dep in self.extensions.get(ext).into_iter().flatten() {
                graph.before(&NodeKey::Extension(dep.clone()), &dependent);
            }
        }
        for name in changelist.written_names() {
            let Some(deps) = self.source.get(name) else {
                continue;
            };
            let dependent = NodeKey::Config(name.to_string());
            for (kind, dep) in deps.iter() {
                if let Some(dependency) = NodeKey::for_dependency(kind, dep) {
                    graph.before(&dependency, &dependent);
                }
            }
        }

        graph
    }
}

fn parsed_dependencies(doc: &cfgsync_core::ConfigDocument) -> Dependencies {
    doc.dependencies().unwrap_or_else(|e| {
        debug!("Ignoring dependencies of {}: {}", doc.name(), e);
        Dependencies::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_deps(names: &[&str]) -> Dependencies {
        Dependencies {
            config: names.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn names(steps: &[ImportStep]) -> Vec<String> {
        steps.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_simple_dependency_chain() {
        // c -> b -> a
        let changelist = Changelist {
            create: vec!["x.c".into(), "x.b".into(), "x.a".into()],
            ..Default::default()
        };
        let resolver = DependencyResolver::new()
            .with_source_dependencies("x.c", config_deps(&["x.b"]))
            .with_source_dependencies("x.b", config_deps(&["x.a"]));

        let steps = resolver
            .resolve(&changelist, &ExtensionChangelist::default())
            .unwrap();
        assert_eq!(names(&steps), vec!["create x.a", "create x.b", "create x.c"]);
    }

    #[test]
    fn test_independent_items_keep_changelist_order() {
        let changelist = Changelist {
            create: vec!["x.b".into(), "x.a".into()],
            update: vec!["x.c".into()],
            delete: vec!["x.z".into(), "x.y".into()],
            ..Default::default()
        };
        let steps = DependencyResolver::new()
            .resolve(&changelist, &ExtensionChangelist::default())
            .unwrap();
        assert_eq!(
            names(&steps),
            vec![
                "delete x.z",
                "delete x.y",
                "create x.b",
                "create x.a",
                "update x.c"
            ]
        );
    }

    #[test]
    fn test_deletes_run_dependents_first() {
        // x.view depends on x.field; both are deleted
        let changelist = Changelist {
            delete: vec!["x.field".into(), "x.view".into()],
            ..Default::default()
        };
        let resolver =
            DependencyResolver::new().with_target_dependencies("x.view", config_deps(&["x.field"]));
        let steps = resolver
            .resolve(&changelist, &ExtensionChangelist::default())
            .unwrap();
        assert_eq!(names(&steps), vec!["delete x.view", "delete x.field"]);
    }

    #[test]
    fn test_circular_dependency() {
        let changelist = Changelist {
            create: vec!["x.a".into(), "x.b".into(), "x.c".into()],
            ..Default::default()
        };
        let resolver = DependencyResolver::new()
            .with_source_dependencies("x.a", config_deps(&["x.b"]))
            .with_source_dependencies("x.b", config_deps(&["x.a"]));

        let err = resolver
            .resolve(&changelist, &ExtensionChangelist::default())
            .unwrap_err();
        match err {
            ImportError::DependencyCycle { cycles } => {
                assert_eq!(cycles, vec!["x.a, x.b".to_string()]);
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let changelist = Changelist {
            update: vec!["x.a".into()],
            ..Default::default()
        };
        let resolver =
            DependencyResolver::new().with_source_dependencies("x.a", config_deps(&["x.a"]));
        assert!(matches!(
            resolver.resolve(&changelist, &ExtensionChangelist::default()),
            Err(ImportError::DependencyCycle { .. })
        ));
    }

    #[test]
    fn test_install_runs_before_dependent_config() {
        let changelist = Changelist {
            create: vec!["views.view.content".into()],
            ..Default::default()
        };
        let extensions = ExtensionChangelist {
            install: vec![ExtensionRef::module("node"), ExtensionRef::module("views")],
            uninstall: vec![],
        };
        let resolver = DependencyResolver::new()
            .with_source_dependencies(
                "views.view.content",
                Dependencies {
                    module: vec!["views".into()],
                    ..Default::default()
                },
            )
            .with_extension_dependencies(
                ExtensionRef::module("node"),
                vec![ExtensionRef::module("views")],
            );
        let steps = resolver.resolve(&changelist, &extensions).unwrap();
        assert_eq!(
            names(&steps),
            vec![
                "install module views",
                "install module node",
                "create views.view.content"
            ]
        );
    }

    #[test]
    fn test_config_deleted_before_module_uninstalled() {
        let changelist = Changelist {
            delete: vec!["views.view.content".into()],
            ..Default::default()
        };
        let extensions = ExtensionChangelist {
            install: vec![],
            uninstall: vec![ExtensionRef::module("views")],
        };
        let resolver = DependencyResolver::new().with_target_dependencies(
            "views.view.content",
            Dependencies {
                module: vec!["views".into()],
                ..Default::default()
            },
        );
        let steps = resolver.resolve(&changelist, &extensions).unwrap();
        assert_eq!(
            names(&steps),
            vec!["delete views.view.content", "uninstall module views"]
        );
    }

    #[test]
    fn test_dependencies_outside_the_changelist_are_ignored() {
        let changelist = Changelist {
            create: vec!["x.a".into()],
            ..Default::default()
        };
        let resolver = DependencyResolver::new()
            .with_source_dependencies("x.a", config_deps(&["x.already_there"]));
        let steps = resolver
            .resolve(&changelist, &ExtensionChangelist::default())
            .unwrap();
        assert_eq!(names(&steps), vec!["create x.a"]);
    }
}
