//! Dependency ordering between modules.
//!
//! The graph has an edge `A -> B` when module A depends on module B, so B must
//! be installed first. Ordering is Kahn's algorithm over the transitive
//! closure of the requested modules, with ready modules taken in name order so
//! that plans are reproducible.

use crate::error::{InstallError, InstallResult};
use crate::module::ModuleDescriptor;
use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

pub struct DependencyResolver<'a> {
    graph: DiGraph<&'a str, ()>,
    nodes: BTreeMap<&'a str, NodeIndex>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(modules: &'a [ModuleDescriptor]) -> InstallResult<Self> {
        let mut graph = DiGraph::new();
        let mut nodes = BTreeMap::new();

        for module in modules {
            nodes.insert(module.name.as_str(), graph.add_node(module.name.as_str()));
        }

        for module in modules {
            let from = nodes[module.name.as_str()];
            for dependency in &module.dependencies {
                let to = *nodes.get(dependency.as_str()).ok_or_else(|| {
                    InstallError::Discovery(format!(
                        "Module '{}' depends on unknown module '{}'",
                        module.name, dependency
                    ))
                })?;
                graph.add_edge(from, to, ());
            }
        }

        Ok(Self { graph, nodes })
    }

    /// Installation order for `roots` and everything they depend on
    pub fn resolve(&self, roots: &[&str]) -> InstallResult<Vec<String>> {
        let mut closure = HashSet::new();
        for root in roots {
            let start = *self
                .nodes
                .get(root)
                .ok_or_else(|| InstallError::ModuleNotFound(root.to_string()))?;

            let mut dfs = Dfs::new(&self.graph, start);
            while let Some(node) = dfs.next(&self.graph) {
                closure.insert(node);
            }
        }

        self.order(&closure)
    }

    /// Installation order for every module
    pub fn resolve_all(&self) -> InstallResult<Vec<String>> {
        let closure: HashSet<NodeIndex> = self.nodes.values().copied().collect();
        self.order(&closure)
    }

    fn order(&self, closure: &HashSet<NodeIndex>) -> InstallResult<Vec<String>> {
        // Remaining uninstalled dependencies per module
        let mut pending: HashMap<NodeIndex, usize> = closure
            .iter()
            .map(|&node| {
                let deps = self
                    .graph
                    .neighbors_directed(node, Direction::Outgoing)
                    .filter(|dep| closure.contains(dep))
                    .count();
                (node, deps)
            })
            .collect();

        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(&node, _)| self.graph[node])
            .collect();

        let mut ordered = Vec::with_capacity(closure.len());
        while let Some(name) = ready.pop_first() {
            let node = self.nodes[name];
            ordered.push(name.to_string());

            for dependent in self.graph.neighbors_directed(node, Direction::Incoming) {
                if let Some(count) = pending.get_mut(&dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(self.graph[dependent]);
                    }
                }
            }
        }

        if ordered.len() < closure.len() {
            return Err(InstallError::CyclicDependency(self.find_cycle(closure)));
        }

        Ok(ordered)
    }

    /// Names the modules of one cycle inside `closure`, first module repeated at the end
    fn find_cycle(&self, closure: &HashSet<NodeIndex>) -> Vec<String> {
        let cyclic: Vec<BTreeSet<NodeIndex>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.iter().all(|node| closure.contains(node)))
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .map(|scc| scc.into_iter().collect())
            .collect();

        let Some(component) = cyclic
            .iter()
            .min_by_key(|scc| scc.iter().map(|&n| self.graph[n]).min())
        else {
            return Vec::new();
        };

        let Some(start) = component.iter().copied().min_by_key(|&n| self.graph[n]) else {
            return Vec::new();
        };

        // Walk smallest-named successors inside the component until a node repeats
        let mut path: Vec<NodeIndex> = vec![start];
        let mut current = start;
        loop {
            let Some(next) = self
                .graph
                .neighbors_directed(current, Direction::Outgoing)
                .filter(|n| component.contains(n))
                .min_by_key(|&n| self.graph[n])
            else {
                break;
            };

            if let Some(pos) = path.iter().position(|&n| n == next) {
                let mut cycle: Vec<String> =
                    path[pos..].iter().map(|&n| self.graph[n].to_string()).collect();
                cycle.push(self.graph[next].to_string());
                return cycle;
            }

            path.push(next);
            current = next;
        }

        path.iter().map(|&n| self.graph[n].to_string()).collect()
    }
}
