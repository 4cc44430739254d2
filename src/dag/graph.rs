// src/dag/graph.rs

use std::collections::{BTreeMap, HashMap};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, TaskConfig};
use crate::errors::{Result, TaskGraphError};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Tasks that must complete before this one can run.
    deps: Vec<String>,
    /// Tasks that list this one in their `after`.
    dependents: Vec<String>,
}

/// Static task graph described by a config file, keyed by task name.
///
/// The runtime engine never looks at this; it is only used to decide in which
/// order the configured tasks are launched (a task's prerequisites must
/// exist before it can be launched) and for dry-run output.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: HashMap<String, DagNode>,
    /// Task names in a valid launch order.
    order: Vec<String>,
}

impl DagGraph {
    /// Build the graph from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut nodes: HashMap<String, DagNode> = cfg
            .task
            .iter()
            .map(|(name, task)| {
                (
                    name.clone(),
                    DagNode {
                        deps: task.after.clone(),
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        for (name, task) in cfg.task.iter() {
            for dep in task.after.iter() {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(name.clone());
                }
            }
        }

        let order = launch_order(&cfg.task)?;
        Ok(Self { nodes, order })
    }

    /// Task names in an order where every task comes after its dependencies.
    pub fn launch_order(&self) -> &[String] {
        &self.order
    }

    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// Immediate dependencies of a task (its `after` list).
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }
}

/// Topological order of the configured tasks.
///
/// Edge direction is dep -> task, so for `[task.B] after = ["A"]` we add A -> B.
pub(crate) fn launch_order(tasks: &BTreeMap<String, TaskConfig>) -> Result<Vec<String>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in tasks.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in tasks.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(TaskGraphError::DagCycle(format!(
            "cycle detected in task DAG involving task '{}'",
            cycle.node_id()
        ))),
    }
}
