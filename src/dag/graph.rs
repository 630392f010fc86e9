// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::dag::job::{JobDefinition, JobId};
use crate::errors::{JobdagError, Result};

/// Position of a job in the graph's arena (its declaration index).
pub type JobIndex = usize;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct JobNode {
    /// Direct dependencies: jobs that must succeed before this one can run.
    deps: Vec<JobIndex>,
    /// Direct dependents: jobs that need this one. Kept in declaration order.
    dependents: Vec<JobIndex>,
}

/// Immutable dependency graph for one run.
///
/// Jobs live in an arena indexed by declaration order; edges are index
/// lists in both directions. The topological order is computed once at
/// build time and ties are broken by declaration order, so identical input
/// always produces the identical order.
#[derive(Debug, Clone)]
pub struct JobGraph {
    jobs: Vec<JobDefinition>,
    index: HashMap<JobId, JobIndex>,
    nodes: Vec<JobNode>,
    order: Vec<JobIndex>,
}

impl JobGraph {
    /// Build the graph, resolving every `needs` reference.
    ///
    /// Fails with:
    /// - [`JobdagError::DuplicateJob`] if two definitions share an id,
    /// - [`JobdagError::UnknownDependency`] for the first unresolved
    ///   reference in declaration order,
    /// - [`JobdagError::CyclicDependency`] naming every job that sits on a
    ///   cycle.
    pub fn build(definitions: Vec<JobDefinition>) -> Result<Self> {
        let mut index = HashMap::with_capacity(definitions.len());
        for (i, job) in definitions.iter().enumerate() {
            if index.insert(job.id.clone(), i).is_some() {
                return Err(JobdagError::DuplicateJob(job.id.clone()));
            }
        }

        let mut nodes = vec![JobNode::default(); definitions.len()];
        for (i, job) in definitions.iter().enumerate() {
            for dep in job.needs.iter() {
                let d = *index
                    .get(dep)
                    .ok_or_else(|| JobdagError::UnknownDependency {
                        job: job.id.clone(),
                        missing: dep.clone(),
                    })?;

                // `needs = ["a", "a"]` is one edge.
                if !nodes[i].deps.contains(&d) {
                    nodes[i].deps.push(d);
                    nodes[d].dependents.push(i);
                }
            }
        }

        let order = match kahn_order(&nodes) {
            Ok(order) => order,
            Err(leftover) => {
                let members = cycle_members(&nodes, &leftover)
                    .into_iter()
                    .map(|i| definitions[i].id.clone())
                    .collect();
                return Err(JobdagError::CyclicDependency(members));
            }
        };

        let graph = Self {
            jobs: definitions,
            index,
            nodes,
            order,
        };
        debug!(order = ?graph.topological_ids(), "job graph built");
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Definition at `index`. Panics on an index not produced by this graph.
    pub fn job(&self, index: JobIndex) -> &JobDefinition {
        &self.jobs[index]
    }

    /// All definitions in declaration order.
    pub fn jobs(&self) -> impl Iterator<Item = &JobDefinition> {
        self.jobs.iter()
    }

    pub fn index_of(&self, id: &str) -> Option<JobIndex> {
        self.index.get(id).copied()
    }

    /// Immediate dependencies of a job (the jobs listed in its `needs`).
    pub fn dependencies_of(&self, index: JobIndex) -> &[JobIndex] {
        self.nodes
            .get(index)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a job (jobs that list this one in `needs`).
    pub fn dependents_of(&self, index: JobIndex) -> &[JobIndex] {
        self.nodes
            .get(index)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Every job reachable from `index` through dependent edges, excluding
    /// `index` itself, in topological order.
    pub fn downstream_of(&self, index: JobIndex) -> Vec<JobIndex> {
        let mut seen = vec![false; self.jobs.len()];
        let mut stack: Vec<JobIndex> = self.dependents_of(index).to_vec();
        while let Some(i) = stack.pop() {
            if !seen[i] {
                seen[i] = true;
                stack.extend(self.dependents_of(i).iter().copied());
            }
        }
        self.order.iter().copied().filter(|i| seen[*i]).collect()
    }

    /// Deterministic topological order (ties broken by declaration order).
    pub fn topological_order(&self) -> &[JobIndex] {
        &self.order
    }

    pub fn topological_ids(&self) -> Vec<&str> {
        self.order.iter().map(|i| self.jobs[*i].id.as_str()).collect()
    }
}

/// Kahn's algorithm with a min-heap ready set keyed by declaration index.
///
/// Returns the jobs that could not be ordered on failure.
fn kahn_order(nodes: &[JobNode]) -> std::result::Result<Vec<JobIndex>, Vec<JobIndex>> {
    let mut in_degree: Vec<usize> = nodes.iter().map(|n| n.deps.len()).collect();
    let mut ready: BinaryHeap<Reverse<JobIndex>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for &dependent in nodes[i].dependents.iter() {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if order.len() == nodes.len() {
        Ok(order)
    } else {
        Err((0..nodes.len()).filter(|i| in_degree[*i] > 0).collect())
    }
}

/// Jobs on a cycle among the unordered leftovers.
///
/// Leftovers also include jobs that merely sit downstream of a cycle; only
/// non-trivial strongly connected components (or self-loops) are cycles.
fn cycle_members(nodes: &[JobNode], leftover: &[JobIndex]) -> Vec<JobIndex> {
    // Edge direction: dep -> job.
    let mut graph: DiGraphMap<JobIndex, ()> = DiGraphMap::new();
    for &i in leftover {
        graph.add_node(i);
    }
    for &i in leftover {
        for &dep in nodes[i].deps.iter() {
            if graph.contains_node(dep) {
                graph.add_edge(dep, i, ());
            }
        }
    }

    let mut members: Vec<JobIndex> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .flatten()
        .collect();
    members.sort_unstable();
    members
}
