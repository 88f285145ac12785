use crate::parser::workflow::JobSpec;
use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;

/// Direct neighbours of one job, in first-declared order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobLinks {
    pub prerequisites: Vec<String>,
    pub dependents: Vec<String>,
}

/// A `needs` entry that names no job in the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedReference {
    pub job: String,
    pub reference: String,
}

/// Job dependency graph built from `needs:` declarations.
///
/// Edges point from a prerequisite to the job that needs it. References to
/// unknown jobs produce no edge and are kept in [`DependencyGraph::dropped`].
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_map: IndexMap<String, NodeIndex>,
    links: IndexMap<String, JobLinks>,
    dropped: Vec<DroppedReference>,
}

impl DependencyGraph {
    pub fn build(jobs: &IndexMap<String, JobSpec>) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map = IndexMap::new();
        let mut links: IndexMap<String, JobLinks> = IndexMap::new();
        let mut dropped = Vec::new();

        for job_id in jobs.keys() {
            node_map.insert(job_id.clone(), graph.add_node(job_id.clone()));
            links.insert(job_id.clone(), JobLinks::default());
        }

        for (job_id, job) in jobs {
            for dep in &job.needs {
                let Some(&dep_idx) = node_map.get(dep) else {
                    tracing::debug!(job = %job_id, reference = %dep, "dropping unknown needs reference");
                    dropped.push(DroppedReference {
                        job: job_id.clone(),
                        reference: dep.clone(),
                    });
                    continue;
                };
                let job_links = &mut links[job_id];
                if job_links.prerequisites.contains(dep) {
                    continue;
                }
                job_links.prerequisites.push(dep.clone());
                links[dep].dependents.push(job_id.clone());
                graph.add_edge(dep_idx, node_map[job_id], ());
            }
        }

        Self {
            graph,
            node_map,
            links,
            dropped,
        }
    }

    pub fn prerequisites(&self, job_id: &str) -> &[String] {
        self.links
            .get(job_id)
            .map(|l| l.prerequisites.as_slice())
            .unwrap_or_default()
    }

    pub fn dependents(&self, job_id: &str) -> &[String] {
        self.links
            .get(job_id)
            .map(|l| l.dependents.as_slice())
            .unwrap_or_default()
    }

    pub fn dropped(&self) -> &[DroppedReference] {
        &self.dropped
    }

    pub fn job_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Jobs with no prerequisites.
    pub fn root_jobs(&self) -> Vec<&str> {
        self.jobs_without(Direction::Incoming)
    }

    /// Jobs nothing depends on.
    pub fn leaf_jobs(&self) -> Vec<&str> {
        self.jobs_without(Direction::Outgoing)
    }

    fn jobs_without(&self, direction: Direction) -> Vec<&str> {
        self.node_map
            .iter()
            .filter(|(_, idx)| self.graph.neighbors_directed(**idx, direction).count() == 0)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Every dependency cycle, each listed in job declaration order.
    ///
    /// A job that needs itself counts as a cycle of one.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let position = |idx: &NodeIndex| self.node_map.get_index_of(&self.graph[*idx]);

        let mut cycles: Vec<Vec<String>> = petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .map(|mut scc| {
                scc.sort_by_key(position);
                scc.into_iter().map(|idx| self.graph[idx].clone()).collect()
            })
            .collect();
        cycles.sort_by_key(|cycle| self.node_map.get_index_of(&cycle[0]));
        cycles
    }

    /// Mermaid flowchart of the job graph.
    pub fn to_mermaid(&self) -> String {
        let mut lines = vec!["graph LR".to_string()];

        for job_id in self.node_map.keys() {
            lines.push(format!("    {}[\"{}\"]", mermaid_id(job_id), job_id));
        }

        for (job_id, links) in &self.links {
            for dependent in &links.dependents {
                lines.push(format!(
                    "    {} --> {}",
                    mermaid_id(job_id),
                    mermaid_id(dependent)
                ));
            }
        }

        let roots = self.root_jobs();
        if !roots.is_empty() {
            let ids: Vec<String> = roots.iter().map(|id| mermaid_id(id)).collect();
            lines.push(format!("    style {} fill:#22c55e,color:#fff", ids.join(",")));
        }

        lines.join("\n")
    }

    /// One line per job: `job <- prerequisites | -> dependents`.
    pub fn to_text(&self) -> String {
        let mut lines = Vec::new();
        for (job_id, links) in &self.links {
            let mut line = job_id.clone();
            if !links.prerequisites.is_empty() {
                line.push_str(&format!(" <- {}", links.prerequisites.join(", ")));
            }
            if !links.dependents.is_empty() {
                line.push_str(&format!(" -> {}", links.dependents.join(", ")));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

fn mermaid_id(job_id: &str) -> String {
    job_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
