pub mod runner;
pub mod template;
pub mod trigger;

use crate::error::{ConvertError, Result};
use crate::graph::DependencyGraph;
use crate::parser::github::GitHubActionsParser;
use crate::parser::workflow::SourceWorkflow;
use crate::yaml::{anchor, merge};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::Path;
use template::{PipelineTemplate, TemplateBuilder};
use trigger::BranchMap;

pub const DEFAULT_BRANCH: &str = "main";

/// Knobs for one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Emit `&anchor` / `<<: *alias` YAML; otherwise inline every template.
    pub anchors: bool,
    /// Branch used when `on.push.branches` names none.
    pub default_branch: String,
    /// Convert cyclic `needs` graphs instead of rejecting them. The
    /// resulting await/resolve pairs deadlock on CNB.
    pub allow_cycles: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            anchors: true,
            default_branch: DEFAULT_BRANCH.to_string(),
            allow_cycles: false,
        }
    }
}

/// Output of a GitHub Actions -> CNB conversion.
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub source_provider: String,
    pub target_provider: String,
    pub converted_jobs: usize,
    pub default_branch: String,
    pub templates: IndexMap<String, PipelineTemplate>,
    pub branches: BranchMap,
    pub warnings: Vec<String>,
    pub yaml: String,
}

impl Conversion {
    pub fn instance_count(&self) -> usize {
        self.branches
            .values()
            .flat_map(|triggers| triggers.values())
            .map(Vec::len)
            .sum()
    }
}

/// Stateless GitHub Actions -> CNB converter. Safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    options: ConvertOptions,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub fn convert_file(&self, path: &Path) -> Result<Conversion> {
        let workflow = GitHubActionsParser::parse_file(path)?;
        self.convert_workflow(&workflow)
    }

    pub fn convert(&self, content: &str) -> Result<Conversion> {
        let workflow = GitHubActionsParser::parse(content)?;
        self.convert_workflow(&workflow)
    }

    pub fn convert_workflow(&self, workflow: &SourceWorkflow) -> Result<Conversion> {
        let mut warnings = Vec::new();

        let triggers = trigger::normalize_triggers(&workflow.on, &self.options.default_branch);
        let graph = DependencyGraph::build(&workflow.jobs);

        for dropped in graph.dropped() {
            let mut warning = format!(
                "Job '{}' needs unknown job '{}'; dependency ignored",
                dropped.job, dropped.reference
            );
            if let Some(suggestion) = closest_job(&dropped.reference, workflow) {
                warning.push_str(&format!(" (did you mean '{suggestion}'?)"));
            }
            warnings.push(warning);
        }

        for cycle in graph.cycles() {
            if !self.options.allow_cycles {
                return Err(ConvertError::CycleDetected(cycle));
            }
            tracing::debug!(jobs = ?cycle, "converting cyclic needs graph");
            warnings.push(format!(
                "Jobs {} depend on each other; the generated await/resolve stages will deadlock",
                cycle.join(", ")
            ));
        }

        let builder = TemplateBuilder::new(&workflow.env, &graph);
        let mut templates = IndexMap::new();
        for (job_id, job) in &workflow.jobs {
            if let Some(matrix) = &job.matrix {
                for axis in matrix.ignored_axes() {
                    warnings.push(format!(
                        "Job '{}' matrix axis '{}' is not supported and was ignored",
                        job_id, axis
                    ));
                }
            }
            let strip_image = job.node_versions().is_some();
            templates.insert(job_id.clone(), builder.build(job, strip_image, &mut warnings));
        }

        let branches = trigger::map_triggers(&workflow.jobs, &triggers, &mut warnings);

        let anchored = anchor::emit_with_anchors(&templates, &branches)?;
        let yaml = if self.options.anchors {
            anchored
        } else {
            merge::expand_merge_keys(&anchored)?
        };

        tracing::debug!(
            jobs = workflow.job_count(),
            steps = workflow.step_count(),
            warnings = warnings.len(),
            anchors = self.options.anchors,
            "converted workflow"
        );

        Ok(Conversion {
            source_provider: "github-actions".to_string(),
            target_provider: "cnb".to_string(),
            converted_jobs: workflow.job_count(),
            default_branch: triggers.default_branch,
            templates,
            branches,
            warnings,
            yaml,
        })
    }
}

/// Convert GitHub Actions YAML to CNB YAML with default options.
pub fn convert_to_cnb(content: &str, anchors: bool) -> Result<String> {
    let converter = Converter::new(ConvertOptions {
        anchors,
        ..ConvertOptions::default()
    });
    Ok(converter.convert(content)?.yaml)
}

fn closest_job<'a>(reference: &str, workflow: &'a SourceWorkflow) -> Option<&'a str> {
    workflow
        .jobs
        .keys()
        .map(|id| (id, strsim::damerau_levenshtein(reference, id)))
        .filter(|(_, dist)| *dist > 0 && *dist <= 2)
        .min_by_key(|(_, dist)| *dist)
        .map(|(id, _)| id.as_str())
}
