use crate::graph::DependencyGraph;
use crate::migration::runner::{self, CHECKOUT_ACTION, DEFAULT_NODE_VERSION, SETUP_NODE_ACTION};
use crate::parser::workflow::{EnvMap, JobSpec, StepAction, StepSpec};
use serde::{Deserialize, Serialize};

pub const NOOP_SCRIPT: &str = "# no-op";

/// A reusable CNB pipeline body, emitted once per job behind a YAML anchor.
///
/// Templates carry no `name`: the instance that merges a template supplies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<EnvMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerConfig>,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerConfig {
    pub image: String,
}

impl DockerConfig {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Stage {
    /// Cross-pipeline barrier (`cnb:await` / `cnb:resolve`).
    Sync {
        name: String,
        #[serde(rename = "type")]
        kind: SyncKind,
        options: SyncOptions,
    },
    Script {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        env: Option<EnvMap>,
        script: String,
    },
}

impl Stage {
    pub fn name(&self) -> &str {
        match self {
            Stage::Sync { name, .. } | Stage::Script { name, .. } => name,
        }
    }

    pub fn await_job(job_id: &str) -> Self {
        Stage::Sync {
            name: format!("wait for {job_id}"),
            kind: SyncKind::Await,
            options: SyncOptions {
                key: job_id.to_string(),
            },
        }
    }

    pub fn resolve_job(job_id: &str) -> Self {
        Stage::Sync {
            name: format!("resolve for {job_id}"),
            kind: SyncKind::Resolve,
            options: SyncOptions {
                key: job_id.to_string(),
            },
        }
    }

    /// The `(kind, key)` of a barrier stage.
    pub fn sync_key(&self) -> Option<(SyncKind, &str)> {
        match self {
            Stage::Sync { kind, options, .. } => Some((*kind, options.key.as_str())),
            Stage::Script { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncKind {
    #[serde(rename = "cnb:await")]
    Await,
    #[serde(rename = "cnb:resolve")]
    Resolve,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    pub key: String,
}

/// Builds one [`PipelineTemplate`] per job.
///
/// Never fails: steps of unknown shape turn into placeholder stages and are
/// noted in `warnings`.
pub struct TemplateBuilder<'a> {
    global_env: &'a EnvMap,
    graph: &'a DependencyGraph,
}

impl<'a> TemplateBuilder<'a> {
    pub fn new(global_env: &'a EnvMap, graph: &'a DependencyGraph) -> Self {
        Self { global_env, graph }
    }

    /// With `strip_image` set the template gets no `docker` entry; each
    /// matrix instance supplies its own image instead.
    pub fn build(
        &self,
        job: &JobSpec,
        strip_image: bool,
        warnings: &mut Vec<String>,
    ) -> PipelineTemplate {
        let mut stages: Vec<Stage> = self
            .graph
            .prerequisites(&job.id)
            .iter()
            .map(|dep| Stage::await_job(dep))
            .collect();

        let mut image = runner::runner_image(job.runs_on.as_deref()).to_string();

        for (index, step) in job.steps.iter().enumerate() {
            match &step.action {
                StepAction::Uses(uses) if uses.starts_with(CHECKOUT_ACTION) => {}
                StepAction::Uses(uses) if uses.starts_with(SETUP_NODE_ACTION) => {
                    image = runner::node_image(&setup_node_version(&job.id, step, warnings));
                }
                StepAction::Uses(uses) => {
                    warnings.push(format!(
                        "Job '{}' step '{}' uses action '{}' and needs manual porting",
                        job.id,
                        stage_name(step, index),
                        uses
                    ));
                    stages.push(self.script_stage(
                        job,
                        step,
                        index,
                        format!(
                            "# Uses GitHub Action: {uses}\n# Replace with an equivalent CNB plugin or script"
                        ),
                    ));
                }
                StepAction::Run(run) => {
                    stages.push(self.script_stage(job, step, index, run.clone()));
                }
                StepAction::Nothing => {
                    stages.push(self.script_stage(job, step, index, NOOP_SCRIPT.to_string()));
                }
            }
        }

        if !self.graph.dependents(&job.id).is_empty() {
            stages.push(Stage::resolve_job(&job.id));
        }

        if stages.is_empty() {
            stages.push(Stage::Script {
                name: "noop".to_string(),
                env: None,
                script: "echo \"noop\"".to_string(),
            });
        }

        tracing::debug!(job = %job.id, image = %image, strip_image, stages = stages.len(), "built pipeline template");

        PipelineTemplate {
            env: (!self.global_env.is_empty()).then(|| self.global_env.clone()),
            docker: (!strip_image).then(|| DockerConfig::new(image)),
            stages,
        }
    }

    fn script_stage(&self, job: &JobSpec, step: &StepSpec, index: usize, script: String) -> Stage {
        let mut env = job.env.clone();
        env.extend(step.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        Stage::Script {
            name: stage_name(step, index),
            env: (!env.is_empty()).then_some(env),
            script,
        }
    }
}

fn stage_name(step: &StepSpec, index: usize) -> String {
    step.name
        .clone()
        .unwrap_or_else(|| format!("step-{}", index + 1))
}

fn setup_node_version(job_id: &str, step: &StepSpec, warnings: &mut Vec<String>) -> String {
    if let Some(version) = step.with.get("node-version") {
        return version.clone();
    }
    if let Some(file) = step.with.get("node-version-file") {
        warnings.push(format!(
            "Job '{}' reads its Node version from '{}'; defaulting to node:{}",
            job_id, file, DEFAULT_NODE_VERSION
        ));
    }
    DEFAULT_NODE_VERSION.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn graph_of(jobs: &[JobSpec]) -> DependencyGraph {
        let map: IndexMap<String, JobSpec> =
            jobs.iter().map(|j| (j.id.clone(), j.clone())).collect();
        DependencyGraph::build(&map)
    }

    fn build(job: &JobSpec, graph: &DependencyGraph, strip: bool) -> (PipelineTemplate, Vec<String>) {
        let env = EnvMap::new();
        let mut warnings = Vec::new();
        let template = TemplateBuilder::new(&env, graph).build(job, strip, &mut warnings);
        (template, warnings)
    }

    #[test]
    fn independent_job_has_only_step_stages() {
        let mut job = JobSpec::new("build");
        job.runs_on = Some("ubuntu-latest".to_string());
        job.steps = vec![
            StepSpec::uses("actions/checkout@v4"),
            StepSpec::run("npm ci").named("Install"),
            StepSpec::run("npm test"),
        ];
        let graph = graph_of(&[job.clone()]);
        let (template, warnings) = build(&job, &graph, false);

        assert!(warnings.is_empty());
        assert_eq!(template.env, None);
        assert_eq!(template.docker, Some(DockerConfig::new("ubuntu:22.04")));
        assert_eq!(
            template.stages,
            vec![
                Stage::Script {
                    name: "Install".to_string(),
                    env: None,
                    script: "npm ci".to_string()
                },
                Stage::Script {
                    name: "step-3".to_string(),
                    env: None,
                    script: "npm test".to_string()
                },
            ]
        );
    }

    #[test]
    fn barriers_wrap_step_stages() {
        let mut build_job = JobSpec::new("build");
        build_job.steps = vec![StepSpec::run("make")];
        let mut lint = JobSpec::new("lint");
        lint.steps = vec![StepSpec::run("make lint")];
        let mut test = JobSpec::new("test");
        test.needs = vec!["lint".into(), "build".into()];
        test.steps = vec![StepSpec::run("make test")];
        let mut deploy = JobSpec::new("deploy");
        deploy.needs = vec!["test".into()];

        let graph = graph_of(&[build_job, lint, test.clone(), deploy]);
        let (template, _) = build(&test, &graph, false);

        let names: Vec<_> = template.stages.iter().map(Stage::name).collect();
        assert_eq!(
            names,
            vec!["wait for lint", "wait for build", "step-1", "resolve for test"]
        );
        assert_eq!(template.stages[0].sync_key(), Some((SyncKind::Await, "lint")));
        assert_eq!(template.stages[3].sync_key(), Some((SyncKind::Resolve, "test")));
    }

    #[test]
    fn setup_node_overrides_runner_image() {
        let mut job = JobSpec::new("build");
        job.runs_on = Some("windows-latest".to_string());
        let mut setup = StepSpec::uses("actions/setup-node@v4");
        setup.with.insert("node-version".into(), "v18.x".into());
        job.steps = vec![setup, StepSpec::run("npm test")];

        let graph = graph_of(&[job.clone()]);
        let (template, _) = build(&job, &graph, false);
        assert_eq!(template.docker, Some(DockerConfig::new("node:18")));
        assert_eq!(template.stages.len(), 1);

        let (stripped, _) = build(&job, &graph, true);
        assert_eq!(stripped.docker, None);
    }

    #[test]
    fn setup_node_version_file_defaults_with_warning() {
        let mut job = JobSpec::new("build");
        let mut setup = StepSpec::uses("actions/setup-node@v4");
        setup.with.insert("node-version-file".into(), ".nvmrc".into());
        job.steps = vec![setup];

        let graph = graph_of(&[job.clone()]);
        let (template, warnings) = build(&job, &graph, false);
        assert_eq!(template.docker, Some(DockerConfig::new("node:20")));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains(".nvmrc"));
    }

    #[test]
    fn foreign_action_becomes_placeholder() {
        let mut job = JobSpec::new("release");
        job.steps = vec![StepSpec::uses("softprops/action-gh-release@v2").named("Publish")];

        let graph = graph_of(&[job.clone()]);
        let (template, warnings) = build(&job, &graph, false);
        let Stage::Script { name, script, .. } = &template.stages[0] else {
            panic!("expected a script stage");
        };
        assert_eq!(name, "Publish");
        assert!(script.contains("softprops/action-gh-release@v2"));
        assert!(script.starts_with('#'));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn step_without_uses_or_run_is_noop() {
        let mut job = JobSpec::new("a");
        job.steps = vec![StepSpec::default()];
        let graph = graph_of(&[job.clone()]);
        let (template, _) = build(&job, &graph, false);
        assert_eq!(
            template.stages,
            vec![Stage::Script {
                name: "step-1".to_string(),
                env: None,
                script: NOOP_SCRIPT.to_string()
            }]
        );
    }

    #[test]
    fn empty_job_gets_noop_stage() {
        let mut job = JobSpec::new("empty");
        job.steps = vec![StepSpec::uses("actions/checkout@v4")];
        let graph = graph_of(&[job.clone()]);
        let (template, _) = build(&job, &graph, false);
        assert_eq!(template.stages.len(), 1);
        assert_eq!(template.stages[0].name(), "noop");
    }

    #[test]
    fn step_env_overlays_job_env() {
        let mut job = JobSpec::new("a");
        job.env.insert("MODE".into(), "job".into());
        job.env.insert("KEEP".into(), "1".into());
        let mut step = StepSpec::run("env");
        step.env.insert("MODE".into(), "step".into());
        job.steps = vec![step];

        let mut global = EnvMap::new();
        global.insert("GLOBAL".into(), "yes".into());
        let graph = graph_of(&[job.clone()]);
        let mut warnings = Vec::new();
        let template = TemplateBuilder::new(&global, &graph).build(&job, false, &mut warnings);

        assert_eq!(template.env, Some(global.clone()));
        let Stage::Script { env: Some(env), .. } = &template.stages[0] else {
            panic!("expected stage env");
        };
        assert_eq!(env["MODE"], "step");
        assert_eq!(env["KEEP"], "1");
        assert!(!env.contains_key("GLOBAL"));
    }
}
