use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered `KEY: value` environment mapping.
pub type EnvMap = IndexMap<String, String>;

/// The matrix axis that drives per-version pipeline instances.
pub const NODE_VERSION_AXIS: &str = "node-version";

/// A parsed GitHub Actions workflow, reduced to the fields the converter reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceWorkflow {
    pub name: Option<String>,
    pub env: EnvMap,
    pub on: TriggerDeclaration,
    /// Jobs in declaration order.
    pub jobs: IndexMap<String, JobSpec>,
}

impl SourceWorkflow {
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn step_count(&self) -> usize {
        self.jobs.values().map(|j| j.steps.len()).sum()
    }
}

/// How the `on:` key was written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum TriggerDeclaration {
    #[default]
    Absent,
    Single(String),
    List(Vec<String>),
    Map(IndexMap<String, TriggerConfig>),
}

/// Per-event configuration under a mapping-form `on:`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// `branches:` filter, if declared.
    pub branches: Option<Vec<String>>,
    /// Entries of a `schedule:` list; `None` where an entry has no `cron`.
    pub schedule: Vec<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: String,
    /// First element of `runs-on` when it is a list.
    pub runs_on: Option<String>,
    pub env: EnvMap,
    pub steps: Vec<StepSpec>,
    pub matrix: Option<MatrixSpec>,
    pub needs: Vec<String>,
}

impl JobSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Declared `node-version` matrix values, if the job is matrix-expanded on them.
    pub fn node_versions(&self) -> Option<&[String]> {
        self.matrix.as_ref().and_then(|m| m.node_versions())
    }
}

/// `strategy.matrix` axes in declaration order (`include`/`exclude` are not axes).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixSpec {
    pub axes: IndexMap<String, Vec<String>>,
}

impl MatrixSpec {
    pub fn node_versions(&self) -> Option<&[String]> {
        self.axes.get(NODE_VERSION_AXIS).map(Vec::as_slice)
    }

    /// Axes the converter does not interpret.
    pub fn ignored_axes(&self) -> impl Iterator<Item = &str> {
        self.axes
            .keys()
            .map(String::as_str)
            .filter(|axis| *axis != NODE_VERSION_AXIS)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    pub name: Option<String>,
    pub env: EnvMap,
    /// `with:` inputs, stringified.
    pub with: IndexMap<String, String>,
    pub action: StepAction,
}

impl StepSpec {
    pub fn run(script: impl Into<String>) -> Self {
        Self {
            action: StepAction::Run(script.into()),
            ..Self::default()
        }
    }

    pub fn uses(action: impl Into<String>) -> Self {
        Self {
            action: StepAction::Uses(action.into()),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// What a step executes. `uses` takes precedence when a step declares both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum StepAction {
    Uses(String),
    Run(String),
    #[default]
    Nothing,
}
