use crate::migration::runner;
use crate::migration::template::DockerConfig;
use crate::parser::workflow::{JobSpec, TriggerDeclaration};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;

const SCHEDULE_EVENT: &str = "schedule";
const CRON_PREFIX: &str = "crontab";

/// GitHub event name -> CNB trigger name.
pub const EVENT_MAP: &[(&str, &str)] = &[
    ("push", "push"),
    ("pull_request", "pull_request"),
    ("workflow_dispatch", "web_trigger"),
    ("repository_dispatch", "api_trigger"),
];

pub fn map_event(event: &str) -> Option<&'static str> {
    EVENT_MAP
        .iter()
        .find(|(github, _)| *github == event)
        .map(|(_, cnb)| *cnb)
}

/// The `on:` declaration reduced to what the mapper needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedTriggers {
    /// Declared event kinds, in order, without `schedule`.
    pub kinds: Vec<String>,
    pub default_branch: String,
    /// Cron expressions of `schedule` entries that declare one.
    pub crons: Vec<String>,
}

pub fn normalize_triggers(on: &TriggerDeclaration, fallback_branch: &str) -> NormalizedTriggers {
    let raw_kinds: Vec<String> = match on {
        TriggerDeclaration::Absent => Vec::new(),
        TriggerDeclaration::Single(event) => vec![event.clone()],
        TriggerDeclaration::List(events) => events.clone(),
        TriggerDeclaration::Map(map) => map.keys().cloned().collect(),
    };

    let mut default_branch = fallback_branch.to_string();
    let mut crons = Vec::new();
    if let TriggerDeclaration::Map(map) = on {
        if let Some(first) = map
            .get("push")
            .and_then(|push| push.branches.as_ref())
            .and_then(|branches| branches.first())
        {
            default_branch = first.clone();
        }
        if let Some(schedule) = map.get(SCHEDULE_EVENT) {
            for entry in &schedule.schedule {
                match entry {
                    Some(cron) => crons.push(cron.clone()),
                    None => tracing::debug!("skipping schedule entry without a cron expression"),
                }
            }
        }
    }

    NormalizedTriggers {
        kinds: raw_kinds
            .into_iter()
            .filter(|kind| kind != SCHEDULE_EVENT)
            .collect(),
        default_branch,
        crons,
    }
}

/// Key grouping pipeline instances under a branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TriggerKey {
    Event(String),
    Cron(String),
}

impl TriggerKey {
    pub fn is_cron(&self) -> bool {
        matches!(self, TriggerKey::Cron(_))
    }

    /// Prefix for instance names created under this key.
    fn name_prefix(&self) -> &str {
        match self {
            TriggerKey::Event(event) => event,
            TriggerKey::Cron(_) => CRON_PREFIX,
        }
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKey::Event(event) => f.write_str(event),
            TriggerKey::Cron(expr) => write!(f, "{CRON_PREFIX}: {expr}"),
        }
    }
}

impl Serialize for TriggerKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Instance-level fields layered over the merged template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstanceOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerConfig>,
}

impl InstanceOverrides {
    pub fn is_empty(&self) -> bool {
        self.docker.is_none()
    }
}

/// A named pipeline that merges the template `alias` and applies `overrides`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineInstance {
    pub alias: String,
    pub name: String,
    #[serde(skip_serializing_if = "InstanceOverrides::is_empty")]
    pub overrides: InstanceOverrides,
}

pub type TriggerInstances = IndexMap<TriggerKey, Vec<PipelineInstance>>;

/// branch -> trigger key -> instances, all in insertion order.
pub type BranchMap = IndexMap<String, TriggerInstances>;

/// Expand triggers and `node-version` matrices into pipeline instances.
///
/// Every trigger lands under the single default branch. Event kinds with no
/// CNB counterpart are skipped and noted in `warnings`.
pub fn map_triggers(
    jobs: &IndexMap<String, JobSpec>,
    triggers: &NormalizedTriggers,
    warnings: &mut Vec<String>,
) -> BranchMap {
    let mut keyed = TriggerInstances::new();

    for kind in &triggers.kinds {
        let Some(event) = map_event(kind) else {
            warnings.push(format!(
                "Workflow trigger '{}' has no CNB equivalent and was skipped",
                kind
            ));
            continue;
        };
        let key = TriggerKey::Event(event.to_string());
        let instances = instances_for(&key, jobs);
        keyed.insert(key, instances);
    }

    for cron in &triggers.crons {
        let key = TriggerKey::Cron(cron.clone());
        let instances = instances_for(&key, jobs);
        keyed.insert(key, instances);
    }

    let mut branches = BranchMap::new();
    branches.insert(triggers.default_branch.clone(), keyed);
    branches
}

fn instances_for(key: &TriggerKey, jobs: &IndexMap<String, JobSpec>) -> Vec<PipelineInstance> {
    let prefix = key.name_prefix();
    let mut instances = Vec::new();

    for (job_id, job) in jobs {
        match job.node_versions() {
            Some(versions) => {
                for version in versions {
                    let version = runner::normalize_node_version(version);
                    instances.push(PipelineInstance {
                        alias: job_id.clone(),
                        name: format!("{prefix}-{job_id}-node{version}"),
                        overrides: InstanceOverrides {
                            docker: Some(DockerConfig::new(format!("node:{version}"))),
                        },
                    });
                }
            }
            None => instances.push(PipelineInstance {
                alias: job_id.clone(),
                name: format!("{prefix}-{job_id}"),
                overrides: InstanceOverrides::default(),
            }),
        }
    }

    instances
}
