use crate::error::{ConvertError, Result};
use crate::parser::workflow::*;
use indexmap::IndexMap;
use serde_yaml::Value;
use std::path::Path;

/// Parser for GitHub Actions workflow YAML files.
pub struct GitHubActionsParser;

impl GitHubActionsParser {
    /// Parse a GitHub Actions workflow file into a [`SourceWorkflow`].
    pub fn parse_file(path: &Path) -> Result<SourceWorkflow> {
        let content = std::fs::read_to_string(path).map_err(|source| ConvertError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse GitHub Actions YAML content into a [`SourceWorkflow`].
    ///
    /// Only malformed YAML or an empty/non-mapping document is an error;
    /// fields of unexpected shape fall back to their defaults.
    pub fn parse(content: &str) -> Result<SourceWorkflow> {
        let yaml: Value =
            serde_yaml::from_str(content).map_err(|e| ConvertError::Parse(e.to_string()))?;

        match &yaml {
            Value::Null => return Err(ConvertError::Parse("document is empty".to_string())),
            Value::Mapping(_) => {}
            _ => {
                return Err(ConvertError::Parse(
                    "expected a mapping at the document root".to_string(),
                ))
            }
        }

        let mut workflow = SourceWorkflow {
            name: yaml.get("name").and_then(scalar_to_string),
            ..SourceWorkflow::default()
        };

        if let Some(on) = yaml.get("on") {
            workflow.on = Self::parse_triggers(on);
        }

        if let Some(env) = yaml.get("env") {
            workflow.env = Self::parse_env(env);
        }

        if let Some(jobs) = yaml.get("jobs").and_then(|v| v.as_mapping()) {
            for (job_id, job_config) in jobs {
                let Some(job_id) = scalar_to_string(job_id) else {
                    continue;
                };
                let job = Self::parse_job(&job_id, job_config);
                workflow.jobs.insert(job_id, job);
            }
        }

        Ok(workflow)
    }

    fn parse_triggers(on: &Value) -> TriggerDeclaration {
        match on {
            Value::String(event) => TriggerDeclaration::Single(event.clone()),
            Value::Sequence(events) => {
                TriggerDeclaration::List(events.iter().filter_map(scalar_to_string).collect())
            }
            Value::Mapping(map) => {
                let mut triggers = IndexMap::new();
                for (event, config) in map {
                    let Some(event_name) = scalar_to_string(event) else {
                        continue;
                    };
                    let branches = config.get("branches").map(string_list);
                    let schedule = if event_name == "schedule" {
                        Self::parse_schedule(config)
                    } else {
                        Vec::new()
                    };
                    triggers.insert(event_name, TriggerConfig { branches, schedule });
                }
                TriggerDeclaration::Map(triggers)
            }
            _ => TriggerDeclaration::Absent,
        }
    }

    fn parse_schedule(config: &Value) -> Vec<Option<String>> {
        let cron_of = |entry: &Value| entry.get("cron").and_then(scalar_to_string);
        match config {
            Value::Sequence(entries) => entries.iter().map(cron_of).collect(),
            Value::Mapping(_) => vec![cron_of(config)],
            _ => Vec::new(),
        }
    }

    fn parse_job(job_id: &str, config: &Value) -> JobSpec {
        let mut job = JobSpec::new(job_id);

        // runs-on: a label or a list of labels, first one wins
        job.runs_on = match config.get("runs-on") {
            Some(Value::Sequence(labels)) => labels.first().and_then(scalar_to_string),
            Some(other) => scalar_to_string(other),
            None => None,
        };

        if let Some(needs) = config.get("needs") {
            job.needs = Self::parse_needs(needs);
        }

        if let Some(env) = config.get("env") {
            job.env = Self::parse_env(env);
        }

        if let Some(strategy) = config.get("strategy") {
            job.matrix = Self::parse_matrix(strategy);
        }

        if let Some(steps) = config.get("steps").and_then(|v| v.as_sequence()) {
            job.steps = steps.iter().map(Self::parse_step).collect();
        }

        job
    }

    fn parse_needs(needs: &Value) -> Vec<String> {
        match needs {
            Value::String(s) => vec![s.clone()],
            Value::Sequence(seq) => seq
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn parse_step(step: &Value) -> StepSpec {
        let name = step.get("name").and_then(scalar_to_string);

        let uses = step.get("uses").and_then(scalar_to_string);
        let run = step.get("run").and_then(scalar_to_string);
        let action = match (uses, run) {
            (Some(uses), _) => StepAction::Uses(uses),
            (None, Some(run)) => StepAction::Run(run),
            (None, None) => StepAction::Nothing,
        };

        StepSpec {
            name,
            env: step.get("env").map(Self::parse_env).unwrap_or_default(),
            with: step.get("with").map(Self::parse_env).unwrap_or_default(),
            action,
        }
    }

    fn parse_env(env: &Value) -> EnvMap {
        let mut map = EnvMap::new();
        if let Some(mapping) = env.as_mapping() {
            for (k, v) in mapping {
                if let (Some(key), Some(val)) = (scalar_to_string(k), scalar_to_string(v)) {
                    map.insert(key, val);
                }
            }
        }
        map
    }

    fn parse_matrix(strategy: &Value) -> Option<MatrixSpec> {
        let mapping = strategy.get("matrix")?.as_mapping()?;

        let mut axes = IndexMap::new();
        for (key, value) in mapping {
            let Some(key) = key.as_str() else {
                continue;
            };
            // Skip special keys like 'include' and 'exclude'
            if key == "include" || key == "exclude" {
                continue;
            }
            axes.insert(key.to_string(), string_list(value));
        }

        Some(MatrixSpec { axes })
    }
}

/// Render a scalar YAML value as the string a workflow author meant by it.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A scalar or a sequence of scalars, as a list.
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(seq) => seq.iter().filter_map(scalar_to_string).collect(),
        other => scalar_to_string(other).into_iter().collect(),
    }
}
