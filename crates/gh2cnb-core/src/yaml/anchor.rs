use crate::error::{ConvertError, Result};
use crate::migration::template::PipelineTemplate;
use crate::migration::trigger::BranchMap;
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use serde_yaml::Value;
use std::sync::LazyLock;

/// Characters that make a plain YAML scalar ambiguous.
static NEEDS_QUOTES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[:#\-?*&!|>'"%@`{}\[\],\s]"#).expect("valid regex"));

/// Render templates and instances as anchor/alias YAML.
///
/// `serde_yaml` cannot emit `&anchor`, `*alias` or `<<` merge keys, so the
/// document is composed as text and only the mapping bodies are serialized.
///
/// Layout:
///
/// ```yaml
/// .build: &build
///   docker:
///     image: ubuntu:22.04
///   stages:
///   - name: Build
///     script: make
///
/// main:
///   push:
///     -
///       name: "push-build"
///       <<: *build
/// ```
pub fn emit_with_anchors(
    templates: &IndexMap<String, PipelineTemplate>,
    branches: &BranchMap,
) -> Result<String> {
    let mut parts: Vec<String> = Vec::new();

    for (name, template) in templates {
        parts.push(format!(".{name}: &{name}"));
        parts.push(indent_block(dump(template, name)?.trim_end(), 2));
        parts.push(String::new());
    }

    for (branch, triggers) in branches {
        parts.push(format!("{}:", quote_if_needed(branch)));
        for (key, instances) in triggers {
            let rendered_key = if key.is_cron() {
                json_quote(&key.to_string())
            } else {
                key.to_string()
            };
            parts.push(format!("  {rendered_key}:"));

            if instances.is_empty() {
                parts.push("    []".to_string());
                continue;
            }

            for instance in instances {
                parts.push("    -".to_string());
                parts.push(format!("      name: {}", quote_if_needed(&instance.name)));
                parts.push(format!("      <<: *{}", instance.alias));
                if !instance.overrides.is_empty() {
                    let dumped = dump(&instance.overrides, &instance.name)?;
                    parts.push(indent_block(dumped.trim_end(), 6));
                }
            }
        }
    }

    let mut text = parts.join("\n");
    text.push('\n');
    Ok(text)
}

fn dump<T: Serialize>(value: &T, owner: &str) -> Result<String> {
    serde_yaml::to_string(value)
        .map_err(|e| ConvertError::Expansion(format!("failed to serialize '{owner}': {e}")))
}

/// Prefix every non-empty line with `spaces` columns.
pub fn indent_block(text: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                line.to_string()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Double-quote `s` when it would not read back as the same plain string.
pub fn quote_if_needed(s: &str) -> String {
    if NEEDS_QUOTES.is_match(s) || !reads_back_as_string(s) {
        json_quote(s)
    } else {
        s.to_string()
    }
}

/// `true`, `null`, `1.0` and the empty string all parse as something else.
fn reads_back_as_string(s: &str) -> bool {
    matches!(serde_yaml::from_str::<Value>(s), Ok(Value::String(parsed)) if parsed == s)
}

/// JSON string literals are valid YAML double-quoted scalars.
fn json_quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::template::{DockerConfig, Stage};
    use crate::migration::trigger::{InstanceOverrides, PipelineInstance, TriggerInstances, TriggerKey};

    fn template() -> PipelineTemplate {
        PipelineTemplate {
            env: None,
            docker: Some(DockerConfig::new("ubuntu:22.04")),
            stages: vec![Stage::Script {
                name: "Build".to_string(),
                env: None,
                script: "make".to_string(),
            }],
        }
    }

    fn instance(alias: &str, name: &str, image: Option<&str>) -> PipelineInstance {
        PipelineInstance {
            alias: alias.to_string(),
            name: name.to_string(),
            overrides: InstanceOverrides {
                docker: image.map(DockerConfig::new),
            },
        }
    }

    #[test]
    fn quotes_only_when_needed() {
        assert_eq!(quote_if_needed("main"), "main");
        assert_eq!(quote_if_needed("push-build"), "\"push-build\"");
        assert_eq!(quote_if_needed("release/*"), "\"release/*\"");
        assert_eq!(quote_if_needed("with space"), "\"with space\"");
        assert_eq!(quote_if_needed("true"), "\"true\"");
        assert_eq!(quote_if_needed("123"), "\"123\"");
        assert_eq!(quote_if_needed(""), "\"\"");
    }

    #[test]
    fn indents_non_empty_lines() {
        assert_eq!(indent_block("a:\n  b: 1\n\nc: 2", 2), "  a:\n    b: 1\n\n  c: 2");
    }

    #[test]
    fn emits_anchor_alias_layout() {
        let mut templates = IndexMap::new();
        templates.insert("build".to_string(), template());

        let mut triggers = TriggerInstances::new();
        triggers.insert(
            TriggerKey::Event("push".into()),
            vec![instance("build", "push-build", None)],
        );
        triggers.insert(
            TriggerKey::Cron("0 0 * * *".into()),
            vec![instance("build", "crontab-build-node18", Some("node:18"))],
        );
        triggers.insert(TriggerKey::Event("web_trigger".into()), vec![]);
        let mut branches = BranchMap::new();
        branches.insert("main".to_string(), triggers);

        let text = emit_with_anchors(&templates, &branches).unwrap();

        assert!(text.starts_with(".build: &build\n  docker:\n"));
        assert!(text.contains("\n\nmain:\n  push:\n    -\n      name: \"push-build\"\n      <<: *build\n"));
        assert!(text.contains("  \"crontab: 0 0 * * *\":\n"));
        assert!(text.contains("      <<: *build\n      docker:\n        image: "));
        assert!(text.contains("  web_trigger:\n    []\n"));

        // the generic parser resolves the merge source and accepts the layout
        let parsed: Value = serde_yaml::from_str(&text).unwrap();
        let push = &parsed["main"]["push"][0];
        assert_eq!(push["name"], Value::String("push-build".into()));
        assert_eq!(push["<<"]["docker"]["image"], Value::String("ubuntu:22.04".into()));
        let cron = &parsed["main"]["crontab: 0 0 * * *"][0];
        assert_eq!(cron["docker"]["image"], Value::String("node:18".into()));
    }

    #[test]
    fn multiline_scripts_stay_parseable() {
        let mut templates = IndexMap::new();
        templates.insert(
            "test".to_string(),
            PipelineTemplate {
                env: None,
                docker: None,
                stages: vec![Stage::Script {
                    name: "Test".to_string(),
                    env: None,
                    script: "npm ci\n\nnpm test -- --watch=false\n".to_string(),
                }],
            },
        );
        let text = emit_with_anchors(&templates, &BranchMap::new()).unwrap();
        let parsed: Value = serde_yaml::from_str(&text).unwrap();
        assert_eq!(
            parsed[".test"]["stages"][0]["script"],
            Value::String("npm ci\n\nnpm test -- --watch=false\n".into())
        );
    }

    #[test]
    fn output_is_deterministic() {
        let mut templates = IndexMap::new();
        templates.insert("build".to_string(), template());
        let mut branches = BranchMap::new();
        branches.insert("main".to_string(), TriggerInstances::new());
        assert_eq!(
            emit_with_anchors(&templates, &branches).unwrap(),
            emit_with_anchors(&templates, &branches).unwrap()
        );
    }
}
