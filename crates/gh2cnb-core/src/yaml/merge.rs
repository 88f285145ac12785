use crate::error::{ConvertError, Result};
use indexmap::IndexMap;
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};

pub const MERGE_KEY: &str = "<<";

/// Prefix marking a top-level key as an anchor definition.
const ANCHOR_PREFIX: char = '.';

/// Re-parse anchor-form YAML and inline every `<<` merge key.
///
/// Top-level `.name` entries are anchor definitions and are dropped from the
/// result; every other entry is expanded recursively. Fields declared next to
/// `<<` win over merged ones.
pub fn expand_merge_keys(anchored: &str) -> Result<String> {
    let parsed: Value = serde_yaml::from_str(anchored)
        .map_err(|e| ConvertError::Expansion(format!("anchored YAML does not parse: {e}")))?;

    let expanded = MergeExpander::from_document(&parsed)?.expand_document();

    serde_yaml::to_string(&expanded)
        .map_err(|e| ConvertError::Expansion(format!("failed to serialize expanded YAML: {e}")))
}

/// Anchor table plus the non-anchor entries of one document.
pub struct MergeExpander {
    anchors: IndexMap<String, Value>,
    entries: Mapping,
}

impl MergeExpander {
    pub fn from_document(document: &Value) -> Result<Self> {
        let root = match document {
            Value::Mapping(root) => root,
            Value::Null => {
                return Ok(Self {
                    anchors: IndexMap::new(),
                    entries: Mapping::new(),
                })
            }
            _ => {
                return Err(ConvertError::Expansion(
                    "anchored YAML root is not a mapping".to_string(),
                ))
            }
        };

        let mut anchors = IndexMap::new();
        let mut entries = Mapping::new();
        for (key, value) in root {
            match key.as_str().and_then(|k| k.strip_prefix(ANCHOR_PREFIX)) {
                Some(name) => {
                    anchors.insert(name.to_string(), value.clone());
                }
                None => {
                    entries.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(Self { anchors, entries })
    }

    pub fn anchor_names(&self) -> impl Iterator<Item = &str> {
        self.anchors.keys().map(String::as_str)
    }

    pub fn expand_document(&self) -> Value {
        let mut active = Vec::new();
        Value::Mapping(self.expand_mapping(&self.entries, &mut active))
    }

    /// `active` holds the anchors currently being expanded, so a
    /// self-referencing anchor contributes nothing instead of recursing.
    fn expand(&self, value: &Value, active: &mut Vec<String>) -> Value {
        match value {
            Value::Sequence(items) => {
                Value::Sequence(items.iter().map(|v| self.expand(v, active)).collect())
            }
            Value::Mapping(map) => Value::Mapping(self.expand_mapping(map, active)),
            Value::Tagged(tagged) => Value::Tagged(Box::new(TaggedValue {
                tag: tagged.tag.clone(),
                value: self.expand(&tagged.value, active),
            })),
            scalar => scalar.clone(),
        }
    }

    fn expand_mapping(&self, map: &Mapping, active: &mut Vec<String>) -> Mapping {
        let mut out = Mapping::new();

        if let Some(merge) = map.get(MERGE_KEY) {
            // earlier sources win over later ones
            for source in self.merge_sources(merge, active) {
                for (key, value) in source {
                    if !out.contains_key(&key) {
                        out.insert(key, value);
                    }
                }
            }
        }

        for (key, value) in map {
            if key.as_str() == Some(MERGE_KEY) {
                continue;
            }
            out.insert(key.clone(), self.expand(value, active));
        }

        out
    }

    /// The mappings a `<<` value stands for, already expanded.
    ///
    /// The parser resolves `*alias` into the anchored mapping itself; a
    /// literal `"*name"` string is looked up in the anchor table instead.
    fn merge_sources(&self, merge: &Value, active: &mut Vec<String>) -> Vec<Mapping> {
        match merge {
            Value::Mapping(source) => vec![self.expand_mapping(source, active)],
            Value::Sequence(items) => items
                .iter()
                .flat_map(|item| self.merge_sources(item, active))
                .collect(),
            Value::String(reference) => match reference.strip_prefix('*') {
                Some(name) => self.resolve_anchor(name, active).into_iter().collect(),
                None => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    fn resolve_anchor(&self, name: &str, active: &mut Vec<String>) -> Option<Mapping> {
        if active.iter().any(|a| a == name) {
            tracing::warn!(anchor = %name, "ignoring recursive anchor reference");
            return None;
        }
        let Some(body) = self.anchors.get(name) else {
            tracing::debug!(anchor = %name, "ignoring reference to undefined anchor");
            return None;
        };

        active.push(name.to_string());
        let expanded = match self.expand(body, active) {
            Value::Mapping(map) => Some(map),
            _ => None,
        };
        active.pop();
        expanded
    }
}
