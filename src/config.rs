use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine settings. Every key is optional in the YAML file; missing keys take the
/// defaults below.
///
/// ```yaml
///     unsetPlaceholder: "—"
///     assignmentFields: [assignedTo, florist]
///     idAliases:
///       customisations: notes
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Placeholder shown for unset values.
    pub unset_placeholder: String,

    /// Color token used when a difficulty label has no color in the directory.
    pub neutral_color: String,

    /// `chrono` pattern used to render date fields. Month and weekday names are
    /// always English; tenants needing another language use numeric patterns such as
    /// `%d.%m.%Y`.
    pub date_display_format: String,

    /// Top-level keys whose presence marks a record as an external payload.
    pub external_envelope_keys: Vec<String>,

    /// Alternative storage keys tried when `record[id]` misses.
    pub id_aliases: HashMap<String, String>,

    /// Select fields whose value is a user identifier.
    pub assignment_fields: Vec<String>,

    /// Select fields whose value is a completion flag.
    pub completion_fields: Vec<String>,

    /// Fields whose edits are also sent to the notes side channel.
    pub notes_fields: Vec<String>,

    /// Fields whose value is a difficulty label with an associated color.
    pub difficulty_fields: Vec<String>,

    /// Compiled size limit for tenant-authored patterns, in bytes.
    pub regex_size_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unset_placeholder: "Not set".into(),
            neutral_color: "gray".into(),
            date_display_format: "%-d %B %Y".into(),
            external_envelope_keys: vec!["lineItems".into(), "localProduct".into()],
            id_aliases: HashMap::new(),
            assignment_fields: vec!["assignedTo".into()],
            completion_fields: vec!["isCompleted".into()],
            notes_fields: vec!["customisations".into()],
            difficulty_fields: vec!["difficultyLabel".into()],
            regex_size_limit: 1 << 20,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document is a valid config with every default.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn is_assignment(&self, id: &str) -> bool {
        self.assignment_fields.iter().any(|field| field == id)
    }

    pub fn is_completion(&self, id: &str) -> bool {
        self.completion_fields.iter().any(|field| field == id)
    }

    pub fn is_notes(&self, id: &str) -> bool {
        self.notes_fields.iter().any(|field| field == id)
    }

    pub fn is_difficulty(&self, id: &str) -> bool {
        self.difficulty_fields.iter().any(|field| field == id)
    }

    /// Keys to try, in order, when `record[id]` misses: the configured alias first,
    /// then the camelCase/snake_case counterpart of the id.
    pub fn synonyms(&self, id: &str) -> Vec<String> {
        let mut synonyms = Vec::with_capacity(2);
        if let Some(alias) = self.id_aliases.get(id) {
            synonyms.push(alias.clone());
        }
        if let Some(other_case) = case_counterpart(id) {
            if !synonyms.contains(&other_case) {
                synonyms.push(other_case);
            }
        }
        synonyms
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Engine configuration YAML is invalid. {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("IO error occurred while loading the engine configuration. {0}")]
    Io(#[from] std::io::Error),
}

/// `assigned_to` -> `assignedTo`, `assignedTo` -> `assigned_to`.
/// Ids with neither underscores nor uppercase letters have no counterpart.
fn case_counterpart(id: &str) -> Option<String> {
    if id.contains('_') {
        let mut out = String::with_capacity(id.len());
        let mut upper_next = false;
        for c in id.chars() {
            if c == '_' {
                upper_next = !out.is_empty();
            } else if upper_next {
                out.extend(c.to_uppercase());
                upper_next = false;
            } else {
                out.push(c);
            }
        }
        (out != id).then_some(out)
    } else if id.chars().any(|c| c.is_uppercase()) {
        let mut out = String::with_capacity(id.len() + 4);
        for (idx, c) in id.chars().enumerate() {
            if c.is_uppercase() {
                if idx > 0 {
                    out.push('_');
                }
                out.extend(c.to_lowercase());
            } else {
                out.push(c);
            }
        }
        Some(out)
    } else {
        None
    }
}
