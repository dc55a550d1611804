use std::collections::HashMap;
use std::fmt::Write;
use std::hash::BuildHasher;

use log::{trace, warn};
use serde::Serialize;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::date;
use crate::field::{FieldDefinition, FieldType};

/// Looks up a user's display name by identifier.
pub trait UserDirectory {
    fn display_name(&self, id: &str) -> Option<String>;
}

/// Looks up the color token of a label by its exact name.
pub trait LabelColors {
    fn color_of(&self, name: &str) -> Option<String>;
}

impl<S: BuildHasher> UserDirectory for HashMap<String, String, S> {
    fn display_name(&self, id: &str) -> Option<String> {
        self.get(id).cloned()
    }
}

impl<S: BuildHasher> LabelColors for HashMap<String, String, S> {
    fn color_of(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Two-state caption of status and completion fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Completion {
    Pending,
    Completed,
}

impl Completion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Completion::Pending => "Pending",
            Completion::Completed => "Completed",
        }
    }

    /// Booleans, their string forms, and the captions themselves.
    fn from_value(value: &Value) -> Option<Self> {
        let done = match value {
            Value::Bool(done) => *done,
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "completed" => true,
                "false" | "pending" => false,
                _ => return None,
            },
            _ => return None,
        };
        Some(Completion::from(done))
    }
}

impl From<bool> for Completion {
    fn from(done: bool) -> Self {
        if done {
            Completion::Completed
        } else {
            Completion::Pending
        }
    }
}

/// Presentation form of a value, independent of any UI toolkit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DisplayValue {
    /// No value. Rendered with the configured placeholder.
    Unset { placeholder: String },

    Text { text: String },

    /// Multi-line text with whitespace kept as is.
    MultiLine { text: String },

    /// Calendar rendering of an instant, or the raw text if it did not parse.
    Date { text: String },

    /// One badge per tag, order and duplicates kept.
    Tags { tags: Vec<String> },

    Caption { caption: Completion },

    /// Assigned user. `name` falls back to the identifier.
    Person { id: String, name: String },

    /// Difficulty label with its color.
    Label { text: String, color: String },
}

impl DisplayValue {
    pub fn is_unset(&self) -> bool {
        matches!(self, DisplayValue::Unset { .. })
    }

    /// Value that formats back to this display value through the same field.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            DisplayValue::Unset { .. } => None,
            DisplayValue::Text { text }
            | DisplayValue::MultiLine { text }
            | DisplayValue::Date { text }
            | DisplayValue::Label { text, .. } => Some(Value::String(text.clone())),
            DisplayValue::Tags { tags } => Some(Value::Array(
                tags.iter().cloned().map(Value::String).collect(),
            )),
            DisplayValue::Caption { caption } => Some(Value::String(caption.as_str().to_owned())),
            DisplayValue::Person { id, .. } => Some(Value::String(id.clone())),
        }
    }
}

impl std::fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayValue::Unset { placeholder } => f.write_str(placeholder),
            DisplayValue::Text { text }
            | DisplayValue::MultiLine { text }
            | DisplayValue::Date { text }
            | DisplayValue::Label { text, .. } => f.write_str(text),
            DisplayValue::Tags { tags } => f.write_str(&tags.join(", ")),
            DisplayValue::Caption { caption } => f.write_str(caption.as_str()),
            DisplayValue::Person { name, .. } => f.write_str(name),
        }
    }
}

/// Maps transformed values to [DisplayValue]s. Collaborator directories are optional;
/// without them identifiers are shown raw and labels get the neutral color.
#[derive(Clone, Copy)]
pub struct Presenter<'a> {
    config: &'a EngineConfig,
    users: Option<&'a dyn UserDirectory>,
    colors: Option<&'a dyn LabelColors>,
}

impl<'a> Presenter<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            users: None,
            colors: None,
        }
    }

    pub fn with_users(mut self, users: &'a dyn UserDirectory) -> Self {
        self.users = Some(users);
        self
    }

    pub fn with_label_colors(mut self, colors: &'a dyn LabelColors) -> Self {
        self.colors = Some(colors);
        self
    }

    pub fn format(&self, value: Option<&Value>, field: &FieldDefinition) -> DisplayValue {
        let value = match value {
            None | Some(Value::Null) => return self.unset(),
            Some(Value::String(s)) if s.is_empty() => return self.unset(),
            Some(value) => value,
        };
        let id = field.id.as_str();

        let display = match field.ty {
            FieldType::Select if self.config.is_assignment(id) => self.person(value),
            FieldType::Select | FieldType::Status if self.is_two_state(field) => {
                match Completion::from_value(value) {
                    Some(caption) => DisplayValue::Caption { caption },
                    None => self.text(field, value),
                }
            }
            FieldType::Textarea => DisplayValue::MultiLine {
                text: stringify(value),
            },
            FieldType::Date => self.date(value),
            FieldType::Tags => DisplayValue::Tags {
                tags: tag_list(value),
            },
            _ => self.text(field, value),
        };
        trace!("Formatted `{id}` as {display:?}");
        display
    }

    fn is_two_state(&self, field: &FieldDefinition) -> bool {
        field.ty == FieldType::Status || self.config.is_completion(field.id.as_str())
    }

    fn unset(&self) -> DisplayValue {
        DisplayValue::Unset {
            placeholder: self.config.unset_placeholder.clone(),
        }
    }

    fn person(&self, value: &Value) -> DisplayValue {
        let id = stringify(value);
        let name = self
            .users
            .and_then(|users| users.display_name(&id))
            .unwrap_or_else(|| id.clone());
        DisplayValue::Person { id, name }
    }

    fn date(&self, value: &Value) -> DisplayValue {
        let raw = stringify(value);
        let Some(dt) = date::parse_iso_instant(&raw) else {
            return DisplayValue::Date { text: raw };
        };

        // A malformed display pattern surfaces as a fmt error, not a panic.
        let mut text = String::new();
        match write!(text, "{}", dt.format(&self.config.date_display_format)) {
            Ok(()) => DisplayValue::Date { text },
            Err(_) => {
                warn!(
                    "Date display format `{}` is invalid",
                    self.config.date_display_format
                );
                DisplayValue::Date { text: raw }
            }
        }
    }

    fn text(&self, field: &FieldDefinition, value: &Value) -> DisplayValue {
        let text = stringify(value);
        if !self.config.is_difficulty(field.id.as_str()) {
            return DisplayValue::Text { text };
        }
        let color = self
            .colors
            .and_then(|colors| colors.color_of(&text))
            .unwrap_or_else(|| self.config.neutral_color.clone());
        DisplayValue::Label { text, color }
    }
}

impl std::fmt::Debug for Presenter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Presenter")
            .field("users", &self.users.is_some())
            .field("colors", &self.colors.is_some())
            .finish()
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// Arrays keep their order; a joined string is split back on commas.
fn tag_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(stringify).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_owned)
            .collect(),
        other => vec![stringify(other)],
    }
}
