use std::path::Path;

use lazy_regex::regex_is_match;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path::SourcePath;

/// Schema is the ordered list of field definitions that applies to one tenant view.
///
/// It is supplied by the schema store and is never mutated by the engine. Order is
/// significant: it is the order in which values are presented.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Schema {
    fields: Vec<FieldDefinition>,
}

impl Schema {
    pub fn field(&self, id: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.id == id)
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldDefinition> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields marked as visible, in schema order.
    pub fn visible(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|field| field.is_visible)
    }

    /// Fields that accept edits, in schema order.
    pub fn editable(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|field| field.is_editable)
    }

    /// Load a schema from YAML of the form `fields: [...]`.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SchemaError> {
        let file: SchemaFile = serde_yml::from_str(yaml)?;
        Self::from_fields(file.fields)
    }

    /// Load a schema from a JSON array of field definitions, as served by the schema store.
    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let fields: Vec<FieldDefinition> = serde_json::from_str(json)?;
        Self::from_fields(fields)
    }

    pub fn load_yaml(path: &Path) -> Result<Self, SchemaError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    fn from_fields(fields: Vec<FieldDefinition>) -> Result<Self, SchemaError> {
        let mut builder = SchemaBuilder::with_capacity(fields.len());
        for field in fields {
            builder.add_field(field);
        }
        builder.build()
    }

    /// Report definitions that are accepted but cannot work as written. These are
    /// not errors: the transformation pipeline degrades them to sentinels at render time.
    pub fn lint(&self) -> Vec<SchemaWarning> {
        let mut warnings = Vec::new();
        for field in &self.fields {
            match (field.transformation, field.rule()) {
                (Some(Transformation::Extract), None) => {
                    warnings.push(SchemaWarning::MissingRule(field.id.clone()));
                }
                (None, Some(_)) => {
                    warnings.push(SchemaWarning::UnusedRule(field.id.clone()));
                }
                _ => {}
            }
        }
        warnings
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a FieldDefinition;
    type IntoIter = std::slice::Iter<'a, FieldDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[derive(Deserialize)]
struct SchemaFile {
    #[serde(default)]
    fields: Vec<FieldDefinition>,
}

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: Vec<FieldDefinition>,
}

impl SchemaBuilder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    pub fn add_field(&mut self, field: FieldDefinition) -> &mut Self {
        self.fields.push(field);
        self
    }

    /// Check that ids are unique and build the schema, keeping insertion order.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut duplicated: Vec<FieldId> = Vec::new();
        for (idx, field) in self.fields.iter().enumerate() {
            let seen_before = self.fields[..idx].iter().any(|other| other.id == field.id);
            if seen_before && !duplicated.contains(&field.id) {
                duplicated.push(field.id.clone());
            }
        }

        if !duplicated.is_empty() {
            warn!("Schema rejected, duplicated field ids: {duplicated:?}");
            return Err(SchemaError::DuplicatedFields(duplicated));
        }

        debug!("Schema built with {} fields", self.fields.len());
        Ok(Schema {
            fields: self.fields,
        })
    }
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error(
        "Duplicated field ids found in the schema: {}",
        .0.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ")
    )]
    DuplicatedFields(Vec<FieldId>),

    #[error("Schema YAML could not be read. {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("Schema JSON could not be read. {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error occurred while loading the schema. {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaWarning {
    /// Field declares `extract` but carries no usable rule.
    MissingRule(FieldId),

    /// Field carries a rule but declares no transformation, so the rule is ignored.
    UnusedRule(FieldId),
}

impl std::fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaWarning::MissingRule(id) => {
                write!(f, "field `{id}` declares extraction without a rule")
            }
            SchemaWarning::UnusedRule(id) => {
                write!(f, "field `{id}` has a rule but no transformation")
            }
        }
    }
}

/// Declarative description of one logical field: where to find it, how to rewrite it
/// and how to present it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: FieldId,

    /// Caption for the presentation layer. Opaque to the engine.
    #[serde(default)]
    pub label: String,

    #[serde(rename = "type", default)]
    pub ty: FieldType,

    /// Location of the raw value in an external payload. `None` reads `record[id]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<SourcePath>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<Transformation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation_rule: Option<String>,

    #[serde(default)]
    pub is_editable: bool,

    #[serde(default = "default_visible")]
    pub is_visible: bool,
}

fn default_visible() -> bool {
    true
}

impl FieldDefinition {
    pub fn new(id: FieldId, ty: FieldType) -> Self {
        Self {
            label: id.to_string(),
            id,
            ty,
            source_path: None,
            transformation: None,
            transformation_rule: None,
            is_editable: false,
            is_visible: true,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_source_path(mut self, path: &str) -> Self {
        self.source_path = Some(SourcePath::parse(path));
        self
    }

    pub fn with_extract(mut self, rule: impl Into<String>) -> Self {
        self.transformation = Some(Transformation::Extract);
        self.transformation_rule = Some(rule.into());
        self
    }

    pub fn editable(mut self, editable: bool) -> Self {
        self.is_editable = editable;
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.is_visible = visible;
        self
    }

    /// Transformation rule, if present and non-blank.
    pub fn rule(&self) -> Option<&str> {
        self.transformation_rule
            .as_deref()
            .filter(|rule| !rule.trim().is_empty())
    }
}

/// Semantic type of a field. Governs coercion and default formatting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Select,
    Textarea,
    Date,
    Tags,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transformation {
    /// Replace the raw string with the first match of the field's rule.
    Extract,
}

#[derive(Debug, Error)]
#[error("Invalid field id: {0:?}")]
pub struct InvalidFieldId(String);

/// Identifier of a field, unique within a schema. Also the default storage key.
///
/// Tenants choose ids freely; only empty ids and ids with surrounding whitespace
/// are refused.
#[derive(Clone, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[repr(transparent)]
pub struct FieldId(String);

impl FieldId {
    pub fn new(id: String) -> Result<Self, InvalidFieldId> {
        if regex_is_match!(r"^\S(?:.*\S)?$"s, &id) {
            Ok(Self(id))
        } else {
            Err(InvalidFieldId(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FieldId {
    type Error = InvalidFieldId;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        FieldId::new(id)
    }
}

impl From<FieldId> for String {
    fn from(id: FieldId) -> String {
        id.0
    }
}

impl AsRef<str> for FieldId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Debug for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for FieldId {
    type Err = InvalidFieldId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldId::new(s.to_string())
    }
}

impl std::borrow::Borrow<str> for FieldId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for FieldId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: AsRef<str>> std::cmp::PartialEq<T> for FieldId {
    fn eq(&self, other: &T) -> bool {
        self.0 == other.as_ref()
    }
}
