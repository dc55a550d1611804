use log::trace;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::field::FieldDefinition;
use crate::label::LabelCategory;
use crate::path::{ProductProperty, SourcePath};
use crate::record::{ExternalOrder, Record};

/// Separator used when a tag sequence is read as a single value.
pub const TAG_SEPARATOR: &str = ", ";

/// Locate the raw value of `field` in `record`.
///
/// `None` means "not set": the record or definition is absent, or the path does not
/// resolve. `Some(Value::Null)` is a value that is present and null. Never panics.
pub fn resolve(
    field: Option<&FieldDefinition>,
    record: Option<&Record>,
    config: &EngineConfig,
) -> Option<Value> {
    let (field, record) = (field?, record?);

    let value = match &field.source_path {
        None => by_id(field.id.as_str(), record, config),
        Some(SourcePath::Product(prop)) => match record {
            Record::External(order) => product_value(order, prop),
            Record::Local(_) => None,
        },
        Some(SourcePath::Tags) => record.get("tags").map(joined_tags),
        Some(SourcePath::LineItem(prop)) => match record {
            Record::External(order) => order.line_item(*prop).cloned(),
            Record::Local(_) => None,
        },
        Some(SourcePath::Property(name)) => match record.get(name) {
            Some(value) => Some(value.clone()),
            // Local entities store values under the field id.
            None if !record.is_external() => by_id(field.id.as_str(), record, config),
            None => None,
        },
    };

    trace!("Resolved `{}`: {value:?}", field.id);
    value
}

fn by_id(id: &str, record: &Record, config: &EngineConfig) -> Option<Value> {
    if let Some(value) = record.get(id) {
        return Some(value.clone());
    }
    config
        .synonyms(id)
        .iter()
        .find_map(|key| record.get(key))
        .cloned()
}

fn product_value(order: &ExternalOrder, prop: &ProductProperty) -> Option<Value> {
    let product = order.local_product()?;
    match prop {
        ProductProperty::LabelNames => match product.get("labelNames")? {
            Value::Array(names) => Some(names.first().cloned().unwrap_or(Value::Null)),
            other => Some(other.clone()),
        },
        ProductProperty::DifficultyLabel => Some(label_value(order, LabelCategory::Difficulty)),
        ProductProperty::ProductTypeLabel => {
            Some(label_value(order, LabelCategory::ProductType))
        }
        ProductProperty::Other(name) => product.get(name).cloned(),
    }
}

fn label_value(order: &ExternalOrder, category: LabelCategory) -> Value {
    order
        .labels()
        .first(category)
        .map_or(Value::Null, |name| Value::String(name.to_owned()))
}

/// Arrays are joined in order; anything else is passed through.
fn joined_tags(tags: &Value) -> Value {
    let Value::Array(items) = tags else {
        return tags.clone();
    };

    let joined = items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(TAG_SEPARATOR);
    Value::String(joined)
}
