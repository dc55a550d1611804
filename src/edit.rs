use log::{debug, trace};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::EngineConfig;

/// Receives the new value of the notes field in addition to the generic update.
pub trait NotesListener {
    fn notes_changed(&self, value: &Value);
}

impl<F: Fn(&Value)> NotesListener for F {
    fn notes_changed(&self, value: &Value) {
        self(value)
    }
}

/// Single-field delta for the persistence layer to merge into the stored entity.
/// Serializes as `{ "<field>": <value> }`.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialUpdate {
    field: String,
    value: Value,
}

impl PartialUpdate {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_parts(self) -> (String, Value) {
        (self.field, self.value)
    }

    pub fn into_map(self) -> Map<String, Value> {
        let mut map = Map::with_capacity(1);
        map.insert(self.field, self.value);
        map
    }

    /// Apply onto a local entity, replacing any previous value of the field.
    pub fn merge_into(&self, entity: &mut Map<String, Value>) {
        entity.insert(self.field.clone(), self.value.clone());
    }
}

impl Serialize for PartialUpdate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.field, &self.value)?;
        map.end()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("Field `{0}` is not defined in the schema")]
    UnknownField(String),

    #[error("Field `{0}` is not editable")]
    NotEditable(String),
}

/// Turns user-entered values into partial updates.
///
/// Values are not validated against the field type here; that is left to the
/// persistence collaborator.
#[derive(Clone, Copy)]
pub struct EditBinder<'a> {
    config: &'a EngineConfig,
    notes: Option<&'a dyn NotesListener>,
}

impl<'a> EditBinder<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            notes: None,
        }
    }

    pub fn with_notes_listener(mut self, listener: &'a dyn NotesListener) -> Self {
        self.notes = Some(listener);
        self
    }

    /// `{ field_id: new_value }`. Edits of the notes field are also sent to the notes
    /// listener, if there is one.
    pub fn bind_edit(&self, field_id: &str, new_value: Value) -> PartialUpdate {
        if self.config.is_notes(field_id) {
            match self.notes {
                Some(listener) => {
                    debug!("Notifying notes listener of `{field_id}` edit");
                    listener.notes_changed(&new_value);
                }
                None => trace!("No notes listener for `{field_id}` edit"),
            }
        }

        PartialUpdate {
            field: field_id.to_owned(),
            value: new_value,
        }
    }
}

impl std::fmt::Debug for EditBinder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditBinder")
            .field("notes", &self.notes.is_some())
            .finish()
    }
}
