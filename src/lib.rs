//! Fieldwork is a declarative, schema-driven layer that turns order-like records into
//! display values, and user edits back into partial updates.
//!
//! A tenant configures an ordered list of field definitions. For each field the engine
//! resolves a raw value from the right place in the record, optionally rewrites it with
//! a tenant-authored extraction rule, and formats it according to the field's type.
//! Editable fields get the opposite path: a new value becomes a single-key update that
//! the persistence layer merges into the stored entity.
//!
//! # Records
//! Two record shapes are supported and never mixed within one resolution:
//! - local entities, flat maps keyed by field id;
//! - external payloads imported from a commerce platform, with a `lineItems` edge list,
//!   a `tags` sequence and a `localProduct` carrying parallel `labelNames` and
//!   `labelCategories` arrays.
//!
//! The shape is detected once per record by the presence of an external-only envelope
//! key. Product labels are paired by index at that moment, so nothing downstream reads
//! the two arrays separately.
//!
//! # Rules Are Data
//! Extraction rules are regular expressions written by tenants, not by engineers. A rule
//! that does not compile, does not match, or extracts something that is not a date for a
//! date field degrades that one field to a visible sentinel (`Invalid Regex`,
//! `No match`, `Invalid Date`). Nothing on the read path panics or returns an error.
//!
//! # Collaborators
//! The engine owns no storage, no sessions and no UI. A user directory, a label color
//! directory and a notes listener may be supplied by the caller; each is optional and
//! the engine falls back to raw identifiers, a neutral color, or no notification.
//!
//! ```
//! use fieldwork::{Engine, Schema};
//! use serde_json::json;
//!
//! let engine = Engine::default();
//! let schema = Schema::from_yaml_str(fieldwork::default_order_schema_yaml()).unwrap();
//! let order = json!({
//!     "name": "#1001",
//!     "note": "Order placed on 21/06/2025 for delivery",
//!     "tags": ["urgent", "fragile"],
//!     "lineItems": {"edges": []},
//! });
//!
//! let shown = engine.present_visible(&schema, &order, &engine.presenter());
//! assert_eq!(shown["deliveryDate"].to_string(), "21 June 2025");
//! assert_eq!(shown["tags"].to_string(), "urgent, fragile");
//! ```

/// Engine settings loaded from YAML.
pub mod config;

/// Date parsing for extracted values and the ISO-8601 instant form they are stored in.
pub mod date;

/// Edit path: user values to partial updates.
pub mod edit;

/// Facade that runs resolution, transformation and formatting for a schema.
pub mod engine;

/// Field definitions and schemas.
pub mod field;

/// Presentation of transformed values.
pub mod format;

/// Pairing of parallel label arrays.
pub mod label;

/// Parsing of source paths.
pub mod path;

/// Record shape detection.
pub mod record;

/// Location of raw values in records.
pub mod resolve;

/// Extraction rules and type coercion.
pub mod transform;

pub use config::{ConfigError, EngineConfig};
pub use edit::{EditBinder, EditError, NotesListener, PartialUpdate};
pub use engine::Engine;
pub use field::{
    FieldDefinition, FieldId, FieldType, Schema, SchemaBuilder, SchemaError, Transformation,
};
pub use format::{Completion, DisplayValue, LabelColors, Presenter, UserDirectory};
pub use label::{disambiguate, LabelCategory, LabelSet};
pub use path::SourcePath;
pub use record::Record;
pub use transform::{PatternCache, Sentinel, Transformed};

#[cfg(test)]
pub fn init_log() {
    use log::{LevelFilter, Record};

    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        flexi_logger::Logger::with(LevelFilter::Trace)
            .format(format)
            .start()
            .map(std::mem::forget)
            .unwrap();
    });

    fn format(
        write: &mut dyn std::io::Write,
        _: &mut flexi_logger::DeferredNow,
        record: &Record,
    ) -> std::io::Result<()> {
        write.write_all(
            format!(
                "[{} {}:{}] {} - {}",
                record.level(),
                record.file().unwrap_or_default(),
                record.line().unwrap_or_default(),
                record.module_path().unwrap_or_default(),
                record.args()
            )
            .as_bytes(),
        )
    }
}

/// Default order view schema. Tenants without a custom schema get this one, and tests
/// use it as a realistic fixture.
pub fn default_order_schema_yaml() -> &'static str {
    include_str!("core/order_fields.yaml")
}
