use indexmap::IndexMap;
use log::{debug, trace};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::edit::{EditBinder, EditError, PartialUpdate};
use crate::field::{FieldDefinition, FieldType, Schema};
use crate::format::{DisplayValue, Presenter};
use crate::path::SourcePath;
use crate::record::Record;
use crate::resolve::resolve;
use crate::transform::{transform, PatternCache, Transformed};

/// Resolution engine: configuration plus the compiled pattern cache.
///
/// Every operation is a pure function of its inputs and the configuration. The cache
/// only saves recompilation and can be shared across threads.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    patterns: PatternCache,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let patterns = PatternCache::new(config.regex_size_limit);
        Self { config, patterns }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn patterns(&self) -> &PatternCache {
        &self.patterns
    }

    /// Detect the shape of a raw record.
    pub fn record<'a>(&self, raw: &'a Value) -> Option<Record<'a>> {
        Record::detect(raw, &self.config.external_envelope_keys)
    }

    pub fn resolve(&self, field: Option<&FieldDefinition>, raw: Option<&Value>) -> Option<Value> {
        let record = raw.and_then(|raw| self.record(raw));
        resolve(field, record.as_ref(), &self.config)
    }

    pub fn transform(&self, raw: Option<Value>, field: &FieldDefinition) -> Transformed {
        transform(raw, field, &self.patterns)
    }

    /// Resolve and transform one field of an already detected record.
    pub fn evaluate(&self, field: &FieldDefinition, record: Option<&Record>) -> Transformed {
        let raw = resolve(Some(field), record, &self.config);
        let transformed = transform(raw, field, &self.patterns);
        if let Some(sentinel) = transformed.sentinel() {
            debug!("Field `{}` degraded to `{sentinel}`", field.id);
        }
        transformed
    }

    /// Transformed value of the field `id`. An id missing from the schema yields an
    /// empty string, which presents as unset.
    pub fn field_value(&self, schema: &Schema, id: &str, raw: &Value) -> Transformed {
        let Some(field) = schema.field(id) else {
            trace!("Field `{id}` is not in the schema");
            return Transformed::Value(Some(Value::String(String::new())));
        };
        let record = self.record(raw);
        self.evaluate(field, record.as_ref())
    }

    pub fn presenter(&self) -> Presenter<'_> {
        Presenter::new(&self.config)
    }

    pub fn edit_binder(&self) -> EditBinder<'_> {
        EditBinder::new(&self.config)
    }

    /// Display value of every field in `fields`, keyed by id in the given order.
    /// The record shape is detected once for the whole pass.
    pub fn present<'f, I>(
        &self,
        fields: I,
        raw: &Value,
        presenter: &Presenter,
    ) -> IndexMap<String, DisplayValue>
    where
        I: IntoIterator<Item = &'f FieldDefinition>,
    {
        let record = self.record(raw);
        fields
            .into_iter()
            .map(|field| {
                let value = tag_array(field, record.as_ref())
                    .or_else(|| self.evaluate(field, record.as_ref()).into_value());
                (field.id.to_string(), presenter.format(value.as_ref(), field))
            })
            .collect()
    }

    /// [Engine::present] over the visible fields of the schema.
    pub fn present_visible(
        &self,
        schema: &Schema,
        raw: &Value,
        presenter: &Presenter,
    ) -> IndexMap<String, DisplayValue> {
        self.present(schema.visible(), raw, presenter)
    }

    /// Bind an edit after checking the schema allows it.
    pub fn bind_field_edit(
        &self,
        schema: &Schema,
        binder: &EditBinder,
        id: &str,
        new_value: Value,
    ) -> Result<PartialUpdate, EditError> {
        let field = schema
            .field(id)
            .ok_or_else(|| EditError::UnknownField(id.to_owned()))?;
        if !field.is_editable {
            return Err(EditError::NotEditable(id.to_owned()));
        }
        Ok(binder.bind_edit(id, new_value))
    }
}

/// Untransformed tag fields of external records are presented from the tag array
/// itself, so a tag containing the separator stays one tag.
fn tag_array(field: &FieldDefinition, record: Option<&Record>) -> Option<Value> {
    if field.ty != FieldType::Tags
        || field.transformation.is_some()
        || field.source_path != Some(SourcePath::Tags)
    {
        return None;
    }
    let record = record.filter(|record| record.is_external())?;
    match record.get("tags")? {
        Value::Array(items) if !items.is_empty() => Some(Value::Array(items.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::HashMap;

    use chrono::Datelike;
    use serde_json::json;

    use super::*;
    use crate::date;
    use crate::field::SchemaBuilder;
    use crate::transform::Sentinel;

    fn field(id: &str, ty: FieldType) -> FieldDefinition {
        FieldDefinition::new(id.parse().unwrap(), ty)
    }

    fn order_schema() -> Schema {
        Schema::from_yaml_str(crate::default_order_schema_yaml()).unwrap()
    }

    fn external_order() -> Value {
        json!({
            "name": "#1001",
            "note": "Order placed on 21/06/2025 for delivery",
            "tags": ["urgent", "fragile"],
            "lineItems": {"edges": [{"node": {
                "title": "Peony bouquet",
                "variant": {"title": "Large", "id": "gid://Variant/1"},
                "product": {"id": "gid://Product/9"}
            }}]},
            "localProduct": {
                "labelNames": ["Hard", "Bouquet"],
                "labelCategories": ["difficulty", "productType"]
            },
            "assignedTo": "u-7",
            "isCompleted": false,
            "customisations": "No lilies"
        })
    }

    #[test]
    fn scenario_day_first_extraction() {
        crate::init_log();
        let engine = Engine::default();
        let due = field("deliveryDate", FieldType::Date)
            .with_source_path("note")
            .with_extract(r"\d{2}/\d{2}/\d{4}");
        let record = json!({"note": "Order placed on 21/06/2025 for delivery"});

        let out = engine.transform(engine.resolve(Some(&due), Some(&record)), &due);
        let Transformed::Value(Some(Value::String(iso))) = &out else {
            panic!("expected an ISO date, got {out:?}");
        };
        let dt = date::parse_iso_instant(iso).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2025, 6, 21));
    }

    #[test]
    fn scenario_label_fields() {
        let engine = Engine::default();
        let schema = order_schema();
        let record = external_order();
        assert_eq!(
            engine.field_value(&schema, "difficultyLabel", &record),
            Transformed::Value(Some(json!("Hard")))
        );
        assert_eq!(
            engine.field_value(&schema, "productTypeLabel", &record),
            Transformed::Value(Some(json!("Bouquet")))
        );
    }

    #[test]
    fn scenario_malformed_rule() {
        let engine = Engine::default();
        let reference = field("reference", FieldType::Text).with_extract("([A-Z)");
        let record = json!({"reference": "ABC-1"});
        let out = engine.transform(engine.resolve(Some(&reference), Some(&record)), &reference);
        assert_eq!(out.sentinel(), Some(Sentinel::InvalidRegex));
        assert_eq!(out.into_value(), Some(json!("Invalid Regex")));
    }

    #[test]
    fn scenario_tags_on_both_shapes() {
        let engine = Engine::default();
        let tags = field("tags", FieldType::Tags).with_source_path("tags");

        let external = engine.resolve(Some(&tags), Some(&external_order()));
        assert_eq!(external, Some(json!("urgent, fragile")));

        let local = engine.resolve(Some(&tags), Some(&json!({"tags": "urgent, fragile"})));
        assert_eq!(local, Some(json!("urgent, fragile")));
    }

    #[test]
    fn plain_fields_are_identity() {
        let engine = Engine::default();
        let record = json!({"title": "Peonies", "count": 3, "flags": [true, null], "gone": null});
        for (id, ty) in [
            ("title", FieldType::Text),
            ("count", FieldType::Select),
            ("flags", FieldType::Tags),
            ("gone", FieldType::Date),
            ("absent", FieldType::Status),
        ] {
            let f = field(id, ty);
            assert_eq!(
                engine.transform(engine.resolve(Some(&f), Some(&record)), &f),
                Transformed::Value(record.get(id).cloned())
            );
        }
    }

    #[test]
    fn edits_round_trip_through_resolution() {
        let engine = Engine::default();
        let binder = engine.edit_binder();
        let mut entity = json!({"title": "Old", "assigned_to": "u-1"})
            .as_object()
            .unwrap()
            .clone();

        for (f, value) in [
            (field("title", FieldType::Text), json!("New")),
            (field("assignedTo", FieldType::Select), json!("u-2")),
            (field("isCompleted", FieldType::Status), json!(true)),
            (field("tags", FieldType::Tags), json!(["a", "a", "b"])),
        ] {
            binder
                .bind_edit(f.id.as_str(), value.clone())
                .merge_into(&mut entity);
            let merged = Value::Object(entity.clone());
            assert_eq!(engine.resolve(Some(&f), Some(&merged)), Some(value));
        }
    }

    #[test]
    fn missing_field_is_unset() {
        let engine = Engine::default();
        let schema = order_schema();
        let out = engine.field_value(&schema, "nope", &external_order());
        assert_eq!(out, Transformed::Value(Some(json!(""))));

        let value = out.into_value();
        let display = engine
            .presenter()
            .format(value.as_ref(), &field("nope", FieldType::Text));
        assert!(display.is_unset());
    }

    #[test]
    fn presents_default_schema_for_external_order() {
        crate::init_log();
        let engine = Engine::default();
        let schema = order_schema();
        let users: HashMap<String, String> = [("u-7".to_string(), "Ada".to_string())].into();
        let colors: HashMap<String, String> = [("Hard".to_string(), "red".to_string())].into();
        let presenter = engine
            .presenter()
            .with_users(&users)
            .with_label_colors(&colors);

        let shown = engine.present_visible(&schema, &external_order(), &presenter);
        let visible: Vec<&str> = schema.visible().map(|f| f.id.as_str()).collect();
        assert_eq!(shown.keys().map(String::as_str).collect::<Vec<_>>(), visible);

        assert_eq!(shown["orderName"].to_string(), "#1001");
        assert_eq!(shown["productTitle"].to_string(), "Peony bouquet");
        assert_eq!(shown["variantTitle"].to_string(), "Large");
        assert_eq!(shown["deliveryDate"].to_string(), "21 June 2025");
        assert_eq!(
            shown["tags"],
            DisplayValue::Tags {
                tags: vec!["urgent".into(), "fragile".into()]
            }
        );
        assert_eq!(
            shown["difficultyLabel"],
            DisplayValue::Label {
                text: "Hard".into(),
                color: "red".into()
            }
        );
        assert_eq!(shown["productTypeLabel"].to_string(), "Bouquet");
        assert_eq!(shown["assignedTo"].to_string(), "Ada");
        assert_eq!(shown["isCompleted"].to_string(), "Pending");
        assert_eq!(shown["customisations"].to_string(), "No lilies");
    }

    #[test]
    fn external_tags_containing_commas_stay_whole() {
        let engine = Engine::default();
        let schema = order_schema();
        let order = json!({"tags": ["Gift, wrapped", "urgent"], "lineItems": {"edges": []}});
        let shown = engine.present(&schema, &order, &engine.presenter());
        assert_eq!(
            shown["tags"],
            DisplayValue::Tags {
                tags: vec!["Gift, wrapped".into(), "urgent".into()]
            }
        );

        // The read path still yields the joined string.
        assert_eq!(
            engine.field_value(&schema, "tags", &order),
            Transformed::Value(Some(json!("Gift, wrapped, urgent")))
        );

        let empty = json!({"tags": [], "lineItems": {"edges": []}});
        let shown = engine.present(&schema, &empty, &engine.presenter());
        assert!(shown["tags"].is_unset());
    }

    #[test]
    fn presents_local_record_with_unset_values() {
        let engine = Engine::default();
        let schema = order_schema();
        let local = json!({"orderName": "#1002", "tags": "gift", "is_completed": true});
        let shown = engine.present(&schema, &local, &engine.presenter());

        assert_eq!(shown["orderName"].to_string(), "#1002");
        assert_eq!(shown["isCompleted"].to_string(), "Completed");
        assert_eq!(
            shown["tags"],
            DisplayValue::Tags {
                tags: vec!["gift".into()]
            }
        );
        assert!(shown["productTitle"].is_unset());
        assert!(shown["difficultyLabel"].is_unset());
        assert_eq!(shown["deliveryDate"].to_string(), "Not set");
    }

    #[test]
    fn one_bad_rule_degrades_one_field() {
        let engine = Engine::default();
        let mut builder = SchemaBuilder::default();
        builder
            .add_field(field("orderName", FieldType::Text).with_source_path("name"))
            .add_field(
                field("reference", FieldType::Text)
                    .with_source_path("note")
                    .with_extract("([A-Z)"),
            )
            .add_field(
                field("deliveryDate", FieldType::Date)
                    .with_source_path("note")
                    .with_extract(r"\d{4}-\d{2}-\d{2}"),
            );
        let schema = builder.build().unwrap();

        let shown = engine.present(&schema, &external_order(), &engine.presenter());
        assert_eq!(shown["orderName"].to_string(), "#1001");
        assert_eq!(shown["reference"].to_string(), "Invalid Regex");
        assert_eq!(shown["deliveryDate"].to_string(), "No match");
    }

    #[test]
    fn gated_edits() {
        let engine = Engine::default();
        let schema = order_schema();
        let notified = Cell::new(0);
        let listener = |_: &Value| notified.set(notified.get() + 1);
        let binder = engine.edit_binder().with_notes_listener(&listener);

        let update = engine
            .bind_field_edit(&schema, &binder, "customisations", json!("Ribbon: red"))
            .unwrap();
        assert_eq!(update.field(), "customisations");
        assert_eq!(notified.get(), 1);

        assert_eq!(
            engine.bind_field_edit(&schema, &binder, "orderName", json!("x")),
            Err(EditError::NotEditable("orderName".into()))
        );
        assert_eq!(
            engine.bind_field_edit(&schema, &binder, "nope", json!("x")),
            Err(EditError::UnknownField("nope".into()))
        );
        assert_eq!(notified.get(), 1);
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        let engine = Engine::default();
        let schema = order_schema();
        let record = external_order();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let shown = engine.present(&schema, &record, &engine.presenter());
                    assert_eq!(shown["deliveryDate"].to_string(), "21 June 2025");
                });
            }
        });
        assert_eq!(engine.patterns().len(), 1);
    }
}
