use log::debug;
use serde_json::{Map, Value};

use crate::label::LabelSet;
use crate::path::LineItemProperty;

/// A raw record in one of its two shapes. The shape is detected once per record and
/// never mixed within a single resolution.
#[derive(Debug, Clone)]
pub enum Record<'a> {
    /// Flat, locally-owned entity keyed by field id.
    Local(&'a Map<String, Value>),

    /// Nested payload imported from the external commerce platform.
    External(ExternalOrder<'a>),
}

impl<'a> Record<'a> {
    /// Detect the shape of `value` by the presence of any of the external-only
    /// envelope keys. Anything that is not an object is no record at all.
    pub fn detect<S: AsRef<str>>(value: &'a Value, envelope_keys: &[S]) -> Option<Self> {
        let Value::Object(map) = value else {
            debug!("Record is not an object, treating it as absent");
            return None;
        };

        let external = envelope_keys
            .iter()
            .any(|key| map.contains_key(key.as_ref()));
        if external {
            debug!("Record detected as external payload");
            Some(Record::External(ExternalOrder::ingest(map)))
        } else {
            debug!("Record detected as local entity");
            Some(Record::Local(map))
        }
    }

    /// Top-level property of the record.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.map().get(key)
    }

    pub fn map(&self) -> &'a Map<String, Value> {
        match self {
            Record::Local(map) => *map,
            Record::External(order) => order.payload,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Record::External(_))
    }
}

/// External payload with its product labels already paired.
#[derive(Debug, Clone)]
pub struct ExternalOrder<'a> {
    payload: &'a Map<String, Value>,
    local_product: Option<&'a Map<String, Value>>,
    labels: LabelSet<'a>,
}

impl<'a> ExternalOrder<'a> {
    pub fn ingest(payload: &'a Map<String, Value>) -> Self {
        let local_product = payload.get("localProduct").and_then(Value::as_object);
        let labels = local_product
            .map(|product| {
                LabelSet::from_json(product.get("labelNames"), product.get("labelCategories"))
            })
            .unwrap_or_default();

        Self {
            payload,
            local_product,
            labels,
        }
    }

    pub fn payload(&self) -> &'a Map<String, Value> {
        self.payload
    }

    pub fn local_product(&self) -> Option<&'a Map<String, Value>> {
        self.local_product
    }

    pub fn labels(&self) -> &LabelSet<'a> {
        &self.labels
    }

    /// Node of the first `lineItems` edge. Accepts both `{"edges": [...]}` and a bare
    /// edge array.
    pub fn first_line_item(&self) -> Option<&'a Value> {
        let line_items = self.payload.get("lineItems")?;
        let edges = match line_items {
            Value::Object(connection) => connection.get("edges")?.as_array()?,
            Value::Array(edges) => edges,
            _ => return None,
        };
        edges.first()?.get("node")
    }

    pub fn line_item(&self, prop: LineItemProperty) -> Option<&'a Value> {
        let node = self.first_line_item()?;
        match prop {
            LineItemProperty::Title => node.get("title"),
            LineItemProperty::VariantTitle => node.get("variant")?.get("title"),
            LineItemProperty::ProductId => node.get("product")?.get("id"),
            LineItemProperty::VariantId => node.get("variant")?.get("id"),
        }
    }
}
