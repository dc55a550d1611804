//! Product labels arrive as two parallel arrays, `labelNames` and `labelCategories`,
//! aligned by index. They are paired once when a record is ingested, and everything
//! downstream works with the pairs.

use serde_json::Value;
use smallvec::SmallVec;

/// Category of a label that has a dedicated field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelCategory {
    Difficulty,
    ProductType,
}

impl LabelCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelCategory::Difficulty => "difficulty",
            LabelCategory::ProductType => "productType",
        }
    }
}

impl std::fmt::Display for LabelCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label<'a> {
    pub name: &'a str,
    pub category: &'a str,
}

/// Ordered `(name, category)` pairs of one product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet<'a> {
    labels: SmallVec<[Label<'a>; 4]>,
}

impl<'a> LabelSet<'a> {
    /// Pair names with categories by index. Pairing stops at the shorter sequence.
    pub fn pair<N, C>(names: N, categories: C) -> Self
    where
        N: IntoIterator<Item = &'a str>,
        C: IntoIterator<Item = &'a str>,
    {
        let labels = names
            .into_iter()
            .zip(categories)
            .map(|(name, category)| Label { name, category })
            .collect();
        Self { labels }
    }

    /// Pair the raw JSON arrays. Entries are zipped before non-string entries are
    /// dropped, so a bad entry never shifts the alignment of the ones after it.
    pub fn from_json(names: Option<&'a Value>, categories: Option<&'a Value>) -> Self {
        let (Some(Value::Array(names)), Some(Value::Array(categories))) = (names, categories)
        else {
            return Self::default();
        };

        let labels = names
            .iter()
            .zip(categories)
            .filter_map(|(name, category)| {
                Some(Label {
                    name: name.as_str()?,
                    category: category.as_str()?,
                })
            })
            .collect();
        Self { labels }
    }

    /// First label of the category, in original order.
    pub fn first(&self, category: LabelCategory) -> Option<&'a str> {
        self.first_in(category.as_str())
    }

    pub fn first_in(&self, category: &str) -> Option<&'a str> {
        self.labels
            .iter()
            .find(|label| label.category == category)
            .map(|label| label.name)
    }

    /// All labels of the category, in original order.
    pub fn of(&self, category: &'a str) -> impl Iterator<Item = &'a str> + '_ {
        self.labels
            .iter()
            .filter(move |label| label.category == category)
            .map(|label| label.name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label<'a>> {
        self.labels.iter()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// First name in `label_names` whose index-aligned entry in `label_categories` is
/// `category`, or `None`.
pub fn disambiguate<'a>(
    category: LabelCategory,
    label_names: &[&'a str],
    label_categories: &[&'a str],
) -> Option<&'a str> {
    LabelSet::pair(label_names.iter().copied(), label_categories.iter().copied()).first(category)
}
