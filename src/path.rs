use log::trace;
use logos::Logos;
use smallvec::SmallVec;

/// Parsed locator of a raw value inside a record.
///
/// Source paths are authored as plain strings in the schema:
/// ```yaml
///     sourcePath: "product:difficultyLabel"
///     sourcePath: "line_items.variant_title"
///     sourcePath: "tags"
///     sourcePath: "shippingAddress"
/// ```
/// Parsing never fails. Anything that is not one of the recognized forms is a
/// direct property name on the payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourcePath {
    /// `product:<property>`, read from the `localProduct` sub-object.
    Product(ProductProperty),

    /// `tags`, the ordered tag sequence.
    Tags,

    /// `line_items.<property>`, read from the first line item edge.
    LineItem(LineItemProperty),

    /// Any other property, read directly from the payload.
    Property(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProductProperty {
    /// First entry of `labelNames`.
    LabelNames,

    /// First label whose aligned category is `difficulty`.
    DifficultyLabel,

    /// First label whose aligned category is `productType`.
    ProductTypeLabel,

    /// Literal property of `localProduct`.
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineItemProperty {
    /// `node.title`
    Title,

    /// `node.variant.title`
    VariantTitle,

    /// `node.product.id`
    ProductId,

    /// `node.variant.id`
    VariantId,
}

#[derive(Logos, Debug, Clone, PartialEq)]
enum PathLex {
    #[token("product:", priority = 100)]
    ProductPrefix,

    #[token("line_items.", priority = 100)]
    LineItemsPrefix,

    #[regex(r"[^ \t\r\n:.]+", |lex| lex.slice().to_owned())]
    Segment(String),

    #[token(".")]
    Dot,

    #[token(":")]
    Colon,
}

impl SourcePath {
    pub fn parse(raw: &str) -> Self {
        let tokens: Result<SmallVec<[PathLex; 3]>, _> = PathLex::lexer(raw).collect();
        let tokens = match tokens {
            Ok(tokens) => tokens,
            Err(_) => {
                trace!("Source path `{raw}` is not lexable, reading it as a property");
                return SourcePath::Property(raw.to_owned());
            }
        };

        use PathLex::*;
        let path = match tokens.as_slice() {
            [ProductPrefix, Segment(prop)] => SourcePath::Product(ProductProperty::from(prop.as_str())),
            [LineItemsPrefix, Segment(prop)] => match LineItemProperty::from_segment(prop) {
                Some(prop) => SourcePath::LineItem(prop),
                None => SourcePath::Property(raw.to_owned()),
            },
            [Segment(name)] if name == "tags" => SourcePath::Tags,
            _ => SourcePath::Property(raw.to_owned()),
        };
        trace!("Source path `{raw}` parsed as {path:?}");
        path
    }
}

impl From<&str> for ProductProperty {
    fn from(prop: &str) -> Self {
        match prop {
            "labelNames" => ProductProperty::LabelNames,
            "difficultyLabel" => ProductProperty::DifficultyLabel,
            "productTypeLabel" => ProductProperty::ProductTypeLabel,
            other => ProductProperty::Other(other.to_owned()),
        }
    }
}

impl ProductProperty {
    pub fn as_str(&self) -> &str {
        match self {
            ProductProperty::LabelNames => "labelNames",
            ProductProperty::DifficultyLabel => "difficultyLabel",
            ProductProperty::ProductTypeLabel => "productTypeLabel",
            ProductProperty::Other(prop) => prop,
        }
    }
}

impl LineItemProperty {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "title" => Some(LineItemProperty::Title),
            "variant_title" => Some(LineItemProperty::VariantTitle),
            "product_id" => Some(LineItemProperty::ProductId),
            "variant_id" => Some(LineItemProperty::VariantId),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LineItemProperty::Title => "title",
            LineItemProperty::VariantTitle => "variant_title",
            LineItemProperty::ProductId => "product_id",
            LineItemProperty::VariantId => "variant_id",
        }
    }
}

impl std::fmt::Display for SourcePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourcePath::Product(prop) => write!(f, "product:{}", prop.as_str()),
            SourcePath::Tags => f.write_str("tags"),
            SourcePath::LineItem(prop) => write!(f, "line_items.{}", prop.as_str()),
            SourcePath::Property(name) => f.write_str(name),
        }
    }
}

impl serde::Serialize for SourcePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for SourcePath {
    fn deserialize<D>(deserializer: D) -> Result<SourcePath, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(SourcePath::parse(&raw))
    }
}
