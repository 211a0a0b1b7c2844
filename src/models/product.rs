use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Catalog record as held in the item store.
///
/// Only `id` is guaranteed. The well-known attributes are typed, everything
/// else the import wrote is carried through untouched in `attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Product {
    /// Create a product carrying only its identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            author: None,
            price: None,
            image_url: None,
            category_id: None,
            attributes: Map::new(),
        }
    }

    /// Convenience constructor for a fully described book
    pub fn book(
        id: impl Into<String>,
        name: impl Into<String>,
        author: impl Into<String>,
        price: Decimal,
        image_url: impl Into<String>,
        category_id: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            author: Some(author.into()),
            price: Some(price),
            image_url: Some(image_url.into()),
            category_id: Some(category_id.into()),
            ..Self::new(id)
        }
    }

    /// Build a product from loosely typed attributes.
    ///
    /// A well-known attribute is lifted into its typed field only when it has
    /// the expected shape. Anything else stays in `attributes` unchanged.
    pub fn from_attributes(id: impl Into<String>, mut attributes: Map<String, Value>) -> Self {
        let name = take_string(&mut attributes, "name");
        let author = take_string(&mut attributes, "author");
        let image_url = take_string(&mut attributes, "imageUrl");
        let category_id = take_string(&mut attributes, "categoryId");
        let price = take_price(&mut attributes);

        Self {
            id: id.into(),
            name,
            author,
            price,
            image_url,
            category_id,
            attributes,
        }
    }

    pub fn in_category(&self, category_id: &str) -> bool {
        self.category_id.as_deref() == Some(category_id)
    }
}

fn take_string(attributes: &mut Map<String, Value>, name: &str) -> Option<String> {
    if !attributes.get(name)?.is_string() {
        return None;
    }
    match attributes.remove(name)? {
        Value::String(value) => Some(value),
        _ => None,
    }
}

fn take_price(attributes: &mut Map<String, Value>) -> Option<Decimal> {
    let price = match attributes.get("price")? {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }?;
    attributes.remove("price");
    Some(price)
}

/// Exact decimal from number text, including exponent notation
pub(crate) fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}
