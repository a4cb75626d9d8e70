use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Starting price in the studio's currency.
    #[serde(default)]
    pub price_from: Option<f64>,
    #[serde(default = "default_active", deserialize_with = "null_as_active")]
    pub active: bool,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub sort_order: i32,
}

fn default_active() -> bool {
    true
}

fn null_as_active<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_else(default_active))
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct NewService {
    #[validate(length(min = 1, max = 120, message = "Name is required (max 120 characters)"))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price_from: Option<f64>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct ServicePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub price_from: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
}

impl ServicePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price_from.is_none()
            && self.active.is_none()
            && self.sort_order.is_none()
    }
}
