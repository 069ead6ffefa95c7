//! Typed payload blocks stored on stages and templates
//!
//! Stage instances carry several JSON columns (checklist state, custom field
//! values, distribution data, ...). Each column has a concrete type here and is
//! checked against the owning template's schema before it is written.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{CoreError, CoreResult};

/// Ordered list of string keys (checklist items, substages)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
#[serde(transparent)]
pub struct KeyList(pub Vec<String>);

impl KeyList {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|k| k == key)
    }
}

/// Locale code to display string
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
#[serde(transparent)]
pub struct LocalizedNames(pub BTreeMap<String, String>);

/// Key to boolean state (checklist ticks, enabled substages)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
#[serde(transparent)]
pub struct FlagMap(pub BTreeMap<String, bool>);

impl FlagMap {
    /// Every key initialised to `false`
    pub fn unchecked<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        Self(keys.into_iter().map(|k| (k.to_string(), false)).collect())
    }
}

/// Key to free-text value (checklist prompts, custom field values)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
#[serde(transparent)]
pub struct TextMap(pub BTreeMap<String, String>);

/// Product id (as a JSON object key) to quantity
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
#[serde(transparent)]
pub struct QuantityMap(pub BTreeMap<String, i64>);

/// User ids allowed to see a file, or mentioned in a comment
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
#[serde(transparent)]
pub struct UserIdList(pub Vec<i32>);

impl UserIdList {
    pub fn contains(&self, user_id: i32) -> bool {
        self.0.contains(&user_id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append `user_id` unless already present, keeping insertion order
    pub fn ensure(&mut self, user_id: i32) {
        if !self.0.contains(&user_id) {
            self.0.push(user_id);
        }
    }

    /// Drop duplicates, keeping the first occurrence
    pub fn dedup(mut self) -> Self {
        let mut seen = BTreeSet::new();
        self.0.retain(|id| seen.insert(*id));
        self
    }
}

/// Pricing and listing copy captured at the distribution stage
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DistributionData {
    #[serde(default)]
    pub product_prices: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketplace_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_description: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CustomFieldType {
    Text,
    Textarea,
    Number,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldDef {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: CustomFieldType,
    #[serde(default)]
    pub position: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
#[serde(transparent)]
pub struct CustomFieldDefs(pub Vec<CustomFieldDef>);

impl CustomFieldDefs {
    pub fn find(&self, key: &str) -> Option<&CustomFieldDef> {
        self.0.iter().find(|def| def.key == key)
    }
}

/// Reject blank or repeated keys in a template schema list
pub fn validate_key_list(field: &str, keys: &KeyList) -> CoreResult<()> {
    let mut seen = BTreeSet::new();
    for key in keys.keys() {
        if key.trim().is_empty() {
            return Err(CoreError::invalid_field(field, "Keys cannot be blank"));
        }
        if !seen.insert(key) {
            return Err(CoreError::invalid_field(
                field,
                format!("Duplicate key '{}'", key),
            ));
        }
    }
    Ok(())
}

pub fn validate_custom_field_defs(defs: &CustomFieldDefs) -> CoreResult<()> {
    let mut seen = BTreeSet::new();
    for def in &defs.0 {
        if def.key.trim().is_empty() {
            return Err(CoreError::invalid_field(
                "customFields",
                "Custom field key cannot be blank",
            ));
        }
        if !seen.insert(def.key.as_str()) {
            return Err(CoreError::invalid_field(
                "customFields",
                format!("Duplicate custom field key '{}'", def.key),
            ));
        }
    }
    Ok(())
}

/// Ensure every key of a submitted map is declared in `allowed`
pub fn check_known_keys<'a>(
    field: &str,
    submitted: impl IntoIterator<Item = &'a String>,
    allowed: &BTreeSet<String>,
) -> CoreResult<()> {
    for key in submitted {
        if !allowed.contains(key) {
            return Err(CoreError::invalid_field(
                field,
                format!("Unknown key '{}'", key),
            ));
        }
    }
    Ok(())
}

pub fn validate_custom_field_values(values: &TextMap, defs: &CustomFieldDefs) -> CoreResult<()> {
    for (key, value) in &values.0 {
        let def = defs.find(key).ok_or_else(|| {
            CoreError::invalid_field("customFieldsData", format!("Unknown custom field '{}'", key))
        })?;
        if def.field_type == CustomFieldType::Number && !value.trim().is_empty() {
            let parsed = value.trim().parse::<f64>().ok().filter(|n| n.is_finite());
            if parsed.is_none() {
                return Err(CoreError::invalid_field(
                    "customFieldsData",
                    format!("Custom field '{}' must be a number", key),
                ));
            }
        }
    }
    Ok(())
}

pub fn validate_distribution(data: &DistributionData, product_ids: &BTreeSet<String>) -> CoreResult<()> {
    for (product_id, price) in &data.product_prices {
        if !product_ids.contains(product_id) {
            return Err(CoreError::invalid_field(
                "distributionData",
                format!("Unknown product '{}'", product_id),
            ));
        }
        if !price.is_finite() || *price < 0.0 {
            return Err(CoreError::invalid_field(
                "distributionData",
                format!("Price for product '{}' must be a non-negative number", product_id),
            ));
        }
    }
    Ok(())
}

pub fn validate_quantities(data: &QuantityMap, product_ids: &BTreeSet<String>) -> CoreResult<()> {
    for (product_id, quantity) in &data.0 {
        if !product_ids.contains(product_id) {
            return Err(CoreError::invalid_field(
                "productQuantitiesData",
                format!("Unknown product '{}'", product_id),
            ));
        }
        if *quantity < 0 {
            return Err(CoreError::invalid_field(
                "productQuantitiesData",
                format!("Quantity for product '{}' cannot be negative", product_id),
            ));
        }
    }
    Ok(())
}

static MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@\[[^\]]*\]\((\d+)\)").expect("mention pattern is valid"));

/// Extract user ids from `@[Display Name](123)` markup, first occurrence order
pub fn parse_mentions(content: &str) -> UserIdList {
    UserIdList(
        MENTION_RE
            .captures_iter(content)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<i32>().ok())
            .collect(),
    )
    .dedup()
}
