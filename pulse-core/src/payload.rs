//! Raw upstream provider payload
//!
//! Every field is optional and decoding never fails on an off-type value:
//! numbers tolerate string encodings, flags tolerate numbers and strings,
//! and anything unusable is treated as absent. Alternate upstream key names
//! (`name`, `currentPrice`, ...) decode into their own fields so a payload
//! carrying both spellings stays valid. Normalization into a
//! [`crate::Product`] happens in the acquisition pipeline, never here.

use crate::{PricePoint, RankPoint};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub asin: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    /// Alternate spelling of `title`.
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub brand: Option<String>,
    /// Alternate spelling of `brand`.
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sub_category: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub price: Option<f64>,
    /// Alternate spelling of `price`.
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub bsr: Option<f64>,
    /// Alternate spelling of `bsr`.
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub rank: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub est_sales: Option<f64>,
    /// Alternate spelling of `estSales`.
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub estimated_sales: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub sellers: Option<f64>,
    /// Alternate spelling of `sellers`.
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub offer_count: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub referral_fee: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub fba_fee: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub storage_fee: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub weight: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub dimensions: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_hazmat: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_ip_risk: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_oversized: Option<bool>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub reviews: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub trend: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub seasonality_tags: Option<Vec<String>>,
    #[serde(default)]
    pub analysis: Option<Value>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub price_history: Option<Vec<PricePoint>>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub bsr_history: Option<Vec<RankPoint>>,
}

// ============================================================================
// LENIENT DECODERS
// ============================================================================

/// Accept JSON numbers and numeric strings. Anything else is absent so
/// normalization applies its default.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// Accept booleans, numbers (non-zero is true) and the usual textual flags.
fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Accept strings and render other scalars as text.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(scalar_text))
}

/// Accept a list of scalars or a single tag string.
fn lenient_tags<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(scalar_text)
                .filter(|tag| !tag.trim().is_empty())
                .collect(),
        ),
        Some(Value::String(s)) if !s.trim().is_empty() => Some(vec![s]),
        _ => None,
    })
}

/// Accept an array, keeping only the elements that decode as `T`.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        ),
        _ => None,
    })
}
