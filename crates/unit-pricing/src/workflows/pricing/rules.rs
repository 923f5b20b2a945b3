use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::pipeline::StepError;

const STATIC_CONFIG: &str = "staticConfig";
const DYNAMIC_CONFIG: &str = "dynamicConfig";
const RANGING: &str = "ranging";

/// Read-only view over the `staticConfig` section of a pricing config.
#[derive(Debug, Clone, Copy)]
pub struct StaticConfig<'a> {
    values: &'a Map<String, Value>,
}

impl<'a> StaticConfig<'a> {
    pub fn from_content(content: &'a Value) -> Option<Self> {
        content
            .get(STATIC_CONFIG)
            .and_then(Value::as_object)
            .map(|values| Self { values })
    }

    /// Strict lookup: only JSON numbers count.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.values
            .get(key)
            .and_then(Value::as_f64)
            .filter(|value| value.is_finite())
    }

    /// Lenient lookup: JSON numbers or numeric strings.
    pub fn lenient_number(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(numeric)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn current_price_per_sqm(&self) -> Option<f64> {
        self.number("current_price_per_sqm")
    }

    pub fn onboarding_price_per_sqm(&self) -> Option<f64> {
        self.lenient_number("onboarding_current_price_per_sqm")
    }

    pub fn minimum_liq_refusal_price(&self) -> Option<f64> {
        self.lenient_number("minimum_liq_refusal_price")
    }

    pub fn maximum_liq_refusal_price(&self) -> Option<f64> {
        self.lenient_number("maximum_liq_refusal_price")
    }

    pub fn bargain_gap(&self) -> Option<f64> {
        self.lenient_number("bargainGap")
    }

    /// Gaussian width for similarity scoring: defaults to 1.0, floored at 1e-9.
    pub fn sigma(&self) -> f64 {
        let sigma = self.lenient_number("sigma").unwrap_or(1.0);
        if sigma <= 0.0 {
            1e-9
        } else {
            sigma
        }
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.lenient_number("similarityThreshold").unwrap_or(0.0)
    }
}

/// A finite JSON number or a string holding one.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|value| value.is_finite())
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|number| number != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn lenient_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

fn important_fields<'de, D>(deserializer: D) -> Result<BTreeMap<String, bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_map(deserializer)?
        .into_iter()
        .map(|(field, flag)| {
            let selected = truthy(&flag);
            (field, selected)
        })
        .collect())
}

/// Weights accept numbers, numeric strings and booleans; null weighs nothing.
fn weights<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_map(deserializer)?
        .into_iter()
        .map(|(field, weight)| {
            let parsed = match &weight {
                Value::Null => Some(0.0),
                Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
                other => numeric(other),
            };
            match parsed {
                Some(parsed) => Ok((field, parsed)),
                None => Err(D::Error::custom(format!(
                    "weight for `{field}` is not a number: {weight}"
                ))),
            }
        })
        .collect()
}

/// `dynamicConfig`: which fields participate in scoring and their weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicConfig {
    #[serde(rename = "importantFields", default, deserialize_with = "important_fields")]
    pub important_fields: BTreeMap<String, bool>,
    #[serde(default, deserialize_with = "weights")]
    pub weights: BTreeMap<String, f64>,
}

impl DynamicConfig {
    pub fn selected_fields(&self) -> impl Iterator<Item = &str> {
        self.important_fields
            .iter()
            .filter(|(_, selected)| **selected)
            .map(|(field, _)| field.as_str())
    }

    pub fn weight(&self, field: &str) -> f64 {
        self.weights
            .get(field)
            .copied()
            .filter(|weight| weight.is_finite())
            .unwrap_or(0.0)
    }
}

fn default_priority() -> i64 {
    1
}

/// Integers, integral floats and numeric strings; null falls back to the default.
fn priority<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(default_priority());
    }
    if let Some(priority) = value.as_i64() {
        return Ok(priority);
    }
    match numeric(&value) {
        Some(priority) if priority.fract() == 0.0 && priority.abs() < i64::MAX as f64 => {
            Ok(priority as i64)
        }
        _ => Err(D::Error::custom(format!("priority is not an integer: {value}"))),
    }
}

/// A single value stands for a one-element list; null for an empty one.
fn bucket_values<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(values) => values,
        value => vec![value],
    })
}

/// Ordered priority bucket: attribute values listed here rank at `priority`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityBucket {
    #[serde(default = "default_priority", deserialize_with = "priority")]
    pub priority: i64,
    #[serde(default, deserialize_with = "bucket_values")]
    pub values: Vec<Value>,
}

impl PriorityBucket {
    pub fn new(priority: i64, values: Vec<Value>) -> Self {
        Self { priority, values }
    }
}

pub type Ranging = BTreeMap<String, Vec<PriorityBucket>>;

/// Parsed scoring rules from the latest pricing config.
#[derive(Debug, Clone)]
pub struct PricingRules<'a> {
    pub static_config: StaticConfig<'a>,
    pub dynamic_config: DynamicConfig,
    pub ranging: Ranging,
}

impl<'a> PricingRules<'a> {
    /// Requires non-empty `staticConfig`, `dynamicConfig` and `ranging` sections.
    pub fn from_content(content: &'a Value) -> Result<Self, StepError> {
        let static_config = StaticConfig::from_content(content)
            .filter(|config| !config.values.is_empty())
            .ok_or(StepError::IncompleteConfig {
                section: STATIC_CONFIG,
            })?;

        let dynamic_config = non_empty_section(content, DYNAMIC_CONFIG)?;
        let dynamic_config: DynamicConfig =
            serde_json::from_value(dynamic_config.clone()).map_err(|err| {
                StepError::MalformedConfig {
                    section: DYNAMIC_CONFIG,
                    reason: err.to_string(),
                }
            })?;

        let ranging = non_empty_section(content, RANGING)?;
        let ranging: Ranging =
            serde_json::from_value(ranging.clone()).map_err(|err| StepError::MalformedConfig {
                section: RANGING,
                reason: err.to_string(),
            })?;

        Ok(Self {
            static_config,
            dynamic_config,
            ranging,
        })
    }

    pub fn buckets(&self, field: &str) -> &[PriorityBucket] {
        self.ranging.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn non_empty_section<'v>(content: &'v Value, section: &'static str) -> Result<&'v Value, StepError> {
    let value = content
        .get(section)
        .ok_or(StepError::IncompleteConfig { section })?;
    match value.as_object() {
        Some(map) if !map.is_empty() => Ok(value),
        _ => Err(StepError::IncompleteConfig { section }),
    }
}

/// One label ranked by the ranking assistant (e.g. a flat number or a floor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedLabel {
    pub name: String,
    pub value: String,
    pub priority: i64,
}

/// Folds ranked labels into `ranging` buckets: ascending priority, values in
/// input order, equal priorities merged into one bucket.
pub fn buckets_from_labels(labels: &[RankedLabel]) -> Vec<PriorityBucket> {
    let mut grouped: BTreeMap<i64, Vec<Value>> = BTreeMap::new();
    for label in labels {
        let values = grouped.entry(label.priority).or_default();
        let value = Value::String(label.value.clone());
        if !values.contains(&value) {
            values.push(value);
        }
    }

    grouped
        .into_iter()
        .map(|(priority, values)| PriorityBucket::new(priority, values))
        .collect()
}

/// Builds a `ranging` section from per-field ranking suggestions.
pub fn ranging_from_suggestions(suggestions: &BTreeMap<String, Vec<RankedLabel>>) -> Ranging {
    suggestions
        .iter()
        .map(|(field, labels)| (field.clone(), buckets_from_labels(labels)))
        .collect()
}
