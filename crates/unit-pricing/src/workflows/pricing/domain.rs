use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::rules::StaticConfig;

pub const STATUS_AVAILABLE: &str = "available";
pub const STATUS_SOLD: &str = "sold";

/// A sellable unit inside a real-estate object, as stored by the premises registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Premises {
    pub id: i64,
    pub reo_id: i64,
    pub uploaded: DateTime<Utc>,
    pub property_type: String,
    pub premises_id: String,
    pub number_of_unit: i64,
    pub number: i64,
    pub entrance: String,
    pub floor: i64,
    pub layout_type: String,
    pub full_price: Option<f64>,
    pub total_area_m2: f64,
    pub estimated_area_m2: f64,
    pub price_per_meter: f64,
    pub number_of_rooms: i64,
    pub living_area_m2: Option<f64>,
    pub kitchen_area_m2: Option<f64>,
    pub view_from_window: Option<String>,
    pub number_of_levels: Option<i64>,
    pub number_of_loggias: Option<i64>,
    pub number_of_balconies: Option<i64>,
    pub number_of_bathrooms_with_toilets: Option<i64>,
    pub number_of_separate_bathrooms: Option<i64>,
    pub number_of_terraces: Option<i64>,
    pub studio: bool,
    pub status: String,
    pub sales_amount: Option<f64>,
    pub customcontent: Option<Value>,
}

impl Premises {
    pub fn is_available(&self) -> bool {
        self.status == STATUS_AVAILABLE
    }

    pub fn is_sold(&self) -> bool {
        self.status == STATUS_SOLD
    }

    /// Resolves a ranging field name to the unit's value for that attribute.
    ///
    /// Typed attributes win; unknown names fall back to keys of `customcontent`.
    pub fn attribute(&self, field: &str) -> Option<AttributeValue> {
        let number = |value: f64| Some(AttributeValue::Number(value));
        let count = |value: Option<i64>| value.map(|v| AttributeValue::Number(v as f64));
        let text = |value: &str| Some(AttributeValue::Text(value.to_string()));

        match field {
            "id" => number(self.id as f64),
            "property_type" => text(&self.property_type),
            "premises_id" => text(&self.premises_id),
            "number_of_unit" => number(self.number_of_unit as f64),
            "number" => number(self.number as f64),
            "entrance" => text(&self.entrance),
            "floor" => number(self.floor as f64),
            "layout_type" => text(&self.layout_type),
            "full_price" => self.full_price.map(AttributeValue::Number),
            "total_area_m2" => number(self.total_area_m2),
            "estimated_area_m2" => number(self.estimated_area_m2),
            "price_per_meter" => number(self.price_per_meter),
            "number_of_rooms" => number(self.number_of_rooms as f64),
            "living_area_m2" => self.living_area_m2.map(AttributeValue::Number),
            "kitchen_area_m2" => self.kitchen_area_m2.map(AttributeValue::Number),
            "view_from_window" => self.view_from_window.as_deref().and_then(text),
            "number_of_levels" => count(self.number_of_levels),
            "number_of_loggias" => count(self.number_of_loggias),
            "number_of_balconies" => count(self.number_of_balconies),
            "number_of_bathrooms_with_toilets" => count(self.number_of_bathrooms_with_toilets),
            "number_of_separate_bathrooms" => count(self.number_of_separate_bathrooms),
            "number_of_terraces" => count(self.number_of_terraces),
            "studio" => Some(AttributeValue::Flag(self.studio)),
            "status" => text(&self.status),
            "sales_amount" => self.sales_amount.map(AttributeValue::Number),
            other => self
                .customcontent
                .as_ref()
                .and_then(|content| content.get(other))
                .and_then(AttributeValue::from_json),
        }
    }
}

/// Attribute value as seen by the rank lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl AttributeValue {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(flag) => Some(Self::Flag(*flag)),
            Value::Number(number) => number.as_f64().map(Self::Number),
            Value::String(text) => Some(Self::Text(text.clone())),
            other => Some(Self::Text(other.to_string())),
        }
    }

    /// Numeric reading of the value; text is parsed when it holds a finite number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value).filter(|v| v.is_finite()),
            Self::Text(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            Self::Flag(_) => None,
        }
    }

    /// Textual reading used for string matching; integral numbers drop the fraction.
    pub fn as_text(&self) -> String {
        match self {
            Self::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                format!("{}", *value as i64)
            }
            Self::Number(value) => value.to_string(),
            Self::Text(text) => text.clone(),
            Self::Flag(flag) => flag.to_string(),
        }
    }
}

/// Planned sales income for a property type over a period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomePlan {
    pub id: i64,
    pub uploaded_at: DateTime<Utc>,
    pub is_active: bool,
    pub reo_id: i64,
    pub property_type: String,
    pub period_begin: String,
    pub period_end: String,
    pub area: f64,
    pub planned_sales_revenue: f64,
    pub price_per_sqm: f64,
    pub price_per_sqm_end: f64,
}

/// Persisted pricing configuration. `content` keeps the exact JSON written by the
/// config-sync side (`staticConfig`, `dynamicConfig`, `ranging`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfigRecord {
    pub id: i64,
    pub is_active: bool,
    pub reo_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub content: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigStatus {
    Default,
    #[default]
    Custom,
}

/// Stored distribution curve selection (`function_type` plus its parameters in `content`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfigRecord {
    pub id: i64,
    pub func_name: String,
    pub content: Value,
    pub is_active: bool,
    pub config_status: ConfigStatus,
}

/// Developer status label translated into the system vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusMapping {
    pub id: i64,
    pub reo_id: i64,
    pub dev_status: String,
    pub sys_status: String,
}

/// Real-estate object with every related record loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealEstateObject {
    pub id: i64,
    pub name: String,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
    pub curr: Option<String>,
    pub url: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub is_deleted: bool,
    pub custom_fields: Option<Value>,
    pub premises: Vec<Premises>,
    pub income_plans: Vec<IncomePlan>,
    pub pricing_configs: Vec<PricingConfigRecord>,
    pub status_mappings: Vec<StatusMapping>,
}

/// Per-unit values accumulated by the pricing pipeline, in pipeline order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitCalculation {
    pub base_price: f64,
    /// Liquidation refusal ratios of `base_price`, seeded from `staticConfig`.
    pub min_ref_price: f64,
    pub max_ref_price: f64,
    pub min_liq_rate: f64,
    pub max_liq_rate: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub spread: f64,
    pub scoring: f64,
    pub normalized_scoring: f64,
    pub normalized_rank: f64,
    pub preset_value: f64,
    pub mixed_scoring: f64,
    pub running_total_mixed: f64,
    pub normalized_running_total: f64,
    pub scope: f64,
    pub fit_spread_rate: f64,
    pub fit_conditional_value: f64,
    pub conditional_cost: f64,
    pub cost_share: f64,
    pub actual_cost: f64,
    pub actual_price_per_sqm: f64,
    pub final_price: f64,
}

impl UnitCalculation {
    /// Every numeric field, labelled, for finiteness checks and exports.
    pub fn fields(&self) -> [(&'static str, f64); 23] {
        [
            ("base_price", self.base_price),
            ("min_ref_price", self.min_ref_price),
            ("max_ref_price", self.max_ref_price),
            ("min_liq_rate", self.min_liq_rate),
            ("max_liq_rate", self.max_liq_rate),
            ("min_price", self.min_price),
            ("max_price", self.max_price),
            ("spread", self.spread),
            ("scoring", self.scoring),
            ("normalized_scoring", self.normalized_scoring),
            ("normalized_rank", self.normalized_rank),
            ("preset_value", self.preset_value),
            ("mixed_scoring", self.mixed_scoring),
            ("running_total_mixed", self.running_total_mixed),
            ("normalized_running_total", self.normalized_running_total),
            ("scope", self.scope),
            ("fit_spread_rate", self.fit_spread_rate),
            ("fit_conditional_value", self.fit_conditional_value),
            ("conditional_cost", self.conditional_cost),
            ("cost_share", self.cost_share),
            ("actual_cost", self.actual_cost),
            ("actual_price_per_sqm", self.actual_price_per_sqm),
            ("final_price", self.final_price),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PremisesWithCalculation {
    #[serde(flatten)]
    pub unit: Premises,
    #[serde(default)]
    pub calculation: UnitCalculation,
}

impl From<Premises> for PremisesWithCalculation {
    fn from(unit: Premises) -> Self {
        Self {
            unit,
            calculation: UnitCalculation::default(),
        }
    }
}

/// The real-estate object threaded through the pricing pipeline and returned to callers.
///
/// Built fresh for every scoring request; never shared between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealEstateObjectWithCalculations {
    pub id: i64,
    pub name: String,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
    pub curr: Option<String>,
    pub url: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub is_deleted: bool,
    pub custom_fields: Option<Value>,
    pub income_plans: Vec<IncomePlan>,
    pub pricing_configs: Vec<PricingConfigRecord>,
    #[serde(default)]
    pub status_mappings: Vec<StatusMapping>,
    pub distribution_config: Option<DistributionConfigRecord>,
    pub premises: Vec<PremisesWithCalculation>,
}

impl RealEstateObjectWithCalculations {
    /// Builds the calculation context: applies status mappings and seeds the
    /// reference liquidation prices from the latest pricing config.
    pub fn new(object: RealEstateObject, distribution_config: DistributionConfigRecord) -> Self {
        let RealEstateObject {
            id,
            name,
            lon,
            lat,
            curr,
            url,
            created,
            updated,
            is_deleted,
            custom_fields,
            premises,
            income_plans,
            pricing_configs,
            status_mappings,
        } = object;

        let (min_ref_price, max_ref_price) = pricing_configs
            .last()
            .and_then(|config| StaticConfig::from_content(&config.content))
            .map(|config| {
                (
                    config.minimum_liq_refusal_price().unwrap_or(0.0),
                    config.maximum_liq_refusal_price().unwrap_or(0.0),
                )
            })
            .unwrap_or((0.0, 0.0));

        let premises = premises
            .into_iter()
            .map(|mut unit| {
                if let Some(status) = map_status(&status_mappings, &unit.status) {
                    unit.status = status;
                }
                let mut record = PremisesWithCalculation::from(unit);
                record.calculation.min_ref_price = min_ref_price;
                record.calculation.max_ref_price = max_ref_price;
                record
            })
            .collect();

        Self {
            id,
            name,
            lon,
            lat,
            curr,
            url,
            created,
            updated,
            is_deleted,
            custom_fields,
            income_plans,
            pricing_configs,
            status_mappings,
            distribution_config: Some(distribution_config),
            premises,
        }
    }

    pub fn latest_pricing_config(&self) -> Option<&PricingConfigRecord> {
        self.pricing_configs.last()
    }

    pub fn static_config(&self) -> Option<StaticConfig<'_>> {
        self.latest_pricing_config()
            .and_then(|config| StaticConfig::from_content(&config.content))
    }
}

fn map_status(mappings: &[StatusMapping], status: &str) -> Option<String> {
    mappings
        .iter()
        .find(|mapping| mapping.dev_status == status)
        .or_else(|| {
            mappings
                .iter()
                .find(|mapping| mapping.dev_status.eq_ignore_ascii_case(status.trim()))
        })
        .map(|mapping| mapping.sys_status.clone())
}
