//! Rank lookup and unit scoring.
//!
//! Each selected field maps a unit's attribute onto a priority bucket from the
//! `ranging` section (1 = best). Without sold units the ranks are inverted and
//! weighted; once anything has sold, units are scored by how closely their ranks
//! resemble the sold ones.

use serde_json::Value;

use super::domain::{AttributeValue, Premises};
use super::numeric::round_to;
use super::rules::{PricingRules, PriorityBucket};

/// A field taking part in scoring, with its weight and priority buckets.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringField {
    pub name: String,
    pub weight: f64,
    pub buckets: Vec<PriorityBucket>,
    max_rank: i64,
}

impl ScoringField {
    pub fn new(name: impl Into<String>, weight: f64, buckets: Vec<PriorityBucket>) -> Self {
        let max_rank = buckets
            .iter()
            .map(|bucket| bucket.priority)
            .max()
            .unwrap_or(1);
        Self {
            name: name.into(),
            weight,
            buckets,
            max_rank,
        }
    }

    /// Worst rank defined for the field.
    pub fn max_rank(&self) -> i64 {
        self.max_rank
    }

    /// Priority bucket holding the unit's value. Numeric matches are tried
    /// before string matches; a missing value or no match ranks worst.
    pub fn rank_for(&self, unit: &Premises) -> i64 {
        let Some(value) = unit.attribute(&self.name) else {
            return self.max_rank;
        };

        if let Some(number) = value.as_number() {
            if let Some(bucket) = self
                .buckets
                .iter()
                .find(|bucket| bucket.values.iter().any(|v| numeric_match(v, number)))
            {
                return bucket.priority;
            }
        }

        let text = value.as_text();
        self.buckets
            .iter()
            .find(|bucket| bucket.values.iter().any(|v| text_match(v, &text)))
            .map(|bucket| bucket.priority)
            .unwrap_or(self.max_rank)
    }
}

fn numeric_match(candidate: &Value, number: f64) -> bool {
    match candidate {
        Value::Number(n) => n.as_f64() == Some(number),
        Value::String(text) => text.trim().parse::<f64>().ok() == Some(number),
        _ => false,
    }
}

fn text_match(candidate: &Value, text: &str) -> bool {
    match candidate {
        Value::String(value) => value == text,
        other => AttributeValue::from_json(other)
            .map(|value| value.as_text() == text)
            .unwrap_or(false),
    }
}

/// How scores are produced for the current set of units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoringMode {
    InverseRank,
    Similarity { sigma: f64, threshold: f64 },
}

/// Scores available units against the configured fields and any sold anchors.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    fields: Vec<ScoringField>,
    sold_ranks: Vec<Vec<i64>>,
    mode: ScoringMode,
}

impl ScoringEngine {
    pub fn new<'u>(rules: &PricingRules<'_>, sold: impl IntoIterator<Item = &'u Premises>) -> Self {
        let fields = rules
            .dynamic_config
            .selected_fields()
            .map(|field| {
                ScoringField::new(
                    field,
                    rules.dynamic_config.weight(field),
                    rules.buckets(field).to_vec(),
                )
            })
            .collect();

        let mode = ScoringMode::Similarity {
            sigma: rules.static_config.sigma(),
            threshold: rules.static_config.similarity_threshold(),
        };

        Self::with_fields(fields, sold, mode)
    }

    /// `mode` supplies sigma/threshold; it collapses to inverse-rank when nothing has sold.
    pub fn with_fields<'u>(
        fields: Vec<ScoringField>,
        sold: impl IntoIterator<Item = &'u Premises>,
        mode: ScoringMode,
    ) -> Self {
        let sold_ranks: Vec<Vec<i64>> = sold
            .into_iter()
            .map(|unit| fields.iter().map(|field| field.rank_for(unit)).collect())
            .collect();

        let mode = if sold_ranks.is_empty() {
            ScoringMode::InverseRank
        } else {
            mode
        };

        Self {
            fields,
            sold_ranks,
            mode,
        }
    }

    pub fn mode(&self) -> ScoringMode {
        self.mode
    }

    pub fn fields(&self) -> &[ScoringField] {
        &self.fields
    }

    pub fn score(&self, unit: &Premises) -> f64 {
        if self.fields.is_empty() {
            return 0.0;
        }

        let ranks: Vec<i64> = self.fields.iter().map(|field| field.rank_for(unit)).collect();
        match self.mode {
            ScoringMode::InverseRank => self.inverse_rank_score(&ranks),
            ScoringMode::Similarity { sigma, threshold } => {
                self.similarity_score(&ranks, sigma, threshold)
            }
        }
    }

    fn inverse_rank_score(&self, ranks: &[i64]) -> f64 {
        let raw: f64 = self
            .fields
            .iter()
            .zip(ranks)
            .map(|(field, rank)| {
                let max_rank = field.max_rank();
                let inverse = (max_rank - rank + 1) as f64;
                let normalized = if max_rank > 0 {
                    inverse / max_rank as f64
                } else {
                    0.0
                };
                normalized * field.weight
            })
            .sum();

        round_to(raw, 4)
    }

    fn similarity_score(&self, ranks: &[i64], sigma: f64, threshold: f64) -> f64 {
        let mut similarities = vec![0.0; self.fields.len()];

        for sold in &self.sold_ranks {
            for (i, field) in self.fields.iter().enumerate() {
                let max_rank = field.max_rank();
                let delta = (ranks[i] - sold[i]).abs() as f64;
                let normalized = if max_rank > 0 {
                    delta / max_rank as f64
                } else {
                    0.0
                };

                let similarity = gaussian_similarity(normalized, sigma);
                if similarity > threshold {
                    similarities[i] += similarity;
                }
            }
        }

        let max_similarity = similarities.iter().copied().fold(0.0, f64::max);
        let total_weight: f64 = self.fields.iter().map(|field| field.weight).sum();

        let score: f64 = self
            .fields
            .iter()
            .zip(&similarities)
            .map(|(field, similarity)| {
                let similarity = if max_similarity > 0.0 {
                    similarity / max_similarity
                } else {
                    0.0
                };
                let weight = if total_weight > 0.0 {
                    field.weight / total_weight
                } else {
                    0.0
                };
                similarity * weight
            })
            .sum();

        round_to(score, 6)
    }
}

/// `exp(-Δ² / 2σ²)`
pub fn gaussian_similarity(delta: f64, sigma: f64) -> f64 {
    (-(delta * delta) / (2.0 * sigma * sigma)).exp()
}
