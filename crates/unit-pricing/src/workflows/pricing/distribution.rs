use serde_json::Value;
use tracing::warn;

const GAUSSIAN_MEAN: f64 = 0.5;
const GAUSSIAN_STD_DEV: f64 = 1.0 / 6.0;
const BIMODAL_MEAN_LOW: f64 = 1.0 / 3.0;
const BIMODAL_MEAN_HIGH: f64 = 2.0 / 3.0;
const BIMODAL_STD_DEV: f64 = 1.0 / 10.0;

/// Preset weighting curve selected by a distribution config.
#[derive(Debug, Clone, PartialEq)]
pub enum DistributionCurve {
    Uniform,
    Gaussian { mean: f64, std_dev: f64 },
    Bimodal { mean1: f64, mean2: f64, std_dev: f64 },
    Unknown(String),
}

impl DistributionCurve {
    /// Reads `function_type` and its parameters, substituting defaults for
    /// anything missing or invalid.
    pub fn from_content(content: &Value) -> Self {
        let function_type = match content.get("function_type").and_then(Value::as_str) {
            Some(kind) => kind,
            None => {
                warn!("function_type is missing or not a string, defaulting to Uniform");
                "Uniform"
            }
        };

        match function_type {
            "Uniform" => Self::Uniform,
            "Gaussian" => {
                let mean = param(content, "mean").unwrap_or_else(|| {
                    warn!("mean is missing or not a number, defaulting to {GAUSSIAN_MEAN}");
                    GAUSSIAN_MEAN
                });
                let std_dev = positive_param(content, "stdDev").unwrap_or_else(|| {
                    warn!("stdDev is missing or non-positive, defaulting to 1/6");
                    GAUSSIAN_STD_DEV
                });
                Self::Gaussian { mean, std_dev }
            }
            "Bimodal" => {
                let mean1 = param(content, "mean1").unwrap_or_else(|| {
                    warn!("mean1 is missing or not a number, defaulting to 1/3");
                    BIMODAL_MEAN_LOW
                });
                let mean2 = param(content, "mean2").unwrap_or_else(|| {
                    warn!("mean2 is missing or not a number, defaulting to 2/3");
                    BIMODAL_MEAN_HIGH
                });
                let std_dev = positive_param(content, "stdDev").unwrap_or_else(|| {
                    warn!("stdDev is missing or non-positive, defaulting to 1/10");
                    BIMODAL_STD_DEV
                });
                Self::Bimodal {
                    mean1,
                    mean2,
                    std_dev,
                }
            }
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Raw weights for `length` ranked positions, evaluated at `x = (i + 1) / length`.
    pub fn sample(&self, length: usize) -> Vec<f64> {
        let positions = (0..length).map(|i| (i + 1) as f64 / length as f64);
        match self {
            Self::Uniform => positions.collect(),
            Self::Gaussian { mean, std_dev } => positions
                .map(|x| gaussian_bump(x, *mean, *std_dev))
                .collect(),
            Self::Bimodal {
                mean1,
                mean2,
                std_dev,
            } => positions
                .map(|x| gaussian_bump(x, *mean1, *std_dev) + gaussian_bump(x, *mean2, *std_dev))
                .collect(),
            Self::Unknown(kind) => {
                warn!(%kind, "unknown distribution type, using flat weights");
                vec![1.0; length]
            }
        }
    }
}

fn gaussian_bump(x: f64, mean: f64, std_dev: f64) -> f64 {
    let z = (x - mean) / std_dev;
    (-0.5 * z * z).exp()
}

fn param(content: &Value, key: &str) -> Option<f64> {
    content
        .get(key)
        .and_then(Value::as_f64)
        .filter(|value| value.is_finite())
}

fn positive_param(content: &Value, key: &str) -> Option<f64> {
    param(content, key).filter(|value| *value > 0.0)
}

/// Maps a normalized rank onto an index into the sampled curve:
/// `floor((rank - 1/max_rank) * (max_rank - 1))`. `None` when it falls outside.
pub fn preset_index(normalized_rank: f64, max_rank: usize, length: usize) -> Option<usize> {
    if max_rank == 0 {
        return None;
    }

    let max_rank = max_rank as f64;
    let index = ((normalized_rank - 1.0 / max_rank) * (max_rank - 1.0)).floor();
    if index.is_finite() && index >= 0.0 && (index as usize) < length {
        Some(index as usize)
    } else {
        None
    }
}
