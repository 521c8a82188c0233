use serde::{Deserialize, Serialize};

use crate::consts::LOGISTIC_CLAMP;

#[inline(always)]
pub fn logistic(t: f32) -> f32 {
    (1.0 + (-t).exp()).recip()
}

/// Maps the raw score to a prediction and to the partial gradient the engine consumes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Copy)]
pub enum LossFunction {
    // labels > 0 are positives, everything else is negative
    CrossEntropy,
    Squared,
}

impl LossFunction {
    pub fn prediction(&self, score: f32) -> f32 {
        match self {
            LossFunction::CrossEntropy => {
                if score.is_nan() {
                    log::warn!("NAN prediction, forcing 0.0");
                    logistic(0.0)
                } else {
                    logistic(score.max(-LOGISTIC_CLAMP).min(LOGISTIC_CLAMP))
                }
            }
            LossFunction::Squared => score,
        }
    }

    /// d loss / d score
    pub fn partial_gradient(&self, score: f32, label: f32) -> f32 {
        match self {
            LossFunction::CrossEntropy => {
                if score.is_nan() || score < -LOGISTIC_CLAMP || score > LOGISTIC_CLAMP {
                    return 0.0;
                }
                let y = if label > 0.0 { 1.0 } else { -1.0 };
                -y / (1.0 + (y * score).exp())
            }
            LossFunction::Squared => score - label,
        }
    }

    pub fn loss(&self, score: f32, label: f32) -> f32 {
        match self {
            LossFunction::CrossEntropy => {
                let y = if label > 0.0 { 1.0 } else { -1.0 };
                let margin = -y * score;
                // log(1 + exp(m)) without overflowing for large margins
                if margin > LOGISTIC_CLAMP {
                    margin
                } else {
                    margin.exp().ln_1p()
                }
            }
            LossFunction::Squared => {
                let diff = score - label;
                0.5 * diff * diff
            }
        }
    }

    pub fn get_name(&self) -> &'static str {
        match self {
            LossFunction::CrossEntropy => "cross-entropy",
            LossFunction::Squared => "squared",
        }
    }
}
