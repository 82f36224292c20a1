//! Update rules of the linear classifiers.
//!
//! Every rule looks at the margin between the correct label and the best
//! wrong label, decides whether to update and by how much, and returns an
//! [`Update`] that [`super::LinearClassifier`] applies to each feature's
//! weight for both labels.

use tessera_core::fv::squared_norm;
use tessera_core::Weight;

/// A linear learning algorithm and its hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Algorithm {
    /// Multi-class perceptron.
    Perceptron,
    /// Passive-aggressive.
    PassiveAggressive,
    /// Passive-aggressive with a capped step.
    PassiveAggressive1 {
        /// Regularization weight `C`.
        c: f64,
    },
    /// Passive-aggressive with a soft step.
    PassiveAggressive2 {
        /// Regularization weight `C`.
        c: f64,
    },
    /// Confidence-weighted.
    ConfidenceWeighted {
        /// Confidence parameter `phi`.
        c: f64,
    },
    /// Adaptive regularization of weights.
    Arow {
        /// Regularization weight `C`.
        c: f64,
    },
    /// Normal herding.
    Nherd {
        /// Regularization weight `C`.
        c: f64,
    },
}

/// The margin of one training example.
#[derive(Debug, Clone, PartialEq)]
pub struct Margin {
    /// Score of the correct label minus the best wrong score.
    pub margin: f64,
    /// Best-scoring wrong label, if any other label is known.
    pub incorrect: Option<String>,
    /// Best-scoring label overall.
    pub predicted: Option<String>,
    /// `Σ x² (σ_correct + σ_incorrect)` over the example's features.
    pub variance: f64,
}

/// How to move one weight. `sign` is `+1` for the correct label and `-1`
/// for the incorrect one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Update {
    Step { step: f64 },
    Arow { alpha: f64, beta: f64 },
    Nherd { alpha: f64, shrink: f64 },
    ConfidenceWeighted { gamma: f64, phi: f64 },
}

impl Update {
    /// Moves `w` for a feature of value `x`.
    pub fn apply(self, w: Weight, x: f64, sign: f64) -> Weight {
        let sigma = w.covariance;
        match self {
            Update::Step { step } => Weight {
                value: w.value + sign * step * x,
                covariance: sigma,
            },
            Update::Arow { alpha, beta } => Weight {
                value: w.value + sign * alpha * sigma * x,
                covariance: sigma - beta * sigma * sigma * x * x,
            },
            Update::Nherd { alpha, shrink } => Weight {
                value: w.value + sign * alpha * sigma * x,
                covariance: 1.0 / (1.0 / sigma + shrink * x * x),
            },
            Update::ConfidenceWeighted { gamma, phi } => Weight {
                value: w.value + sign * gamma * sigma * x,
                covariance: 1.0 / (1.0 / sigma + 2.0 * gamma * phi * x * x),
            },
        }
    }
}

impl Algorithm {
    /// Registered algorithm name.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Perceptron => "perceptron",
            Algorithm::PassiveAggressive => "PA",
            Algorithm::PassiveAggressive1 { .. } => "PA1",
            Algorithm::PassiveAggressive2 { .. } => "PA2",
            Algorithm::ConfidenceWeighted { .. } => "CW",
            Algorithm::Arow { .. } => "AROW",
            Algorithm::Nherd { .. } => "NHERD",
        }
    }

    /// Decides the update for one example, or `None` to leave the model as
    /// it is.
    pub fn plan(&self, fv: &[(String, f64)], m: &Margin, label: &str) -> Option<Update> {
        let update = match *self {
            Algorithm::Perceptron => {
                if m.predicted.as_deref() == Some(label) {
                    return None;
                }
                Update::Step { step: 1.0 }
            }
            Algorithm::PassiveAggressive => {
                let (loss, norm) = hinge(fv, m)?;
                Update::Step {
                    step: loss / (2.0 * norm),
                }
            }
            Algorithm::PassiveAggressive1 { c } => {
                let (loss, norm) = hinge(fv, m)?;
                Update::Step {
                    step: c.min(loss / (2.0 * norm)),
                }
            }
            Algorithm::PassiveAggressive2 { c } => {
                let (loss, norm) = hinge(fv, m)?;
                Update::Step {
                    step: loss / (2.0 * norm + 1.0 / (2.0 * c)),
                }
            }
            Algorithm::ConfidenceWeighted { c: phi } => {
                if m.variance <= 0.0 {
                    return None;
                }
                let b = 1.0 + 2.0 * phi * m.margin;
                let gamma = (-b + (b * b - 8.0 * phi * (m.margin - phi * m.variance)).sqrt())
                    / (4.0 * phi * m.variance);
                if !(gamma > 0.0) {
                    return None;
                }
                Update::ConfidenceWeighted { gamma, phi }
            }
            Algorithm::Arow { c } => {
                let loss = 1.0 - m.margin;
                if loss <= 0.0 {
                    return None;
                }
                let beta = 1.0 / (m.variance + 1.0 / c);
                Update::Arow {
                    alpha: loss * beta,
                    beta,
                }
            }
            Algorithm::Nherd { c } => {
                let loss = 1.0 - m.margin;
                if loss <= 0.0 {
                    return None;
                }
                Update::Nherd {
                    alpha: loss / (m.variance + 1.0 / c),
                    shrink: 2.0 * c + c * c * m.variance,
                }
            }
        };
        Some(update)
    }
}

/// Hinge loss and squared norm, or `None` when no update is due.
fn hinge(fv: &[(String, f64)], m: &Margin) -> Option<(f64, f64)> {
    let loss = 1.0 - m.margin;
    if loss <= 0.0 {
        return None;
    }
    let norm = squared_norm(fv);
    if norm == 0.0 {
        return None;
    }
    Some((loss, norm))
}
