//! Oracle-backed semantic scoring.
//!
//! A single call never fails: timeouts, transport errors and responses that
//! fail validation all resolve to [`SemanticVerdict::fallback`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::calendar::CalendarEvent;
use crate::error::OracleError;
use crate::oracle::{OracleRequest, OracleResponse, ScoringOracle};
use crate::scoring::{Criterion, ScoreComponents, SEMANTIC_MAX};
use crate::task::TaskToAnchor;
use crate::timeline::AvailableSlot;

/// Semantic total used when the oracle gives no usable answer
pub const FALLBACK_TOTAL: f64 = SEMANTIC_MAX / 2.0;

/// Outcome of one semantic scoring call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticVerdict {
    pub components: ScoreComponents,
    pub reasoning: String,
    pub model_id: Option<String>,
    /// True when the neutral fallback stands in for an oracle answer
    pub fallback: bool,
}

impl SemanticVerdict {
    /// Neutral verdict: every semantic criterion at half its maximum.
    pub fn fallback() -> Self {
        let components = Criterion::SEMANTIC
            .iter()
            .fold(ScoreComponents::new(), |acc, c| acc.with(*c, c.max() / 2.0));
        Self {
            components,
            reasoning: String::new(),
            model_id: None,
            fallback: true,
        }
    }

    pub fn total(&self) -> f64 {
        self.components.total()
    }
}

/// Scores a pair by asking the oracle, with a per-call timeout.
#[derive(Clone)]
pub struct SemanticScorer {
    oracle: Arc<dyn ScoringOracle>,
    timeout: Duration,
}

impl SemanticScorer {
    pub fn new(oracle: Arc<dyn ScoringOracle>, timeout: Duration) -> Self {
        Self { oracle, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Score one pair given the events around the slot.
    pub async fn score(
        &self,
        task: &TaskToAnchor,
        slot: &AvailableSlot,
        context: &[&CalendarEvent],
    ) -> SemanticVerdict {
        let request = OracleRequest::new(task, slot, context);

        let outcome = match tokio::time::timeout(self.timeout, self.oracle.evaluate(&request)).await
        {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(self.timeout)),
        };

        match outcome.and_then(|response| Self::validate(response, &task.id, &slot.id)) {
            Ok(verdict) => verdict,
            Err(err) => {
                tracing::warn!(
                    oracle = self.oracle.name(),
                    task_id = %task.id,
                    slot_id = %slot.id,
                    error = %err,
                    "semantic scoring failed; using fallback score"
                );
                SemanticVerdict::fallback()
            }
        }
    }

    /// Reject non-numeric scores, clamp out-of-range ones.
    fn validate(
        response: OracleResponse,
        task_id: &str,
        slot_id: &str,
    ) -> Result<SemanticVerdict, OracleError> {
        let raw = [
            (Criterion::TaskContext, response.task_context),
            (Criterion::DependencyFlow, response.dependency_flow),
            (Criterion::EnergyFocus, response.energy_focus),
        ];

        let mut components = ScoreComponents::new();
        for (criterion, value) in raw {
            if !value.is_finite() {
                return Err(OracleError::Malformed(format!(
                    "{} is not a finite number",
                    criterion.as_str()
                )));
            }
            if value < 0.0 || value > criterion.max() {
                tracing::warn!(
                    task_id,
                    slot_id,
                    criterion = criterion.as_str(),
                    value,
                    max = criterion.max(),
                    "oracle sub-score out of range; clamping"
                );
            }
            components = components.with(criterion, value);
        }

        Ok(SemanticVerdict {
            components,
            reasoning: response.reasoning,
            model_id: Some(response.model_id).filter(|id| !id.is_empty()),
            fallback: false,
        })
    }
}
