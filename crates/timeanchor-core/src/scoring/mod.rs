//! Task/slot fit scoring.
//!
//! Two tiers contribute to a pair's score:
//!
//! | Tier | Criteria | Max |
//! |------|----------|-----|
//! | Algorithmic | duration fit 5, time window 5, priority alignment 5 | 15 |
//! | Semantic | task context 12, dependency flow 11, energy focus 10 | 33 |
//!
//! The algorithmic tier is cheap and runs for every pair. The semantic tier
//! asks an external oracle and only runs for each task's top candidates, see
//! [`HybridScorer`].

pub mod algorithmic;
pub mod hybrid;
pub mod semantic;

pub use algorithmic::AlgorithmicScorer;
pub use hybrid::{HybridScorer, HybridScores, HybridStats};
pub use semantic::{SemanticScorer, SemanticVerdict};

use serde::{Deserialize, Serialize};

/// Highest algorithmic total
pub const ALGORITHMIC_MAX: f64 = 15.0;
/// Highest semantic total
pub const SEMANTIC_MAX: f64 = 33.0;
/// Highest combined total
pub const HYBRID_MAX: f64 = ALGORITHMIC_MAX + SEMANTIC_MAX;

/// A named scoring criterion with a fixed maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    DurationFit,
    TimeWindow,
    PriorityAlignment,
    TaskContext,
    DependencyFlow,
    EnergyFocus,
}

impl Criterion {
    pub const ALGORITHMIC: [Criterion; 3] = [
        Criterion::DurationFit,
        Criterion::TimeWindow,
        Criterion::PriorityAlignment,
    ];

    pub const SEMANTIC: [Criterion; 3] = [
        Criterion::TaskContext,
        Criterion::DependencyFlow,
        Criterion::EnergyFocus,
    ];

    /// Upper bound of this criterion
    pub fn max(self) -> f64 {
        match self {
            Self::DurationFit | Self::TimeWindow | Self::PriorityAlignment => 5.0,
            Self::TaskContext => 12.0,
            Self::DependencyFlow => 11.0,
            Self::EnergyFocus => 10.0,
        }
    }

    pub fn is_semantic(self) -> bool {
        Self::SEMANTIC.contains(&self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DurationFit => "duration_fit",
            Self::TimeWindow => "time_window",
            Self::PriorityAlignment => "priority_alignment",
            Self::TaskContext => "task_context",
            Self::DependencyFlow => "dependency_flow",
            Self::EnergyFocus => "energy_focus",
        }
    }
}

/// One criterion's score with its bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
    pub criterion: Criterion,
    pub value: f64,
    pub max: f64,
}

/// Named sub-scores; the total is always derived, never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    entries: Vec<SubScore>,
}

impl ScoreComponents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `criterion` to `value` clamped into `[0, max]`.
    ///
    /// Setting the same criterion twice replaces the earlier value.
    pub fn with(mut self, criterion: Criterion, value: f64) -> Self {
        let max = criterion.max();
        let value = if value.is_finite() { value.clamp(0.0, max) } else { 0.0 };
        match self.entries.iter_mut().find(|e| e.criterion == criterion) {
            Some(entry) => entry.value = value,
            None => self.entries.push(SubScore {
                criterion,
                value,
                max,
            }),
        }
        self
    }

    /// Append every sub-score of `other`
    pub fn merged(self, other: &ScoreComponents) -> Self {
        other
            .entries
            .iter()
            .fold(self, |acc, e| acc.with(e.criterion, e.value))
    }

    pub fn get(&self, criterion: Criterion) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.criterion == criterion)
            .map(|e| e.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubScore> {
        self.entries.iter()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.value).sum()
    }

    /// Sum of the maxima of the criteria present
    pub fn max_total(&self) -> f64 {
        self.entries.iter().map(|e| e.max).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Normalize a total to a 0-100 confidence.
pub fn confidence(total: f64, max_possible: f64) -> f64 {
    if max_possible <= 0.0 {
        return 0.0;
    }
    (total / max_possible * 100.0).clamp(0.0, 100.0)
}

/// Score for one (task, slot) pair in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSlotScore {
    task_id: String,
    slot_id: String,
    algorithmic: ScoreComponents,
    semantic: Option<SemanticVerdict>,
    max_possible: f64,
    total: f64,
    confidence: f64,
}

impl TaskSlotScore {
    /// Algorithmic-only score, normalized against [`ALGORITHMIC_MAX`].
    pub fn algorithmic(
        task_id: impl Into<String>,
        slot_id: impl Into<String>,
        components: ScoreComponents,
    ) -> Self {
        Self::build(task_id.into(), slot_id.into(), components, None, ALGORITHMIC_MAX)
    }

    /// Score from a hybrid run, normalized against [`HYBRID_MAX`].
    ///
    /// `semantic` is `None` for pairs outside their task's top-N; they count
    /// as zero semantic points.
    pub fn hybrid(
        task_id: impl Into<String>,
        slot_id: impl Into<String>,
        algorithmic: ScoreComponents,
        semantic: Option<SemanticVerdict>,
    ) -> Self {
        Self::build(task_id.into(), slot_id.into(), algorithmic, semantic, HYBRID_MAX)
    }

    fn build(
        task_id: String,
        slot_id: String,
        algorithmic: ScoreComponents,
        semantic: Option<SemanticVerdict>,
        max_possible: f64,
    ) -> Self {
        let total = algorithmic.total() + semantic.as_ref().map_or(0.0, |s| s.total());
        debug_assert!(total <= max_possible + f64::EPSILON, "score total exceeds its tier max");
        Self {
            task_id,
            slot_id,
            algorithmic,
            semantic,
            max_possible,
            total,
            confidence: confidence(total, max_possible),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn slot_id(&self) -> &str {
        &self.slot_id
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn max_possible(&self) -> f64 {
        self.max_possible
    }

    pub fn algorithmic_total(&self) -> f64 {
        self.algorithmic.total()
    }

    /// Zero when the semantic tier was not consulted for this pair
    pub fn semantic_total(&self) -> f64 {
        self.semantic.as_ref().map_or(0.0, |s| s.total())
    }

    pub fn semantic(&self) -> Option<&SemanticVerdict> {
        self.semantic.as_ref()
    }

    /// Every sub-score of both tiers
    pub fn components(&self) -> ScoreComponents {
        match &self.semantic {
            Some(verdict) => self.algorithmic.clone().merged(&verdict.components),
            None => self.algorithmic.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components_clamp_and_sum() {
        let components = ScoreComponents::new()
            .with(Criterion::DurationFit, 4.0)
            .with(Criterion::TimeWindow, 9.0)
            .with(Criterion::PriorityAlignment, -2.0);

        assert_eq!(components.get(Criterion::TimeWindow), Some(5.0));
        assert_eq!(components.get(Criterion::PriorityAlignment), Some(0.0));
        assert_eq!(components.total(), 9.0);
        assert_eq!(components.max_total(), ALGORITHMIC_MAX);
    }

    #[test]
    fn test_components_replace_existing_entry() {
        let components = ScoreComponents::new()
            .with(Criterion::EnergyFocus, 3.0)
            .with(Criterion::EnergyFocus, 7.0);
        assert_eq!(components.iter().count(), 1);
        assert_eq!(components.total(), 7.0);
    }

    #[test]
    fn test_non_finite_values_score_zero() {
        let components = ScoreComponents::new().with(Criterion::TaskContext, f64::NAN);
        assert_eq!(components.get(Criterion::TaskContext), Some(0.0));
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(confidence(15.0, 15.0), 100.0);
        assert_eq!(confidence(7.5, 15.0), 50.0);
        assert_eq!(confidence(20.0, 15.0), 100.0);
        assert_eq!(confidence(1.0, 0.0), 0.0);
    }

    #[test]
    fn test_algorithmic_pair_score() {
        let components = ScoreComponents::new()
            .with(Criterion::DurationFit, 5.0)
            .with(Criterion::TimeWindow, 3.0)
            .with(Criterion::PriorityAlignment, 4.0);
        let score = TaskSlotScore::algorithmic("t1", "slot-01", components);

        assert_eq!(score.total(), 12.0);
        assert_eq!(score.confidence(), 80.0);
        assert_eq!(score.semantic_total(), 0.0);
        assert!(score.semantic().is_none());
    }

    #[test]
    fn test_hybrid_pair_without_semantic_counts_zero() {
        let components = ScoreComponents::new().with(Criterion::DurationFit, 5.0);
        let score = TaskSlotScore::hybrid("t1", "slot-01", components, None);
        assert_eq!(score.total(), 5.0);
        assert_eq!(score.max_possible(), HYBRID_MAX);
    }

    #[test]
    fn test_criterion_tiers() {
        assert_eq!(
            Criterion::ALGORITHMIC.iter().map(|c| c.max()).sum::<f64>(),
            ALGORITHMIC_MAX
        );
        assert_eq!(Criterion::SEMANTIC.iter().map(|c| c.max()).sum::<f64>(), SEMANTIC_MAX);
        assert!(Criterion::DependencyFlow.is_semantic());
        assert!(!Criterion::DurationFit.is_semantic());
    }
}
