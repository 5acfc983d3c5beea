//! # TimeAnchor Core Library
//!
//! Anchors a day's flexible tasks into the free time between fixed calendar
//! events. Given the events and tasks for one user and one day, a run finds
//! the gaps, scores every task/slot pair and commits a one-to-one greedy
//! assignment.
//!
//! ## Architecture
//!
//! - **Gap Finder**: merges events and emits classified slots inside the
//!   working-hours window
//! - **Algorithmic Scorer**: three-criterion rubric, 0-15, run for every pair
//! - **Semantic Scorer**: asks an external oracle for three more criteria,
//!   0-33, with a neutral fallback on any failure
//! - **Hybrid Scorer**: algorithmic everywhere, semantic only for each task's
//!   top-N slots, fanned out with bounded concurrency
//! - **Greedy Assignment**: ranks pairs and commits them without conflicts
//! - **Coordinator**: runs the stages in order and picks the scoring mode
//!
//! ## Key Components
//!
//! - [`GapFinder`]: slot extraction
//! - [`HybridScorer`]: cost-bounded two-tier scoring
//! - [`GreedyAssigner`]: conflict-free assignment
//! - [`AnchoringCoordinator`]: end-to-end run
//! - [`AnchorConfig`]: TOML configuration

pub mod assignment;
pub mod calendar;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod oracle;
pub mod scoring;
pub mod task;
pub mod timeline;

pub use assignment::{AssignmentResult, GreedyAssigner, TaskAssignment, UnassignedReason, UnassignedTask};
pub use calendar::{CalendarEvent, CalendarProfile, CalendarSource, EventSource, StaticCalendar, SyntheticCalendar};
pub use config::AnchorConfig;
pub use coordinator::{AnchoringCoordinator, AnchoringReport, CoordinatorState, ScoringMode};
pub use error::{ConfigError, CoreError, OracleError, Result, ValidationError};
pub use oracle::{HttpOracle, OracleRequest, OracleResponse, ScoringOracle};
pub use scoring::{
    AlgorithmicScorer, Criterion, HybridScorer, HybridScores, HybridStats, ScoreComponents,
    SemanticScorer, SemanticVerdict, TaskSlotScore,
};
pub use task::{EnergyZone, Priority, StaticTaskSource, TaskSource, TaskToAnchor, TimeBlock};
pub use timeline::{AvailableSlot, GapFinder, GapSize, GapType, WorkingHours};
