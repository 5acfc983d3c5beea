//! Timeline analysis.
//!
//! This module provides:
//! - Gap detection between calendar events, clipped to working hours
//! - Gap classification by time of day and by size

mod gap;

pub use gap::{AvailableSlot, GapFinder, GapSize, GapType, WorkingHours};
