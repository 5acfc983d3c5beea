//! Gap detection between calendar events.
//!
//! Finds the unoccupied windows between a day's fixed events, clipped to
//! working hours, and classifies each one by time of day and by size.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::CalendarEvent;
use crate::error::ValidationError;

/// A gap bounded by events on both sides and spanning at most this long
/// counts as "between meetings".
const BETWEEN_MEETINGS_MAX_MINUTES: i64 = 180;

/// Size category of a gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapSize {
    Tiny,   // < 15 minutes
    Small,  // 15-29 minutes
    Medium, // 30-60 minutes
    Large,  // > 60 minutes
}

impl GapSize {
    /// Categorize a gap by its duration in minutes
    pub fn from_minutes(minutes: i64) -> Self {
        if minutes < 15 {
            Self::Tiny
        } else if minutes < 30 {
            Self::Small
        } else if minutes <= 60 {
            Self::Medium
        } else {
            Self::Large
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

/// Time-of-day classification of a gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapType {
    Morning,
    BetweenMeetings,
    Lunch,
    Afternoon,
    Evening,
    Night,
}

impl GapType {
    /// Classify a gap from its wall-clock start.
    ///
    /// `bounded_span` is the length of the enclosing gap when it has an
    /// event on both sides, `None` when it touches a working-hours edge.
    pub fn classify(local_start: NaiveTime, bounded_span: Option<i64>) -> Self {
        let hour = local_start.hour();
        if hour >= 20 || hour < 5 {
            return Self::Night;
        }
        if hour < 9 {
            return Self::Morning;
        }
        if hour == 12 {
            return Self::Lunch;
        }
        if matches!(bounded_span, Some(span) if span <= BETWEEN_MEETINGS_MAX_MINUTES) {
            return Self::BetweenMeetings;
        }
        if hour < 12 {
            Self::Morning
        } else if hour < 17 {
            Self::Afternoon
        } else {
            Self::Evening
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::BetweenMeetings => "between_meetings",
            Self::Lunch => "lunch",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

/// An available slot a task can be anchored into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub gap_type: GapType,
    pub size: GapSize,
    /// Event that ends where this slot starts, if any
    pub preceding_event_id: Option<String>,
    /// Event that starts where this slot ends, if any
    pub following_event_id: Option<String>,
}

impl AvailableSlot {
    /// Get duration in minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// Check if this slot can fit a task of given duration
    pub fn can_fit(&self, minutes: i64) -> bool {
        self.duration_minutes() >= minutes
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && self.end_time > start
    }

    /// Up to `window` timed events on each side of the slot, chronological.
    pub fn surrounding_events<'a>(
        &self,
        events: &'a [CalendarEvent],
        window: usize,
    ) -> Vec<&'a CalendarEvent> {
        let mut before: Vec<_> = events
            .iter()
            .filter(|e| !e.all_day && e.end_time <= self.start_time)
            .collect();
        before.sort_by(|a, b| b.end_time.cmp(&a.end_time));
        before.truncate(window);
        before.reverse();

        let mut after: Vec<_> = events
            .iter()
            .filter(|e| !e.all_day && e.start_time >= self.end_time)
            .collect();
        after.sort_by_key(|e| e.start_time);
        after.truncate(window);

        before.extend(after);
        before
    }
}

/// Daily working-hours bounds in wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl WorkingHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Parse "HH:MM" bounds.
    pub fn parse(start: &str, end: &str) -> Result<Self, ValidationError> {
        let parse = |field: &str, value: &str| {
            NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| ValidationError::InvalidValue {
                field: field.to_string(),
                message: format!("'{value}' is not HH:MM ({e})"),
            })
        };
        let hours = Self::new(parse("working_hours.start", start)?, parse("working_hours.end", end)?);
        if hours.start == hours.end {
            return Err(ValidationError::InvalidValue {
                field: "working_hours".into(),
                message: "start and end must differ".into(),
            });
        }
        Ok(hours)
    }

    /// Concrete `[start, end)` window on `date` in `offset` wall-clock.
    ///
    /// An end at or before the start wraps into the next day.
    pub fn window_on(
        &self,
        date: NaiveDate,
        offset: FixedOffset,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), ValidationError> {
        let local = |time: NaiveTime| {
            offset
                .from_local_datetime(&date.and_time(time))
                .single()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| ValidationError::InvalidValue {
                    field: "working_hours".into(),
                    message: format!("{time} does not exist on {date}"),
                })
        };
        let start = local(self.start)?;
        let mut end = local(self.end)?;
        if self.end <= self.start {
            end += Duration::days(1);
        }
        Ok((start, end))
    }
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(6, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// Merged run of overlapping events.
struct Occupied<'a> {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    first: &'a CalendarEvent,
    last: &'a CalendarEvent,
}

/// Unclassified free interval with its neighbours.
struct Candidate<'a> {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    preceding: Option<&'a CalendarEvent>,
    following: Option<&'a CalendarEvent>,
}

/// Finds available slots in a day's calendar.
#[derive(Debug, Clone)]
pub struct GapFinder {
    /// Minimum gap duration to keep (in minutes)
    min_gap_minutes: i64,
    /// Split longer gaps into pieces of at most this length
    max_slot_minutes: Option<i64>,
    /// Wall-clock offset used for classification
    offset: FixedOffset,
}

impl GapFinder {
    /// Create a finder with default settings (15 min minimum, UTC, no split)
    pub fn new() -> Self {
        Self {
            min_gap_minutes: 15,
            max_slot_minutes: None,
            offset: Utc.fix(),
        }
    }

    /// Set the minimum gap duration
    pub fn with_min_gap(mut self, minutes: i64) -> Self {
        self.min_gap_minutes = minutes;
        self
    }

    /// Partition gaps longer than `minutes` into consecutive slots.
    /// Values below the minimum gap act as the minimum gap.
    pub fn with_max_slot(mut self, minutes: Option<i64>) -> Self {
        self.max_slot_minutes = minutes;
        self
    }

    /// Classify gap types in this wall-clock offset
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn min_gap_minutes(&self) -> i64 {
        self.min_gap_minutes
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Find slots for `date` within `hours`.
    pub fn find_gaps_on(
        &self,
        events: &[CalendarEvent],
        date: NaiveDate,
        hours: &WorkingHours,
    ) -> Result<Vec<AvailableSlot>, ValidationError> {
        let (start, end) = hours.window_on(date, self.offset)?;
        self.find_gaps(events, start, end)
    }

    /// Find slots between events inside `[window_start, window_end)`.
    ///
    /// All-day events are ignored. Overlapping or touching events are merged
    /// before gaps are taken, so slots never overlap each other or any event.
    /// Output is sorted by start time.
    pub fn find_gaps(
        &self,
        events: &[CalendarEvent],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<AvailableSlot>, ValidationError> {
        if window_end <= window_start {
            return Err(ValidationError::InvalidTimeRange {
                id: "working_hours".into(),
                start: window_start,
                end: window_end,
            });
        }

        let mut timed: Vec<&CalendarEvent> = events.iter().filter(|e| !e.all_day).collect();
        for event in &timed {
            event.validate()?;
        }
        timed.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then(a.end_time.cmp(&b.end_time))
                .then_with(|| a.id.cmp(&b.id))
        });

        let blocks = Self::merge(&timed);
        let candidates = Self::candidates(&blocks, window_start, window_end);

        let mut slots = Vec::new();
        for candidate in candidates {
            let span = (candidate.end - candidate.start).num_minutes();
            if span < self.min_gap_minutes {
                continue;
            }
            let bounded_span = match (candidate.preceding, candidate.following) {
                (Some(_), Some(_)) => Some(span),
                _ => None,
            };

            let pieces = self.partition(candidate.start, candidate.end);
            let last = pieces.len() - 1;
            for (i, (start, end)) in pieces.into_iter().enumerate() {
                let local_start = start.with_timezone(&self.offset).time();
                slots.push(AvailableSlot {
                    id: String::new(),
                    start_time: start,
                    end_time: end,
                    gap_type: GapType::classify(local_start, bounded_span),
                    size: GapSize::from_minutes((end - start).num_minutes()),
                    preceding_event_id: candidate
                        .preceding
                        .filter(|_| i == 0)
                        .map(|e| e.id.clone()),
                    following_event_id: candidate
                        .following
                        .filter(|_| i == last)
                        .map(|e| e.id.clone()),
                });
            }
        }

        for (i, slot) in slots.iter_mut().enumerate() {
            slot.id = format!("slot-{:02}", i + 1);
        }

        Ok(slots)
    }

    /// Collapse sorted events into disjoint occupied intervals.
    fn merge<'a>(sorted: &[&'a CalendarEvent]) -> Vec<Occupied<'a>> {
        let mut blocks: Vec<Occupied<'a>> = Vec::new();
        for &event in sorted {
            if let Some(block) = blocks.last_mut().filter(|b| event.start_time <= b.end) {
                if event.end_time > block.end {
                    block.end = event.end_time;
                    block.last = event;
                }
                continue;
            }
            blocks.push(Occupied {
                start: event.start_time,
                end: event.end_time,
                first: event,
                last: event,
            });
        }
        blocks
    }

    /// Free intervals before, between and after the occupied blocks,
    /// clipped to the window.
    fn candidates<'a>(
        blocks: &[Occupied<'a>],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Vec<Candidate<'a>> {
        let mut candidates = Vec::new();
        let mut cursor = window_start;
        let mut preceding = None;

        for block in blocks
            .iter()
            .filter(|b| b.end > window_start && b.start < window_end)
        {
            if block.start > cursor {
                candidates.push(Candidate {
                    start: cursor,
                    end: block.start,
                    preceding,
                    following: Some(block.first),
                });
            }
            cursor = cursor.max(block.end.min(window_end));
            preceding = Some(block.last);
        }

        if cursor < window_end {
            candidates.push(Candidate {
                start: cursor,
                end: window_end,
                preceding,
                following: None,
            });
        }

        candidates
    }

    /// Split one gap into consecutive pieces no longer than the max slot.
    /// The step never drops below the minimum gap, and a trailing piece
    /// shorter than the minimum is folded into its neighbour.
    fn partition(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        let Some(max) = self.max_slot_minutes.filter(|m| *m > 0) else {
            return vec![(start, end)];
        };
        let step = Duration::minutes(max.max(self.min_gap_minutes));

        let mut pieces = Vec::new();
        let mut cursor = start;
        while end - cursor > step {
            pieces.push((cursor, cursor + step));
            cursor += step;
        }

        let remainder = (end - cursor).num_minutes();
        match pieces.last_mut() {
            Some(last) if remainder < self.min_gap_minutes => last.1 = end,
            _ => pieces.push((cursor, end)),
        }
        pieces
    }
}

impl Default for GapFinder {
    fn default() -> Self {
        Self::new()
    }
}
