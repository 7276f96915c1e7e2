//! # Simulated Calendar
//!
//! In-process stand-in for a calendar service. All times are relative to a
//! fixed anchor instant, so the same sequence of calls always produces the
//! same slots.

use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};

use super::params::{optional_str, optional_u64, required_str, required_u64, ToolParams};
use super::Tool;
use crate::error::ToolError;

/// Slot format accepted and returned by the calendar tools
pub const SLOT_FORMAT: &str = "%Y-%m-%d %H:%M";

const DEFAULT_DURATION_MINUTES: u64 = 30;
const LEAD_HOURS: i64 = 3;
const WINDOW_HOURS: i64 = 24;
const MAX_DURATION_MINUTES: u64 = WINDOW_HOURS as u64 * 60;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Booking {
    pub id: u32,
    pub title: String,
    pub description: String,
    #[serde(serialize_with = "serialize_slot")]
    pub start: NaiveDateTime,
    pub duration_minutes: u64,
}

impl Booking {
    pub fn end(&self) -> NaiveDateTime {
        // Bookings are only created once their end is known to be representable
        add_minutes(self.start, self.duration_minutes).unwrap_or(NaiveDateTime::MAX)
    }

    fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        start < self.end() && self.start < end
    }
}

fn serialize_slot<S: serde::Serializer>(t: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_slot(t))
}

pub fn format_slot(t: &NaiveDateTime) -> String {
    t.format(SLOT_FORMAT).to_string()
}

/// `start + n` minutes, or `None` when it leaves chrono's range.
fn add_minutes(start: NaiveDateTime, n: u64) -> Option<NaiveDateTime> {
    let delta = Duration::try_minutes(i64::try_from(n).ok()?)?;
    start.checked_add_signed(delta)
}

fn add_hours(start: NaiveDateTime, n: i64) -> Result<NaiveDateTime, ToolError> {
    Duration::try_hours(n)
        .and_then(|delta| start.checked_add_signed(delta))
        .ok_or_else(|| ToolError::failed("calendar anchor is out of range"))
}

/// Calendar with free slots searched from `anchor + 3h` up to `anchor + 24h`.
#[derive(Debug)]
pub struct SimulatedCalendar {
    anchor: NaiveDateTime,
    bookings: Mutex<Vec<Booking>>,
}

impl Default for SimulatedCalendar {
    fn default() -> Self {
        let anchor = NaiveDate::from_ymd_opt(2025, 1, 6)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap_or_default();
        Self::anchored_at(anchor)
    }
}

impl SimulatedCalendar {
    pub fn anchored_at(anchor: NaiveDateTime) -> Self {
        Self {
            anchor,
            bookings: Mutex::new(Vec::new()),
        }
    }

    /// Anchored at the current local minute
    pub fn starting_now() -> Self {
        let now = Local::now().naive_local();
        let anchor = now
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now);
        Self::anchored_at(anchor)
    }

    pub fn anchor(&self) -> NaiveDateTime {
        self.anchor
    }

    pub fn bookings(&self) -> Result<Vec<Booking>, ToolError> {
        Ok(self.lock()?.clone())
    }

    /// Earliest free start for a meeting of `duration_minutes`.
    pub fn find_slot(&self, duration_minutes: u64) -> Result<NaiveDateTime, ToolError> {
        let bookings = self.lock()?;
        self.first_free(&bookings, duration_minutes)
    }

    /// Book a meeting. Without a slot the earliest free one is used.
    pub fn book(
        &self,
        title: &str,
        description: &str,
        slot: Option<NaiveDateTime>,
        duration_minutes: u64,
    ) -> Result<Booking, ToolError> {
        let mut bookings = self.lock()?;

        let start = match slot {
            Some(start) => {
                let end = add_minutes(start, duration_minutes).ok_or_else(|| {
                    ToolError::invalid("time_slot", "meeting would end past the calendar range")
                })?;
                if let Some(clash) = bookings.iter().find(|b| b.overlaps(start, end)) {
                    return Err(ToolError::failed(format!(
                        "slot {} overlaps '{}' at {}",
                        format_slot(&start),
                        clash.title,
                        format_slot(&clash.start)
                    )));
                }
                start
            }
            None => self.first_free(&bookings, duration_minutes)?,
        };

        let booking = Booking {
            id: bookings.len() as u32 + 1,
            title: title.to_string(),
            description: description.to_string(),
            start,
            duration_minutes,
        };
        bookings.push(booking.clone());
        Ok(booking)
    }

    fn first_free(
        &self,
        bookings: &[Booking],
        duration_minutes: u64,
    ) -> Result<NaiveDateTime, ToolError> {
        let window_end = add_hours(self.anchor, WINDOW_HOURS)?;
        let mut candidate = add_hours(self.anchor, LEAD_HOURS)?;

        loop {
            let end = add_minutes(candidate, duration_minutes);
            let Some(end) = end.filter(|end| *end <= window_end) else {
                return Err(ToolError::failed(format!(
                    "no free {}-minute slot before {}",
                    duration_minutes,
                    format_slot(&window_end)
                )));
            };
            match bookings
                .iter()
                .filter(|b| b.overlaps(candidate, end))
                .map(Booking::end)
                .max()
            {
                Some(next) => candidate = next,
                None => return Ok(candidate),
            }
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Booking>>, ToolError> {
        self.bookings
            .lock()
            .map_err(|e| ToolError::failed(format!("calendar unavailable: {}", e)))
    }
}

fn duration_param(params: &ToolParams, required: bool) -> Result<u64, ToolError> {
    let minutes = if required {
        required_u64(params, "duration_minutes")?
    } else {
        optional_u64(params, "duration_minutes")?.unwrap_or(DEFAULT_DURATION_MINUTES)
    };
    if minutes == 0 {
        return Err(ToolError::invalid("duration_minutes", "must be greater than zero"));
    }
    if minutes > MAX_DURATION_MINUTES {
        return Err(ToolError::invalid(
            "duration_minutes",
            format!("must be at most {}", MAX_DURATION_MINUTES),
        ));
    }
    Ok(minutes)
}

/// `find_calendar_slot {duration_minutes}` → `"YYYY-MM-DD HH:MM"`
pub struct FindCalendarSlot {
    calendar: Arc<SimulatedCalendar>,
}

impl FindCalendarSlot {
    pub fn new(calendar: Arc<SimulatedCalendar>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for FindCalendarSlot {
    fn name(&self) -> &str {
        "find_calendar_slot"
    }

    async fn call(&self, params: &ToolParams) -> Result<Value, ToolError> {
        let duration = duration_param(params, true)?;
        let slot = self.calendar.find_slot(duration)?;
        tracing::debug!(duration, slot = %format_slot(&slot), "Found calendar slot");
        Ok(Value::String(format_slot(&slot)))
    }
}

/// `book_calendar_event {title, description?, time_slot?, duration_minutes?}`
pub struct BookCalendarEvent {
    calendar: Arc<SimulatedCalendar>,
}

impl BookCalendarEvent {
    pub fn new(calendar: Arc<SimulatedCalendar>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for BookCalendarEvent {
    fn name(&self) -> &str {
        "book_calendar_event"
    }

    async fn call(&self, params: &ToolParams) -> Result<Value, ToolError> {
        let title = required_str(params, "title")?;
        let description = optional_str(params, "description")?.unwrap_or_default();
        let duration = duration_param(params, false)?;
        let slot = optional_str(params, "time_slot")?
            .map(|s| {
                NaiveDateTime::parse_from_str(s.trim(), SLOT_FORMAT).map_err(|e| {
                    ToolError::invalid("time_slot", format!("expected YYYY-MM-DD HH:MM: {}", e))
                })
            })
            .transpose()?;

        let booking = self.calendar.book(title, description, slot, duration)?;
        tracing::info!(
            id = booking.id,
            title = %booking.title,
            slot = %format_slot(&booking.start),
            "Booked calendar event"
        );

        Ok(json!({
            "booked": true,
            "event_id": booking.id,
            "title": booking.title,
            "time_slot": format_slot(&booking.start),
            "duration_minutes": booking.duration_minutes,
        }))
    }
}
