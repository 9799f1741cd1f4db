use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

pub type EventCode = i32;

#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub driver_id: String,
    pub event_code: EventCode,
    pub read_timestamp: NaiveDateTime,
}

impl EventRecord {
    pub fn read_date(&self) -> NaiveDate {
        self.read_timestamp.date()
    }
}

/// Inclusive calendar-date bounds applied to `read_timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverTotal {
    pub driver_id: String,
    pub total_score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventCount {
    pub event_code: EventCode,
    pub event_name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverReport {
    pub driver_id: String,
    pub total_score: f64,
    pub daily_series: Vec<DailyCount>,
    pub event_breakdown: Vec<EventCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeSummary {
    pub event_code: EventCode,
    pub event_name: Option<String>,
    pub count: usize,
    pub weightable: bool,
}
