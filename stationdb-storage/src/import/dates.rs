use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;

const DATE_TIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d"];

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        })
}

/// Tallies dates seen in a dump to pick its content date
#[derive(Debug, Default)]
pub struct DateCounter {
    counts: HashMap<NaiveDate, u64>,
}

impl DateCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, raw: &str) {
        if let Some(date) = parse_date(raw) {
            *self.counts.entry(date).or_insert(0) += 1;
        }
    }

    /// Most frequent date; equal counts go to the later date
    pub fn most_common(&self) -> Option<NaiveDate> {
        self.counts
            .iter()
            .max_by(|(a_date, a_count), (b_date, b_count)| {
                a_count.cmp(b_count).then_with(|| a_date.cmp(b_date))
            })
            .map(|(date, _)| *date)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
