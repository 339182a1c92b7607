use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Deserialize;

use crate::error::ReconError;
use crate::model::AppliedFilters;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: InputConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Input file paths, resolved relative to the config file by the caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    #[serde(default)]
    pub orders: Option<String>,
    #[serde(default)]
    pub payments: Option<String>,
    #[serde(default)]
    pub refunds: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
    /// Off-hours window, `HH:MM-HH:MM`. Wraps midnight when start > end.
    #[serde(default)]
    pub offhours: Option<String>,
    #[serde(default)]
    pub weekend: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved (validated) settings
// ---------------------------------------------------------------------------

/// Inclusive calendar-date range applied to order_datetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// An unknown datetime never satisfies a bounded range.
    pub fn contains(&self, at: Option<NaiveDateTime>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(at) = at else {
            return false;
        };
        let date = at.date();
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// Time-of-day window in minutes since midnight, half-open `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffHoursWindow {
    pub start: u32,
    pub end: u32,
}

impl OffHoursWindow {
    pub fn contains_minute(&self, minute_of_day: u32) -> bool {
        if self.start < self.end {
            self.start <= minute_of_day && minute_of_day < self.end
        } else {
            // Overnight (e.g. 21:00-09:00). start == end covers the whole day.
            minute_of_day >= self.start || minute_of_day < self.end
        }
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.contains_minute(at.hour() * 60 + at.minute())
    }
}

impl FromStr for OffHoursWindow {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| {
            ReconError::InvalidConfiguration(format!(
                "offhours '{s}': {why} (expected HH:MM-HH:MM)"
            ))
        };
        let (start, end) = s.split_once('-').ok_or_else(|| invalid("missing '-'"))?;
        let start = parse_hhmm(start).ok_or_else(|| invalid("bad start time"))?;
        let end = parse_hhmm(end).ok_or_else(|| invalid("bad end time"))?;
        Ok(Self { start, end })
    }
}

impl std::fmt::Display for OffHoursWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start / 60,
            self.start % 60,
            self.end / 60,
            self.end % 60
        )
    }
}

fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.trim().split_once(':')?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return None;
    }
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    (h < 24 && m < 60).then_some(h * 60 + m)
}

/// Per-row rule settings threaded into the rule engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleConfig {
    pub offhours: Option<OffHoursWindow>,
    pub weekend: bool,
}

/// Everything the engine needs from the filters, validated up front.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFilters {
    pub date_range: DateRange,
    pub rules: RuleConfig,
    pub applied: AppliedFilters,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl FilterConfig {
    pub fn resolve(&self) -> Result<ResolvedFilters, ReconError> {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(ReconError::InvalidConfiguration(format!(
                    "date_from {from} is after date_to {to}"
                )));
            }
        }

        let offhours = self
            .offhours
            .as_deref()
            .map(str::parse::<OffHoursWindow>)
            .transpose()?;

        Ok(ResolvedFilters {
            date_range: DateRange {
                from: self.date_from,
                to: self.date_to,
            },
            rules: RuleConfig {
                offhours,
                weekend: self.weekend,
            },
            applied: AppliedFilters {
                date_from: self.date_from,
                date_to: self.date_to,
                offhours: offhours.map(|w| w.to_string()),
                weekend: self.weekend,
            },
        })
    }
}

impl RunConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: RunConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        self.filters.resolve().map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
