// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! CF-style calendars at day resolution.
//!
//! Climate model output is routinely produced on non-civil calendars: no
//! leap days, or twelve fixed 30-day months. Interval rules only need to
//! know which (year, month, day) a time value falls on, so this module stops
//! at day resolution and leaves sub-daily offsets to the source.

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

/// The calendar a time axis is encoded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Calendar {
    /// Proleptic Gregorian, the civil calendar.
    #[default]
    Gregorian,
    /// 365-day years, February always 28 days.
    Noleap,
    /// Twelve 30-day months.
    Day360,
}

/// A calendar date produced by decoding a time value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CalendarDate {
    pub year: i64,
    /// 1-based
    pub month: u32,
    /// 1-based
    pub day: u32,
}

impl CalendarDate {
    /// Meteorological season index, 0..4. DJF=0, MAM=1, JJA=2, SON=3.
    /// December counts toward the following year's DJF.
    pub fn season(&self) -> (i64, u32) {
        match self.month {
            12 => (self.year + 1, 0),
            1 | 2 => (self.year, 0),
            3..=5 => (self.year, 1),
            6..=8 => (self.year, 2),
            _ => (self.year, 3),
        }
    }
}

/// Time units of the form `days since YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeUnits {
    pub epoch: (i64, u32, u32),
}

impl TimeUnits {
    /// Parse the CF units string. Only the day-resolution form is supported.
    pub fn parse(units: &str) -> Result<Self, EngineError> {
        let rest = units
            .strip_prefix("days since ")
            .ok_or_else(|| EngineError::unsatisfiable(format!("unsupported time units '{units}'")))?;
        let date_part = rest.split_whitespace().next().unwrap_or(rest);
        let mut fields = date_part.split('-');
        let parse_field = |s: Option<&str>| -> Result<i64, EngineError> {
            s.and_then(|v| v.parse::<i64>().ok()).ok_or_else(|| {
                EngineError::unsatisfiable(format!("malformed date in time units '{units}'"))
            })
        };
        let year = parse_field(fields.next())?;
        let month = parse_field(fields.next())? as u32;
        let day = parse_field(fields.next())? as u32;
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(EngineError::unsatisfiable(format!(
                "date out of range in time units '{units}'"
            )));
        }
        Ok(Self {
            epoch: (year, month, day),
        })
    }

    pub fn days_since(epoch: (i64, u32, u32)) -> Self {
        Self { epoch }
    }
}

const NOLEAP_MONTH_DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

fn is_gregorian_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Days from civil date, proleptic Gregorian. Hinnant's algorithm.
fn gregorian_days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (month as i64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

/// Civil date from days, proleptic Gregorian. Hinnant's algorithm.
fn gregorian_civil_from_days(days: i64) -> CalendarDate {
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    CalendarDate {
        year: if month <= 2 { y + 1 } else { y },
        month,
        day,
    }
}

fn noleap_day_of_year(month: u32, day: u32) -> i64 {
    let mut doy = day as i64 - 1;
    for m in 0..(month as usize - 1) {
        doy += NOLEAP_MONTH_DAYS[m] as i64;
    }
    doy
}

impl Calendar {
    /// Decode a time value (offset in `units`) into a calendar date.
    pub fn decode(&self, time: f64, units: &TimeUnits) -> CalendarDate {
        let offset = time.floor() as i64;
        let (ey, em, ed) = units.epoch;
        match self {
            Calendar::Gregorian => {
                gregorian_civil_from_days(gregorian_days_from_civil(ey, em, ed) + offset)
            }
            Calendar::Noleap => {
                let total = ey * 365 + noleap_day_of_year(em, ed) + offset;
                let year = total.div_euclid(365);
                let mut doy = total.rem_euclid(365) as u32;
                let mut month = 1;
                for len in NOLEAP_MONTH_DAYS {
                    if doy < len {
                        break;
                    }
                    doy -= len;
                    month += 1;
                }
                CalendarDate {
                    year,
                    month,
                    day: doy + 1,
                }
            }
            Calendar::Day360 => {
                let total = ey * 360 + (em as i64 - 1) * 30 + (ed as i64 - 1) + offset;
                let year = total.div_euclid(360);
                let rem = total.rem_euclid(360);
                CalendarDate {
                    year,
                    month: (rem / 30) as u32 + 1,
                    day: (rem % 30) as u32 + 1,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units() -> TimeUnits {
        TimeUnits::days_since((2020, 1, 1))
    }

    #[test]
    fn parse_units_round_trips() {
        let u = TimeUnits::parse("days since 1979-01-01 00:00:00").unwrap();
        assert_eq!(u.epoch, (1979, 1, 1));
        assert!(TimeUnits::parse("hours since 1979-01-01").is_err());
        assert!(TimeUnits::parse("days since 1979-13-01").is_err());
    }

    #[test]
    fn gregorian_handles_leap_year() {
        let c = Calendar::Gregorian;
        // 2020 is a leap year: day 59 is Feb 29
        let d = c.decode(59.0, &units());
        assert_eq!((d.year, d.month, d.day), (2020, 2, 29));
        let d = c.decode(60.0, &units());
        assert_eq!((d.year, d.month, d.day), (2020, 3, 1));
    }

    #[test]
    fn noleap_skips_feb_29() {
        let c = Calendar::Noleap;
        let d = c.decode(59.0, &units());
        assert_eq!((d.year, d.month, d.day), (2020, 3, 1));
        // a full noleap year later lands on the same date
        let d = c.decode(59.0 + 365.0, &units());
        assert_eq!((d.year, d.month, d.day), (2021, 3, 1));
    }

    #[test]
    fn day360_months_are_uniform() {
        let c = Calendar::Day360;
        let d = c.decode(30.0, &units());
        assert_eq!((d.year, d.month, d.day), (2020, 2, 1));
        let d = c.decode(359.0, &units());
        assert_eq!((d.year, d.month, d.day), (2020, 12, 30));
        let d = c.decode(360.0, &units());
        assert_eq!((d.year, d.month, d.day), (2021, 1, 1));
    }

    #[test]
    fn december_belongs_to_next_years_djf() {
        let d = CalendarDate {
            year: 2020,
            month: 12,
            day: 15,
        };
        assert_eq!(d.season(), (2021, 0));
        let d = CalendarDate {
            year: 2021,
            month: 1,
            day: 15,
        };
        assert_eq!(d.season(), (2021, 0));
    }

    #[test]
    fn gregorian_is_stable_across_epochs() {
        let c = Calendar::Gregorian;
        let a = c.decode(100.0, &TimeUnits::days_since((1979, 1, 1)));
        assert_eq!((a.year, a.month, a.day), (1979, 4, 11));
    }
}
