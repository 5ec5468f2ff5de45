//! Date/time primitives and xs:duration
//!
//! Calendar arithmetic goes through `chrono::NaiveDate` (proleptic
//! Gregorian). XSD years have no year zero; `-0001` is chrono year `0`.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::str::FromStr;

use crate::components::Primitive;
use crate::error::{ValidationError, ValidationErrorKind, ValidationResult};

static DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<y>-?\d{4,})-(?P<mo>\d{2})-(?P<d>\d{2})T(?P<h>\d{2}):(?P<mi>\d{2}):(?P<s>\d{2}(?:\.\d+)?)(?P<tz>Z|[+-]\d{2}:\d{2})?$",
    )
    .expect("static regex")
});
static TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<h>\d{2}):(?P<mi>\d{2}):(?P<s>\d{2}(?:\.\d+)?)(?P<tz>Z|[+-]\d{2}:\d{2})?$")
        .expect("static regex")
});
static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<y>-?\d{4,})-(?P<mo>\d{2})-(?P<d>\d{2})(?P<tz>Z|[+-]\d{2}:\d{2})?$")
        .expect("static regex")
});
static GYEAR_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<y>-?\d{4,})-(?P<mo>\d{2})(?P<tz>Z|[+-]\d{2}:\d{2})?$").expect("static regex")
});
static GYEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<y>-?\d{4,})(?P<tz>Z|[+-]\d{2}:\d{2})?$").expect("static regex")
});
static GMONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^--(?P<mo>\d{2})-(?P<d>\d{2})(?P<tz>Z|[+-]\d{2}:\d{2})?$").expect("static regex")
});
static GDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^---(?P<d>\d{2})(?P<tz>Z|[+-]\d{2}:\d{2})?$").expect("static regex")
});
// "--MM--" is the pre-errata XSD 1.0 form and still shows up in schemas
static GMONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^--(?P<mo>\d{2})(?:--)?(?P<tz>Z|[+-]\d{2}:\d{2})?$").expect("static regex")
});
static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<neg>-)?P(?:(?P<y>\d+)Y)?(?:(?P<mo>\d+)M)?(?:(?P<d>\d+)D)?(?:(?P<t>T)(?:(?P<h>\d+)H)?(?:(?P<mi>\d+)M)?(?:(?P<s>\d+(?:\.\d+)?)S)?)?$",
    )
    .expect("static regex")
});

const SECONDS_PER_DAY: i64 = 86_400;
const FOURTEEN_HOURS: i64 = 14 * 3_600;

fn invalid_date(lexical: &str, reason: &str) -> ValidationError {
    ValidationError::new(
        ValidationErrorKind::InvalidDateTime,
        format!("'{}' is not a valid date/time: {}", lexical, reason),
    )
}

fn invalid_duration(lexical: &str, reason: &str) -> ValidationError {
    ValidationError::new(
        ValidationErrorKind::InvalidDuration,
        format!("'{}' is not a valid duration: {}", lexical, reason),
    )
}

/// XSD year to chrono's astronomical year
fn chrono_year(year: i32) -> i32 {
    if year < 0 {
        year + 1
    } else {
        year
    }
}

fn xsd_year(year: i32) -> i32 {
    if year <= 0 {
        year - 1
    } else {
        year
    }
}

fn is_leap(year: i32) -> bool {
    NaiveDate::from_ymd_opt(chrono_year(year), 2, 29).is_some()
}

fn days_in_month(year: Option<i32>, month: u32) -> u32 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 => match year {
            Some(y) if !is_leap(y) => 28,
            _ => 29,
        },
        _ => 31,
    }
}

/// A value of one of the eight date/time primitives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Temporal {
    /// Which primitive this is
    pub primitive: Primitive,
    /// XSD year (never zero)
    pub year: Option<i32>,
    /// Month 1-12
    pub month: Option<u32>,
    /// Day of month
    pub day: Option<u32>,
    /// Hour 0-23 once normalized
    pub hour: u32,
    /// Minute
    pub minute: u32,
    /// Seconds with fraction
    pub second: Decimal,
    /// Timezone offset in minutes; `None` when absent
    pub tz_minutes: Option<i32>,
}

fn field(caps: &Captures<'_>, name: &str) -> Option<u32> {
    caps.name(name).and_then(|m| m.as_str().parse().ok())
}

fn parse_year(lexical: &str, text: &str) -> ValidationResult<i32> {
    let digits = text.trim_start_matches('-');
    if digits.len() > 4 && digits.starts_with('0') {
        return Err(invalid_date(lexical, "year has leading zeros"));
    }
    let year: i32 = text
        .parse()
        .map_err(|_| invalid_date(lexical, "year out of range"))?;
    if year == 0 {
        return Err(invalid_date(lexical, "year 0000 is not allowed"));
    }
    Ok(year)
}

fn parse_tz(lexical: &str, text: &str) -> ValidationResult<i32> {
    if text == "Z" {
        return Ok(0);
    }
    let sign = if text.starts_with('-') { -1 } else { 1 };
    let hours: i32 = text[1..3]
        .parse()
        .map_err(|_| invalid_date(lexical, "bad timezone"))?;
    let minutes: i32 = text[4..6]
        .parse()
        .map_err(|_| invalid_date(lexical, "bad timezone"))?;
    if minutes > 59 || hours > 14 || (hours == 14 && minutes != 0) {
        return Err(invalid_date(lexical, "timezone out of range"));
    }
    Ok(sign * (hours * 60 + minutes))
}

/// Parse and normalize a date/time lexical of the given primitive
pub fn parse_temporal(primitive: Primitive, lexical: &str) -> ValidationResult<Temporal> {
    let regex: &Regex = match primitive {
        Primitive::DateTime => &DATE_TIME,
        Primitive::Time => &TIME,
        Primitive::Date => &DATE,
        Primitive::GYearMonth => &GYEAR_MONTH,
        Primitive::GYear => &GYEAR,
        Primitive::GMonthDay => &GMONTH_DAY,
        Primitive::GDay => &GDAY,
        Primitive::GMonth => &GMONTH,
        other => {
            return Err(invalid_date(lexical, &format!("{} is not a date/time type", other)));
        }
    };
    let caps = regex
        .captures(lexical)
        .ok_or_else(|| invalid_date(lexical, "bad lexical form"))?;

    let year = match caps.name("y") {
        Some(m) => Some(parse_year(lexical, m.as_str())?),
        None => None,
    };
    let month = field(&caps, "mo");
    if let Some(mo) = month {
        if !(1..=12).contains(&mo) {
            return Err(invalid_date(lexical, "month out of range"));
        }
    }
    let day = field(&caps, "d");
    if let Some(d) = day {
        let max = month.map_or(31, |mo| days_in_month(year, mo));
        if d < 1 || d > max {
            return Err(invalid_date(lexical, "day out of range"));
        }
    }

    let hour = field(&caps, "h").unwrap_or(0);
    let minute = field(&caps, "mi").unwrap_or(0);
    let second = match caps.name("s") {
        Some(m) => Decimal::from_str(m.as_str())
            .map_err(|_| invalid_date(lexical, "bad seconds"))?,
        None => Decimal::ZERO,
    };
    if minute > 59 || second >= Decimal::from(60) {
        return Err(invalid_date(lexical, "time out of range"));
    }
    if hour > 24 || (hour == 24 && (minute != 0 || !second.is_zero())) {
        return Err(invalid_date(lexical, "hour out of range"));
    }

    let tz_minutes = match caps.name("tz") {
        Some(m) => Some(parse_tz(lexical, m.as_str())?),
        None => None,
    };

    let mut value = Temporal {
        primitive,
        year,
        month,
        day,
        hour,
        minute,
        second: second.normalize(),
        tz_minutes,
    };
    value
        .normalize()
        .ok_or_else(|| invalid_date(lexical, "outside the supported calendar range"))?;
    Ok(value)
}

impl Temporal {
    /// Fold 24:00:00 into the next day and move timed values to UTC
    fn normalize(&mut self) -> Option<()> {
        match self.primitive {
            Primitive::DateTime if self.tz_minutes.is_some() || self.hour == 24 => {
                let date = NaiveDate::from_ymd_opt(
                    chrono_year(self.year?),
                    self.month?,
                    self.day?,
                )?;
                let total = i64::from(date.num_days_from_ce()) * SECONDS_PER_DAY
                    + i64::from(self.hour) * 3_600
                    + i64::from(self.minute) * 60
                    - i64::from(self.tz_minutes.unwrap_or(0)) * 60;
                let days = i32::try_from(total.div_euclid(SECONDS_PER_DAY)).ok()?;
                let rem = total.rem_euclid(SECONDS_PER_DAY);
                let date = NaiveDate::from_num_days_from_ce_opt(days)?;
                self.year = Some(xsd_year(date.year()));
                self.month = Some(date.month());
                self.day = Some(date.day());
                self.hour = (rem / 3_600) as u32;
                self.minute = ((rem % 3_600) / 60) as u32;
                self.tz_minutes = self.tz_minutes.map(|_| 0);
            }
            Primitive::Time if self.tz_minutes.is_some() || self.hour == 24 => {
                let total = i64::from(self.hour) * 60 + i64::from(self.minute)
                    - i64::from(self.tz_minutes.unwrap_or(0));
                let rem = total.rem_euclid(24 * 60);
                self.hour = (rem / 60) as u32;
                self.minute = (rem % 60) as u32;
                self.tz_minutes = self.tz_minutes.map(|_| 0);
            }
            _ => {}
        }
        Some(())
    }

    /// Seconds since 0001-01-01T00:00:00Z, missing fields taken from 1972-12-01
    pub fn instant(&self) -> Option<Decimal> {
        let year = chrono_year(self.year.unwrap_or(1972));
        let date = NaiveDate::from_ymd_opt(year, self.month.unwrap_or(12), self.day.unwrap_or(1))?;
        let seconds = i64::from(date.num_days_from_ce()) * SECONDS_PER_DAY
            + i64::from(self.hour) * 3_600
            + i64::from(self.minute) * 60
            - i64::from(self.tz_minutes.unwrap_or(0)) * 60;
        Some(Decimal::from(seconds) + self.second)
    }

    /// Canonical lexical form
    pub fn canonical(&self) -> String {
        let year = self.year.map(format_year).unwrap_or_default();
        let month = self.month.unwrap_or(0);
        let day = self.day.unwrap_or(0);
        let tz = format_tz(self.tz_minutes);
        match self.primitive {
            Primitive::DateTime => format!(
                "{}-{:02}-{:02}T{:02}:{:02}:{}{}",
                year,
                month,
                day,
                self.hour,
                self.minute,
                format_seconds(self.second),
                tz
            ),
            Primitive::Time => format!(
                "{:02}:{:02}:{}{}",
                self.hour,
                self.minute,
                format_seconds(self.second),
                tz
            ),
            Primitive::Date => format!("{}-{:02}-{:02}{}", year, month, day, tz),
            Primitive::GYearMonth => format!("{}-{:02}{}", year, month, tz),
            Primitive::GYear => format!("{}{}", year, tz),
            Primitive::GMonthDay => format!("--{:02}-{:02}{}", month, day, tz),
            Primitive::GDay => format!("---{:02}{}", day, tz),
            _ => format!("--{:02}{}", month, tz),
        }
    }
}

fn format_year(year: i32) -> String {
    if year < 0 {
        format!("-{:04}", year.unsigned_abs())
    } else {
        format!("{:04}", year)
    }
}

fn format_tz(tz: Option<i32>) -> String {
    match tz {
        None => String::new(),
        Some(0) => "Z".to_string(),
        Some(minutes) => {
            let sign = if minutes < 0 { '-' } else { '+' };
            let minutes = minutes.unsigned_abs();
            format!("{}{:02}:{:02}", sign, minutes / 60, minutes % 60)
        }
    }
}

fn format_seconds(second: Decimal) -> String {
    let second = second.normalize();
    if second < Decimal::TEN {
        format!("0{}", second)
    } else {
        second.to_string()
    }
}

/// Order two date/time values
///
/// Values with and without a timezone are comparable only when they are
/// more than fourteen hours apart.
pub fn compare_temporal(a: &Temporal, b: &Temporal) -> Option<Ordering> {
    if a.primitive != b.primitive {
        return None;
    }
    let (ia, ib) = (a.instant()?, b.instant()?);
    if a.tz_minutes.is_some() == b.tz_minutes.is_some() {
        return Some(ia.cmp(&ib));
    }
    let window = Decimal::from(FOURTEEN_HOURS);
    if ia + window < ib {
        Some(Ordering::Less)
    } else if ia - window > ib {
        Some(Ordering::Greater)
    } else {
        None
    }
}

/// An xs:duration as (months, seconds); both carry the same sign
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    /// Years and months folded into months
    pub months: i64,
    /// Days, hours, minutes and seconds folded into seconds
    pub seconds: Decimal,
}

fn duration_component(lexical: &str, caps: &Captures<'_>, name: &str) -> ValidationResult<i64> {
    match caps.name(name) {
        Some(m) => m
            .as_str()
            .parse()
            .map_err(|_| invalid_duration(lexical, "component out of range")),
        None => Ok(0),
    }
}

/// Parse a duration lexical
pub fn parse_duration(lexical: &str) -> ValidationResult<Duration> {
    let caps = DURATION
        .captures(lexical)
        .ok_or_else(|| invalid_duration(lexical, "bad lexical form"))?;
    let has_date = ["y", "mo", "d"].iter().any(|n| caps.name(n).is_some());
    let has_time = ["h", "mi", "s"].iter().any(|n| caps.name(n).is_some());
    if caps.name("t").is_some() && !has_time {
        return Err(invalid_duration(lexical, "'T' without a time component"));
    }
    if !has_date && !has_time {
        return Err(invalid_duration(lexical, "no components"));
    }

    let overflow = || invalid_duration(lexical, "value out of range");
    let years = duration_component(lexical, &caps, "y")?;
    let months = duration_component(lexical, &caps, "mo")?;
    let days = duration_component(lexical, &caps, "d")?;
    let hours = duration_component(lexical, &caps, "h")?;
    let minutes = duration_component(lexical, &caps, "mi")?;
    let seconds = match caps.name("s") {
        Some(m) => Decimal::from_str(m.as_str()).map_err(|_| overflow())?,
        None => Decimal::ZERO,
    };

    let total_months = years
        .checked_mul(12)
        .and_then(|m| m.checked_add(months))
        .ok_or_else(overflow)?;
    let whole = days
        .checked_mul(SECONDS_PER_DAY)
        .and_then(|s| s.checked_add(hours.checked_mul(3_600)?))
        .and_then(|s| s.checked_add(minutes.checked_mul(60)?))
        .ok_or_else(overflow)?;
    let total_seconds = Decimal::from(whole)
        .checked_add(seconds)
        .ok_or_else(overflow)?;

    let negative = caps.name("neg").is_some();
    Ok(Duration {
        months: if negative { -total_months } else { total_months },
        seconds: if negative { -total_seconds } else { total_seconds }.normalize(),
    })
}

impl Duration {
    /// True for `PT0S` and its equivalents
    pub fn is_zero(&self) -> bool {
        self.months == 0 && self.seconds.is_zero()
    }

    /// Canonical lexical form
    pub fn canonical(&self) -> String {
        if self.is_zero() {
            return "PT0S".to_string();
        }
        let mut out = String::new();
        if self.months < 0 || self.seconds.is_sign_negative() {
            out.push('-');
        }
        out.push('P');

        let months = self.months.unsigned_abs();
        if months / 12 > 0 {
            out.push_str(&format!("{}Y", months / 12));
        }
        if months % 12 > 0 {
            out.push_str(&format!("{}M", months % 12));
        }

        let seconds = self.seconds.abs();
        let whole = seconds.trunc();
        let fraction = seconds - whole;
        let whole = whole.to_i64().unwrap_or(i64::MAX);
        let days = whole / SECONDS_PER_DAY;
        let hours = (whole % SECONDS_PER_DAY) / 3_600;
        let minutes = (whole % 3_600) / 60;
        let secs = (Decimal::from(whole % 60) + fraction).normalize();

        if days > 0 {
            out.push_str(&format!("{}D", days));
        }
        if hours > 0 || minutes > 0 || !secs.is_zero() {
            out.push('T');
            if hours > 0 {
                out.push_str(&format!("{}H", hours));
            }
            if minutes > 0 {
                out.push_str(&format!("{}M", minutes));
            }
            if !secs.is_zero() {
                out.push_str(&format!("{}S", secs));
            }
        }
        out
    }

    /// Seconds from 0001-01-01 of `start + self`
    fn added_to(&self, (year, month): (i64, i64)) -> Option<Decimal> {
        let total = year.checked_mul(12)?.checked_add(month - 1)?.checked_add(self.months)?;
        let date = NaiveDate::from_ymd_opt(
            i32::try_from(total.div_euclid(12)).ok()?,
            u32::try_from(total.rem_euclid(12) + 1).ok()?,
            1,
        )?;
        Decimal::from(i64::from(date.num_days_from_ce()) * SECONDS_PER_DAY).checked_add(self.seconds)
    }
}

/// Reference start points for duration ordering
const REFERENCE_POINTS: [(i64, i64); 4] = [(1696, 9), (1697, 2), (1903, 3), (1903, 7)];

/// Partial order on durations
///
/// Two durations compare only if adding them to each reference point
/// orders them the same way every time.
pub fn compare_duration(a: &Duration, b: &Duration) -> Option<Ordering> {
    let mut result = None;
    for start in REFERENCE_POINTS {
        let ordering = a.added_to(start)?.cmp(&b.added_to(start)?);
        match result {
            None => result = Some(ordering),
            Some(previous) if previous != ordering => return None,
            Some(_) => {}
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon(p: Primitive, s: &str) -> String {
        parse_temporal(p, s).unwrap().canonical()
    }

    #[test]
    fn test_datetime_canonical_utc() {
        assert_eq!(
            canon(Primitive::DateTime, "2024-01-15T10:30:00+02:00"),
            "2024-01-15T08:30:00Z"
        );
        assert_eq!(
            canon(Primitive::DateTime, "2024-12-31T23:00:00-01:30"),
            "2025-01-01T00:30:00Z"
        );
        assert_eq!(
            canon(Primitive::DateTime, "2024-01-15T10:30:00.500"),
            "2024-01-15T10:30:00.5"
        );
        assert_eq!(
            canon(Primitive::DateTime, "1999-12-31T24:00:00"),
            "2000-01-01T00:00:00"
        );
    }

    #[test]
    fn test_date_keeps_timezone() {
        assert_eq!(canon(Primitive::Date, "2024-02-29+00:00"), "2024-02-29Z");
        assert_eq!(canon(Primitive::Date, "2024-02-29-05:00"), "2024-02-29-05:00");
        assert_eq!(canon(Primitive::GMonth, "--05--"), "--05");
        assert_eq!(canon(Primitive::GYear, "-0044"), "-0044");
        assert_eq!(canon(Primitive::Time, "23:30:00-01:00"), "00:30:00Z");
    }

    #[test]
    fn test_temporal_rejects() {
        for (p, bad) in [
            (Primitive::Date, "2023-02-29"),
            (Primitive::Date, "2024-13-01"),
            (Primitive::Date, "0000-01-01"),
            (Primitive::Date, "02024-01-01"),
            (Primitive::DateTime, "2024-01-01T24:00:01"),
            (Primitive::DateTime, "2024-01-01T10:00:00+14:30"),
            (Primitive::Time, "10:60:00"),
            (Primitive::GDay, "---32"),
            (Primitive::GMonthDay, "--04-31"),
        ] {
            let err = parse_temporal(p, bad).unwrap_err();
            assert_eq!(err.kind, ValidationErrorKind::InvalidDateTime, "{}", bad);
        }
        assert!(parse_temporal(Primitive::GMonthDay, "--02-29").is_ok());
    }

    #[test]
    fn test_timezone_window() {
        let a = parse_temporal(Primitive::DateTime, "2024-01-01T12:00:00").unwrap();
        let near = parse_temporal(Primitive::DateTime, "2024-01-01T13:00:00Z").unwrap();
        let far = parse_temporal(Primitive::DateTime, "2024-01-03T12:00:00Z").unwrap();
        assert_eq!(compare_temporal(&a, &near), None);
        assert_eq!(compare_temporal(&a, &far), Some(Ordering::Less));
        assert_eq!(compare_temporal(&far, &near), Some(Ordering::Greater));
    }

    #[test]
    fn test_duration_canonical() {
        assert_eq!(parse_duration("P1Y2M3DT4H5M6.70S").unwrap().canonical(), "P1Y2M3DT4H5M6.7S");
        assert_eq!(parse_duration("PT36H").unwrap().canonical(), "P1DT12H");
        assert_eq!(parse_duration("P14M").unwrap().canonical(), "P1Y2M");
        assert_eq!(parse_duration("-P0D").unwrap().canonical(), "PT0S");
        assert_eq!(parse_duration("-PT90S").unwrap().canonical(), "-PT1M30S");
    }

    #[test]
    fn test_duration_rejects() {
        for bad in ["P", "PT", "P1Y2", "1Y", "P-1Y", "P1.5Y", "PT1.S"] {
            let err = parse_duration(bad).unwrap_err();
            assert_eq!(err.kind, ValidationErrorKind::InvalidDuration, "{}", bad);
        }
    }

    #[test]
    fn test_duration_partial_order() {
        let month = parse_duration("P1M").unwrap();
        let days30 = parse_duration("P30D").unwrap();
        let days27 = parse_duration("P27D").unwrap();
        let days32 = parse_duration("P32D").unwrap();
        assert_eq!(compare_duration(&month, &days30), None);
        assert_eq!(compare_duration(&month, &days27), Some(Ordering::Greater));
        assert_eq!(compare_duration(&month, &days32), Some(Ordering::Less));
        let year = parse_duration("P1Y").unwrap();
        assert_eq!(compare_duration(&year, &parse_duration("P12M").unwrap()), Some(Ordering::Equal));
    }
}
