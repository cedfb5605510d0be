//! Five-field cron expressions (`minute hour day-of-month month day-of-week`).
//!
//! The `cron` crate wants a leading seconds field and numbers weekdays from
//! 1 = Sunday, so expressions are rewritten before parsing: seconds are pinned
//! to zero and numeric weekdays (0-7, both 0 and 7 meaning Sunday) become
//! names. Like the `cron` crate, a restricted day-of-month and day-of-week
//! must both match.

use chrono::{DateTime, TimeZone};
use fb_core::{Error, Result};
use std::fmt;
use std::str::FromStr;

const WEEKDAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: ::cron::Schedule,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(Error::invalid_schedule(
                expression,
                format!("expected 5 fields, found {}", fields.len()),
            ));
        }

        let day_of_week = translate_day_of_week(fields[4])
            .map_err(|reason| Error::invalid_schedule(expression, reason))?;
        let six_fields = format!(
            "0 {} {} {} {} {}",
            fields[0], fields[1], fields[2], fields[3], day_of_week
        );
        let schedule = ::cron::Schedule::from_str(&six_fields)
            .map_err(|e| Error::invalid_schedule(expression, e.to_string()))?;

        Ok(Self {
            expression: fields.join(" "),
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First occurrence strictly after `after`, in the same timezone.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedule.after(after).next()
    }
}

impl FromStr for CronSchedule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn translate_day_of_week(field: &str) -> std::result::Result<String, String> {
    let parts = field
        .split(',')
        .map(translate_day_part)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(parts.join(","))
}

fn translate_day_part(part: &str) -> std::result::Result<String, String> {
    let (range, step) = match part.split_once('/') {
        Some((range, step)) => (range, Some(step)),
        None => (part, None),
    };

    let range = match range.split_once('-') {
        Some((start, end)) => {
            let start_name = day_name(start)?;
            if end.trim() == "7" && start_name != "SUN" {
                // Sunday as 7 closes the week; the named form has to wrap explicitly.
                if step.is_some() {
                    return Err(format!("unsupported day-of-week range with step: {}", part));
                }
                match start_name.as_str() {
                    "SAT" => "SAT,SUN".to_string(),
                    _ => format!("{}-SAT,SUN", start_name),
                }
            } else {
                format!("{}-{}", start_name, day_name(end)?)
            }
        }
        None => day_name(range)?,
    };

    Ok(match step {
        Some(step) => format!("{}/{}", range, step),
        None => range,
    })
}

fn day_name(token: &str) -> std::result::Result<String, String> {
    match token.trim().parse::<usize>() {
        Ok(7) => Ok(WEEKDAYS[0].to_string()),
        Ok(n) if n < 7 => Ok(WEEKDAYS[n].to_string()),
        Ok(n) => Err(format!("day of week {} is out of range 0-7", n)),
        Err(_) => Ok(token.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike, Utc, Weekday};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_daily_at_eight() {
        let schedule = CronSchedule::parse("0 8 * * *").unwrap();
        assert_eq!(schedule.next_after(&at(2024, 1, 2, 7, 0)), Some(at(2024, 1, 2, 8, 0)));
        assert_eq!(schedule.next_after(&at(2024, 1, 2, 8, 0)), Some(at(2024, 1, 3, 8, 0)));
    }

    #[test]
    fn test_weekdays_use_standard_numbering() {
        // 2024-01-06 is a Saturday
        let weekdays = CronSchedule::parse("30 9 * * 1-5").unwrap();
        let next = weekdays.next_after(&at(2024, 1, 6, 12, 0)).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!((next.hour(), next.minute()), (9, 30));

        for sunday in ["0 0 * * 0", "0 0 * * 7", "0 0 * * SUN"] {
            let next = CronSchedule::parse(sunday)
                .unwrap()
                .next_after(&at(2024, 1, 2, 0, 0))
                .unwrap();
            assert_eq!(next.weekday(), Weekday::Sun, "{}", sunday);
        }

        let weekend = CronSchedule::parse("0 0 * * 6-7").unwrap();
        let first = weekend.next_after(&at(2024, 1, 2, 0, 0)).unwrap();
        let second = weekend.next_after(&first).unwrap();
        assert_eq!((first.weekday(), second.weekday()), (Weekday::Sat, Weekday::Sun));
    }

    #[test]
    fn test_lists_and_steps() {
        let schedule = CronSchedule::parse("*/15 8,18 * * *").unwrap();
        assert_eq!(schedule.next_after(&at(2024, 1, 2, 8, 20)), Some(at(2024, 1, 2, 8, 30)));
        assert_eq!(schedule.next_after(&at(2024, 1, 2, 8, 50)), Some(at(2024, 1, 2, 18, 0)));
    }

    #[test]
    fn test_invalid_expressions() {
        for expr in ["", "* * *", "0 8 * * * *", "61 * * * *", "0 8 * * 8", "every morning at 8 am"] {
            assert!(
                matches!(CronSchedule::parse(expr), Err(Error::InvalidSchedule { .. })),
                "{:?} should be rejected",
                expr
            );
        }
    }

    #[test]
    fn test_expression_is_normalized() {
        let schedule: CronSchedule = "0  8 * *   *".parse().unwrap();
        assert_eq!(schedule.to_string(), "0 8 * * *");
    }
}
