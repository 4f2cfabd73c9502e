//! Bar timeframes: a label such as `1hour` or `5m` resolved into the
//! broker's unit/multiplier pair.

use crate::domain::error::RollstitchError;
use chrono::Duration;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl TimeUnit {
    /// Parse a unit word. Accepts singular, plural and short forms.
    pub fn parse(unit: &str) -> Result<Self, RollstitchError> {
        match unit.trim().to_lowercase().as_str() {
            "second" | "seconds" | "sec" | "s" => Ok(TimeUnit::Second),
            "minute" | "minutes" | "min" | "m" => Ok(TimeUnit::Minute),
            "hour" | "hours" | "h" => Ok(TimeUnit::Hour),
            "day" | "days" | "d" => Ok(TimeUnit::Day),
            "week" | "weeks" | "w" => Ok(TimeUnit::Week),
            "month" | "months" | "mo" => Ok(TimeUnit::Month),
            _ => Err(RollstitchError::UnsupportedTimeUnit {
                unit: unit.to_string(),
            }),
        }
    }

    /// Numeric code used on the wire by the history endpoint.
    pub fn wire_code(self) -> u8 {
        match self {
            TimeUnit::Second => 1,
            TimeUnit::Minute => 2,
            TimeUnit::Hour => 3,
            TimeUnit::Day => 4,
            TimeUnit::Week => 5,
            TimeUnit::Month => 6,
        }
    }

    pub fn from_wire_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(TimeUnit::Second),
            2 => Some(TimeUnit::Minute),
            3 => Some(TimeUnit::Hour),
            4 => Some(TimeUnit::Day),
            5 => Some(TimeUnit::Week),
            6 => Some(TimeUnit::Month),
            _ => None,
        }
    }

    /// Nominal length of one unit. Months count as 30 days.
    pub fn duration(self) -> Duration {
        match self {
            TimeUnit::Second => Duration::seconds(1),
            TimeUnit::Minute => Duration::minutes(1),
            TimeUnit::Hour => Duration::hours(1),
            TimeUnit::Day => Duration::days(1),
            TimeUnit::Week => Duration::weeks(1),
            TimeUnit::Month => Duration::days(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Timeframe {
    pub label: String,
    pub unit: TimeUnit,
    pub unit_number: u32,
}

impl Timeframe {
    /// Parse labels like `1min`, `15m`, `1hour`, `4h`, `1d`, `d`, `w`.
    ///
    /// A missing multiplier means 1. The label is kept verbatim so series
    /// maps stay keyed by what the caller asked for.
    pub fn parse(label: &str) -> Result<Self, RollstitchError> {
        let key = label.trim();
        let split = key
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(key.len());
        let (digits, unit_str) = key.split_at(split);

        if unit_str.is_empty() {
            return Err(RollstitchError::UnsupportedTimeUnit {
                unit: label.to_string(),
            });
        }

        let unit_number = if digits.is_empty() {
            1
        } else {
            digits
                .parse::<u32>()
                .map_err(|_| RollstitchError::UnsupportedTimeUnit {
                    unit: label.to_string(),
                })?
        };
        if unit_number == 0 {
            return Err(RollstitchError::UnsupportedTimeUnit {
                unit: label.to_string(),
            });
        }

        // "M" alone is month in the common shorthand; everything else is case-insensitive.
        let unit = if unit_str == "M" {
            TimeUnit::Month
        } else {
            TimeUnit::parse(unit_str)?
        };
        let representable = i32::try_from(unit_number)
            .ok()
            .and_then(|n| unit.duration().checked_mul(n))
            .is_some();
        if !representable {
            return Err(RollstitchError::UnsupportedTimeUnit {
                unit: label.to_string(),
            });
        }

        Ok(Self {
            label: key.to_string(),
            unit,
            unit_number,
        })
    }

    pub fn parse_list(input: &str) -> Result<Vec<Self>, RollstitchError> {
        input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Length of one bar.
    pub fn bar_duration(&self) -> Duration {
        self.unit.duration() * self.unit_number as i32
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_long_labels() {
        let tf = Timeframe::parse("1hour").unwrap();
        assert_eq!(tf.unit, TimeUnit::Hour);
        assert_eq!(tf.unit_number, 1);
        assert_eq!(tf.label, "1hour");

        let tf = Timeframe::parse("15min").unwrap();
        assert_eq!(tf.unit, TimeUnit::Minute);
        assert_eq!(tf.unit_number, 15);

        let tf = Timeframe::parse("1day").unwrap();
        assert_eq!(tf.unit, TimeUnit::Day);
    }

    #[test]
    fn parse_short_labels() {
        assert_eq!(Timeframe::parse("5m").unwrap().unit, TimeUnit::Minute);
        assert_eq!(Timeframe::parse("4h").unwrap().unit_number, 4);
        assert_eq!(Timeframe::parse("d").unwrap().unit, TimeUnit::Day);
        assert_eq!(Timeframe::parse("w").unwrap().unit, TimeUnit::Week);
        assert_eq!(Timeframe::parse("1M").unwrap().unit, TimeUnit::Month);
        assert_eq!(Timeframe::parse("30s").unwrap().unit, TimeUnit::Second);
    }

    #[test]
    fn rejects_unknown_units() {
        assert!(matches!(
            Timeframe::parse("3fortnights"),
            Err(RollstitchError::UnsupportedTimeUnit { .. })
        ));
        assert!(Timeframe::parse("15").is_err());
        assert!(Timeframe::parse("4000000000s").is_err());
        assert!(Timeframe::parse("0m").is_err());
        assert!(Timeframe::parse("").is_err());
    }

    #[test]
    fn wire_codes_round_trip() {
        for unit in [
            TimeUnit::Second,
            TimeUnit::Minute,
            TimeUnit::Hour,
            TimeUnit::Day,
            TimeUnit::Week,
            TimeUnit::Month,
        ] {
            assert_eq!(TimeUnit::from_wire_code(unit.wire_code()), Some(unit));
        }
        assert_eq!(TimeUnit::Hour.wire_code(), 3);
        assert_eq!(TimeUnit::from_wire_code(9), None);
    }

    #[test]
    fn bar_duration_scales() {
        assert_eq!(Timeframe::parse("15min").unwrap().bar_duration(), Duration::minutes(15));
        assert_eq!(Timeframe::parse("2h").unwrap().bar_duration(), Duration::hours(2));
    }

    #[test]
    fn parse_list_skips_blanks() {
        let tfs = Timeframe::parse_list("1min, 5min,,1hour ").unwrap();
        let labels: Vec<_> = tfs.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["1min", "5min", "1hour"]);
    }
}
