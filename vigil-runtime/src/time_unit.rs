use std::time::Duration;

/// Time unit for interval values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl std::str::FromStr for TimeUnit {
    type Err = String;

    /// Parse TimeUnit from its full lowercase name: "milliseconds", "seconds", ...
    /// For shorthand notations like "5s", "10m", use `parse_duration` instead.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nanoseconds" => Ok(TimeUnit::Nanoseconds),
            "microseconds" => Ok(TimeUnit::Microseconds),
            "milliseconds" => Ok(TimeUnit::Milliseconds),
            "seconds" => Ok(TimeUnit::Seconds),
            "minutes" => Ok(TimeUnit::Minutes),
            "hours" => Ok(TimeUnit::Hours),
            "days" => Ok(TimeUnit::Days),
            _ => Err(format!("Invalid time unit: {}", s)),
        }
    }
}

impl TimeUnit {
    /// Convert `value` of this unit into a [`Duration`], saturating on overflow
    pub fn to_duration(&self, value: u64) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(value),
            TimeUnit::Microseconds => Duration::from_micros(value),
            TimeUnit::Milliseconds => Duration::from_millis(value),
            TimeUnit::Seconds => Duration::from_secs(value),
            TimeUnit::Minutes => Duration::from_secs(value.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(value.saturating_mul(3_600)),
            TimeUnit::Days => Duration::from_secs(value.saturating_mul(86_400)),
        }
    }

    /// Parse a duration string like "5s", "10m", "2h", "500ms"
    /// Returns (value, TimeUnit) if successful
    ///
    /// Only lowercase suffixes are accepted and no spaces are allowed
    /// between the number and the suffix.
    pub fn parse_duration(s: &str) -> Option<(u64, TimeUnit)> {
        let s = s.trim();

        let split_pos = s.find(|c: char| !c.is_ascii_digit())?;
        if split_pos == 0 {
            return None;
        }

        let (num_str, unit_str) = s.split_at(split_pos);
        let value = num_str.parse::<u64>().ok()?;

        let time_unit = match unit_str {
            "ns" => TimeUnit::Nanoseconds,
            "us" => TimeUnit::Microseconds,
            "ms" => TimeUnit::Milliseconds,
            "s" => TimeUnit::Seconds,
            "m" => TimeUnit::Minutes,
            "h" => TimeUnit::Hours,
            "d" => TimeUnit::Days,
            _ => return None,
        };

        Some((value, time_unit))
    }

    /// Parse either a shorthand ("5s") or a bare number in `default_unit`
    pub fn parse_interval(s: &str, default_unit: TimeUnit) -> Option<Duration> {
        if let Some((value, unit)) = Self::parse_duration(s) {
            return Some(unit.to_duration(value));
        }
        s.trim()
            .parse::<u64>()
            .ok()
            .map(|value| default_unit.to_duration(value))
    }
}
