use thiserror::Error;

/// Shortest time a manual edit may set.
pub const MIN_SECONDS: u32 = 1;
/// Longest time a manual edit may set (8 hours).
pub const MAX_SECONDS: u32 = 28_800;
pub const MAX_HOURS: u64 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeInputError {
    #[error("empty input")]
    Empty,
    #[error("no valid numbers found in '{0}'")]
    NoDigits(String),
    #[error("invalid format, use MM:SS, HH:MM:SS, or minutes")]
    InvalidFormat,
    #[error("minutes/seconds must be < 60")]
    ComponentOutOfRange,
    #[error("hours must be <= {}", MAX_HOURS)]
    TooManyHours,
    #[error("time cannot be zero")]
    Zero,
    #[error("'{0}' is too large")]
    TooLarge(String),
    #[error("{value}s is outside the allowed range {}..={}s", MIN_SECONDS, MAX_SECONDS)]
    OutOfRange { value: i64 },
}

/// Accepts a whole number of seconds if it lies in `[MIN_SECONDS, MAX_SECONDS]`.
pub fn validate_seconds(value: i64) -> Result<u32, TimeInputError> {
    if value < i64::from(MIN_SECONDS) || value > i64::from(MAX_SECONDS) {
        return Err(TimeInputError::OutOfRange { value });
    }
    Ok(value as u32)
}

/// Parses user-entered time text into seconds.
///
/// Accepted shapes: `HH:MM:SS`, `MM:SS`, or a bare number. A bare number up to
/// 60 is read as minutes, anything larger as seconds. Characters other than
/// digits and `:` are dropped before parsing, so `"25 min"` reads as 25 minutes.
pub fn parse_time_input(input: &str) -> Result<u32, TimeInputError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimeInputError::Empty);
    }

    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ':')
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return Err(TimeInputError::NoDigits(trimmed.to_string()));
    }

    let parts = cleaned
        .split(':')
        .map(parse_part)
        .collect::<Result<Vec<u64>, _>>()?;

    let total = match parts.as_slice() {
        [h, m, s] => {
            if *m >= 60 || *s >= 60 {
                return Err(TimeInputError::ComponentOutOfRange);
            }
            if *h > MAX_HOURS {
                return Err(TimeInputError::TooManyHours);
            }
            h * 3600 + m * 60 + s
        }
        [m, s] => {
            if *s >= 60 {
                return Err(TimeInputError::ComponentOutOfRange);
            }
            m.saturating_mul(60).saturating_add(*s)
        }
        [value] => {
            if *value <= 60 {
                value * 60
            } else {
                *value
            }
        }
        _ => return Err(TimeInputError::InvalidFormat),
    };

    if total == 0 {
        return Err(TimeInputError::Zero);
    }
    let total = i64::try_from(total).map_err(|_| TimeInputError::TooLarge(cleaned.clone()))?;
    validate_seconds(total)
}

// Empty segments ("5:" or ":30") count as zero.
fn parse_part(part: &str) -> Result<u64, TimeInputError> {
    if part.is_empty() {
        return Ok(0);
    }
    part.parse::<u64>()
        .map_err(|_| TimeInputError::TooLarge(part.to_string()))
}

/// `MM:SS`, or `HH:MM:SS` once there is at least one full hour.
pub fn format_time(total_seconds: u32) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}
