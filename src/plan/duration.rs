/// Errors produced by [`parse_duration`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("invalid duration format '{input}': unexpected '{found}'")]
    InvalidFormat { input: String, found: char },

    #[error("duration '{0}' is too large")]
    Overflow(String),
}

/// A duration either still in its compact textual form or already in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationInput<'a> {
    Text(&'a str),
    Seconds(u64),
}

impl<'a> From<&'a str> for DurationInput<'a> {
    fn from(text: &'a str) -> Self {
        DurationInput::Text(text)
    }
}

impl<'a> From<&'a String> for DurationInput<'a> {
    fn from(text: &'a String) -> Self {
        DurationInput::Text(text.as_str())
    }
}

impl From<u64> for DurationInput<'_> {
    fn from(seconds: u64) -> Self {
        DurationInput::Seconds(seconds)
    }
}

impl From<u32> for DurationInput<'_> {
    fn from(seconds: u32) -> Self {
        DurationInput::Seconds(u64::from(seconds))
    }
}

fn unit_seconds(c: char) -> Option<u64> {
    match c {
        'h' | 'H' => Some(3600),
        'm' | 'M' => Some(60),
        's' => Some(1),
        _ => None,
    }
}

/// Parse a compact duration such as `1h30m`, `90s` or `3600` into seconds.
///
/// Digit runs are terminated by a unit letter; a trailing run without a unit
/// counts as seconds. The empty string is zero.
pub fn parse_duration<'a>(input: impl Into<DurationInput<'a>>) -> Result<u64, DurationError> {
    let text = match input.into() {
        DurationInput::Seconds(seconds) => return Ok(seconds),
        DurationInput::Text(text) => text,
    };

    let overflow = || DurationError::Overflow(text.to_string());
    let mut total: u64 = 0;
    let mut part: u64 = 0;

    for c in text.chars() {
        if let Some(digit) = c.to_digit(10) {
            part = part
                .checked_mul(10)
                .and_then(|p| p.checked_add(u64::from(digit)))
                .ok_or_else(overflow)?;
            continue;
        }

        let unit = unit_seconds(c).ok_or_else(|| DurationError::InvalidFormat {
            input: text.to_string(),
            found: c,
        })?;
        total = part
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(overflow)?;
        part = 0;
    }

    total.checked_add(part).ok_or_else(overflow)
}
