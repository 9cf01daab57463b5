//! Confidence parsing for free-form provider output.
//!
//! Providers are asked to end their answer with a line such as
//! `Confidence: 0.85` or `Confidence: 85%`. These helpers extract that
//! value and strip the line from the content.

/// Parse a trailing self-reported confidence.
///
/// Scans from the last line upwards and uses the first `confidence:` line
/// found. Values above 1 are read as percentages. Returns `None` when no
/// line is present or the number does not parse.
///
/// # Examples
///
/// ```
/// use wallbounce_domain::consensus::parse_confidence;
///
/// assert_eq!(parse_confidence("Use tokio.\nConfidence: 0.8"), Some(0.8));
/// assert_eq!(parse_confidence("Use tokio.\nconfidence: 75%"), Some(0.75));
/// assert_eq!(parse_confidence("Use tokio."), None);
/// ```
pub fn parse_confidence(text: &str) -> Option<f64> {
    let line = text.lines().rev().find_map(confidence_value)?;
    let (number, percent) = match line.strip_suffix('%') {
        Some(n) => (n.trim(), true),
        None => (line, false),
    };
    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let value = if percent || value > 1.0 {
        value / 100.0
    } else {
        value
    };
    (value <= 1.0).then_some(value)
}

/// Remove the trailing confidence line (if any) from provider output.
pub fn strip_confidence_line(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    match lines.iter().rposition(|l| confidence_value(l).is_some()) {
        Some(idx) => lines
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, l)| *l)
            .collect::<Vec<_>>()
            .join("\n")
            .trim_end()
            .to_string(),
        None => text.trim_end().to_string(),
    }
}

fn confidence_value(line: &str) -> Option<&str> {
    let trimmed = line.trim().trim_start_matches(['*', '_', '#', '-', ' ']);
    let lower = trimmed.to_ascii_lowercase();
    if !lower.starts_with("confidence") {
        return None;
    }
    let rest = &trimmed["confidence".len()..];
    let value = rest.trim_start().strip_prefix(':')?;
    Some(value.trim().trim_matches(['*', '_']).trim())
}
