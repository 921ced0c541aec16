use chrono::DateTime;

/// Formats a feed's raw publication date as a full human-readable date,
/// e.g. "Friday, October 16, 2026".
///
/// RSS uses RFC 2822 dates and Atom uses RFC 3339; both are accepted. The
/// date is shown in the offset it was written in. Returns `None` when the
/// string is neither.
pub fn format_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()?;
    Some(parsed.format("%A, %B %-d, %Y").to_string())
}
