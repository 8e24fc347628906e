//! Comma-separated link lists stored in record fields.
//!
//! The list is plain text: entries joined by `,`, no escaping and no
//! de-duplication. Removal works on the raw text rather than on parsed
//! entries so that values written by older clients keep their layout.
//! A link containing a literal comma cannot be told apart from two links.

/// Entry separator.
pub const SEPARATOR: char = ',';

/// Append a link to a stored value.
pub fn append(current: Option<&str>, link: &str) -> String {
    match current {
        Some(value) if !value.is_empty() => format!("{}{}{}", value, SEPARATOR, link),
        _ => link.to_string(),
    }
}

/// Remove a link from a stored value.
///
/// Tries `"{link},"` first, then the bare link, then drops one trailing
/// separator. Only the first occurrence is removed. Returns `None` when
/// nothing is left.
pub fn remove(current: Option<&str>, link: &str) -> Option<String> {
    let value = current?;

    let with_separator = format!("{}{}", link, SEPARATOR);
    let mut result = if value.contains(&with_separator) {
        value.replacen(&with_separator, "", 1)
    } else {
        value.replacen(link, "", 1)
    };

    if result.ends_with(SEPARATOR) {
        result.pop();
    }

    if result.is_empty() {
        None
    } else {
        Some(result)
    }
}

/// Split a stored value into its non-empty entries.
pub fn parse(current: Option<&str>) -> Vec<&str> {
    current
        .map(|value| {
            value
                .split(SEPARATOR)
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Whether the stored value holds `link` as a whole entry.
pub fn contains(current: Option<&str>, link: &str) -> bool {
    parse(current).iter().any(|entry| *entry == link)
}
