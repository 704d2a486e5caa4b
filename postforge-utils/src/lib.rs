use std::num::ParseIntError;

pub const UNKNOWN_BUSINESS: &str = "unknown business";
pub const SEQUENCE_WIDTH: usize = 4;

pub fn trimmed_or_none(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

/// Returns `true` when the value holds something other than whitespace.
pub fn has_text(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Turns a generated business name into a single directory segment.
///
/// Surrounding whitespace is removed, path separators become `-` and inner
/// line breaks or tabs become a space. Names that would not produce a usable
/// segment fall back to [`UNKNOWN_BUSINESS`].
pub fn business_dir_name(name: &str) -> String {
    let Some(trimmed) = trimmed_or_none(Some(name)) else {
        return UNKNOWN_BUSINESS.to_string();
    };

    let mut segment = String::with_capacity(trimmed.len());
    for ch in trimmed.chars() {
        if matches!(ch, '/' | '\\') {
            segment.push('-');
        } else if ch.is_whitespace() {
            segment.push(' ');
        } else if !ch.is_control() {
            segment.push(ch);
        }
    }

    let segment = segment.trim().to_string();
    match segment.as_str() {
        "" | "." | ".." => UNKNOWN_BUSINESS.to_string(),
        _ => segment,
    }
}

pub fn format_sequence(sequence: u64) -> String {
    format!("{sequence:0width$}", width = SEQUENCE_WIDTH)
}

/// Parses an all-digit directory name.
///
/// Returns `Ok(None)` for names that are not sequence numbers at all and an
/// error for digit strings too large to represent.
pub fn parse_sequence(name: &str) -> Result<Option<u64>, ParseIntError> {
    if name.is_empty() || !name.bytes().all(|byte| byte.is_ascii_digit()) {
        return Ok(None);
    }
    name.parse().map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_dir_name_keeps_readable_names() {
        assert_eq!(business_dir_name("  Café Lumière \n"), "Café Lumière");
    }

    #[test]
    fn business_dir_name_falls_back_when_blank() {
        assert_eq!(business_dir_name("   \n\t"), UNKNOWN_BUSINESS);
        assert_eq!(business_dir_name(".."), UNKNOWN_BUSINESS);
    }

    #[test]
    fn business_dir_name_replaces_separators() {
        assert_eq!(business_dir_name("Salt/Pepper\\Co"), "Salt-Pepper-Co");
    }

    #[test]
    fn business_dir_name_keeps_words_apart_across_line_breaks() {
        assert_eq!(business_dir_name("Golden Crust\nBakery"), "Golden Crust Bakery");
        assert_eq!(business_dir_name("Golden\tCrust\u{7}"), "Golden Crust");
    }

    #[test]
    fn sequence_is_zero_padded() {
        assert_eq!(format_sequence(6), "0006");
        assert_eq!(format_sequence(12345), "12345");
    }

    #[test]
    fn parse_sequence_ignores_non_numeric_names() {
        assert_eq!(parse_sequence("0005"), Ok(Some(5)));
        assert_eq!(parse_sequence("99999999999"), Ok(Some(99_999_999_999)));
        assert_eq!(parse_sequence("abc"), Ok(None));
        assert_eq!(parse_sequence("-1"), Ok(None));
        assert_eq!(parse_sequence(""), Ok(None));
    }

    #[test]
    fn parse_sequence_rejects_digit_strings_that_overflow() {
        assert!(parse_sequence("99999999999999999999999").is_err());
    }
}
