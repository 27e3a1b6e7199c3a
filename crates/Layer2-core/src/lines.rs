//! Line counting
//!
//! `count_lines` is the single source of truth for what a "line" is; every
//! file tier (raw content, rendered table, rendered `pre`) goes through it.

/// Count lines in `text`
///
/// CRLF and lone CR are normalized to LF first. All trailing LFs are then
/// stripped, so blank lines at the end of a file never inflate the count.
/// Empty (or all-newline) input is 0 lines; otherwise it is one more than
/// the number of LFs left.
pub fn count_lines(text: &str) -> u64 {
    let normalized;
    let text = if text.contains('\r') {
        normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        normalized.as_str()
    } else {
        text
    };

    let trimmed = text.trim_end_matches('\n');
    if trimmed.is_empty() {
        return 0;
    }
    1 + trimmed.bytes().filter(|&b| b == b'\n').count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        assert_eq!(count_lines(""), 0);
        assert_eq!(count_lines("\n"), 0);
        assert_eq!(count_lines("\n\n\r\n"), 0);
    }

    #[test]
    fn test_single_line() {
        assert_eq!(count_lines("a"), 1);
        assert_eq!(count_lines("a\n"), 1);
    }

    #[test]
    fn test_trailing_newlines_stripped() {
        assert_eq!(count_lines("a\nb"), 2);
        assert_eq!(count_lines("a\n\n\n"), 1);
        assert_eq!(count_lines("a\nb\n\n"), 2);
    }

    #[test]
    fn test_line_endings_normalized() {
        assert_eq!(count_lines("a\r\nb\r"), 2);
        assert_eq!(count_lines("a\rb\rc"), 3);
        assert_eq!(count_lines("a\r\n\r\n"), 1);
    }

    #[test]
    fn test_inner_blank_lines_count() {
        assert_eq!(count_lines("a\n\nb"), 3);
        assert_eq!(count_lines("\na"), 2);
    }

    #[test]
    fn test_whitespace_only_line_counts() {
        assert_eq!(count_lines(" "), 1);
        assert_eq!(count_lines("a\n \n"), 2);
    }
}
