// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

/// Splits a raw recipient specification into individual addresses.
///
/// Comma is the primary delimiter; when no comma is present the field is
/// split on newlines, then semicolons. Entries are trimmed and empties
/// dropped. Duplicates are preserved on purpose: the upstream list editor
/// owns dedup policy, the engine sends what it is given.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    let delimiter = if raw.contains(',') {
        ','
    } else if raw.contains('\n') {
        '\n'
    } else {
        ';'
    };

    raw.split(delimiter)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_comma_and_trims() {
        let parsed = parse_recipients(" a@x.com , b@x.com,, c@x.com ");
        assert_eq!(parsed, vec!["a@x.com", "b@x.com", "c@x.com"]);
    }

    #[test]
    fn falls_back_to_newline_then_semicolon() {
        assert_eq!(
            parse_recipients("a@x.com\nb@x.com\n"),
            vec!["a@x.com", "b@x.com"]
        );
        assert_eq!(
            parse_recipients("a@x.com; b@x.com"),
            vec!["a@x.com", "b@x.com"]
        );
    }

    #[test]
    fn keeps_duplicates() {
        let parsed = parse_recipients("dup@x.com,dup@x.com");
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn empty_input_yields_no_recipients() {
        assert!(parse_recipients("").is_empty());
        assert!(parse_recipients(" , ,\n").is_empty());
    }
}
