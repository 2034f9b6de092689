// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;

/// Matches `[rnd<charclass>_<length>]` tags. Charclass suffixes follow the
/// classic bulk-mailer convention: n=digits, a=alnum, l=lower, u=upper,
/// s=symbols, lu/ln/un = the obvious unions.
static RND_TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[rnd(lu|ln|un|[nalus])_(\d{1,3})\]").unwrap());

const DIGITS: &str = "0123456789";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SYMBOLS: &str = r##"!@#$%^&*()-_=+[]{};:'",.<>/?~`|"##;

/// Per-recipient values substituted into the campaign templates.
pub struct RenderContext<'a> {
    /// Recipient address, for `[to]`
    pub to: &'a str,
    /// Sending account address, for `[from]`
    pub from: &'a str,
    /// Resolved (possibly rotated) from display name, for `[from_name]`
    pub from_name: &'a str,
    /// Resolved (possibly rotated) subject, for `[subject]`
    pub subject: &'a str,
    /// Sending account login identity, for `[login]`
    pub login: &'a str,
}

impl RenderContext<'_> {
    /// Expands every placeholder tag in `template`. Identity tags resolve to
    /// this context's values; each `[rnd…]` occurrence is an independent draw.
    pub fn render(&self, template: &str) -> String {
        let expanded = template
            .replace("[to]", self.to)
            .replace("[from]", self.from)
            .replace("[from_name]", self.from_name)
            .replace("[subject]", self.subject)
            .replace("[login]", self.login);

        RND_TAG_PATTERN
            .replace_all(&expanded, |caps: &regex::Captures| {
                let length: usize = caps[2].parse().unwrap_or(0);
                random_string(&caps[1], length)
            })
            .into_owned()
    }
}

fn charset(key: &str) -> String {
    match key {
        "n" => DIGITS.to_string(),
        "l" => LOWER.to_string(),
        "u" => UPPER.to_string(),
        "s" => SYMBOLS.to_string(),
        "lu" => format!("{LOWER}{UPPER}"),
        "ln" => format!("{LOWER}{DIGITS}"),
        "un" => format!("{UPPER}{DIGITS}"),
        // "a" and anything unrecognized fall back to full alnum
        _ => format!("{LOWER}{UPPER}{DIGITS}"),
    }
}

fn random_string(charset_key: &str, length: usize) -> String {
    let chars: Vec<char> = charset(charset_key).chars().collect();
    let mut rng = rand::rng();
    (0..length)
        .map(|_| chars[rng.random_range(0..chars.len())])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context<'a>() -> RenderContext<'a> {
        RenderContext {
            to: "alice@example.com",
            from: "sender@example.com",
            from_name: "Sales Team",
            subject: "Spring offers",
            login: "sender01",
        }
    }

    #[test]
    fn expands_identity_tags() {
        let rendered = context().render("Hi [to], [from_name] here ([from], login [login])");
        assert_eq!(
            rendered,
            "Hi alice@example.com, Sales Team here (sender@example.com, login sender01)"
        );
    }

    #[test]
    fn rndn_expands_to_digits_of_requested_length() {
        let rendered = context().render("code: [rndn_6]");
        let code = rendered.strip_prefix("code: ").unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn each_occurrence_is_an_independent_draw() {
        // Two 18-char alnum draws colliding by chance is effectively impossible.
        let rendered = context().render("[rnda_18]|[rnda_18]");
        let parts: Vec<&str> = rendered.split('|').collect();
        assert_eq!(parts.len(), 2);
        assert_ne!(parts[0], parts[1]);
    }

    #[test]
    fn charset_suffixes_draw_from_their_sets() {
        let lower = context().render("[rndl_32]");
        assert!(lower.chars().all(|c| c.is_ascii_lowercase()));
        let upper_num = context().render("[rndun_32]");
        assert!(upper_num
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn unknown_tags_are_left_alone() {
        let rendered = context().render("[unsubscribe] [rndx_4]");
        assert_eq!(rendered, "[unsubscribe] [rndx_4]");
    }
}
