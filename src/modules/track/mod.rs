// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::LazyLock;

use crate::modules::settings::cli::SETTINGS;
use regex::Regex;
use url::Url;

pub static HREF_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href\s*=\s*"([^"]+)""#).unwrap());

/// Rewrites rendered HTML so opens and clicks for one (campaign, recipient)
/// pair report back to this server.
///
/// The rewriting is purely textual: anchors are matched with a regex, not a
/// DOM parser, so malformed or attribute-order-variant markup may be left
/// untouched. That is a documented trade-off; the injector must always
/// produce usable HTML and never fail.
pub struct TrackingInjector {
    html: String,
    campaign_id: u64,
    recipient: String,
    base_url: String,
}

impl TrackingInjector {
    pub fn new(campaign_id: u64, recipient: String) -> Self {
        let base_url = SETTINGS.mailblast_public_url.trim_end_matches('/').to_string();

        TrackingInjector {
            html: Default::default(),
            campaign_id,
            recipient,
            base_url,
        }
    }

    pub fn set_html(&mut self, html: String) {
        self.html = html;
    }

    /// Track links in the email HTML by replacing them with redirect URLs
    pub fn track_links(&mut self) {
        self.html = HREF_PATTERN
            .replace_all(&self.html, |caps: &regex::Captures| {
                if let Some(url_match) = caps.get(1) {
                    let url = url_match.as_str();

                    // Only rewrite absolute http(s) destinations; leave
                    // mailto:, anchors, and malformed values untouched.
                    if let Ok(parsed_url) = Url::parse(url) {
                        if parsed_url.scheme() != "http" && parsed_url.scheme() != "https" {
                            return caps[0].to_string();
                        }
                        if parsed_url.host().is_none() {
                            return caps[0].to_string();
                        }
                        return format!(r#"href="{}""#, self.click_url(url));
                    }
                }

                caps[0].to_string()
            })
            .into_owned();
    }

    /// Generate a redirect URL for click tracking
    fn click_url(&self, destination: &str) -> String {
        format!(
            "{}/track/click?campaign={}&recipient={}&url={}",
            self.base_url,
            self.campaign_id,
            urlencoding::encode(&self.recipient),
            urlencoding::encode(destination)
        )
    }

    /// Append a tracking pixel to the email HTML
    pub fn append_tracking_pixel(&mut self) {
        let tracking_pixel = format!(
            r#"<img src="{}" style="opacity:0; position:absolute; left:-9999px;" alt="" />"#,
            self.open_url()
        );

        if self.html.contains("</body>") {
            self.html = self
                .html
                .replace("</body>", &format!("{}</body>", tracking_pixel));
            return;
        }

        if self.html.contains("</html>") {
            self.html = self
                .html
                .replace("</html>", &format!("{}</html>", tracking_pixel));
            return;
        }

        self.html.push_str(&tracking_pixel);
    }

    /// Generate a beacon URL for open tracking
    fn open_url(&self) -> String {
        format!(
            "{}/track/open?campaign={}&recipient={}",
            self.base_url,
            self.campaign_id,
            urlencoding::encode(&self.recipient)
        )
    }

    /// Get the modified HTML
    pub fn get_html(&self) -> &str {
        &self.html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_injector() -> TrackingInjector {
        TrackingInjector::new(4200, "test@example.com".to_string())
    }

    #[test]
    fn test_track_links_replaces_href() {
        let mut injector = build_injector();
        injector.set_html(r#"<a href="https://example.com/page">Click</a>"#.into());
        injector.track_links();
        assert!(injector.get_html().contains("/track/click?campaign=4200"));
        assert!(injector
            .get_html()
            .contains(&urlencoding::encode("https://example.com/page").into_owned()));
        // Anchor text is untouched
        assert!(injector.get_html().contains(">Click</a>"));
    }

    #[test]
    fn test_every_anchor_is_rewritten_and_decodes_back() {
        let mut injector = build_injector();
        injector.set_html(
            r#"<a href="https://a.example/1">1</a><a href="https://b.example/2?x=y">2</a>"#.into(),
        );
        injector.track_links();
        let html = injector.get_html();
        assert_eq!(html.matches("/track/click").count(), 2);

        // The url parameter round-trips to the original destination.
        let encoded = urlencoding::encode("https://b.example/2?x=y").into_owned();
        let start = html.find(&format!("url={}", encoded)).unwrap();
        let param = &html[start + 4..start + 4 + encoded.len()];
        assert_eq!(
            urlencoding::decode(param).unwrap(),
            "https://b.example/2?x=y"
        );
    }

    #[test]
    fn test_zero_links_is_a_no_op() {
        let mut injector = build_injector();
        injector.set_html("<p>No links here</p>".into());
        injector.track_links();
        assert_eq!(injector.get_html(), "<p>No links here</p>");
    }

    #[test]
    fn test_append_tracking_pixel_before_body_close() {
        let mut injector = build_injector();
        injector.set_html("<html><body>Hello</body></html>".into());
        injector.append_tracking_pixel();
        let html = injector.get_html();
        assert_eq!(html.matches("/track/open").count(), 1);
        assert!(html.contains(r#"alt="" /></body>"#));
    }

    #[test]
    fn test_append_tracking_pixel_appends_if_no_body_or_html() {
        let mut injector = build_injector();
        injector.set_html("<div>Hello</div>".into());
        injector.append_tracking_pixel();
        assert!(injector.get_html().contains("/track/open?campaign=4200"));
    }

    #[test]
    fn test_does_not_modify_non_http_url() {
        let mut injector = build_injector();
        injector.set_html(r#"<a href="mailto:someone@example.com">Click</a>"#.into());
        injector.track_links();
        assert_eq!(injector.get_html(), r#"<a href="mailto:someone@example.com">Click</a>"#);
    }

    #[test]
    fn test_malformed_anchor_is_left_untouched() {
        let mut injector = build_injector();
        injector.set_html(r#"<a href='single-quoted'>Click</a><a href=bare>x</a>"#.into());
        injector.track_links();
        assert_eq!(
            injector.get_html(),
            r#"<a href='single-quoted'>Click</a><a href=bare>x</a>"#
        );
    }
}
