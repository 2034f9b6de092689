// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::{io::Cursor, sync::LazyLock};

use image::{ExtendedColorType, ImageBuffer, ImageEncoder, Rgba};
use poem::{
    handler,
    web::{headers::UserAgent, Query, RealIp, Redirect, TypedHeader},
    IntoResponse, Response,
};
use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::modules::analytics::{CampaignEvent, EventKind};

// Static 1x1 transparent PNG
static TRANSPARENT_PIXEL: LazyLock<Vec<u8>> = LazyLock::new(|| {
    let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);
    let encoder = image::codecs::png::PngEncoder::new(&mut cursor);
    encoder
        .write_image(img.as_raw(), 1, 1, ExtendedColorType::Rgba8)
        .expect("Failed to encode PNG");
    buffer
});

#[derive(Deserialize)]
pub struct OpenParams {
    pub campaign: Option<String>,
    pub recipient: Option<String>,
}

#[derive(Deserialize)]
pub struct ClickParams {
    pub campaign: Option<String>,
    pub recipient: Option<String>,
    pub url: Option<String>,
}

/// Open-tracking beacon. Always answers with the pixel, whatever the query
/// looks like; recording is best-effort and never visible to the client.
#[handler]
pub async fn track_open(
    Query(params): Query<OpenParams>,
    RealIp(ip): RealIp,
    user_agent: Option<TypedHeader<UserAgent>>,
) -> Response {
    match parse_identity(&params.campaign, &params.recipient) {
        Some((campaign_id, recipient)) => {
            CampaignEvent::record(
                campaign_id,
                recipient,
                EventKind::Open,
                None,
                ip.map(|i| i.to_string()),
                user_agent.map(|ua| ua.0.to_string()),
            );
        }
        None => {
            warn!(
                campaign = params.campaign.as_deref().unwrap_or(""),
                "Open track with unusable identity"
            );
        }
    }

    Response::builder()
        .status(http::StatusCode::OK)
        .content_type("image/png")
        .header(http::header::CACHE_CONTROL, "no-store, no-cache")
        .body(TRANSPARENT_PIXEL.clone())
        .into_response()
}

/// Click-redirect endpoint: records the hit and 302s to the destination. An
/// absent or non-http(s) destination gets an empty 200 instead of a redirect.
#[handler]
pub async fn track_click(
    Query(params): Query<ClickParams>,
    RealIp(ip): RealIp,
    user_agent: Option<TypedHeader<UserAgent>>,
) -> Response {
    let destination = params.url.clone().unwrap_or_default();
    if !is_redirectable(&destination) {
        warn!(
            campaign = params.campaign.as_deref().unwrap_or(""),
            url = %destination,
            "Click track without a usable URL"
        );
        return Response::builder()
            .status(http::StatusCode::OK)
            .content_type("text/plain")
            .body("")
            .into_response();
    }

    if let Some((campaign_id, recipient)) = parse_identity(&params.campaign, &params.recipient) {
        CampaignEvent::record(
            campaign_id,
            recipient,
            EventKind::Click,
            Some(destination.clone()),
            ip.map(|i| i.to_string()),
            user_agent.map(|ua| ua.0.to_string()),
        );
    }

    Redirect::temporary(&destination).into_response()
}

fn parse_identity(
    campaign: &Option<String>,
    recipient: &Option<String>,
) -> Option<(u64, String)> {
    let campaign_id = campaign.as_deref()?.parse::<u64>().ok()?;
    let recipient = recipient.as_deref()?.trim();
    if recipient.is_empty() {
        return None;
    }
    Some((campaign_id, recipient.to_string()))
}

fn is_redirectable(destination: &str) -> bool {
    match Url::parse(destination) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host().is_some(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_is_a_png() {
        assert_eq!(&TRANSPARENT_PIXEL[1..4], b"PNG");
    }

    #[test]
    fn identity_requires_numeric_campaign_and_nonempty_recipient() {
        assert_eq!(
            parse_identity(&Some("42".into()), &Some("a@x.com".into())),
            Some((42, "a@x.com".into()))
        );
        assert_eq!(parse_identity(&Some("abc".into()), &Some("a@x.com".into())), None);
        assert_eq!(parse_identity(&Some("42".into()), &Some("  ".into())), None);
        assert_eq!(parse_identity(&None, &Some("a@x.com".into())), None);
    }

    #[test]
    fn only_http_destinations_are_redirectable() {
        assert!(is_redirectable("https://example.com/x"));
        assert!(is_redirectable("http://example.com"));
        assert!(!is_redirectable("javascript:alert(1)"));
        assert!(!is_redirectable("mailto:a@x.com"));
        assert!(!is_redirectable(""));
        assert!(!is_redirectable("not a url"));
    }
}
