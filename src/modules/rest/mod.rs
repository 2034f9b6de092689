// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::time::Duration;

use poem::get;
use poem::listener::TcpListener;
use poem::middleware::{CatchPanic, Cors};
use poem::{EndpointExt, Route, Server};
use poem_openapi::ContactObject;

use crate::modules::error::code::ErrorCode;
use crate::modules::error::handler::error_handler;
use crate::modules::error::{ApiErrorResponse, MailBlastResult};
use crate::modules::metrics::endpoint::PrometheusEndpoint;
use crate::modules::rest::public::status::get_status;
use crate::modules::rest::public::tracking::{track_click, track_open};
use crate::modules::settings::cli::SETTINGS;
use crate::raise_error;
use api::create_openapi_service;

pub mod api;
pub mod public;

pub type ApiResult<T, E = ApiErrorResponse> = std::result::Result<T, E>;

const DESCRIPTION: &str = r#"
    MailBlast is a self-hosted campaign dispatch engine for bulk email.

    - Expands stored campaigns into rendered, per-recipient send jobs with open and click tracking baked in.
    - Routes each job through its assigned sending account: direct SMTP, script webhooks, or commercial MTA submission APIs.
    - Paces delivery with per-account hour/day rate limits and bounded-concurrency scheduling passes.

    Point your campaign editor at the management API and watch the queue counters move.
"#;

pub async fn start_http_server() -> MailBlastResult<()> {
    let listener = TcpListener::bind((
        SETTINGS
            .mailblast_bind_ip
            .clone()
            .unwrap_or("0.0.0.0".into()),
        SETTINGS.mailblast_http_port as u16,
    ));

    let api_service = create_openapi_service()
        .description(DESCRIPTION)
        .contact(ContactObject::new().email("support@mailblast.dev"))
        .license("https://mailblast.dev/license")
        .summary("A self-hosted campaign dispatch engine for bulk email");

    let swagger = api_service.swagger_ui();
    let redoc = api_service.redoc();
    let scalar = api_service.scalar();
    let spec_json = api_service.spec_endpoint();
    let spec_yaml = api_service.spec_endpoint_yaml();
    let openapi_explorer = api_service.openapi_explorer();

    let mut cors_origins = SETTINGS.mailblast_cors_origins.clone();
    if cors_origins.is_empty() {
        cors_origins = ["*".to_string()].into_iter().collect();
    }

    let cors = Cors::new()
        .allow_origins(cors_origins)
        .allow_credentials(true)
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS", "HEAD"])
        .allow_headers(vec!["Content-Type", "Authorization"])
        .expose_headers(vec!["Accept"])
        .max_age(SETTINGS.mailblast_cors_max_age);

    let route = Route::new()
        .nest("/api-docs/swagger", swagger)
        .nest("/api-docs/redoc", redoc)
        .nest("/api-docs/explorer", openapi_explorer)
        .nest("/api-docs/scalar", scalar)
        .nest("/api-docs/spec.json", spec_json)
        .nest("/api-docs/spec.yaml", spec_yaml)
        .nest("/metrics", PrometheusEndpoint)
        .at("/track/open", get(track_open))
        .at("/track/click", get(track_click))
        .nest("/api/status", get(get_status))
        .nest_no_strip("/api/v1", api_service)
        .with(cors)
        .with(CatchPanic::new());

    let server = Server::new(listener)
        .name("MailBlast API Service")
        .idle_timeout(Duration::from_secs(60))
        .run_with_graceful_shutdown(
            route.catch_all_error(error_handler),
            shutdown_signal(),
            Some(Duration::from_secs(5)),
        );
    println!(
        "MailBlast API Service is now running on port {}.",
        SETTINGS.mailblast_http_port
    );
    server
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))
}

/// Resolves when the operator asks the process to stop (ctrl-c, or SIGTERM on
/// unix), letting the server drain in-flight requests before the listener
/// closes.
async fn shutdown_signal() {
    let interrupt = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install the SIGTERM handler");
        tokio::select! {
            _ = interrupt => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        interrupt.await.expect("Failed to listen for ctrl-c");
    }
}
