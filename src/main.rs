// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use mimalloc::MiMalloc;
use modules::{
    error::MailBlastResult, logger, metrics::initialize_metrics, rest::start_http_server,
};
use tracing::info;

mod modules;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

static LOGO: &str = r#"
  __  __       _ _ ____  _           _
 |  \/  | __ _(_) | __ )| | __ _ ___| |_
 | |\/| |/ _` | | |  _ \| |/ _` / __| __|
 | |  | | (_| | | | |_) | | (_| \__ \ |_
 |_|  |_|\__,_|_|_|____/|_|\__,_|___/\__|

"#;

#[tokio::main]
async fn main() -> MailBlastResult<()> {
    logger::initialize_logging();
    info!("{}", LOGO);
    info!("Starting mailblast-server");
    info!("Version:  {}", mailblast_version!());
    info!("Git:      [{}]", env!("GIT_HASH"));

    initialize_metrics();
    start_http_server().await
}
