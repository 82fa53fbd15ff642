//! Stdio serve loop
//!
//! Plain read-dispatch-write: one line in, at most one line out, flushed
//! after every response. The response channel carries nothing else;
//! diagnostics go through tracing to stderr.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use whitegate_cloud::ClientFactory;
use whitegate_config::Config;

use crate::engine::Engine;
use crate::ip::HttpIpResolver;
use crate::tools::ToolContext;

/// Run the server over stdin/stdout until the input stream closes.
pub async fn run_server(config: Config, factory: Arc<dyn ClientFactory>) -> Result<()> {
    let ctx = ToolContext {
        config,
        factory,
        ip_resolver: Arc::new(HttpIpResolver::new()),
    };
    let mut engine = Engine::new(ctx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    tracing::info!("whitegate server listening on stdio");

    while let Some(line) = lines.next_line().await? {
        if let Some(response) = engine.handle_line(&line).await {
            stdout.write_all(response.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    tracing::info!("input stream closed, shutting down");
    Ok(())
}
