use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use spindle_core::observability::QueueCounts;
use spindle_core::{EngineBuilder, EngineConfig, JobState, RandomProcessor};
use tokio::io::{AsyncWriteExt, Stdout};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod input;
mod transport;

/// Final report printed after graceful shutdown.
#[derive(Debug, Serialize)]
struct Summary {
    counts: QueueCounts,
    states: BTreeMap<String, JobState>,
}

async fn write_json<T: Serialize>(out: &mut Stdout, value: &T) -> anyhow::Result<()> {
    let mut line = serde_json::to_vec(value).context("encoding response")?;
    line.push(b'\n');
    out.write_all(&line).await.context("writing stdout")?;
    out.flush().await.context("flushing stdout")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // stdout carries responses; logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spindle=info,spindle_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // (A) Engine from environment
    let config = EngineConfig::from_env();
    info!(?config, "configuration loaded");
    let engine = EngineBuilder::from_config(&config)
        .processor(Arc::new(RandomProcessor::new(config.error_rate)))
        .build()
        .context("building engine")?;

    // (B) One JSON request per stdin line until EOF or Ctrl-C
    let mut stdout = tokio::io::stdout();
    let stdin = std::io::BufReader::new(std::io::stdin());
    let (mut lines, _reader) =
        input::spawn_line_reader(stdin).context("starting stdin reader")?;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res.context("listening for ctrl-c")?;
                info!("interrupt received");
                break;
            }
            line = lines.recv() => {
                let Some(line) = line else {
                    info!("stdin closed");
                    break;
                };
                let line = line.context("reading stdin")?;
                if line.trim().is_empty() {
                    continue;
                }
                let response = transport::handle_line(&engine, &line);
                write_json(&mut stdout, &response).await?;
            }
        }
    }

    // (C) Graceful shutdown: refuse new work, drain, wait for workers
    engine.shutdown().await;

    let summary = Summary {
        counts: engine.counts(),
        states: engine.snapshot_states().into_iter().collect(),
    };
    write_json(&mut stdout, &summary).await
}
