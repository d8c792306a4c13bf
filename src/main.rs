// Interactivity Runner - process entry point
//
// stdout carries the protocol; diagnostics go to stderr.

use interactivity_core::Output;
use interactivity_runner::{engine_from_config, Session};
use interactivity_skills::SkillsConfig;
use tracing_subscriber::EnvFilter;

/// Environment variable for the log filter, checked before `RUST_LOG`.
const LOG_ENV: &str = "INTERACTIVITY_LOG";

/// Commands may recurse deeply; give the interpreter thread room.
const RUNNER_STACK_SIZE: usize = 64 * 1024 * 1024;

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn serve() -> anyhow::Result<()> {
    let config = SkillsConfig::load().unwrap_or_else(|e| {
        tracing::warn!("Failed to load skill configuration, using defaults: {}", e);
        SkillsConfig::default()
    });

    let engine = engine_from_config(&config);
    let mut session = Session::new(engine, Output::stdout());
    session.write_info()?;

    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    session.run_until(stdin, interrupted).await;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let runner = std::thread::Builder::new()
        .name("interactivity-runner".to_string())
        .stack_size(RUNNER_STACK_SIZE)
        .spawn(|| -> anyhow::Result<()> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(serve())
        })?;

    runner
        .join()
        .map_err(|_| anyhow::anyhow!("runner thread panicked"))?
}
