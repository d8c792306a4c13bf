//! Session Loop
//!
//! Reads the host's input one line at a time, routes it, executes the
//! command and flushes the output before reading the next line. Loop-level
//! failures are reported as `Loop error: <message>` and never stop the
//! loop; only end of input or the shutdown signal does.

use std::future::Future;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use interactivity_core::{Output, SharedContext};

use crate::engine::Engine;
use crate::router;
use crate::utils::error::{AppError, AppResult};

/// One runner process's state: shared context, engine and output.
pub struct Session {
    context: SharedContext,
    engine: Engine,
    out: Output,
}

impl Session {
    pub fn new(engine: Engine, out: Output) -> Self {
        Self {
            context: SharedContext::new(),
            engine,
            out,
        }
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Write the startup banner.
    pub fn write_info(&mut self) -> AppResult<()> {
        self.engine.write_info(&mut self.out)?;
        Ok(())
    }

    /// Route and execute one raw input line.
    pub async fn handle_line(&mut self, line: &str) -> AppResult<()> {
        let command = router::route(line, &mut self.context);
        let Some(command) = router::normalize_command(&command) else {
            return Ok(());
        };
        self.engine
            .execute(&command, &self.context, &mut self.out)
            .await?;
        Ok(())
    }

    /// Process input until end of input.
    pub async fn run<R>(&mut self, reader: R)
    where
        R: AsyncBufRead + Unpin,
    {
        self.run_until(reader, std::future::pending()).await
    }

    /// Process input until end of input or until `shutdown` completes.
    ///
    /// `shutdown` is only raced against reading; a command that has started
    /// runs to completion.
    pub async fn run_until<R, S>(&mut self, mut reader: R, shutdown: S)
    where
        R: AsyncBufRead + Unpin,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, stopping input loop");
                    break;
                }
                read = reader.read_until(b'\n', &mut buf) => read,
            };

            let result = match read {
                Ok(0) => {
                    tracing::debug!("End of input");
                    break;
                }
                Ok(_) => match std::str::from_utf8(&buf) {
                    Ok(line) => self.handle_line(line).await,
                    Err(e) => Err(AppError::from(e)),
                },
                Err(e) => Err(AppError::from(e)),
            };

            if let Err(e) = result {
                self.report_loop_error(&e);
            }
        }
    }

    fn report_loop_error(&mut self, err: &AppError) {
        tracing::error!("Loop error: {}", err);
        if let Err(write_err) = self.out.log(&format!("Loop error: {}", err)) {
            tracing::error!("Failed to report loop error: {}", write_err);
        }
    }
}
