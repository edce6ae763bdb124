//! Boundary to the external background removal engine
//!
//! The engine is a black box: raw image bytes in, cutout bytes out, or an
//! implementation-defined error. It is slow (seconds) and is always awaited,
//! never blocked on.

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

/// External background removal capability
#[async_trait]
pub trait RemovalEngine: Send + Sync {
    /// Produce cutout bytes for the given image bytes
    ///
    /// # Errors
    /// Any engine-specific failure; the pipeline treats every error the same way.
    async fn remove_background(&self, image: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Short name used in log events
    fn name(&self) -> &str {
        "engine"
    }
}

/// Engine backed by a synchronous closure.
///
/// The closure runs inline on the calling task, so it should be cheap or
/// already offloaded by the embedder.
pub struct FnEngine<F> {
    name: String,
    func: F,
}

impl<F> FnEngine<F>
where
    F: Fn(&[u8]) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    pub fn new<S: Into<String>>(name: S, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F> RemovalEngine for FnEngine<F>
where
    F: Fn(&[u8]) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    async fn remove_background(&self, image: &[u8]) -> anyhow::Result<Vec<u8>> {
        (self.func)(image)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Engine that pipes the image through an external program (stdin to stdout)
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandEngine {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Parse a whitespace separated command line such as `"rembg i - -"`
    ///
    /// # Errors
    /// - Empty command line
    pub fn from_command_line(command_line: &str) -> anyhow::Result<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("engine command line is empty"))?;
        Ok(Self::new(program).args(parts))
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, image: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start '{}'", self.program))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin of '{}' is not available", self.program))?;

        // Feed stdin while collecting stdout so neither pipe can fill up and stall
        let writer = async move {
            stdin.write_all(image).await?;
            stdin.shutdown().await
        };
        let (write_result, output) = tokio::join!(writer, child.wait_with_output());
        let output = output.with_context(|| format!("failed to wait for '{}'", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            );
        }
        write_result.with_context(|| format!("failed to send image to '{}'", self.program))?;

        debug!(
            program = %self.program,
            output_bytes = output.stdout.len(),
            "Engine process finished"
        );
        Ok(output.stdout)
    }
}

#[async_trait]
impl RemovalEngine for CommandEngine {
    #[instrument(skip(self, image), fields(program = %self.program, input_bytes = image.len()))]
    async fn remove_background(&self, image: &[u8]) -> anyhow::Result<Vec<u8>> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(image))
                .await
                .map_err(|_| anyhow!("'{}' timed out after {:?}", self.program, limit))?,
            None => self.run(image).await,
        }
    }

    fn name(&self) -> &str {
        &self.program
    }
}
