//! CLI command provider.
//!
//! Spawns a configured program per call, writes the prompt to its stdin and
//! reads the answer from stdout. The child is killed when the call future is
//! dropped, so request cancellation and per-provider timeouts terminate it.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;
use wallbounce_application::{Provider, ProviderError, ProviderReply};
use wallbounce_domain::consensus::{parse_confidence, strip_confidence_line};
use wallbounce_domain::{ExecutionOptions, ProviderDescriptor, TokenUsage};

/// Exit status conventionally used for command line usage errors.
const USAGE_ERROR_EXIT: i32 = 2;

pub struct CommandProvider {
    descriptor: ProviderDescriptor,
    command: String,
    args: Vec<String>,
}

impl CommandProvider {
    pub fn new(descriptor: ProviderDescriptor, command: impl Into<String>) -> Self {
        Self {
            descriptor,
            command: command.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Check if the command is available on PATH
    pub fn is_command_available(command: &str) -> bool {
        which::which(command).is_ok()
    }

    fn build_command(&self, options: &ExecutionOptions) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(max_tokens) = options.max_tokens {
            cmd.env("WALLBOUNCE_MAX_TOKENS", max_tokens.to_string());
        }
        if let Some(temperature) = options.temperature {
            cmd.env("WALLBOUNCE_TEMPERATURE", temperature.to_string());
        }
        cmd
    }
}

#[async_trait]
impl Provider for CommandProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn execute(
        &self,
        prompt: &str,
        options: &ExecutionOptions,
    ) -> Result<ProviderReply, ProviderError> {
        let start = Instant::now();
        let mut child = self.build_command(options).spawn().map_err(|e| {
            ProviderError::Unavailable(format!("failed to spawn {}: {}", self.command, e))
        })?;

        // Feed stdin while draining stdout: a program that echoes a large
        // prompt blocks on a full stdout pipe before it reads all of stdin.
        let stdin = child.stdin.take();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(prompt.as_bytes()).await {
                // A program may answer without reading its input.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                result => result,
            }
            // Dropping stdin closes the pipe so the program sees EOF.
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());

        let output = output
            .map_err(|e| ProviderError::Failed(format!("{} did not complete: {}", self.command, e)))?;
        fed.map_err(|e| ProviderError::Failed(format!("failed to write prompt: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(output.status.code(), stderr.trim()));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let confidence = parse_confidence(&raw);
        let content = strip_confidence_line(&raw).trim().to_string();
        if content.is_empty() {
            return Err(ProviderError::Failed(format!(
                "{} produced no output",
                self.command
            )));
        }

        let tokens = TokenUsage::new(estimate_tokens(prompt), estimate_tokens(&content));
        let latency = start.elapsed();
        debug!(
            provider = %self.descriptor.id,
            latency_ms = latency.as_millis() as u64,
            tokens = tokens.total(),
            "Command provider completed"
        );

        let mut reply = ProviderReply::new(content)
            .with_tokens(tokens)
            .with_latency(latency)
            .with_cost(self.descriptor.cost_for(tokens.total()));
        if let Some(confidence) = confidence {
            reply = reply.with_confidence(confidence);
        }
        Ok(reply)
    }

    async fn health_check(&self) -> bool {
        Self::is_command_available(&self.command)
    }
}

/// Whitespace-delimited words, a rough stand-in for tokenizer counts.
fn estimate_tokens(text: &str) -> u32 {
    u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
}

fn classify_failure(code: Option<i32>, stderr: &str) -> ProviderError {
    let lower = stderr.to_lowercase();
    if lower.contains("rate limit") || lower.contains("too many requests") {
        return ProviderError::RateLimited(stderr.to_string());
    }
    match code {
        Some(USAGE_ERROR_EXIT) => ProviderError::InvalidInput(stderr.to_string()),
        Some(code) => ProviderError::Failed(format!("exit status {}: {}", code, stderr)),
        None => ProviderError::Failed(format!("terminated by signal: {}", stderr)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(id: &str, script: &str) -> CommandProvider {
        CommandProvider::new(ProviderDescriptor::new(id), "sh")
            .with_args(vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_echoes_prompt_through_stdin() {
        let provider = CommandProvider::new(
            ProviderDescriptor::new("cat").with_cost_per_token(0.5),
            "cat",
        );
        let reply = provider
            .execute("use a read replica", &ExecutionOptions::default())
            .await
            .unwrap();
        assert_eq!(reply.content, "use a read replica");
        assert_eq!(reply.confidence, None);
        assert_eq!(reply.tokens, TokenUsage::new(4, 4));
        assert_eq!(reply.cost, 4.0);
    }

    #[tokio::test]
    async fn test_parses_trailing_confidence() {
        let provider = sh("conf", "cat >/dev/null; printf 'Add an index.\\nConfidence: 85%%\\n'");
        let reply = provider
            .execute("why is this slow?", &ExecutionOptions::default())
            .await
            .unwrap();
        assert_eq!(reply.content, "Add an index.");
        assert_eq!(reply.confidence, Some(0.85));
    }

    #[tokio::test]
    async fn test_usage_error_is_not_retryable() {
        let provider = sh("bad", "cat >/dev/null; echo 'prompt too long' >&2; exit 2");
        let err = provider
            .execute("x", &ExecutionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidInput(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_rate_limit_from_stderr() {
        let provider = sh("busy", "cat >/dev/null; echo 'Rate limit exceeded' >&2; exit 1");
        let err = provider
            .execute("x", &ExecutionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_empty_output_fails() {
        let provider = sh("quiet", "cat >/dev/null");
        let err = provider
            .execute("x", &ExecutionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Failed(_)));
    }

    #[tokio::test]
    async fn test_large_prompt_is_streamed_while_reading_output() {
        let provider = CommandProvider::new(ProviderDescriptor::new("cat"), "cat");
        let prompt = "word ".repeat(200_000);
        let reply = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            provider.execute(&prompt, &ExecutionOptions::default()),
        )
        .await
        .expect("large prompt deadlocked")
        .unwrap();
        assert_eq!(reply.content.len(), prompt.trim().len());
        assert_eq!(reply.tokens, TokenUsage::new(200_000, 200_000));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let provider = CommandProvider::new(
            ProviderDescriptor::new("ghost"),
            "wallbounce-no-such-binary",
        );
        assert!(!provider.health_check().await);
        let err = provider
            .execute("x", &ExecutionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_options_passed_as_env() {
        let provider = sh("env", "cat >/dev/null; echo \"$WALLBOUNCE_MAX_TOKENS\"");
        let options = ExecutionOptions::default().with_max_tokens(256);
        let reply = provider.execute("x", &options).await.unwrap();
        assert_eq!(reply.content, "256");
    }
}
