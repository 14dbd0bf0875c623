//! Stage backend that runs an external generator process.
//!
//! The stage input (optionally prefixed by the stage instructions) is
//! written to the child's stdin and its stdout is the raw stage output.
//! Works with any CLI that behaves that way, e.g. `fabric -p <pattern>`.

use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::Stage;

/// Subprocess-backed stage
pub struct CommandStage {
    program: String,
    args: Vec<String>,
    instructions: Option<String>,
    display_name: String,
}

impl CommandStage {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        let display_name = std::iter::once(program.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            program,
            args,
            instructions: None,
            display_name,
        }
    }

    /// Send instruction text ahead of the stage input
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    fn payload(&self, input: &str) -> String {
        match &self.instructions {
            Some(instructions) => format!("{}\n\nInput:\n{}", instructions, input),
            None => input.to_string(),
        }
    }
}

#[async_trait]
impl Stage for CommandStage {
    fn name(&self) -> &str {
        &self.display_name
    }

    async fn generate(&self, input: &str) -> Result<String> {
        // kill_on_drop: a timed-out or cancelled call takes the child with it
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn '{}'", self.display_name))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(self.payload(input).as_bytes())
                .await
                .with_context(|| format!("Failed to write to '{}' stdin", self.display_name))?;
            // Drop stdin to signal EOF
        }

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("Failed to wait for '{}'", self.display_name))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            anyhow::bail!(
                "'{}' failed with exit code {}: {}",
                self.display_name,
                exit_code,
                stderr.trim()
            );
        }

        String::from_utf8(output.stdout)
            .with_context(|| format!("'{}' output is not valid UTF-8", self.display_name))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stdout_is_returned_unchanged() {
        let stage = CommandStage::new("cat", vec![]);
        let out = stage.generate("{\"event\":\"FUEL_OK\"}").await.unwrap();
        assert_eq!(out, "{\"event\":\"FUEL_OK\"}");
    }

    #[tokio::test]
    async fn test_instructions_prefix_input() {
        let stage = CommandStage::new("cat", vec![]).with_instructions("Reply with JSON.");
        let out = stage.generate("payload").await.unwrap();
        assert_eq!(out, "Reply with JSON.\n\nInput:\npayload");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_an_error() {
        let stage = CommandStage::new("sh", vec!["-c".to_string(), "echo boom >&2; exit 3".to_string()]);
        let err = stage.generate("").await.unwrap_err();
        assert!(err.to_string().contains("exit code 3"));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let stage = CommandStage::new("/nonexistent/generator", vec![]);
        assert!(stage.generate("x").await.is_err());
    }

    #[test]
    fn test_display_name() {
        let stage = CommandStage::new("fabric", vec!["-p".to_string(), "car_trader".to_string()]);
        assert_eq!(stage.name(), "fabric -p car_trader");
    }
}
