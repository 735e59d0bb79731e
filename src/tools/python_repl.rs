//! Python execution tool for the code agent.
//!
//! Each call runs a fresh `python3 -c <code>` process. There is no state
//! shared between calls, so the model must print what it wants to see.

use crate::tools::registry::Tool;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{info, warn};

const MAX_OUTPUT: usize = 20_000;

pub struct PythonReplTool {
    interpreter: String,
    timeout: Duration,
}

impl PythonReplTool {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    /// Use a different interpreter binary (e.g. a virtualenv's python)
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }
}

#[async_trait]
impl Tool for PythonReplTool {
    fn name(&self) -> &str {
        "python_repl_tool"
    }

    fn description(&self) -> &str {
        "Execute python code for data analysis or calculation. \
         To see the value of something, print it with `print(...)`."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "The python code to execute to do further analysis or calculation."
                }
            },
            "required": ["code"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let code = args
            .get("code")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::InvalidInput("code must be a string".to_string()))?;

        info!("Executing Python code");

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-c")
            .arg(code)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| AppError::Tool(format!("Failed to start {}: {}", self.interpreter, e)))?;

        // Both pipes are drained together; the child is killed if the timeout drops it.
        let result = timeout(self.timeout, child.wait_with_output()).await;

        match result {
            Ok(Ok(output)) => {
                let status = output.status;
                if !status.success() {
                    warn!("Python code exited with {:?}", status.code());
                }
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                Ok(json!({
                    "success": status.success(),
                    "exit_code": status.code().unwrap_or(-1),
                    "stdout": truncate(stdout),
                    "stderr": truncate(stderr),
                }))
            }
            Ok(Err(e)) => Err(AppError::Tool(format!("Python process failed: {}", e))),
            Err(_) => Err(AppError::Tool(format!(
                "Python execution timed out after {} seconds",
                self.timeout.as_secs()
            ))),
        }
    }
}

fn truncate(output: String) -> String {
    if output.len() <= MAX_OUTPUT {
        return output;
    }
    let mut end = MAX_OUTPUT;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}...[truncated, {} bytes total]",
        &output[..end],
        output.len()
    )
}
