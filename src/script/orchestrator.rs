// src/script/orchestrator.rs
//
// Wires a command's pre-request and post-response scripts into the
// send/receive flow. The orchestrator itself never touches a transport:
// it turns a command into the signed bytes to send, and a received frame
// into a validation verdict.

use serde_json::{json, Value};

use super::analyzer::{analyze_command_scripts, CommandScriptAnalysis};
use super::sandbox::{ExecOptions, ScriptError, ScriptExecutor};
use super::Command;
use crate::checksums::ChecksumConfig;
use crate::logging::tlog;

/// Outcome of validating one response frame.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ResponseValidation {
    /// Checksum trailer verification result. Reported, never thrown.
    pub checksum_ok: bool,
    /// Post-response script verdict; true when the script is absent or
    /// disabled.
    pub script_ok: bool,
    /// Script failure detail, when the script timed out, threw, or was
    /// unparseable.
    pub script_error: Option<String>,
    /// The script's raw result value, for display.
    pub script_result: Option<Value>,
}

impl ResponseValidation {
    /// The exchange counts as validated when the script verdict holds.
    pub fn valid(&self) -> bool {
        self.script_ok
    }
}

/// Orchestrates per-command scripting around the send/receive flow.
#[derive(Debug, Clone, Default)]
pub struct CommandOrchestrator {
    executor: ScriptExecutor,
    options: ExecOptions,
}

impl CommandOrchestrator {
    pub fn new() -> Self {
        CommandOrchestrator {
            executor: ScriptExecutor::new(),
            options: ExecOptions::default(),
        }
    }

    pub fn with_options(options: ExecOptions) -> Self {
        CommandOrchestrator {
            executor: ScriptExecutor::new(),
            options,
        }
    }

    /// Analyzer findings for a command's scripts, for pre-flight user
    /// warning. Findings never block execution here; blocking on
    /// `has_critical` is caller policy.
    pub fn preflight(command: &Command) -> Vec<CommandScriptAnalysis> {
        analyze_command_scripts(std::slice::from_ref(command))
    }

    /// Build the outgoing payload for a command and sign it.
    ///
    /// When scripting is enabled and a pre-request script is present, the
    /// script runs with `context.params` bound to `params` and its return
    /// value replaces the stored payload: an array of byte values becomes
    /// the payload directly, a string is sent as UTF-8, and null keeps the
    /// stored `data`. Script failures propagate so the caller can mark the
    /// send failed.
    pub async fn prepare_request(
        &self,
        command: &Command,
        params: &Value,
        checksum: ChecksumConfig,
    ) -> Result<Vec<u8>, ScriptError> {
        let mut payload = command.data.clone();

        if let Some(source) = enabled_script(command, |s| s.pre_request_script.as_ref()) {
            let context = json!({ "params": params });
            let result = self.executor.execute(source, context, &self.options).await?;
            match result {
                Value::Null => {}
                Value::Array(items) => {
                    payload = bytes_from_array(&items)?;
                }
                Value::String(text) => {
                    payload = text.into_bytes();
                }
                other => {
                    return Err(ScriptError::Invalid(format!(
                        "Pre-request script returned unsupported payload type: {}",
                        other
                    )));
                }
            }
        }

        Ok(checksum.sign(&payload))
    }

    /// Validate a received frame against a command's checksum config and
    /// post-response script.
    ///
    /// The checksum verdict is reported as a boolean. The script, when
    /// enabled and present, runs with `context.data` bound to the frame
    /// payload (trailer stripped if the checksum verified) and a truthy
    /// result marks the exchange validated. A disabled or absent script
    /// validates by default.
    pub async fn validate_response(
        &self,
        command: &Command,
        frame: &[u8],
        checksum: ChecksumConfig,
    ) -> ResponseValidation {
        let checksum_ok = checksum.verify(frame);
        let payload: &[u8] = if checksum_ok {
            &frame[..frame.len() - checksum.output_bytes()]
        } else {
            frame
        };

        let source = match enabled_script(command, |s| s.post_response_script.as_ref()) {
            Some(source) => source,
            None => {
                return ResponseValidation {
                    checksum_ok,
                    script_ok: true,
                    script_error: None,
                    script_result: None,
                };
            }
        };

        let context = json!({ "data": payload });
        match self.executor.execute(source, context, &self.options).await {
            Ok(result) => ResponseValidation {
                checksum_ok,
                script_ok: is_truthy(&result),
                script_error: None,
                script_result: Some(result),
            },
            Err(err) => {
                tlog!("Post-response script failed: {}", err);
                ResponseValidation {
                    checksum_ok,
                    script_ok: false,
                    script_error: Some(err.to_string()),
                    script_result: None,
                }
            }
        }
    }
}

/// The command's script for a hook, only when scripting is enabled and the
/// script text is non-empty.
fn enabled_script<'a>(
    command: &'a Command,
    hook: impl Fn(&'a super::CommandScripting) -> Option<&'a String>,
) -> Option<&'a str> {
    if !command.scripting.enabled {
        return None;
    }
    hook(&command.scripting)
        .map(String::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Interpret a script's array return value as payload bytes.
fn bytes_from_array(items: &[Value]) -> Result<Vec<u8>, ScriptError> {
    items
        .iter()
        .map(|item| {
            item.as_f64()
                .filter(|v| v.fract() == 0.0 && (0.0..=255.0).contains(v))
                .map(|v| v as u8)
                .ok_or_else(|| {
                    ScriptError::Invalid(format!("Payload element is not a byte value: {}", item))
                })
        })
        .collect()
}

/// JS-style truthiness over the JSON result.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
