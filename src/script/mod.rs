// src/script/mod.rs
//
// User scripting: static risk analysis, sandboxed execution, and the
// per-command request/response orchestration built on top of both.

pub mod analyzer;
pub mod orchestrator;
pub mod sandbox;

use serde::{Deserialize, Serialize};

/// Which hook of a command a script is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptType {
    PreRequest,
    PostResponse,
}

/// Scripting hooks attached to a saved command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandScripting {
    /// Master switch; when false the hooks are kept but never executed.
    #[serde(default)]
    pub enabled: bool,
    /// Runs before the request is sent; its return value can replace the
    /// outgoing payload.
    #[serde(default)]
    pub pre_request_script: Option<String>,
    /// Runs against the response frame; its truthiness decides validity.
    #[serde(default)]
    pub post_response_script: Option<String>,
}

/// A saved command: a payload to transmit plus optional scripting hooks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Command {
    #[serde(default)]
    pub name: Option<String>,
    /// Stored request payload, sent when no pre-request script overrides it.
    #[serde(default)]
    pub data: Vec<u8>,
    #[serde(default)]
    pub scripting: CommandScripting,
}

impl Command {
    /// Display label for analysis reports: the command's name, or
    /// "Command N" (1-based) when unnamed.
    pub fn label(&self, index: usize) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("Command {}", index + 1),
        }
    }
}
