// src/lib.rs
//
// linetap core: session framing for serial/stream transports, checksum
// trailers on framed payloads, and sandboxed per-command scripting.
// Transport I/O, configuration persistence, and rendering live in the
// host application, not here.

pub mod checksums;
pub mod framing;
pub mod logging;
pub mod script;
pub mod session;

pub use checksums::ChecksumConfig;
pub use framing::framer::{ByteOrder, FramingConfig, FramingStrategy, PrefixWidth};
pub use framing::{hex_preview, FrameCallback, FramingEngine};
pub use logging::{
    clear_system_log, init_file_logging, stop_file_logging, system_log, system_log_entries,
    SystemLogEntry,
};
pub use script::analyzer::{
    analyze, analyze_command_scripts, analyze_value, CommandScriptAnalysis, ScriptAnalysis,
    ScriptFinding, Severity,
};
pub use script::orchestrator::{CommandOrchestrator, ResponseValidation};
pub use script::sandbox::{ExecOptions, ScriptError, ScriptExecutor};
pub use script::{Command, CommandScripting, ScriptType};
pub use session::{now_us, Direction, Frame, Session, SessionLogEntry};
