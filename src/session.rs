// src/session.rs
//
// Per-connection session state: accumulation buffer, framing configuration,
// one-shot framing override, and the session's append-only message log.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::framing::framer::FramingConfig;

/// Get current time in microseconds since UNIX epoch
pub fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Direction of a logged message relative to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Tx,
    Rx,
}

/// One entry in a session's message log.
/// Consumed read-only by the external log viewer.
#[derive(Clone, Debug, Serialize)]
pub struct SessionLogEntry {
    /// Unique entry id
    pub id: String,
    pub direction: Direction,
    pub data: Vec<u8>,
    /// Host UNIX timestamp in microseconds.
    pub timestamp_us: u64,
}

impl SessionLogEntry {
    pub fn new(direction: Direction, data: Vec<u8>) -> Self {
        SessionLogEntry {
            id: Uuid::new_v4().to_string(),
            direction,
            data,
            timestamp_us: now_us(),
        }
    }
}

/// A completed application-level message reassembled from the byte stream.
/// Immutable once produced; never emitted partially.
#[derive(Clone, Debug, Serialize)]
pub struct Frame {
    pub session_id: String,
    pub bytes: Vec<u8>,
    /// Host UNIX timestamp in microseconds at completion.
    pub timestamp_us: u64,
}

/// One logical connection. Owns its accumulation buffer, framing
/// configuration, one-shot override, and message log exclusively;
/// no state is shared between sessions.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub config: FramingConfig,
    /// One-shot framing override. Consumed (cleared) by the call that
    /// produces a frame from it; retained if no frame resulted.
    pub framing_override: Option<FramingConfig>,
    /// Accumulation buffer for bytes not yet framed.
    pub buffer: Vec<u8>,
    /// Append-only message log (RX frames and TX payloads).
    pub log: Vec<SessionLogEntry>,
    /// Generation counter for the pending timeout timer. Bumping this
    /// invalidates any already-spawned flush task for the session.
    pub timer_generation: u64,
    /// Total bytes received into the buffer.
    pub bytes_read: u64,
    /// Total bytes logged as transmitted.
    pub bytes_written: u64,
}

impl Session {
    pub fn new(id: String, config: FramingConfig) -> Self {
        Session {
            id,
            config,
            framing_override: None,
            buffer: Vec::new(),
            log: Vec::new(),
            timer_generation: 0,
            bytes_read: 0,
            bytes_written: 0,
        }
    }

    /// The configuration the next framing evaluation should use:
    /// the one-shot override if present, else the persistent config.
    pub fn effective_config(&self) -> &FramingConfig {
        self.framing_override.as_ref().unwrap_or(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::framer::{FramingConfig, FramingStrategy};

    #[test]
    fn test_effective_config_prefers_override() {
        let mut session = Session::new("s1".to_string(), FramingConfig::default());
        assert_eq!(session.effective_config().strategy, FramingStrategy::None);

        let mut override_cfg = FramingConfig::default();
        override_cfg.strategy = FramingStrategy::Delimiter;
        session.framing_override = Some(override_cfg);
        assert_eq!(
            session.effective_config().strategy,
            FramingStrategy::Delimiter
        );

        session.framing_override = None;
        assert_eq!(session.effective_config().strategy, FramingStrategy::None);
    }

    #[test]
    fn test_log_entry_ids_are_unique() {
        let a = SessionLogEntry::new(Direction::Rx, vec![1, 2]);
        let b = SessionLogEntry::new(Direction::Rx, vec![1, 2]);
        assert_ne!(a.id, b.id);
    }
}
