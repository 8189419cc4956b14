// src/framing/mod.rs
//
// Session framing engine. Owns the per-session receive buffers, applies the
// configured framing strategy to incoming chunks, arms quiet-period timers
// for TIMEOUT framing, and delivers completed frames to the registered
// frame callback. Sessions are isolated: one session's data, config, and
// timers never touch another's.

pub mod framer;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

use crate::logging::{system_log, tlog};
use crate::session::{now_us, Direction, Frame, Session, SessionLogEntry};
use self::framer::{extract_frames, flush_whole_buffer, FramingConfig, FramingStrategy};

/// Maximum number of payload bytes rendered in a hex preview.
const PREVIEW_BYTES: usize = 16;

/// Callback invoked for every completed frame: (bytes, session_id, preview).
pub type FrameCallback = Arc<dyn Fn(Vec<u8>, String, String) + Send + Sync>;

/// Render a bounded hex preview of a payload, truncated with an ellipsis.
pub fn hex_preview(bytes: &[u8]) -> String {
    if bytes.len() <= PREVIEW_BYTES {
        hex::encode(bytes)
    } else {
        format!("{}…", hex::encode(&bytes[..PREVIEW_BYTES]))
    }
}

struct EngineInner {
    sessions: Mutex<HashMap<String, Session>>,
    on_frame: std::sync::Mutex<Option<FrameCallback>>,
}

/// The framing engine. Cheap to clone; clones share the session table.
#[derive(Clone)]
pub struct FramingEngine {
    inner: Arc<EngineInner>,
}

impl Default for FramingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FramingEngine {
    pub fn new() -> Self {
        FramingEngine {
            inner: Arc::new(EngineInner {
                sessions: Mutex::new(HashMap::new()),
                on_frame: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Register the frame callback. Replaces any previous callback.
    pub fn set_frame_callback(&self, callback: FrameCallback) {
        if let Ok(mut slot) = self.inner.on_frame.lock() {
            *slot = Some(callback);
        }
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Create a session with the given persistent framing config.
    pub async fn create_session(&self, id: &str, config: FramingConfig) -> Result<(), String> {
        let mut sessions = self.inner.sessions.lock().await;
        if sessions.contains_key(id) {
            return Err(format!("Session {} already exists", id));
        }
        tlog!("Creating framing session {}", id);
        sessions.insert(id.to_string(), Session::new(id.to_string(), config));
        Ok(())
    }

    /// Remove a session entirely, cancelling any pending timer.
    /// Safe to call for unknown session ids.
    pub async fn remove_session(&self, id: &str) {
        let mut sessions = self.inner.sessions.lock().await;
        if sessions.remove(id).is_some() {
            tlog!("Removed framing session {}", id);
        }
    }

    /// Replace a session's persistent framing config.
    /// Buffered bytes are kept and re-framed under the new config on the
    /// next data arrival.
    pub async fn set_config(&self, id: &str, config: FramingConfig) -> Result<(), String> {
        let mut sessions = self.inner.sessions.lock().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| format!("Unknown session: {}", id))?;
        session.timer_generation += 1;
        session.config = config;
        Ok(())
    }

    /// Set a one-shot framing override. It governs framing until it
    /// produces a frame, then reverts to the persistent config.
    pub async fn set_framing_override(
        &self,
        id: &str,
        config: FramingConfig,
    ) -> Result<(), String> {
        let mut sessions = self.inner.sessions.lock().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| format!("Unknown session: {}", id))?;
        session.framing_override = Some(config);
        Ok(())
    }

    /// Cancel any pending flush timer and discard buffered bytes, leaving
    /// the session itself in place. Idempotent and safe for unknown ids.
    /// After this returns no frame will be observed for the session until
    /// new data arrives.
    pub async fn cleanup_framer(&self, id: &str) {
        let mut sessions = self.inner.sessions.lock().await;
        if let Some(session) = sessions.get_mut(id) {
            session.timer_generation += 1;
            session.buffer.clear();
        }
    }

    // ========================================================================
    // Data Path
    // ========================================================================

    /// Feed a chunk of received bytes into a session and return the frames
    /// completed by this chunk. TIMEOUT-framed data completes later via the
    /// frame callback when the quiet-period timer fires.
    pub async fn handle_data(&self, session_id: &str, bytes: &[u8]) -> Vec<Frame> {
        if bytes.is_empty() {
            return Vec::new();
        }

        let mut timer: Option<(u64, u64, bool)> = None;
        let frames = {
            let mut sessions = self.inner.sessions.lock().await;
            let session = match sessions.get_mut(session_id) {
                Some(session) => session,
                None => {
                    tlog!("Data for unknown session {} ({} bytes)", session_id, bytes.len());
                    system_log(&format!("Received data for unknown session {}", session_id));
                    return Vec::new();
                }
            };

            session.bytes_read += bytes.len() as u64;
            session.buffer.extend_from_slice(bytes);

            let config = session.effective_config().clone();
            let extracted = extract_frames(&config, &mut session.buffer);

            if !extracted.is_empty() && session.framing_override.is_some() {
                session.framing_override = None;
            }

            if config.strategy == FramingStrategy::Timeout && !session.buffer.is_empty() {
                // Re-arm the quiet-period timer; the new generation value
                // invalidates any timer armed by an earlier chunk. Whether
                // the override governed this arming decides whether the
                // deferred flush consumes it.
                session.timer_generation += 1;
                timer = Some((
                    session.timer_generation,
                    config.timeout_ms,
                    session.framing_override.is_some(),
                ));
            }

            extracted
                .into_iter()
                .map(|frame_bytes| self.record_frame(session, frame_bytes))
                .collect::<Vec<Frame>>()
        };

        for frame in &frames {
            self.deliver_frame(frame);
        }

        if let Some((generation, timeout_ms, from_override)) = timer {
            self.spawn_flush_timer(session_id.to_string(), generation, timeout_ms, from_override);
        }

        frames
    }

    /// Append a transmitted payload to the session log.
    pub async fn log_tx(&self, session_id: &str, bytes: &[u8]) -> Result<(), String> {
        let mut sessions = self.inner.sessions.lock().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| format!("Unknown session: {}", session_id))?;
        session.bytes_written += bytes.len() as u64;
        session
            .log
            .push(SessionLogEntry::new(Direction::Tx, bytes.to_vec()));
        Ok(())
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Snapshot of a session's traffic log.
    pub async fn session_log(&self, session_id: &str) -> Vec<SessionLogEntry> {
        let sessions = self.inner.sessions.lock().await;
        sessions
            .get(session_id)
            .map(|session| session.log.clone())
            .unwrap_or_default()
    }

    /// `(bytes_read, bytes_written)` counters for a session.
    pub async fn byte_counts(&self, session_id: &str) -> Option<(u64, u64)> {
        let sessions = self.inner.sessions.lock().await;
        sessions
            .get(session_id)
            .map(|session| (session.bytes_read, session.bytes_written))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Record a completed frame in the session log and build the Frame.
    /// Caller holds the session table lock.
    fn record_frame(&self, session: &mut Session, bytes: Vec<u8>) -> Frame {
        session
            .log
            .push(SessionLogEntry::new(Direction::Rx, bytes.clone()));
        Frame {
            session_id: session.id.clone(),
            bytes,
            timestamp_us: now_us(),
        }
    }

    /// System-log a completed frame and invoke the frame callback.
    /// Called with the session table lock released.
    fn deliver_frame(&self, frame: &Frame) {
        let preview = hex_preview(&frame.bytes);
        system_log(&format!(
            "Session {}: frame of {} bytes [{}]",
            frame.session_id,
            frame.bytes.len(),
            preview
        ));
        let callback = self
            .inner
            .on_frame
            .lock()
            .ok()
            .and_then(|slot| slot.clone());
        if let Some(callback) = callback {
            callback(frame.bytes.clone(), frame.session_id.clone(), preview);
        }
    }

    /// Arm a quiet-period flush for TIMEOUT framing. The timer only flushes
    /// if its generation still matches when it fires; re-arms, config
    /// changes, cleanup, and removal all bump the generation and thereby
    /// cancel it.
    fn spawn_flush_timer(
        &self,
        session_id: String,
        generation: u64,
        timeout_ms: u64,
        from_override: bool,
    ) {
        let inner = Arc::clone(&self.inner);
        let engine = FramingEngine { inner };
        tokio::spawn(async move {
            sleep(Duration::from_millis(timeout_ms)).await;
            engine
                .flush_on_timeout(&session_id, generation, from_override)
                .await;
        });
    }

    async fn flush_on_timeout(&self, session_id: &str, generation: u64, from_override: bool) {
        let frame = {
            let mut sessions = self.inner.sessions.lock().await;
            let session = match sessions.get_mut(session_id) {
                Some(session) => session,
                None => return,
            };
            if session.timer_generation != generation {
                return;
            }
            let flushed = flush_whole_buffer(&mut session.buffer);
            let frame_bytes = match flushed.into_iter().next() {
                Some(frame_bytes) => frame_bytes,
                None => return,
            };
            // A deferred flush counts as the override's one frame only
            // when the override governed the arming of this timer. An
            // override set after arming was never consulted and stays.
            if from_override {
                session.framing_override = None;
            }
            self.record_frame(session, frame_bytes)
        };
        self.deliver_frame(&frame);
    }
}
