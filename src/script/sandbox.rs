// src/script/sandbox.rs
//
// Sandboxed execution of user scripts. Each call evaluates in a fresh
// ECMAScript context on its own worker thread: no DOM, no network, no
// storage, no host state. The only binding a script sees beyond the
// language builtins is the read-only `context` value the caller injects.
// The wall-clock timeout is enforced from the host side; a timed-out
// worker is abandoned and its eventual result goes nowhere.

use boa_engine::{js_string, property::Attribute, Context, JsValue, Script, Source};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::{timeout, Duration};

/// Caps applied to each script context so an abandoned worker cannot spin
/// forever. Generous enough that legitimate payload transforms never hit
/// them before the wall-clock timeout does.
const LOOP_ITERATION_LIMIT: u64 = 100_000_000;
const RECURSION_LIMIT: usize = 1_000;

/// Typed script failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    /// Wall-clock budget exceeded; the worker was abandoned.
    #[error("Script execution timed out")]
    Timeout,
    /// The script threw; carries the original error message.
    #[error("Script threw: {0}")]
    Thrown(String),
    /// The script (or its context value) could not be evaluated at all.
    #[error("Invalid script: {0}")]
    Invalid(String),
}

/// Execution options.
#[derive(Debug, Clone, Copy)]
pub struct ExecOptions {
    /// Wall-clock budget for one execution.
    pub timeout: Duration,
}

impl Default for ExecOptions {
    fn default() -> Self {
        ExecOptions {
            timeout: Duration::from_millis(1000),
        }
    }
}

/// Stateless executor service. Holds no session affinity; every call gets
/// a fresh isolate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptExecutor;

impl ScriptExecutor {
    pub fn new() -> Self {
        ScriptExecutor
    }

    /// Run `source` with `context` bound as the global `context` value and
    /// return the script's result converted back to JSON. Numbers, strings,
    /// arrays, and plain objects pass through; an undefined completion
    /// becomes null. Byte payloads are passed as number arrays, which keep
    /// `.length` and index access inside the script.
    pub async fn execute(
        &self,
        source: &str,
        context: Value,
        options: &ExecOptions,
    ) -> Result<Value, ScriptError> {
        let source = source.to_string();
        let (result_tx, result_rx) = oneshot::channel();

        // Detached worker: if we time out it keeps running until the boa
        // runtime limits stop it, but its send lands in a dropped receiver.
        std::thread::spawn(move || {
            let _ = result_tx.send(evaluate(&source, &context));
        });

        match timeout(options.timeout, result_rx).await {
            Err(_elapsed) => Err(ScriptError::Timeout),
            Ok(Err(_gone)) => Err(ScriptError::Invalid(
                "Script worker terminated unexpectedly".to_string(),
            )),
            Ok(Ok(result)) => result,
        }
    }
}

/// Evaluate a script in a fresh, capability-free context.
fn evaluate(source: &str, context_value: &Value) -> Result<Value, ScriptError> {
    let mut context = Context::default();
    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(LOOP_ITERATION_LIMIT);
    context.runtime_limits_mut().set_recursion_limit(RECURSION_LIMIT);

    let bound = JsValue::from_json(context_value, &mut context)
        .map_err(|e| ScriptError::Invalid(format!("Context value rejected: {}", e)))?;
    context
        .register_global_property(js_string!("context"), bound, Attribute::ENUMERABLE)
        .map_err(|e| ScriptError::Invalid(format!("Context binding failed: {}", e)))?;

    // The evaluated form is decided by parsing alone, before anything
    // runs. A script may throw SyntaxError at runtime, so classifying a
    // completed evaluation's error would re-execute side effects and could
    // turn a thrown error into a success. Top-level `return` only parses
    // inside a function body, which is what the wrapped form provides.
    let script = match Script::parse(Source::from_bytes(source), None, &mut context) {
        Ok(script) => script,
        Err(parse_err) => {
            let wrapped = format!("(function(context) {{\n{}\n}})(context)", source);
            match Script::parse(Source::from_bytes(&wrapped), None, &mut context) {
                Ok(script) => script,
                // Report the original parse failure, not the wrapper's
                Err(_) => return Err(ScriptError::Invalid(parse_err.to_string())),
            }
        }
    };

    let completion = script
        .evaluate(&mut context)
        .map_err(|thrown| ScriptError::Thrown(thrown.to_string()))?;

    if completion.is_undefined() || completion.is_null() {
        return Ok(Value::Null);
    }
    completion
        .to_json(&mut context)
        .map_err(|e| ScriptError::Invalid(format!("Script result is not JSON-representable: {}", e)))
}
