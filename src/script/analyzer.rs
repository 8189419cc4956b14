// src/script/analyzer.rs
//
// Heuristic static scan of user script source. The rule set is a
// declarative table evaluated in one pass; matching is deliberately
// syntactic (regex, not a parse). This layer is advisory for the user;
// the execution boundary is the sandbox, not the analyzer.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::{Command, ScriptType};

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

/// One matched risk pattern.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptFinding {
    pub severity: Severity,
    pub message: String,
    /// The matched source text (or a synthetic marker for length findings).
    pub pattern: String,
}

/// Result of analyzing one script source.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptAnalysis {
    pub has_warnings: bool,
    pub has_critical: bool,
    pub findings: Vec<ScriptFinding>,
}

impl ScriptAnalysis {
    fn push(&mut self, severity: Severity, message: &str, pattern: String) {
        match severity {
            Severity::Warning => self.has_warnings = true,
            Severity::Critical => self.has_critical = true,
        }
        self.findings.push(ScriptFinding {
            severity,
            message: message.to_string(),
            pattern,
        });
    }
}

/// Analysis of one script hook of one command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandScriptAnalysis {
    pub command_name: String,
    pub script_type: ScriptType,
    pub script: String,
    pub analysis: ScriptAnalysis,
}

// ============================================================================
// Rule Table
// ============================================================================

struct Rule {
    pattern: &'static Lazy<Regex>,
    severity: Severity,
    message: &'static str,
}

macro_rules! rule_regex {
    ($name:ident, $re:expr) => {
        static $name: Lazy<Regex> = Lazy::new(|| Regex::new($re).expect("rule regex"));
    };
}

rule_regex!(RE_UNBOUNDED_WHILE, r"while\s*\(\s*(?:true|1|!0)\s*\)");
rule_regex!(RE_UNBOUNDED_FOR, r"for\s*\(\s*;\s*;\s*\)");
rule_regex!(RE_EVAL, r"\beval\s*\(");
rule_regex!(RE_NEW_FUNCTION, r"new\s+Function\s*\(");
rule_regex!(RE_LARGE_REPEAT, r"\.repeat\s*\(\s*(\d+)");
rule_regex!(RE_URL, r"https?://");
rule_regex!(RE_FETCH, r"\bfetch\s*\(");
rule_regex!(RE_LOCAL_STORAGE, r"\blocalStorage\b");
rule_regex!(RE_ATOB, r"\batob\s*\(");
rule_regex!(RE_FROM_CHAR_CODE, r"String\s*\.\s*fromCharCode");
rule_regex!(RE_STRING_TIMER, r#"set(?:Timeout|Interval)\s*\(\s*["']"#);
rule_regex!(RE_DYNAMIC_IMPORT, r"\bimport\s*\(");

/// `.repeat(n)` counts at or above this look like memory-bomb attempts.
const LARGE_REPEAT_THRESHOLD: u64 = 1_000_000;

/// Script length thresholds (characters). Mutually exclusive ranges.
const LENGTH_CRITICAL: usize = 5000;
const LENGTH_WARNING: usize = 2000;

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule {
            pattern: &RE_UNBOUNDED_WHILE,
            severity: Severity::Critical,
            message: "Unbounded while loop",
        },
        Rule {
            pattern: &RE_UNBOUNDED_FOR,
            severity: Severity::Critical,
            message: "Unbounded for loop",
        },
        Rule {
            pattern: &RE_EVAL,
            severity: Severity::Critical,
            message: "eval() allows arbitrary code execution",
        },
        Rule {
            pattern: &RE_NEW_FUNCTION,
            severity: Severity::Critical,
            message: "new Function() allows arbitrary code execution",
        },
        Rule {
            pattern: &RE_URL,
            severity: Severity::Warning,
            message: "Embedded absolute URL",
        },
        Rule {
            pattern: &RE_FETCH,
            severity: Severity::Warning,
            message: "Network request attempt",
        },
        Rule {
            pattern: &RE_LOCAL_STORAGE,
            severity: Severity::Warning,
            message: "Persistent storage access",
        },
        Rule {
            pattern: &RE_ATOB,
            severity: Severity::Warning,
            message: "Base64 decoding (possible obfuscation)",
        },
        Rule {
            pattern: &RE_FROM_CHAR_CODE,
            severity: Severity::Warning,
            message: "Character-code string construction (possible obfuscation)",
        },
        Rule {
            pattern: &RE_STRING_TIMER,
            severity: Severity::Warning,
            message: "Timer with string argument (implicit eval)",
        },
        Rule {
            pattern: &RE_DYNAMIC_IMPORT,
            severity: Severity::Warning,
            message: "Dynamic module import",
        },
    ]
});

// ============================================================================
// Analysis
// ============================================================================

/// Scan a script source for risk patterns. Pure function of the text.
pub fn analyze(source: &str) -> ScriptAnalysis {
    let mut analysis = ScriptAnalysis::default();

    for rule in RULES.iter() {
        if let Some(m) = rule.pattern.find(source) {
            analysis.push(rule.severity, rule.message, m.as_str().to_string());
        }
    }

    // Large .repeat(n) counts: the regex finds the call shape, the numeric
    // threshold decides whether it is a finding.
    for caps in RE_LARGE_REPEAT.captures_iter(source) {
        let count = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0);
        if count >= LARGE_REPEAT_THRESHOLD {
            analysis.push(
                Severity::Critical,
                "Very large string repeat count",
                caps.get(0).map(|m| m.as_str()).unwrap_or(".repeat").to_string(),
            );
        }
    }

    let length = source.chars().count();
    if length > LENGTH_CRITICAL {
        analysis.push(
            Severity::Critical,
            "Script is very long",
            format!("{} chars", length),
        );
    } else if length > LENGTH_WARNING {
        analysis.push(
            Severity::Warning,
            "Script is unusually long",
            format!("{} chars", length),
        );
    }

    analysis
}

/// Analyze a script arriving through the JSON config surface.
/// Anything that is not a string (including null) is itself a critical
/// finding rather than a scan subject.
pub fn analyze_value(value: &Value) -> ScriptAnalysis {
    match value {
        Value::String(source) => analyze(source),
        _ => {
            let mut analysis = ScriptAnalysis::default();
            analysis.push(
                Severity::Critical,
                "Script is not a valid string",
                value.to_string(),
            );
            analysis
        }
    }
}

/// Analyze every non-empty script across a command list, in command order
/// with pre-request before post-response. The `enabled` flag gates
/// execution only, never inspection.
pub fn analyze_command_scripts(commands: &[Command]) -> Vec<CommandScriptAnalysis> {
    let mut results = Vec::new();

    for (index, command) in commands.iter().enumerate() {
        let command_name = command.label(index);
        let hooks = [
            (ScriptType::PreRequest, &command.scripting.pre_request_script),
            (ScriptType::PostResponse, &command.scripting.post_response_script),
        ];
        for (script_type, script) in hooks {
            if let Some(source) = script {
                if source.trim().is_empty() {
                    continue;
                }
                results.push(CommandScriptAnalysis {
                    command_name: command_name.clone(),
                    script_type,
                    script: source.clone(),
                    analysis: analyze(source),
                });
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::CommandScripting;
    use serde_json::json;

    #[test]
    fn test_clean_script_has_no_findings() {
        let analysis = analyze("return 2+2;");
        assert!(!analysis.has_warnings);
        assert!(!analysis.has_critical);
        assert!(analysis.findings.is_empty());
    }

    #[test]
    fn test_unbounded_loops_are_critical() {
        for source in [
            "while(true){}",
            "while (true) {}",
            "while(1){}",
            "while(!0){}",
            "for(;;){}",
            "for ( ; ; ) {}",
        ] {
            let analysis = analyze(source);
            assert!(analysis.has_critical, "expected critical for {:?}", source);
        }
    }

    #[test]
    fn test_bounded_loops_are_clean() {
        let analysis = analyze("for (let i = 0; i < 10; i++) { sum += i; }");
        assert!(!analysis.has_critical);
        assert!(!analysis.has_warnings);
    }

    #[test]
    fn test_eval_and_new_function_are_critical() {
        assert!(analyze("eval('x')").has_critical);
        assert!(analyze("new Function('return 1')()").has_critical);
        // "medieval(" must not trip the eval rule
        assert!(!analyze("medieval('x')").has_critical);
    }

    #[test]
    fn test_large_repeat_threshold() {
        assert!(analyze("'a'.repeat(10000000)").has_critical);
        assert!(analyze("'a'.repeat(1000000)").has_critical);
        let small = analyze("'a'.repeat(100)");
        assert!(!small.has_critical);
        assert!(!small.has_warnings);
    }

    #[test]
    fn test_warning_patterns() {
        for source in [
            "fetch('http://x')",
            "let u = 'https://example.com';",
            "localStorage.getItem('k')",
            "atob('aGk=')",
            "String.fromCharCode(72)",
            "setTimeout('doIt()', 10)",
            "import('mod')",
        ] {
            let analysis = analyze(source);
            assert!(analysis.has_warnings, "expected warning for {:?}", source);
        }
    }

    #[test]
    fn test_timer_with_function_argument_is_clean() {
        assert!(!analyze("setTimeout(() => done(), 10)").has_warnings);
    }

    #[test]
    fn test_findings_accumulate() {
        let analysis = analyze("while(true){ fetch('https://x.com') }");
        assert!(analysis.has_critical);
        assert!(analysis.has_warnings);
        assert!(analysis.findings.len() >= 2);
    }

    #[test]
    fn test_length_thresholds_are_mutually_exclusive() {
        let warning = analyze(&"a".repeat(2500));
        assert!(warning.has_warnings);
        assert!(!warning.has_critical);

        let critical = analyze(&"a".repeat(6000));
        assert!(critical.has_critical);
        // Only the length finding is present; ranges do not overlap
        assert_eq!(
            critical
                .findings
                .iter()
                .filter(|f| f.pattern.ends_with("chars"))
                .count(),
            1
        );
    }

    #[test]
    fn test_analyze_value_non_string() {
        assert!(analyze_value(&json!(null)).has_critical);
        assert!(analyze_value(&json!(42)).has_critical);
        assert!(analyze_value(&json!({"script": "x"})).has_critical);
        assert!(!analyze_value(&json!("return 1;")).has_critical);
    }

    fn command(name: Option<&str>, pre: Option<&str>, post: Option<&str>) -> Command {
        Command {
            name: name.map(String::from),
            data: Vec::new(),
            scripting: CommandScripting {
                enabled: false,
                pre_request_script: pre.map(String::from),
                post_response_script: post.map(String::from),
            },
        }
    }

    #[test]
    fn test_analyze_command_scripts_order_and_labels() {
        let commands = vec![
            command(Some("ping"), Some("return params.x;"), Some("return data.length > 0;")),
            command(None, None, Some("while(true){}")),
            command(Some("empty"), Some("   "), None),
        ];

        let results = analyze_command_scripts(&commands);
        assert_eq!(results.len(), 3);

        // Command order, pre before post
        assert_eq!(results[0].command_name, "ping");
        assert_eq!(results[0].script_type, ScriptType::PreRequest);
        assert_eq!(results[1].command_name, "ping");
        assert_eq!(results[1].script_type, ScriptType::PostResponse);

        // Unnamed commands get a positional label; enabled=false is ignored
        assert_eq!(results[2].command_name, "Command 2");
        assert!(results[2].analysis.has_critical);
    }

    #[test]
    fn test_analyze_command_scripts_empty_input() {
        assert!(analyze_command_scripts(&[]).is_empty());
    }
}
