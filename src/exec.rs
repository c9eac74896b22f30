use std::process::Command;

/// Output captured from one execution of an armed snippet. Rendered once as
/// a transcript entry and never sent back to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub output: String,
}

/// Holds at most one extracted code snippet awaiting an explicit `run`.
///
/// The code runs unsandboxed with the full privileges of this process; that
/// is the documented contract of the `run` command, gated only by the
/// `allow_exec` config flag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Gate {
    #[default]
    Disarmed,
    Armed(String),
}

impl Gate {
    /// Arm with a fresh snippet. A newer reply's code overwrites any
    /// unconsumed one: the latest reply wins.
    pub fn arm(&mut self, code: String) {
        *self = Gate::Armed(code);
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, Gate::Armed(_))
    }

    /// Execute the armed snippet synchronously via `interpreter -c code`,
    /// capturing stdout and stderr. Returns `None` (and stays put) when
    /// disarmed. The gate is disarmed after a run attempt no matter how the
    /// child fared; spawn failures and non-zero exits become output text
    /// instead of errors so a bad snippet can never wedge the session.
    pub fn fire(&mut self, interpreter: &str) -> Option<ExecutionResult> {
        let code = match std::mem::take(self) {
            Gate::Disarmed => return None,
            Gate::Armed(code) => code,
        };

        let output = match Command::new(interpreter).arg("-c").arg(&code).output() {
            Ok(out) => {
                let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&out.stderr);
                if !stderr.is_empty() {
                    if !text.is_empty() && !text.ends_with('\n') {
                        text.push('\n');
                    }
                    text.push_str(&stderr);
                }
                if !out.status.success() {
                    if !text.is_empty() && !text.ends_with('\n') {
                        text.push('\n');
                    }
                    text.push_str(&format!("[exited with {}]", out.status));
                }
                text
            }
            Err(e) => format!("failed to launch {}: {}", interpreter, e),
        };

        Some(ExecutionResult { output })
    }
}
