//! Result of a command executed inside a pod

use serde::Serialize;

/// Exit status and combined stdout/stderr of one in-pod command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    /// Process exit code (0 on success)
    pub exit_code: i32,
    /// Interleaved stdout and stderr
    pub output: String,
}

impl ExecutionResult {
    /// Result of a command that exited with `exit_code`
    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    /// The command exited with zero
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Substring match on the captured output
    pub fn output_contains(&self, needle: &str) -> bool {
        self.output.contains(needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_is_exit_zero() {
        assert!(ExecutionResult::new(0, "").success());
        assert!(!ExecutionResult::new(1, "").success());
        assert!(!ExecutionResult::new(-1, "").success());
    }

    #[test]
    fn test_output_contains() {
        let result = ExecutionResult::new(0, "--- PASS: TestReadOnlyTest (3.10s)\nok");
        assert!(result.output_contains("PASS"));
        assert!(!result.output_contains("FAIL"));
    }
}
