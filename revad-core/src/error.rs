use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Recoverable errors raised while recording.
///
/// Invariant violations (mismatched nesting, stale handles) are not represented
/// here; those panic, since continuing would differentiate truncated memory.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
  /// Two operand sequences that must pair up element-wise differ in length.
  #[error("length mismatch: expected {expected} operands, got {actual}")]
  LengthMismatch { expected: usize, actual: usize },

  /// A reduction needs more operands than it was given.
  #[error("{operation} needs at least {required} operands, got {actual}")]
  TooFewOperands {
    operation: &'static str,
    required: usize,
    actual: usize,
  },

  /// Domain error raised by collaborator code running under a nested scope.
  #[error("domain error: {0}")]
  Domain(String),
}
