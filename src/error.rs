use thiserror::Error;

/// Errors raised during query compilation or evaluation.
///
/// Every failure is a validation error raised synchronously; it unwinds the
/// whole evaluation and no partial results are returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Criteria or pipeline document has the wrong shape
    #[error("invalid criteria: {0}")]
    InvalidCriteria(String),

    /// Expression tree cannot be interpreted
    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    /// Operator name is unknown in the class it was used in
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    /// Operator operand has the wrong shape or type
    #[error("invalid operand: {0}")]
    InvalidOperand(String),

    /// Reference to an unbound variable
    #[error("undefined variable: $${0}")]
    UndefinedVariable(String),

    /// Operator registration failure
    #[error("invalid operator registration: {0}")]
    Registration(String),
}

pub type Result<T> = std::result::Result<T, Error>;
