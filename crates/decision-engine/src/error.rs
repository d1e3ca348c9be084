//! Error Types for the Decision Engine
//!
//! Only structurally invalid input is an error. Weak signals, short candle
//! histories and degenerate ratios degrade to neutral defaults instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid {field}: {value} (prices must be positive and finite)")]
    InvalidPrice { field: &'static str, value: String },

    #[error("Stop loss must differ from entry price")]
    ZeroStopDistance,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Symbol not supported: {0}")]
    UnsupportedSymbol(String),

    #[error("Market data error: {0}")]
    DataSource(String),

    #[error("Pattern compilation error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub(crate) fn invalid_price(field: &'static str, value: impl ToString) -> Self {
        Self::InvalidPrice {
            field,
            value: value.to_string(),
        }
    }
}

impl From<EngineError> for agent_core::AgentError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidPrice { .. }
            | EngineError::ZeroStopDistance
            | EngineError::InvalidInput(_)
            | EngineError::UnsupportedSymbol(_) => Self::ToolValidation(err.to_string()),
            other => Self::ToolExecution(other.to_string()),
        }
    }
}
