//! # agent-core
//!
//! Tool framework shared by the decision engine and the HTTP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     ToolRegistry                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐  │
//! │  │ market_      │  │ trade_       │  │ emotion_check  │  │
//! │  │ analyzer     │  │ evaluator    │  │ position_sizer │  │
//! │  └──────────────┘  └──────────────┘  └────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//!          ▲ ToolCall (JSON)             │ ToolResult
//!          │                             ▼
//!     LLM function calling / HTTP clients (external)
//! ```
//!
//! The LLM client itself is an external collaborator; this crate only defines
//! the schema and dispatch contract that such a client talks to.

pub mod tool;
pub mod error;

pub use error::{AgentError, Result};
pub use tool::{ParameterSchema, Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
