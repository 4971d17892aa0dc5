//! Outbound controller commands

use std::fmt;

use crate::constants::{DIPC_COMMAND_CODE, DIPC_MESSAGE_TYPE};
use crate::errors::WriteError;

/// Event log severity carried in the `msgtype` field of log records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Information,
    Warning,
    Error,
}

impl Severity {
    /// Parse the controller's numeric severity code.
    ///
    /// `0` and `1` are both informational. Every other code is rejected.
    pub fn from_code(code: &str) -> Result<Self, WriteError> {
        match code.trim() {
            "0" | "1" => Ok(Self::Information),
            "2" => Ok(Self::Warning),
            "3" => Ok(Self::Error),
            other => Err(WriteError::UnknownSeverity(other.to_string())),
        }
    }

    /// Instruction sent to the controller for this severity, if any.
    pub fn instruction(self) -> Option<ControllerInstruction> {
        match self {
            Self::Information => None,
            Self::Warning => Some(ControllerInstruction::Hold),
            Self::Error => Some(ControllerInstruction::Abort),
        }
    }
}

/// Program control instructions understood by the controller's PML task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerInstruction {
    Hold,
    Abort,
}

impl ControllerInstruction {
    pub fn payload(self) -> &'static str {
        match self {
            Self::Hold => "ePMLCommand;[C_Hold]",
            Self::Abort => "ePMLCommand;[C_Abort]",
        }
    }
}

impl fmt::Display for ControllerInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.payload())
    }
}

/// One DIPC send request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCommand {
    pub source_queue_name: String,
    pub command_code: i64,
    pub user_defined_value: i64,
    pub message_type_code: i64,
    pub payload: String,
}

impl OutboundCommand {
    /// Standard DIPC data message from `sender`.
    pub fn dipc(sender: impl Into<String>, user_defined_value: i64, payload: impl Into<String>) -> Self {
        Self {
            source_queue_name: sender.into(),
            command_code: DIPC_COMMAND_CODE,
            user_defined_value,
            message_type_code: DIPC_MESSAGE_TYPE,
            payload: payload.into(),
        }
    }
}
