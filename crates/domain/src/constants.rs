//! Protocol constants
//!
//! Fixed values of the controller's web service protocol.

// Endpoints
pub const LOGIN_PATH: &str = "/rw";
pub const SUBSCRIPTION_PATH: &str = "/subscription";
pub const DIPC_ROOT: &str = "/rw/dipc/";
pub const DIPC_CREATE_PATH: &str = "/rw/dipc?action=dipc-create";
pub const DIPC_SEND_ACTION: &str = "?action=dipc-send";

/// WebSocket subprotocol requested on upgrade.
pub const SUBSCRIPTION_SUBPROTOCOL: &str = "robapi2_subscription";

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

// DIPC queue creation defaults
pub const DEFAULT_QUEUE_SIZE: u32 = 5;
pub const DEFAULT_QUEUE_MAX_MSG_SIZE: u32 = 444;

// DIPC send
pub const DIPC_COMMAND_CODE: i64 = 111;
pub const DIPC_MESSAGE_TYPE: i64 = 1;

// Event classes
pub const KIND_SIGNAL_STATE: &str = "ios-signalstate-ev";
pub const KIND_IPC_MESSAGE: &str = "dipc-msg-ev";
pub const KIND_LOG_MESSAGE: &str = "elog-message-ev";
pub const KIND_LOG_DETAIL: &str = "elog-message";
pub const KIND_VISION_FRUIT: &str = "vis-fruit";

// Record keys
pub const TAG_MSGTYPE: &str = "msgtype";
pub const TAG_ENDPOINT: &str = "endpoint";
pub const FIELD_SEVERITY: &str = "msgtype";
pub const FIELD_DIPC_USERDEF: &str = "dipc-userdef";
pub const FIELD_DIPC_DATA: &str = "dipc-data";

/// Prefix of records emitted for IPC messages; the robot id follows.
pub const RECORD_NAME_PREFIX: &str = "rws_";

// Vision payload geometry
pub const FRUIT_MAX: usize = 4;
pub const FRUIT_SIZE: usize = 7;

/// Attempts allowed by the default attempt ceiling before a call is skipped.
pub const ATTEMPT_CEILING: u32 = 4;
