//! Form encodings sent to the controller
//!
//! Values are written verbatim. The controller expects the raw resource paths
//! and payloads, so nothing here percent-encodes.

use rws_bridge_domain::{OutboundCommand, SubscriptionRequest, WriteError};

/// `resources=i&i=<path>&i-p=<priority>` for every entry, 1-based, in order.
pub fn encode_subscription(request: &SubscriptionRequest) -> String {
    request
        .entries()
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let i = idx + 1;
            format!("resources={i}&{i}={}&{i}-p={}", entry.target, entry.priority)
        })
        .collect::<Vec<_>>()
        .join("&")
}

pub fn encode_command(command: &OutboundCommand) -> String {
    format!(
        "dipc-src-queue-name={}&dipc-cmd={}&dipc-userdef={}&dipc-msgtype={}&dipc-data={}",
        command.source_queue_name,
        command.command_code,
        command.user_defined_value,
        command.message_type_code,
        command.payload
    )
}

/// Encode a command and enforce the byte limit. Over-limit commands are
/// rejected whole.
pub fn encode_checked(command: &OutboundCommand, limit: usize) -> Result<String, WriteError> {
    let encoded = encode_command(command);
    if encoded.len() > limit {
        return Err(WriteError::TooLarge { limit, actual: encoded.len() });
    }
    Ok(encoded)
}

pub fn encode_queue_creation(name: &str, size: u32, max_message_bytes: u32) -> String {
    format!("dipc-queue-name={name}&dipc-queue-size={size}&dipc-max-msg-size={max_message_bytes}")
}
