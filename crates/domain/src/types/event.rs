//! Decoded controller events

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{
    KIND_IPC_MESSAGE, KIND_LOG_DETAIL, KIND_LOG_MESSAGE, KIND_SIGNAL_STATE, KIND_VISION_FRUIT,
    TAG_ENDPOINT, TAG_MSGTYPE,
};
use crate::types::record::{FieldValue, Record};

/// Event class carried by a list item's `class` attribute or a record's
/// `msgtype` tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// I/O signal state change (`ios-signalstate-ev`)
    SignalState,
    /// DIPC queue message (`dipc-msg-ev`)
    IpcMessage,
    /// Event log notification (`elog-message-ev`); details live at the href
    LogMessage,
    /// Event log message detail document (`elog-message`)
    LogDetail,
    /// Fruit positions from a vision system (`vis-fruit`), output side only
    VisionFruit,
    /// Anything else
    Other(String),
}

impl EventKind {
    pub fn from_class(class: &str) -> Self {
        match class {
            KIND_SIGNAL_STATE => Self::SignalState,
            KIND_IPC_MESSAGE => Self::IpcMessage,
            KIND_LOG_MESSAGE => Self::LogMessage,
            KIND_LOG_DETAIL => Self::LogDetail,
            KIND_VISION_FRUIT => Self::VisionFruit,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::SignalState => KIND_SIGNAL_STATE,
            Self::IpcMessage => KIND_IPC_MESSAGE,
            Self::LogMessage => KIND_LOG_MESSAGE,
            Self::LogDetail => KIND_LOG_DETAIL,
            Self::VisionFruit => KIND_VISION_FRUIT,
            Self::Other(class) => class,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One leaf element of an event: `class` attribute and text content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventField {
    pub name: String,
    pub value: String,
}

impl EventField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// A fully decoded list item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedEvent {
    pub kind: String,
    /// Link target of the item, e.g. `/rw/elog/0/4050138`
    pub source_ref: String,
    pub fields: Vec<EventField>,
}

impl DecodedEvent {
    pub fn event_kind(&self) -> EventKind {
        EventKind::from_class(&self.kind)
    }

    /// First field with the given name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.value.as_str())
    }

    /// Convert into a record tagged with the event kind and source.
    ///
    /// Later fields with a repeated name overwrite earlier ones.
    pub fn into_record(self, name: impl Into<String>) -> Record {
        let mut record = Record::new(name)
            .with_tag(TAG_MSGTYPE, self.kind)
            .with_tag(TAG_ENDPOINT, self.source_ref);
        for field in self.fields {
            record.fields.insert(field.name, FieldValue::String(field.value));
        }
        record
    }
}
