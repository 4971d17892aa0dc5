//! Record to controller command mapping
//!
//! Records are dispatched on their `msgtype` tag. Records that passed
//! through a flattening bridge carry prefixed keys (`tags_msgtype`,
//! `fields_dipc-data`), so tag and field prefixes are configurable.

use rws_bridge_domain::constants::{
    FIELD_DIPC_DATA, FIELD_DIPC_USERDEF, FIELD_SEVERITY, FRUIT_MAX, FRUIT_SIZE, TAG_MSGTYPE,
};
use rws_bridge_domain::{EventKind, FieldValue, OutboundCommand, Record, Severity, WriteError};
use tracing::{debug, info, warn};

/// Builds outbound commands from records
#[derive(Debug, Clone)]
pub struct CommandEncoder {
    sender: String,
    robot_id: i64,
    tag_prefix: String,
    field_prefix: String,
}

impl CommandEncoder {
    pub fn new(sender: impl Into<String>, robot_id: i64) -> Self {
        Self { sender: sender.into(), robot_id, tag_prefix: String::new(), field_prefix: String::new() }
    }

    pub fn with_prefixes(mut self, tag_prefix: impl Into<String>, field_prefix: impl Into<String>) -> Self {
        self.tag_prefix = tag_prefix.into();
        self.field_prefix = field_prefix.into();
        self
    }

    /// Message type of a record, honouring the tag prefix.
    pub fn message_type(&self, record: &Record) -> Result<EventKind, WriteError> {
        record
            .tag(&format!("{}{TAG_MSGTYPE}", self.tag_prefix))
            .map(EventKind::from_class)
            .ok_or(WriteError::MissingKind)
    }

    /// Map a record to the command it calls for.
    ///
    /// `Ok(None)` means the record needs no command (signal changes,
    /// informational log events).
    pub fn build(&self, record: &Record) -> Result<Option<OutboundCommand>, WriteError> {
        match self.message_type(record)? {
            EventKind::IpcMessage => self.ipc_passthrough(record).map(Some),
            EventKind::SignalState => {
                debug!("Signal state change, no action");
                Ok(None)
            }
            EventKind::LogMessage | EventKind::LogDetail => self.severity_command(record),
            EventKind::VisionFruit => self.fruit_command(record).map(Some),
            EventKind::Other(kind) => Err(WriteError::UnknownKind(kind)),
        }
    }

    fn field<'a>(&self, record: &'a Record, name: &str) -> Option<&'a FieldValue> {
        record.field(&format!("{}{name}", self.field_prefix))
    }

    fn ipc_passthrough(&self, record: &Record) -> Result<OutboundCommand, WriteError> {
        let userdef = self
            .field(record, FIELD_DIPC_USERDEF)
            .ok_or_else(|| WriteError::MissingField(FIELD_DIPC_USERDEF.to_string()))?;
        let data = self
            .field(record, FIELD_DIPC_DATA)
            .ok_or_else(|| WriteError::MissingField(FIELD_DIPC_DATA.to_string()))?;

        let userdef = userdef.as_i64().ok_or_else(|| WriteError::InvalidField {
            field: FIELD_DIPC_USERDEF.to_string(),
            reason: format!("not an integer: {userdef}"),
        })?;

        Ok(OutboundCommand::dipc(&self.sender, userdef, data.to_string()))
    }

    fn severity_command(&self, record: &Record) -> Result<Option<OutboundCommand>, WriteError> {
        let code = self
            .field(record, FIELD_SEVERITY)
            .ok_or_else(|| WriteError::MissingField(FIELD_SEVERITY.to_string()))?
            .to_string();

        match Severity::from_code(&code)?.instruction() {
            None => {
                info!(severity = %code, "Informational event, no action");
                Ok(None)
            }
            Some(instruction) => {
                warn!(severity = %code, instruction = %instruction, "Event requires controller action");
                Ok(Some(OutboundCommand::dipc(&self.sender, self.robot_id, instruction.payload())))
            }
        }
    }

    fn fruit_command(&self, record: &Record) -> Result<OutboundCommand, WriteError> {
        let mut grid = [[0.0_f64; FRUIT_SIZE]; FRUIT_MAX];

        for (key, value) in &record.fields {
            let Some((fruit, coord)) = self.fruit_index(key) else {
                continue;
            };
            let value = value.as_f64().ok_or_else(|| WriteError::InvalidField {
                field: key.clone(),
                reason: format!("not a number: {value}"),
            })?;
            grid[fruit][coord] = value;
        }

        Ok(OutboundCommand::dipc(&self.sender, self.robot_id, format_fruit(&grid)))
    }

    /// `<prefix><fruit>_<coord>` within the grid bounds.
    fn fruit_index(&self, key: &str) -> Option<(usize, usize)> {
        let rest = key.strip_prefix(self.field_prefix.as_str())?;
        let (fruit, coord) = rest.split_once('_')?;
        let fruit: usize = fruit.parse().ok()?;
        let coord: usize = coord.parse().ok()?;
        (fruit < FRUIT_MAX && coord < FRUIT_SIZE).then_some((fruit, coord))
    }
}

/// `Fruit{4};[[x,..],..]` with six decimals, `.000000` shortened to `.0`.
pub fn format_fruit(grid: &[[f64; FRUIT_SIZE]; FRUIT_MAX]) -> String {
    let rows: Vec<String> = grid
        .iter()
        .map(|row| {
            let values: Vec<String> = row.iter().map(|v| format!("{v:.6}")).collect();
            format!("[{}]", values.join(","))
        })
        .collect();
    format!("Fruit{{{FRUIT_MAX}}};[{}]", rows.join(",")).replace(".000000", ".0")
}
