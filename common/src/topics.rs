pub const TOPIC_PRESENCE: &str = "activate";

/// Per-device topic names. Payload shape is decided by topic, never by content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    /// Inbound bare numeric IR codes.
    pub command: String,
    /// Inbound full state replacements.
    pub overwrite: String,
    /// Outbound state snapshots.
    pub sync: String,
    pub presence_payload: String,
}

impl Topics {
    pub fn for_device(device_id: &str) -> Self {
        Self {
            command: format!("ac/{device_id}"),
            overwrite: format!("ac/overwrite/{device_id}"),
            sync: format!("ac/sync/{device_id}"),
            presence_payload: format!("name:{device_id}"),
        }
    }

    pub fn subscriptions(&self) -> [&str; 2] {
        [self.command.as_str(), self.overwrite.as_str()]
    }
}
