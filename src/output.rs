//! Delivery of channel outputs to whatever switches the loads

use crate::error::{ManagerError, Result};
use crate::value::OnOff;
use parking_lot::Mutex;
use serde::Serialize;
use std::io::Write;

/// Receiver of channel state changes
pub trait OutputSink: Send + Sync {
    fn apply(&self, manager_id: &str, channel: &str, state: OnOff) -> Result<()>;
}

#[derive(Serialize)]
struct OutputRecord<'a> {
    manager: &'a str,
    channel: &'a str,
    state: OnOff,
    timestamp: String,
}

/// Writes each change as one JSON line
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> OutputSink for JsonLinesSink<W> {
    fn apply(&self, manager_id: &str, channel: &str, state: OnOff) -> Result<()> {
        let record = OutputRecord {
            manager: manager_id,
            channel,
            state,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let line = serde_json::to_string(&record)?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line)
            .and_then(|()| writer.flush())
            .map_err(|e| ManagerError::output(format!("Failed to write {}: {}", channel, e)))
    }
}

/// Keeps every applied change in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    applied: Mutex<Vec<(String, OnOff)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel and state of every call, oldest first
    pub fn applied(&self) -> Vec<(String, OnOff)> {
        self.applied.lock().clone()
    }

    pub fn clear(&self) {
        self.applied.lock().clear();
    }
}

impl OutputSink for RecordingSink {
    fn apply(&self, _manager_id: &str, channel: &str, state: OnOff) -> Result<()> {
        self.applied.lock().push((channel.to_string(), state));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_line_per_change() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.apply("house", "boiler", OnOff::On).unwrap();
        sink.apply("house", "boiler", OnOff::Off).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["manager"], "house");
        assert_eq!(first["channel"], "boiler");
        assert_eq!(first["state"], "ON");
    }
}
