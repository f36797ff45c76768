//! JSON Event Sink
//!
//! Outputs engine events as NDJSON for automation.

use crate::domain::ports::{DeployEvent, DeployEventSink};
use std::io::{self, Write};
use std::sync::Mutex;

/// Event sink that writes one JSON object per line
pub struct JsonEventSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonEventSink {
    /// NDJSON on stderr, leaving stdout for the final `--json` document
    pub fn stderr() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::stderr())),
        }
    }

    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    fn write_event(&self, event: serde_json::Value) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", event);
            let _ = writer.flush();
        }
    }
}

fn to_json(event: DeployEvent) -> serde_json::Value {
    match event {
        DeployEvent::Started { operation, target } => serde_json::json!({
            "event": "start",
            "operation": operation,
            "target": target,
        }),

        DeployEvent::Stage { target, stage } => serde_json::json!({
            "event": "stage",
            "target": target,
            "stage": stage.as_str(),
        }),

        DeployEvent::RolledBack {
            target,
            stage,
            recovered,
        } => serde_json::json!({
            "event": "rolled_back",
            "target": target,
            "failed_stage": stage.as_str(),
            "recovered": recovered,
        }),

        DeployEvent::UnresolvedVariables { target, names } => serde_json::json!({
            "event": "unresolved_variables",
            "target": target,
            "names": names,
        }),

        DeployEvent::CertificateRequested { domain, mode } => serde_json::json!({
            "event": "certificate_requested",
            "domain": domain,
            "mode": mode,
        }),

        DeployEvent::CertificateIssued { domain, expires_at } => serde_json::json!({
            "event": "certificate_issued",
            "domain": domain,
            "expires_at": expires_at.map(|t| t.to_rfc3339()),
        }),

        DeployEvent::CertificateSkipped { domain, reason } => serde_json::json!({
            "event": "certificate_skipped",
            "domain": domain,
            "reason": reason,
        }),

        DeployEvent::CertificateFailed { domain, error } => serde_json::json!({
            "event": "certificate_failed",
            "domain": domain,
            "error": error,
        }),

        DeployEvent::Committed {
            id,
            outcome,
            message,
        } => serde_json::json!({
            "event": "committed",
            "id": id,
            "outcome": outcome.as_str(),
            "message": message,
        }),

        DeployEvent::Completed {
            operation,
            target,
            success,
        } => serde_json::json!({
            "event": "complete",
            "operation": operation,
            "target": target,
            "status": if success { "success" } else { "failed" },
        }),
    }
}

impl DeployEventSink for JsonEventSink {
    fn on_event(&self, event: DeployEvent) {
        self.write_event(to_json(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Outcome;
    use crate::domain::ports::DeployStage;
    use crate::error::FailedStage;
    use std::sync::Arc;

    struct TestWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl TestWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buffer = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    buffer: buffer.clone(),
                },
                buffer,
            )
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn lines(buffer: &Arc<Mutex<Vec<u8>>>) -> Vec<serde_json::Value> {
        String::from_utf8(buffer.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn json_sink_writes_one_object_per_event() {
        let (writer, buffer) = TestWriter::new();
        let sink = JsonEventSink::with_writer(writer);

        sink.on_event(DeployEvent::Started {
            operation: "add",
            target: "example.com".to_string(),
        });
        sink.on_event(DeployEvent::Stage {
            target: "example.com".to_string(),
            stage: DeployStage::Validated,
        });

        let events = lines(&buffer);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event"], "start");
        assert_eq!(events[0]["operation"], "add");
        assert_eq!(events[1]["stage"], "validated");
    }

    #[test]
    fn json_sink_reports_rollback() {
        let (writer, buffer) = TestWriter::new();
        let sink = JsonEventSink::with_writer(writer);

        sink.on_event(DeployEvent::RolledBack {
            target: "example.com".to_string(),
            stage: FailedStage::Reload,
            recovered: true,
        });

        let events = lines(&buffer);
        assert_eq!(events[0]["event"], "rolled_back");
        assert_eq!(events[0]["failed_stage"], "reload");
        assert_eq!(events[0]["recovered"], true);
    }

    #[test]
    fn json_sink_outputs_status_on_complete() {
        let (writer, buffer) = TestWriter::new();
        let sink = JsonEventSink::with_writer(writer);

        sink.on_event(DeployEvent::Committed {
            id: "abc".to_string(),
            outcome: Outcome::RolledBack,
            message: "add a.com".to_string(),
        });
        sink.on_event(DeployEvent::Completed {
            operation: "add",
            target: "a.com".to_string(),
            success: false,
        });

        let events = lines(&buffer);
        assert_eq!(events[0]["outcome"], "rolled-back");
        assert_eq!(events[1]["status"], "failed");
    }
}
