use serde::Serialize;

use crate::receipt::ReceiptResult;

/// One incremental update on the batch stream. The orchestrator
/// constructs and emits these in order; the transport forwards them
/// verbatim as named server-sent events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BatchEvent {
    Progress {
        completed: usize,
        total: usize,
        current_file: String,
    },
    Result(ReceiptResult),
    Error {
        file_name: String,
        error: String,
    },
    Done {
        total: usize,
    },
}

impl BatchEvent {
    /// The SSE event name for this update.
    pub fn name(&self) -> &'static str {
        match self {
            BatchEvent::Progress { .. } => "progress",
            BatchEvent::Result(_) => "result",
            BatchEvent::Error { .. } => "error",
            BatchEvent::Done { .. } => "done",
        }
    }

    /// The JSON payload carried by the event.
    pub fn payload(&self) -> String {
        // Serialization of these shapes cannot fail; fall back to an
        // empty object rather than poisoning the stream.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names() {
        let progress = BatchEvent::Progress {
            completed: 0,
            total: 3,
            current_file: "a.jpg".to_string(),
        };
        assert_eq!(progress.name(), "progress");
        assert_eq!(BatchEvent::Done { total: 3 }.name(), "done");
        assert_eq!(
            BatchEvent::Error {
                file_name: "b.jpg".to_string(),
                error: "boom".to_string()
            }
            .name(),
            "error"
        );
    }

    #[test]
    fn progress_payload_shape() {
        let ev = BatchEvent::Progress {
            completed: 1,
            total: 2,
            current_file: "レシート.jpg".to_string(),
        };
        let v: serde_json::Value = serde_json::from_str(&ev.payload()).unwrap();
        assert_eq!(v["completed"], 1);
        assert_eq!(v["total"], 2);
        assert_eq!(v["current_file"], "レシート.jpg");
    }

    #[test]
    fn done_payload_shape() {
        let v: serde_json::Value =
            serde_json::from_str(&BatchEvent::Done { total: 7 }.payload()).unwrap();
        assert_eq!(v, serde_json::json!({ "total": 7 }));
    }
}
