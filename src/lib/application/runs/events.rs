use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

/// Output of a run, in the order it happened. `Done` is always last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum RunEvent {
    Line { stream: StreamKind, text: String },
    Done { exit_code: i32 },
}

impl RunEvent {
    pub fn stderr(text: impl Into<String>) -> Self {
        RunEvent::Line {
            stream: StreamKind::Stderr,
            text: text.into(),
        }
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            RunEvent::Line { .. } => "line",
            RunEvent::Done { .. } => "done",
        }
    }
}
