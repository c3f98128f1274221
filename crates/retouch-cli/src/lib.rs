use retouch_core::{
    EditOutcome, EditSummary, ErrorMetadata, FieldKind, OperationKey, PipelineError,
    PipelineState,
};
use retouch_pipeline::StateObserver;
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;

/// Parse a `name=value` pair from `--field`.
pub fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing field name in '{}'", raw));
    }
    Ok((name.to_string(), value.to_string()))
}

#[derive(Debug, Serialize)]
pub struct FieldInfo {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: String,
    pub required: bool,
}

#[derive(Debug, Serialize)]
pub struct OperationInfo {
    pub key: &'static str,
    pub label: &'static str,
    pub fields: Vec<FieldInfo>,
}

/// Catalog shown by `retouch operations`.
pub fn operation_catalog() -> Vec<OperationInfo> {
    OperationKey::ALL
        .into_iter()
        .map(|key| OperationInfo {
            key: key.as_str(),
            label: key.label(),
            fields: key
                .fields()
                .iter()
                .map(|spec| FieldInfo {
                    name: spec.name,
                    label: spec.label,
                    kind: match spec.kind {
                        FieldKind::Number => "number".to_string(),
                        FieldKind::Text => "text".to_string(),
                        FieldKind::Select(options) => format!("select({})", options.join("|")),
                    },
                    required: spec.required,
                })
                .collect(),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub code: &'static str,
    pub message: String,
    pub suggested_action: Option<&'static str>,
    pub detail: String,
}

impl From<&PipelineError> for ErrorReport {
    fn from(err: &PipelineError) -> Self {
        Self {
            code: err.error_code(),
            message: err.user_message(),
            suggested_action: err.suggested_action(),
            detail: err.to_string(),
        }
    }
}

/// JSON printed when `retouch edit` finishes.
#[derive(Debug, Serialize)]
pub struct EditReport {
    pub state: PipelineState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<EditSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

impl EditReport {
    pub fn success(outcome: &EditOutcome, saved_to: String) -> Self {
        Self {
            state: PipelineState::Succeeded,
            result: Some(outcome.summary()),
            saved_to: Some(saved_to),
            error: None,
        }
    }

    pub fn failure(state: PipelineState, err: &PipelineError) -> Self {
        Self {
            state,
            result: None,
            saved_to: None,
            error: Some(ErrorReport::from(err)),
        }
    }
}

/// Prints progress lines ("validating...", "uploading...") to a writer.
pub struct ConsoleObserver<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleObserver<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> ConsoleObserver<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn line(&self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Progress output is best effort.
        let _ = writeln!(out, "{}", text);
    }
}

impl<W: Write + Send> StateObserver for ConsoleObserver<W> {
    fn on_state(&self, state: PipelineState) {
        if state.is_busy() {
            self.line(&format!("{}...", state));
        }
    }

    fn on_success(&self, outcome: &EditOutcome) {
        self.line(&format!(
            "done: {} ({} bytes)",
            outcome.filename,
            outcome.blob.len()
        ));
    }

    fn on_failure(&self, error: &PipelineError) {
        self.line(&format!("error: {}", error.user_message()));
    }
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_field_ok() {
        assert_eq!(
            parse_field("width=640").unwrap(),
            ("width".to_string(), "640".to_string())
        );
        // Only the first '=' splits.
        assert_eq!(
            parse_field("watermark_text=a=b").unwrap(),
            ("watermark_text".to_string(), "a=b".to_string())
        );
    }

    #[test]
    fn parse_field_rejects_malformed() {
        assert!(parse_field("width").is_err());
        assert!(parse_field("=5").is_err());
    }

    #[test]
    fn catalog_lists_every_operation() {
        let catalog = operation_catalog();
        assert_eq!(catalog.len(), OperationKey::ALL.len());
        let flip = catalog.iter().find(|op| op.key == "flip").unwrap();
        assert_eq!(flip.fields[0].kind, "select(horizontal|vertical)");
    }

    #[test]
    fn console_observer_prints_busy_states_only() {
        let observer = ConsoleObserver::new(Vec::new());
        observer.on_state(PipelineState::Validating);
        observer.on_state(PipelineState::Idle);
        observer.on_failure(&PipelineError::UserCancelled);

        let printed = String::from_utf8(observer.into_inner()).unwrap();
        assert_eq!(printed, "validating...\nerror: The upload was cancelled.\n");
    }

    #[test]
    fn failure_report_serializes_code() {
        let report = EditReport::failure(
            PipelineState::Failed,
            &PipelineError::Network("connection refused".to_string()),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["error"]["code"], "NETWORK_ERROR");
        assert!(json.get("result").is_none());
    }
}
