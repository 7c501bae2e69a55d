//! Turns gateway failures into messages the user can act on.

use shared::{
    error::{ErrorCode, UserFacingError},
    protocol::ErrorEnvelope,
};

const UNSUPPORTED_MIME_MARKER: &str = "Unsupported MIME type";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationAction {
    CreateModel,
    ApplyGarment,
    ChangePose,
}

impl GenerationAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateModel => "create_model",
            Self::ApplyGarment => "apply_garment",
            Self::ChangePose => "change_pose",
        }
    }

    pub fn failure_context(self) -> &'static str {
        match self {
            Self::CreateModel => "Failed to create model",
            Self::ApplyGarment => "Failed to apply garment",
            Self::ChangePose => "Failed to change pose",
        }
    }

    pub fn busy_label(self) -> &'static str {
        match self {
            Self::CreateModel => "Creating model...",
            Self::ApplyGarment => "Dressing...",
            Self::ChangePose => "Changing pose...",
        }
    }
}

pub fn classify_gateway_error(action: GenerationAction, err: &anyhow::Error) -> UserFacingError {
    classify_failure(action, &format!("{err:#}"))
}

pub fn classify_failure(action: GenerationAction, raw: &str) -> UserFacingError {
    if raw.contains(UNSUPPORTED_MIME_MARKER) {
        return match unsupported_mime_type(raw) {
            Some(mime_type) => UserFacingError::new(
                ErrorCode::UnsupportedFormat,
                format!(
                    "The file type '{mime_type}' is not supported. Please use a format such as PNG, JPEG or WEBP."
                ),
            ),
            None => UserFacingError::new(
                ErrorCode::UnsupportedFormat,
                "Unsupported file format. Please upload an image in PNG, JPEG or WEBP format.",
            ),
        };
    }

    if raw.contains("RESOURCE_EXHAUSTED")
        || raw.contains("429")
        || raw.to_ascii_lowercase().contains("quota")
    {
        return UserFacingError::new(
            ErrorCode::RateLimited,
            "Quota exceeded. The image service limits how often it can be used; please wait a moment before trying again.",
        );
    }

    let raw = raw.trim();
    let raw = if raw.is_empty() {
        "An unknown error occurred."
    } else {
        raw
    };
    UserFacingError::new(
        ErrorCode::Generation,
        format!("{}. {raw}", action.failure_context()),
    )
}

/// MIME type named by an "Unsupported MIME type: <type>" message, preferring
/// the nested message of a JSON error envelope when one is embedded.
fn unsupported_mime_type(raw: &str) -> Option<String> {
    let nested = embedded_error_message(raw);
    let source = nested
        .as_deref()
        .filter(|message| message.contains(UNSUPPORTED_MIME_MARKER))
        .unwrap_or(raw);

    let after_marker = &source[source.find(UNSUPPORTED_MIME_MARKER)? + UNSUPPORTED_MIME_MARKER.len()..];
    let mime_type: String = after_marker
        .trim_start_matches(|c: char| c == ':' || c.is_whitespace())
        .chars()
        .take_while(|c| !c.is_whitespace() && !matches!(c, '"' | '\'' | ',' | '}' | ')'))
        .collect();
    let mime_type = mime_type.trim_end_matches('.');

    (!mime_type.is_empty()).then(|| mime_type.to_string())
}

fn embedded_error_message(raw: &str) -> Option<String> {
    let json = &raw[raw.find('{')?..];
    serde_json::from_str::<ErrorEnvelope>(json)
        .ok()
        .and_then(|envelope| envelope.error.message)
}
