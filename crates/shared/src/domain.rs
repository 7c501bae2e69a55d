use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_IMAGE_MIME: &str = "image/png";

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_newtype!(GarmentId);
string_newtype!(ImageRef);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataUrlError {
    #[error("image reference is not a data URL")]
    NotADataUrl,
    #[error("data URL is missing its payload separator")]
    MissingPayload,
    #[error("data URL payload is not valid base64: {0}")]
    InvalidBase64(String),
}

/// Borrowed view over the pieces of a `data:<mime>;base64,<payload>` reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUrl<'a> {
    pub mime_type: Option<&'a str>,
    pub payload: &'a str,
}

impl ImageRef {
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{mime_type};base64,{}", STANDARD.encode(bytes)))
    }

    pub fn from_base64(mime_type: &str, payload: &str) -> Self {
        Self(format!("data:{mime_type};base64,{payload}"))
    }

    pub fn data_url(&self) -> Result<DataUrl<'_>, DataUrlError> {
        let rest = self
            .0
            .strip_prefix("data:")
            .ok_or(DataUrlError::NotADataUrl)?;
        let (header, payload) = rest.split_once(',').ok_or(DataUrlError::MissingPayload)?;
        let mime_type = header
            .split(';')
            .next()
            .map(str::trim)
            .filter(|mime| !mime.is_empty());
        Ok(DataUrl { mime_type, payload })
    }

    /// MIME type declared by the data URL, `image/png` when absent or unparsable.
    pub fn mime_type_or_default(&self) -> &str {
        self.data_url()
            .ok()
            .and_then(|url| url.mime_type)
            .unwrap_or(DEFAULT_IMAGE_MIME)
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>, DataUrlError> {
        let url = self.data_url()?;
        STANDARD
            .decode(url.payload)
            .map_err(|err| DataUrlError::InvalidBase64(err.to_string()))
    }
}

/// A garment the user can put on: a stable id, a name for display, and where its image lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardrobeItem {
    pub id: GarmentId,
    pub display_name: String,
    pub source_url: String,
}

impl WardrobeItem {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            id: GarmentId(id.into()),
            display_name: display_name.into(),
            source_url: source_url.into(),
        }
    }

    /// Item for a user-supplied upload; ids are `custom-<unix millis>`.
    pub fn custom(display_name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self::new(
            format!("custom-{}", Utc::now().timestamp_millis()),
            display_name,
            source_url,
        )
    }

    pub fn is_custom(&self) -> bool {
        self.id.as_str().starts_with("custom-")
    }
}
