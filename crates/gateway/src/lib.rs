use async_trait::async_trait;
use shared::domain::{DataUrlError, ImageRef};
use thiserror::Error;

pub mod gemini;
pub mod prompts;

pub use gemini::{GeminiConfig, GeminiGateway};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("image model returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Blocked: {reason}")]
    Blocked { reason: String },
    #[error("image model response did not contain an image")]
    InvalidResponse,
    #[error("invalid input image: {0}")]
    InvalidInput(#[from] DataUrlError),
}

/// The external image-generation service.
///
/// Every call may take arbitrarily long and may fail; callers classify the
/// rendered error text rather than matching on concrete error types.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Turns a user photo into a neutral studio model image.
    async fn normalize_to_model(&self, photo: &ImageRef) -> anyhow::Result<ImageRef>;

    async fn fit_garment(
        &self,
        base: &ImageRef,
        garment: &ImageRef,
        color: Option<&str>,
    ) -> anyhow::Result<ImageRef>;

    async fn vary_pose(&self, base: &ImageRef, pose_instruction: &str)
        -> anyhow::Result<ImageRef>;
}
