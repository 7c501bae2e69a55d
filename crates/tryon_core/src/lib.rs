//! Outfit history, display resolution and request orchestration for a virtual try-on session.

pub mod controller;
pub mod history;
pub mod messages;
pub mod poses;
pub mod resolver;

pub use controller::{ActionOutcome, InteractionController, Rejection, SessionSnapshot, StagedGarment};
pub use history::{HistoryError, Layer, OutfitHistory, PoseImages, StepBack};
pub use messages::{classify_failure, classify_gateway_error, GenerationAction};
pub use poses::{PoseCatalog, PoseCatalogError, DEFAULT_POSE_INSTRUCTIONS};
pub use resolver::resolve;
