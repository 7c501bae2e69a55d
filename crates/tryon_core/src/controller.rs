//! Serializes user actions against the outfit history and the generation gateway.
//!
//! A single busy flag gates every state-changing entry point. Generation
//! calls are awaited without holding the state lock, so snapshots stay
//! readable while a request is in flight.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use gateway::GenerationGateway;
use shared::{
    domain::{ImageRef, WardrobeItem},
    error::UserFacingError,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    history::{OutfitHistory, StepBack},
    messages::{classify_gateway_error, GenerationAction},
    poses::PoseCatalog,
    resolver::resolve,
};

/// Why an action was refused before doing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Busy,
    NoModel,
    NoStagedGarment,
    UnknownPose(usize),
    AtBase,
    AtLatest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed,
    Rejected(Rejection),
    Failed(UserFacingError),
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// A garment picked or uploaded by the user but not yet put on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedGarment {
    pub item: WardrobeItem,
    pub image: ImageRef,
    pub color: Option<String>,
}

/// Read-only view handed to render layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub display_image: Option<ImageRef>,
    pub position: usize,
    pub layer_count: usize,
    pub pose_index: usize,
    pub pose_label: Option<String>,
    pub busy_label: Option<&'static str>,
    pub last_error: Option<UserFacingError>,
    pub worn: Vec<WardrobeItem>,
    pub staged: Option<WardrobeItem>,
    pub can_undo: bool,
    pub can_redo: bool,
}

#[derive(Default)]
struct SessionState {
    source_photo: Option<ImageRef>,
    history: OutfitHistory,
    pose_index: usize,
    staged: Option<StagedGarment>,
    running: Option<GenerationAction>,
    last_error: Option<UserFacingError>,
}

/// Holds the busy flag for as long as it lives.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct InteractionController {
    gateway: Arc<dyn GenerationGateway>,
    poses: PoseCatalog,
    busy: AtomicBool,
    state: Mutex<SessionState>,
}

impl InteractionController {
    pub fn new(gateway: Arc<dyn GenerationGateway>) -> Self {
        Self::with_poses(gateway, PoseCatalog::default())
    }

    pub fn with_poses(gateway: Arc<dyn GenerationGateway>, poses: PoseCatalog) -> Self {
        Self {
            gateway,
            poses,
            busy: AtomicBool::new(false),
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn poses(&self) -> &PoseCatalog {
        &self.poses
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn begin(&self, action: &'static str) -> Result<BusyGuard<'_>, Rejection> {
        BusyGuard::try_acquire(&self.busy).ok_or_else(|| {
            debug!(action, "rejected while another request is in flight");
            Rejection::Busy
        })
    }

    /// Normalizes `photo` into a studio model and starts a fresh history on it.
    ///
    /// The photo is shown as-is until the model image arrives, and stays the
    /// display image if generation fails.
    pub async fn create_model(&self, photo: ImageRef) -> ActionOutcome {
        let _guard = match self.begin(GenerationAction::CreateModel.as_str()) {
            Ok(guard) => guard,
            Err(rejection) => return ActionOutcome::Rejected(rejection),
        };

        {
            let mut state = self.state.lock().await;
            *state = SessionState {
                source_photo: Some(photo.clone()),
                running: Some(GenerationAction::CreateModel),
                ..SessionState::default()
            };
        }
        info!("creating studio model from photo");

        let result = self.gateway.normalize_to_model(&photo).await;

        let mut state = self.state.lock().await;
        state.running = None;
        match result {
            Ok(model) => {
                state.history.seed_base(self.poses.first(), model);
                info!("studio model ready");
                ActionOutcome::Completed
            }
            Err(err) => Self::record_failure(&mut state, GenerationAction::CreateModel, &err),
        }
    }

    /// Fits `garment_image` onto the image currently displayed.
    ///
    /// On success the new layer replaces anything after the cursor. On
    /// failure the history is untouched and a staged copy of the garment, if
    /// any, is kept for a retry.
    pub async fn apply_garment(
        &self,
        item: WardrobeItem,
        garment_image: ImageRef,
        color: Option<String>,
    ) -> ActionOutcome {
        let _guard = match self.begin(GenerationAction::ApplyGarment.as_str()) {
            Ok(guard) => guard,
            Err(rejection) => return ActionOutcome::Rejected(rejection),
        };
        self.run_apply(item, garment_image, color).await
    }

    pub async fn apply_staged_garment(&self) -> ActionOutcome {
        let _guard = match self.begin(GenerationAction::ApplyGarment.as_str()) {
            Ok(guard) => guard,
            Err(rejection) => return ActionOutcome::Rejected(rejection),
        };
        let staged = self.state.lock().await.staged.clone();
        match staged {
            Some(staged) => self.run_apply(staged.item, staged.image, staged.color).await,
            None => ActionOutcome::Rejected(Rejection::NoStagedGarment),
        }
    }

    async fn run_apply(
        &self,
        item: WardrobeItem,
        garment_image: ImageRef,
        color: Option<String>,
    ) -> ActionOutcome {
        let (base, pose_key) = {
            let mut state = self.state.lock().await;
            let pose_key = self.active_pose_key(&state).to_string();
            let Some(base) = resolve(&state.history, state.history.position(), &pose_key).cloned()
            else {
                return ActionOutcome::Rejected(Rejection::NoModel);
            };
            state.running = Some(GenerationAction::ApplyGarment);
            state.last_error = None;
            (base, pose_key)
        };
        info!(garment = %item.id, color = color.as_deref(), "applying garment");

        let result = self
            .gateway
            .fit_garment(&base, &garment_image, color.as_deref())
            .await;

        let mut state = self.state.lock().await;
        state.running = None;
        match result {
            Ok(image) => {
                if state
                    .staged
                    .as_ref()
                    .is_some_and(|staged| staged.item.id == item.id)
                {
                    state.staged = None;
                }
                let garment_id = item.id.clone();
                state.history.append_layer(item, &pose_key, image, color);
                info!(
                    garment = %garment_id,
                    position = state.history.position(),
                    "garment applied"
                );
                ActionOutcome::Completed
            }
            Err(err) => Self::record_failure(&mut state, GenerationAction::ApplyGarment, &err),
        }
    }

    /// Switches the active pose, generating the variation for the current layer on a cache miss.
    pub async fn select_pose(&self, pose_index: usize) -> ActionOutcome {
        let Some(pose_key) = self.poses.key(pose_index).map(str::to_string) else {
            return ActionOutcome::Rejected(Rejection::UnknownPose(pose_index));
        };
        let _guard = match self.begin(GenerationAction::ChangePose.as_str()) {
            Ok(guard) => guard,
            Err(rejection) => return ActionOutcome::Rejected(rejection),
        };

        let (base, position) = {
            let mut state = self.state.lock().await;
            let position = state.history.position();
            let Some(layer) = state.history.current_layer() else {
                return ActionOutcome::Rejected(Rejection::NoModel);
            };
            if layer.pose_images().contains_key(&pose_key) {
                debug!(position, pose = %pose_key, "pose served from cache");
                state.pose_index = pose_index;
                state.last_error = None;
                return ActionOutcome::Completed;
            }
            let Some(base) = layer.pose_images().first().cloned() else {
                return ActionOutcome::Rejected(Rejection::NoModel);
            };
            state.running = Some(GenerationAction::ChangePose);
            state.last_error = None;
            (base, position)
        };
        info!(position, pose = %pose_key, "generating pose variation");

        let result = self.gateway.vary_pose(&base, &pose_key).await;

        let mut state = self.state.lock().await;
        state.running = None;
        match result {
            Ok(image) => {
                if state.history.set_pose_image(position, &pose_key, image) {
                    state.pose_index = pose_index;
                }
                ActionOutcome::Completed
            }
            Err(err) => Self::record_failure(&mut state, GenerationAction::ChangePose, &err),
        }
    }

    pub async fn next_pose(&self) -> ActionOutcome {
        let current = self.state.lock().await.pose_index;
        self.select_pose(self.poses.next(current)).await
    }

    pub async fn previous_pose(&self) -> ActionOutcome {
        let current = self.state.lock().await.pose_index;
        self.select_pose(self.poses.previous(current)).await
    }

    /// Steps back one layer. On the base layer this is a no-op reporting [`Rejection::AtBase`].
    pub async fn undo(&self) -> ActionOutcome {
        let _guard = match self.begin("undo") {
            Ok(guard) => guard,
            Err(rejection) => return ActionOutcome::Rejected(rejection),
        };
        let mut state = self.state.lock().await;
        if state.history.is_empty() {
            return ActionOutcome::Rejected(Rejection::NoModel);
        }
        match state.history.move_to_previous() {
            StepBack::Moved { position } => {
                debug!(position, "stepped back one layer");
                ActionOutcome::Completed
            }
            StepBack::AtBase => ActionOutcome::Rejected(Rejection::AtBase),
        }
    }

    pub async fn redo(&self) -> ActionOutcome {
        let _guard = match self.begin("redo") {
            Ok(guard) => guard,
            Err(rejection) => return ActionOutcome::Rejected(rejection),
        };
        let mut state = self.state.lock().await;
        if state.history.move_to_next() {
            debug!(position = state.history.position(), "stepped forward one layer");
            ActionOutcome::Completed
        } else {
            ActionOutcome::Rejected(Rejection::AtLatest)
        }
    }

    /// Start over: drops the photo, history, staged garment and error, and returns to the first pose.
    pub async fn reset(&self) -> ActionOutcome {
        let _guard = match self.begin("reset") {
            Ok(guard) => guard,
            Err(rejection) => return ActionOutcome::Rejected(rejection),
        };
        *self.state.lock().await = SessionState::default();
        info!("session reset");
        ActionOutcome::Completed
    }

    pub async fn stage_garment(
        &self,
        item: WardrobeItem,
        image: ImageRef,
        color: Option<String>,
    ) -> ActionOutcome {
        let _guard = match self.begin("stage_garment") {
            Ok(guard) => guard,
            Err(rejection) => return ActionOutcome::Rejected(rejection),
        };
        self.state.lock().await.staged = Some(StagedGarment { item, image, color });
        ActionOutcome::Completed
    }

    pub async fn clear_staged_garment(&self) -> ActionOutcome {
        let _guard = match self.begin("clear_staged_garment") {
            Ok(guard) => guard,
            Err(rejection) => return ActionOutcome::Rejected(rejection),
        };
        self.state.lock().await.staged = None;
        ActionOutcome::Completed
    }

    pub async fn display_image(&self) -> Option<ImageRef> {
        let state = self.state.lock().await;
        self.display_image_of(&state)
    }

    pub async fn history(&self) -> OutfitHistory {
        self.state.lock().await.history.clone()
    }

    pub async fn active_pose_index(&self) -> usize {
        self.state.lock().await.pose_index
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        let busy_label = if self.is_busy() {
            state.running.map(GenerationAction::busy_label)
        } else {
            None
        };
        SessionSnapshot {
            display_image: self.display_image_of(&state),
            position: state.history.position(),
            layer_count: state.history.len(),
            pose_index: state.pose_index,
            pose_label: self.poses.label(state.pose_index).map(str::to_string),
            busy_label,
            last_error: state.last_error.clone(),
            worn: state
                .history
                .visible_layers()
                .iter()
                .filter_map(|layer| layer.garment.clone())
                .collect(),
            staged: state.staged.as_ref().map(|staged| staged.item.clone()),
            can_undo: state.history.position() > 0,
            can_redo: state.history.can_redo(),
        }
    }

    fn active_pose_key<'s>(&'s self, state: &SessionState) -> &'s str {
        self.poses.key(state.pose_index).unwrap_or(self.poses.first())
    }

    fn display_image_of(&self, state: &SessionState) -> Option<ImageRef> {
        let pose_key = self.active_pose_key(state);
        resolve(&state.history, state.history.position(), pose_key)
            .or(state.source_photo.as_ref())
            .cloned()
    }

    fn record_failure(
        state: &mut SessionState,
        action: GenerationAction,
        err: &anyhow::Error,
    ) -> ActionOutcome {
        let classified = classify_gateway_error(action, err);
        warn!(
            action = action.as_str(),
            code = ?classified.code,
            error = %format!("{err:#}"),
            "generation failed"
        );
        state.last_error = Some(classified.clone());
        ActionOutcome::Failed(classified)
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
