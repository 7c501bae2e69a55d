use serde::{Deserialize, Serialize};
use shared::domain::{GarmentId, ImageRef, WardrobeItem};
use thiserror::Error;
use tracing::{debug, warn};

/// Why a stored history was refused on load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("layer has no pose images")]
    EmptyLayer,
    #[error("pose '{0}' appears twice in one layer")]
    DuplicatePose(String),
    #[error("layer 0 must be the base model")]
    MissingBase,
    #[error("layer {0} carries no garment")]
    MissingGarment(usize),
    #[error("position {position} is outside a history of {len} layers")]
    PositionOutOfRange { position: usize, len: usize },
}

/// Generated images of one layer, keyed by pose instruction.
///
/// Entries keep their insertion slot when overwritten, so the first entry is
/// always the image stored under the pose that was active when the layer was
/// created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<(String, ImageRef)>",
    into = "Vec<(String, ImageRef)>"
)]
pub struct PoseImages {
    entries: Vec<(String, ImageRef)>,
}

impl TryFrom<Vec<(String, ImageRef)>> for PoseImages {
    type Error = HistoryError;

    fn try_from(entries: Vec<(String, ImageRef)>) -> Result<Self, Self::Error> {
        if entries.is_empty() {
            return Err(HistoryError::EmptyLayer);
        }
        for (index, (key, _)) in entries.iter().enumerate() {
            if entries[..index].iter().any(|(seen, _)| seen == key) {
                return Err(HistoryError::DuplicatePose(key.clone()));
            }
        }
        Ok(Self { entries })
    }
}

impl From<PoseImages> for Vec<(String, ImageRef)> {
    fn from(images: PoseImages) -> Self {
        images.entries
    }
}

impl PoseImages {
    fn seeded(pose_key: &str, image: ImageRef) -> Self {
        Self {
            entries: vec![(pose_key.to_string(), image)],
        }
    }

    /// Inserts or overwrites; returns the replaced image.
    pub fn insert(&mut self, pose_key: &str, image: ImageRef) -> Option<ImageRef> {
        match self.entries.iter_mut().find(|(key, _)| key == pose_key) {
            Some((_, slot)) => Some(std::mem::replace(slot, image)),
            None => {
                self.entries.push((pose_key.to_string(), image));
                None
            }
        }
    }

    pub fn get(&self, pose_key: &str) -> Option<&ImageRef> {
        self.entries
            .iter()
            .find(|(key, _)| key == pose_key)
            .map(|(_, image)| image)
    }

    pub fn contains_key(&self, pose_key: &str) -> bool {
        self.get(pose_key).is_some()
    }

    pub fn first(&self) -> Option<&ImageRef> {
        self.entries.first().map(|(_, image)| image)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ImageRef)> {
        self.entries
            .iter()
            .map(|(key, image)| (key.as_str(), image))
    }
}

/// One step of the outfit: the garment put on (none for the base model) and
/// its cached images per pose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub garment: Option<WardrobeItem>,
    pose_images: PoseImages,
    /// Last colour override requested for the garment. Advisory only.
    pub color: Option<String>,
}

impl Layer {
    pub fn base(pose_key: &str, image: ImageRef) -> Self {
        Self {
            garment: None,
            pose_images: PoseImages::seeded(pose_key, image),
            color: None,
        }
    }

    pub fn with_garment(
        garment: WardrobeItem,
        pose_key: &str,
        image: ImageRef,
        color: Option<String>,
    ) -> Self {
        Self {
            garment: Some(garment),
            pose_images: PoseImages::seeded(pose_key, image),
            color,
        }
    }

    pub fn is_base(&self) -> bool {
        self.garment.is_none()
    }

    pub fn pose_images(&self) -> &PoseImages {
        &self.pose_images
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepBack {
    Moved { position: usize },
    /// Already on the base layer (or nothing to step back from); nothing changed.
    AtBase,
}

/// Linear outfit history with a cursor.
///
/// Layers past the cursor survive undo and can be stepped into again until
/// the next garment is applied, which truncates them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredHistory")]
pub struct OutfitHistory {
    layers: Vec<Layer>,
    position: usize,
}

#[derive(Deserialize)]
struct StoredHistory {
    layers: Vec<Layer>,
    position: usize,
}

impl TryFrom<StoredHistory> for OutfitHistory {
    type Error = HistoryError;

    fn try_from(stored: StoredHistory) -> Result<Self, Self::Error> {
        let StoredHistory { layers, position } = stored;
        if layers.is_empty() {
            if position != 0 {
                return Err(HistoryError::PositionOutOfRange { position, len: 0 });
            }
            return Ok(Self::default());
        }
        if !layers[0].is_base() {
            return Err(HistoryError::MissingBase);
        }
        if let Some(index) = layers.iter().skip(1).position(Layer::is_base) {
            return Err(HistoryError::MissingGarment(index + 1));
        }
        if position >= layers.len() {
            return Err(HistoryError::PositionOutOfRange {
                position,
                len: layers.len(),
            });
        }
        Ok(Self { layers, position })
    }
}

impl OutfitHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any existing history with a single base layer.
    pub fn seed_base(&mut self, pose_key: &str, image: ImageRef) {
        self.layers = vec![Layer::base(pose_key, image)];
        self.position = 0;
    }

    /// Drops every layer after the cursor, appends the new layer and moves onto it.
    ///
    /// Returns `false` without touching anything when there is no base layer yet.
    pub fn append_layer(
        &mut self,
        garment: WardrobeItem,
        pose_key: &str,
        image: ImageRef,
        color: Option<String>,
    ) -> bool {
        if self.layers.is_empty() {
            warn!(garment = %garment.id, "ignoring garment layer without a base model");
            return false;
        }
        let discarded = self.layers.len() - (self.position + 1);
        self.layers.truncate(self.position + 1);
        self.layers
            .push(Layer::with_garment(garment, pose_key, image, color));
        self.position = self.layers.len() - 1;
        debug!(position = self.position, discarded, "appended outfit layer");
        true
    }

    /// Caches `image` for `pose_key` on the layer at `position`. Stale positions are ignored.
    pub fn set_pose_image(&mut self, position: usize, pose_key: &str, image: ImageRef) -> bool {
        match self.layers.get_mut(position) {
            Some(layer) => {
                layer.pose_images.insert(pose_key, image);
                true
            }
            None => {
                warn!(
                    position,
                    len = self.layers.len(),
                    "ignoring pose image for missing layer"
                );
                false
            }
        }
    }

    pub fn move_to_previous(&mut self) -> StepBack {
        if self.layers.is_empty() || self.position == 0 {
            return StepBack::AtBase;
        }
        self.position -= 1;
        StepBack::Moved {
            position: self.position,
        }
    }

    /// Steps back into a layer kept after an undo.
    pub fn move_to_next(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.position += 1;
        true
    }

    pub fn reset(&mut self) {
        self.layers.clear();
        self.position = 0;
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, position: usize) -> Option<&Layer> {
        self.layers.get(position)
    }

    pub fn current_layer(&self) -> Option<&Layer> {
        self.layers.get(self.position)
    }

    /// The outfit as currently worn: base layer through the cursor.
    pub fn visible_layers(&self) -> &[Layer] {
        self.layers.get(..=self.position).unwrap_or(&[])
    }

    pub fn active_garment_ids(&self) -> Vec<GarmentId> {
        self.visible_layers()
            .iter()
            .filter_map(|layer| layer.garment.as_ref().map(|garment| garment.id.clone()))
            .collect()
    }

    pub fn can_redo(&self) -> bool {
        self.position + 1 < self.layers.len()
    }
}

#[cfg(test)]
#[path = "tests/history_tests.rs"]
mod tests;
