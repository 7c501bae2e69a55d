use std::collections::HashSet;

use thiserror::Error;

/// Instructions are also the cache keys of [`crate::history::PoseImages`]; editing
/// the text of an entry orphans every image cached under the old wording.
pub const DEFAULT_POSE_INSTRUCTIONS: [&str; 5] = [
    "Full body front: Neutral stance.",
    "Medium shot: Waist-up focus.",
    "Walking shot: Walking toward the camera.",
    "Seated: Relaxed editorial.",
    "Profile: Side highlight.",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoseCatalogError {
    #[error("pose catalog must contain at least one instruction")]
    Empty,
    #[error("pose instruction listed twice: {0}")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoseCatalog {
    instructions: Vec<String>,
}

impl Default for PoseCatalog {
    fn default() -> Self {
        Self {
            instructions: DEFAULT_POSE_INSTRUCTIONS
                .iter()
                .map(|instruction| instruction.to_string())
                .collect(),
        }
    }
}

impl PoseCatalog {
    pub fn new(instructions: Vec<String>) -> Result<Self, PoseCatalogError> {
        if instructions.is_empty() {
            return Err(PoseCatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for instruction in &instructions {
            if !seen.insert(instruction.as_str()) {
                return Err(PoseCatalogError::Duplicate(instruction.clone()));
            }
        }
        Ok(Self { instructions })
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn key(&self, index: usize) -> Option<&str> {
        self.instructions.get(index).map(String::as_str)
    }

    /// Pose active when a session starts or is reset.
    pub fn first(&self) -> &str {
        &self.instructions[0]
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.instructions.iter().position(|entry| entry == key)
    }

    pub fn next(&self, index: usize) -> usize {
        (index + 1) % self.len()
    }

    pub fn previous(&self, index: usize) -> usize {
        (index % self.len() + self.len() - 1) % self.len()
    }

    /// Short name shown in pickers: the text before the first `:`.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.key(index)
            .map(|instruction| instruction.split(':').next().unwrap_or(instruction).trim())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.instructions.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_keys_are_instruction_text() {
        let catalog = PoseCatalog::default();
        assert_eq!(catalog.len(), DEFAULT_POSE_INSTRUCTIONS.len());
        assert_eq!(catalog.first(), DEFAULT_POSE_INSTRUCTIONS[0]);
        assert_eq!(catalog.index_of(DEFAULT_POSE_INSTRUCTIONS[3]), Some(3));
    }

    #[test]
    fn cycling_wraps_in_both_directions() {
        let catalog = PoseCatalog::default();
        let last = catalog.len() - 1;
        assert_eq!(catalog.next(last), 0);
        assert_eq!(catalog.next(0), 1);
        assert_eq!(catalog.previous(0), last);
        assert_eq!(catalog.previous(2), 1);
    }

    #[test]
    fn labels_stop_at_first_colon() {
        let catalog = PoseCatalog::default();
        assert_eq!(catalog.label(4), Some("Profile"));
        assert_eq!(catalog.label(99), None);
    }

    #[test]
    fn rejects_empty_and_duplicate_catalogs() {
        assert_eq!(PoseCatalog::new(Vec::new()), Err(PoseCatalogError::Empty));
        assert_eq!(
            PoseCatalog::new(vec!["A".into(), "A".into()]),
            Err(PoseCatalogError::Duplicate("A".into()))
        );
    }
}
