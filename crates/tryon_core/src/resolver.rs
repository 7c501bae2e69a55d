use shared::domain::ImageRef;

use crate::history::OutfitHistory;

/// Picks the image to show for a layer and pose.
///
/// Exact cache hit first, then the layer's first-inserted image (the one
/// produced under the pose active when the layer was created). `None` when
/// the history is empty or `position` is stale; callers supply their own
/// fallback, typically the uploaded photo.
pub fn resolve<'a>(
    history: &'a OutfitHistory,
    position: usize,
    pose_key: &str,
) -> Option<&'a ImageRef> {
    let images = history.layer(position)?.pose_images();
    images.get(pose_key).or_else(|| images.first())
}

#[cfg(test)]
mod tests {
    use shared::domain::WardrobeItem;

    use super::*;

    fn img(name: &str) -> ImageRef {
        ImageRef::from(format!("data:image/png;base64,{name}"))
    }

    fn scenario_history() -> OutfitHistory {
        let mut history = OutfitHistory::new();
        history.seed_base("P0", img("M0"));
        history.append_layer(
            WardrobeItem::new("g1", "G1", "https://example.test/g1.png"),
            "P0",
            img("R1"),
            None,
        );
        history
    }

    #[test]
    fn empty_history_resolves_to_nothing() {
        assert_eq!(resolve(&OutfitHistory::new(), 0, "P0"), None);
    }

    #[test]
    fn exact_pose_hit_wins_over_fallback() {
        let mut history = scenario_history();
        history.set_pose_image(1, "P1", img("R2"));
        assert_eq!(resolve(&history, 1, "P1"), Some(&img("R2")));
        assert_eq!(resolve(&history, 1, "P0"), Some(&img("R1")));
    }

    #[test]
    fn missing_pose_falls_back_to_creation_image_deterministically() {
        let mut history = scenario_history();
        history.set_pose_image(1, "P3", img("R3"));
        history.set_pose_image(1, "P2", img("R4"));

        let first = resolve(&history, 1, "P4").cloned();
        for _ in 0..10 {
            assert_eq!(resolve(&history, 1, "P4").cloned(), first);
        }
        assert_eq!(first, Some(img("R1")));
    }

    #[test]
    fn earlier_layer_falls_back_to_base_image_for_any_pose() {
        let history = scenario_history();
        assert_eq!(resolve(&history, 0, "P1"), Some(&img("M0")));
    }

    #[test]
    fn stale_position_resolves_to_nothing() {
        assert_eq!(resolve(&scenario_history(), 7, "P0"), None);
    }
}
