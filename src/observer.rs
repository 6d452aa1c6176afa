//! Viewport intersection watchers: post list to map focus, and gallery autoplay.

use crate::surface::{AnchorId, ObserverOptions};

/// Visible fraction of one observed element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    pub target: AnchorId,
    pub ratio: f64,
}

/// Position of the most visible candidate among `(visible ratio, track number)` pairs.
///
/// A strictly higher ratio wins; on equal ratios the higher track number
/// (the later post) wins, and among equal track numbers the first candidate.
///
/// ```
/// use track_map::select_max_visible;
/// assert_eq!(select_max_visible([(0.8, 2), (0.8, 5), (0.3, 9)]), Some(1));
/// assert_eq!(select_max_visible(std::iter::empty()), None);
/// ```
pub fn select_max_visible(candidates: impl IntoIterator<Item = (f64, usize)>) -> Option<usize> {
    let mut best: Option<(usize, f64, usize)> = None;
    for (idx, (ratio, track_number)) in candidates.into_iter().enumerate() {
        let wins = match best {
            None => true,
            Some((_, best_ratio, best_track)) => {
                best_ratio < ratio || (best_ratio == ratio && best_track < track_number)
            }
        };
        if wins {
            best = Some((idx, ratio, track_number));
        }
    }
    best.map(|(idx, _, _)| idx)
}

/// Visibility report of an inline gallery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GalleryVisibility {
    pub gallery: AnchorId,
    pub ratio: f64,
    pub playing: bool,
}

/// Keeps inline galleries playing exactly while they are fully visible.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoplayGate {
    /// Ratio from which a gallery counts as fully visible.
    /// Default: 0.99
    pub full_visibility: f64,
    pub thresholds: Vec<f64>,
}

impl Default for AutoplayGate {
    fn default() -> Self {
        Self {
            full_visibility: 0.99,
            thresholds: vec![0.0, 0.25, 0.5, 0.75, 1.0],
        }
    }
}

impl AutoplayGate {
    /// Observer options for the whole viewport.
    pub fn observer_options(&self) -> ObserverOptions {
        ObserverOptions {
            root_margin_top: 0.0,
            thresholds: self.thresholds.clone(),
        }
    }

    /// Galleries whose autoplay has to be toggled.
    pub fn toggles(&self, entries: &[GalleryVisibility]) -> Vec<AnchorId> {
        entries
            .iter()
            .filter(|entry| (entry.ratio >= self.full_visibility) != entry.playing)
            .map(|entry| entry.gallery)
            .collect()
    }
}
