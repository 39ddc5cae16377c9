//! Statistical early stop for thresholded searches.

/// Number of recent scores kept by the tracker.
pub(crate) const SCORE_WINDOW: usize = 200;
/// Standard deviations above the window mean the threshold must exceed.
const STOP_DEVIATIONS: f64 = 2.0;

/// Tracks recently observed neighbour scores.
///
/// Once a full window has been seen the search stops when the threshold sits
/// well above the recent score distribution, since further expansion is
/// unlikely to find qualifying nodes.
#[derive(Clone, Debug)]
pub(crate) enum ScoreTracker {
    Disabled,
    Window {
        scores: Vec<f32>,
        next: usize,
        threshold: f32,
    },
}

impl ScoreTracker {
    pub(crate) fn new(threshold: f32) -> Self {
        if threshold > 0.0 {
            Self::Window {
                scores: Vec::with_capacity(SCORE_WINDOW),
                next: 0,
                threshold,
            }
        } else {
            Self::Disabled
        }
    }

    pub(crate) fn track(&mut self, score: f32) {
        let Self::Window { scores, next, .. } = self else {
            return;
        };
        if scores.len() < SCORE_WINDOW {
            scores.push(score);
        } else if let Some(slot) = scores.get_mut(*next) {
            *slot = score;
        }
        *next = (*next + 1) % SCORE_WINDOW;
    }

    pub(crate) fn should_stop(&self) -> bool {
        let Self::Window {
            scores, threshold, ..
        } = self
        else {
            return false;
        };
        if scores.len() < SCORE_WINDOW {
            return false;
        }
        let count = scores.len() as f64;
        let mean = scores.iter().map(|s| f64::from(*s)).sum::<f64>() / count;
        let variance = scores
            .iter()
            .map(|s| {
                let delta = f64::from(*s) - mean;
                delta * delta
            })
            .sum::<f64>()
            / count;
        f64::from(*threshold) > mean + STOP_DEVIATIONS * variance.sqrt()
    }
}
