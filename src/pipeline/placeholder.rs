use rayon::prelude::*;

use super::classifier::{ClassifierOutput, FrameClassifier};
use crate::{
    error::ClassifierError,
    types::{ClassificationResult, Frame, GestureCategory},
};

// Frames darker than this are reported as "no hand".
const MIN_BRIGHTNESS: f32 = 16.0;
const BAND_WIDTH: f32 = 256.0 / 3.0;
// Darkest band first.
const BAND_LABELS: [&str; 3] = ["Rock", "Scissors", "Paper"];

/// Model-free stand-in that maps mean frame brightness onto a gesture.
#[derive(Debug, Default)]
pub struct PlaceholderClassifier;

impl FrameClassifier for PlaceholderClassifier {
    fn classify(&mut self, frame: &Frame) -> ClassifierOutput {
        let brightness = mean_brightness(frame)?;
        if brightness < MIN_BRIGHTNESS {
            return Ok(ClassificationResult::for_frame(frame, Vec::new()));
        }

        let band = ((brightness / BAND_WIDTH) as usize).min(BAND_LABELS.len() - 1);
        let centre = (band as f32 + 0.5) * BAND_WIDTH;
        let score = (1.0 - (brightness - centre).abs() / BAND_WIDTH).clamp(0.5, 1.0);
        let rest = (1.0 - score) / 2.0;

        let mut categories = vec![GestureCategory::new(BAND_LABELS[band], score)];
        categories.extend(
            BAND_LABELS
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != band)
                .map(|(_, label)| GestureCategory::new(*label, rest)),
        );

        Ok(ClassificationResult::for_frame(frame, categories))
    }
}

fn mean_brightness(frame: &Frame) -> Result<f32, ClassifierError> {
    if frame.rgba.is_empty() || frame.rgba.len() != frame.expected_len() {
        return Err(ClassifierError::input(format!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgba.len(),
            frame.expected_len()
        )));
    }

    let total: f32 = frame
        .rgba
        .par_chunks_exact(4)
        .map(|px| (px[0] as f32 + px[1] as f32 + px[2] as f32) / 3.0)
        .sum();
    Ok(total / (frame.rgba.len() / 4) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Move;

    fn solid(value: u8) -> Frame {
        let mut rgba = Vec::new();
        for _ in 0..16 {
            rgba.extend_from_slice(&[value, value, value, 255]);
        }
        Frame::new(rgba, 4, 4)
    }

    #[test]
    fn brightness_bands_map_to_moves() {
        let mut classifier = PlaceholderClassifier;
        let cases = [(40, Move::Rock), (128, Move::Scissors), (230, Move::Paper)];
        for (value, expected) in cases {
            let result = classifier.classify(&solid(value)).unwrap();
            assert_eq!(result.player_move(), expected, "brightness {value}");
            assert_eq!(result.categories.len(), 3);
        }
    }

    #[test]
    fn scores_are_ranked_and_bounded() {
        let result = PlaceholderClassifier.classify(&solid(128)).unwrap();
        let top = result.top_category().unwrap();
        assert!(top.score >= 0.5 && top.score <= 1.0);
        let sum: f32 = result.categories.iter().map(|c| c.score).sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn dark_frame_yields_no_categories() {
        let result = PlaceholderClassifier.classify(&solid(0)).unwrap();
        assert!(result.categories.is_empty());
    }

    #[test]
    fn malformed_frame_is_an_input_error() {
        let frame = Frame::new(vec![1, 2, 3], 4, 4);
        let err = PlaceholderClassifier.classify(&frame).unwrap_err();
        assert_eq!(err.code, ClassifierError::INPUT);
    }
}
