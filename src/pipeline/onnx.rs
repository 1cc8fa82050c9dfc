use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow};
use image::{RgbaImage, imageops::FilterType};
use ndarray::Array4;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use rayon::prelude::*;

use super::classifier::{ClassifierOutput, FrameClassifier, rank_categories, softmax};
use crate::{
    error::ClassifierError,
    types::{ClassificationResult, Frame},
};

/// Gesture classifier backed by an ONNX image model with one logit per label.
pub struct OrtClassifier {
    session: Session,
    labels: Vec<String>,
    input_size: u32,
}

impl OrtClassifier {
    pub fn new(model_path: &Path, labels_path: &Path, input_size: u32) -> Result<Self> {
        let labels = load_labels(labels_path)?;
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;

        Ok(Self {
            session,
            labels,
            input_size,
        })
    }
}

impl FrameClassifier for OrtClassifier {
    fn classify(&mut self, frame: &Frame) -> ClassifierOutput {
        let input = prepare_input(frame, self.input_size)
            .map_err(|err| ClassifierError::input(format!("{err:#}")))?;
        let tensor = Tensor::from_array(input)
            .map_err(|err| ClassifierError::input(format!("failed to build tensor: {err}")))?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|err| ClassifierError::model(format!("failed to run ORT session: {err}")))?;
        if outputs.len() < 1 {
            return Err(ClassifierError::model("model returned no outputs"));
        }

        let logits: Vec<f32> = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|err| ClassifierError::model(format!("failed to extract logits: {err}")))?
            .iter()
            .copied()
            .collect();
        if logits.len() != self.labels.len() {
            log::warn!(
                "model produced {} scores for {} labels",
                logits.len(),
                self.labels.len()
            );
        }

        let scores = softmax(&logits);
        Ok(ClassificationResult::for_frame(
            frame,
            rank_categories(&self.labels, &scores),
        ))
    }
}

fn load_labels(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read labels from {}", path.display()))?;
    let labels: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        return Err(anyhow!("label file {} is empty", path.display()));
    }
    Ok(labels)
}

/// Letterboxes the frame into a square NHWC tensor scaled to [0, 1].
fn prepare_input(frame: &Frame, target_size: u32) -> Result<Array4<f32>> {
    let Some(img) = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone()) else {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgba.len(),
            frame.expected_len()
        ));
    };

    let scale = target_size as f32 / (frame.width.max(frame.height).max(1) as f32);
    let new_w = (frame.width as f32 * scale).round().max(1.0) as u32;
    let new_h = (frame.height as f32 * scale).round().max(1.0) as u32;
    let resized = image::imageops::resize(&img, new_w, new_h, FilterType::CatmullRom);

    let pad_x = ((target_size as i64 - new_w as i64) / 2).max(0);
    let pad_y = ((target_size as i64 - new_h as i64) / 2).max(0);
    let mut canvas =
        RgbaImage::from_pixel(target_size, target_size, image::Rgba([0u8, 0u8, 0u8, 255u8]));
    image::imageops::replace(&mut canvas, &resized, pad_x, pad_y);

    let normalized: Vec<f32> = canvas
        .as_raw()
        .par_chunks_exact(4)
        .flat_map_iter(|px| {
            [
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ]
        })
        .collect();

    Array4::<f32>::from_shape_vec(
        (1, target_size as usize, target_size as usize, 3),
        normalized,
    )
    .map_err(|err| anyhow!("failed to build input tensor: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_is_letterboxed_square() {
        let frame = Frame::new(vec![255; 8 * 4 * 4], 8, 4);
        let input = prepare_input(&frame, 16).unwrap();
        assert_eq!(input.shape(), &[1, 16, 16, 3]);
        // Top rows are padding, the centre is the white frame.
        assert_eq!(input[[0, 0, 8, 0]], 0.0);
        assert!((input[[0, 8, 8, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let frame = Frame::new(vec![0; 3], 8, 4);
        assert!(prepare_input(&frame, 16).is_err());
    }
}
