use std::thread;

#[cfg(feature = "classifier-ort")]
use std::path::PathBuf;

#[cfg(feature = "classifier-ort")]
use crate::types::GestureCategory;

use crossbeam_channel::{Receiver, Sender, TrySendError, never, select};

use super::placeholder::PlaceholderClassifier;
use crate::{
    error::ClassifierError,
    types::{ClassificationResult, Frame},
};

pub type ClassifierOutput = Result<ClassificationResult, ClassifierError>;

pub trait FrameClassifier: Send + 'static {
    fn classify(&mut self, frame: &Frame) -> ClassifierOutput;
}

#[derive(Clone, Debug, Default)]
pub enum ClassifierBackend {
    #[default]
    Placeholder,
    #[cfg(feature = "classifier-ort")]
    Ort {
        model_path: PathBuf,
        labels_path: PathBuf,
        input_size: u32,
    },
}

impl ClassifierBackend {
    pub fn label(&self) -> &'static str {
        match self {
            ClassifierBackend::Placeholder => "placeholder",
            #[cfg(feature = "classifier-ort")]
            ClassifierBackend::Ort { .. } => "ort",
        }
    }

    pub fn build(&self) -> Result<Box<dyn FrameClassifier>, ClassifierError> {
        match self {
            ClassifierBackend::Placeholder => Ok(Box::new(PlaceholderClassifier::default())),
            #[cfg(feature = "classifier-ort")]
            ClassifierBackend::Ort {
                model_path,
                labels_path,
                input_size,
            } => {
                let classifier =
                    super::onnx::OrtClassifier::new(model_path, labels_path, *input_size)?;
                log::info!(
                    "gesture classifier ORT backend ready using {}",
                    model_path.display()
                );
                Ok(Box::new(classifier))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerControl {
    /// Release the classifier and drop incoming frames.
    Suspend,
    /// Rebuild the classifier on the next frame.
    Resume,
}

pub fn start_classifier(
    backend: ClassifierBackend,
    frame_rx: Receiver<Frame>,
    control_rx: Receiver<WorkerControl>,
    output_tx: Sender<ClassifierOutput>,
) -> thread::JoinHandle<()> {
    log::info!("starting gesture classifier backend: {}", backend.label());

    start_worker(move || backend.build(), frame_rx, control_rx, output_tx)
}

pub(crate) fn start_worker<B>(
    build: B,
    frame_rx: Receiver<Frame>,
    control_rx: Receiver<WorkerControl>,
    output_tx: Sender<ClassifierOutput>,
) -> thread::JoinHandle<()>
where
    B: FnMut() -> Result<Box<dyn FrameClassifier>, ClassifierError> + Send + 'static,
{
    thread::spawn(move || run_worker_loop(build, frame_rx, control_rx, output_tx))
}

fn run_worker_loop<B>(
    mut build: B,
    frame_rx: Receiver<Frame>,
    mut control_rx: Receiver<WorkerControl>,
    output_tx: Sender<ClassifierOutput>,
) where
    B: FnMut() -> Result<Box<dyn FrameClassifier>, ClassifierError>,
{
    let mut engine: Option<Box<dyn FrameClassifier>> = None;
    let mut suspended = false;
    // A failed build is retried only after the next resume.
    let mut build_failed = false;

    loop {
        let input = select! {
            recv(control_rx) -> msg => WorkerInput::Control(msg.ok()),
            recv(frame_rx) -> frame => WorkerInput::Frame(frame.ok()),
        };

        match input {
            WorkerInput::Control(Some(WorkerControl::Suspend)) => {
                if engine.take().is_some() {
                    log::info!("gesture classifier released");
                }
                suspended = true;
            }
            WorkerInput::Control(Some(WorkerControl::Resume)) => {
                suspended = false;
                build_failed = false;
            }
            WorkerInput::Control(None) => control_rx = never(),
            WorkerInput::Frame(None) => break,
            WorkerInput::Frame(Some(frame)) => {
                let frame = drain_to_latest(frame, &frame_rx);
                if suspended || build_failed {
                    continue;
                }

                if engine.is_none() {
                    match build() {
                        Ok(built) => engine = Some(built),
                        Err(err) => {
                            log::error!("failed to set up gesture classifier: {err}");
                            build_failed = true;
                            if !forward(&output_tx, Err(err)) {
                                break;
                            }
                            continue;
                        }
                    }
                }

                let Some(classifier) = engine.as_mut() else {
                    continue;
                };
                let output = classifier.classify(&frame);
                if let Err(err) = &output {
                    log::warn!("gesture classification failed: {err}");
                }
                if !forward(&output_tx, output) {
                    break;
                }
            }
        }
    }

    log::info!("gesture classifier worker stopped");
}

enum WorkerInput {
    Control(Option<WorkerControl>),
    Frame(Option<Frame>),
}

/// Returns `false` once the consumer has gone away.
fn forward(output_tx: &Sender<ClassifierOutput>, output: ClassifierOutput) -> bool {
    match output_tx.try_send(output) {
        Ok(()) | Err(TrySendError::Full(_)) => true,
        Err(TrySendError::Disconnected(_)) => false,
    }
}

fn drain_to_latest(mut frame: Frame, frame_rx: &Receiver<Frame>) -> Frame {
    // Drop stale frames if the classifier fell behind.
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    frame
}

#[cfg(feature = "classifier-ort")]
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![0.0; logits.len()];
    }
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

/// Pairs labels with scores, highest first. Equal scores keep label order.
#[cfg(feature = "classifier-ort")]
pub fn rank_categories(labels: &[String], scores: &[f32]) -> Vec<GestureCategory> {
    let mut categories: Vec<GestureCategory> = labels
        .iter()
        .zip(scores)
        .map(|(label, score)| GestureCategory::new(label.clone(), *score))
        .collect();
    categories.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    categories
}
