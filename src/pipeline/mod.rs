#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod classifier;
#[cfg(feature = "classifier-ort")]
mod onnx;
mod placeholder;
pub mod source;

pub use classifier::{ClassifierBackend, ClassifierOutput, WorkerControl, start_classifier};
pub use source::{
    FrameStream, LatestFrameSender, StreamSettings, latest_frame_channel, start_replay_stream,
    start_synthetic_stream,
};
