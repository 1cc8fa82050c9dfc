use std::{path::PathBuf, time::Duration};

use clap::{Args, ValueEnum};

use crate::{
    game::SessionConfig,
    pipeline::{ClassifierBackend, StreamSettings},
    types::Locale,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("countdown needs at least one tick")]
    NoCountdownTicks,
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("replay source needs --frames <DIR>")]
    MissingFrames,
    #[cfg(feature = "classifier-ort")]
    #[error("ort backend needs --model and --labels")]
    MissingModel,
    #[error("{0} support was not compiled in (enable the `{1}` feature)")]
    FeatureDisabled(&'static str, &'static str),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    #[default]
    Synthetic,
    Replay,
    Camera,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    #[default]
    Placeholder,
    Ort,
}

#[derive(Args, Debug, Clone)]
pub struct PlayArgs {
    /// Where frames come from.
    #[arg(long, value_enum, default_value_t = SourceKind::Synthetic, env = "RPS_SOURCE")]
    pub source: SourceKind,
    /// Directory of PNG/JPEG frames for the replay source.
    #[arg(long, env = "RPS_FRAMES")]
    pub frames: Option<PathBuf>,
    #[arg(long, default_value_t = 0, env = "RPS_CAMERA_INDEX")]
    pub camera_index: u32,
    /// Gesture classifier backend.
    #[arg(long, value_enum, default_value_t = BackendKind::Placeholder, env = "RPS_BACKEND")]
    pub backend: BackendKind,
    /// ONNX model producing one logit per label.
    #[arg(long, env = "RPS_MODEL")]
    pub model: Option<PathBuf>,
    /// Text file with one label per line, in model output order.
    #[arg(long, env = "RPS_LABELS")]
    pub labels: Option<PathBuf>,
    #[arg(long, default_value_t = 224, env = "RPS_INPUT_SIZE")]
    pub input_size: u32,
    #[arg(long, default_value_t = 3, env = "RPS_COUNTDOWN_TICKS")]
    pub countdown_ticks: u32,
    #[arg(long, default_value_t = 1_000, env = "RPS_TICK_MS")]
    pub tick_ms: u64,
    /// Time allowed for a gesture after the countdown; 0 waits forever.
    #[arg(long, default_value_t = 3_000, env = "RPS_GESTURE_TIMEOUT_MS")]
    pub gesture_timeout_ms: u64,
    #[arg(long, default_value_t = 10, env = "RPS_CLASSIFY_FPS")]
    pub classify_fps: u32,
    #[arg(long, default_value_t = 30, env = "RPS_FPS")]
    pub fps: u32,
    #[arg(long, value_enum, default_value_t = Locale::En, env = "RPS_LOCALE")]
    pub locale: Locale,
    /// Play this many rounds back to back, then exit.
    #[arg(long, env = "RPS_AUTO_ROUNDS")]
    pub auto_rounds: Option<u32>,
}

#[derive(Clone, Debug)]
pub enum FrameSourceConfig {
    Synthetic,
    Replay { dir: PathBuf },
    Camera { index: u32 },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub stream: StreamSettings,
    pub source: FrameSourceConfig,
    pub backend: ClassifierBackend,
    pub locale: Locale,
    pub auto_rounds: Option<u32>,
}

impl TryFrom<PlayArgs> for AppConfig {
    type Error = ConfigError;

    fn try_from(args: PlayArgs) -> Result<Self, Self::Error> {
        if args.countdown_ticks == 0 {
            return Err(ConfigError::NoCountdownTicks);
        }
        for (name, value) in [
            ("tick-ms", args.tick_ms),
            ("classify-fps", u64::from(args.classify_fps)),
            ("fps", u64::from(args.fps)),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }

        let source = match args.source {
            SourceKind::Synthetic => FrameSourceConfig::Synthetic,
            SourceKind::Replay => FrameSourceConfig::Replay {
                dir: args.frames.ok_or(ConfigError::MissingFrames)?,
            },
            SourceKind::Camera => {
                if !cfg!(feature = "camera-nokhwa") {
                    return Err(ConfigError::FeatureDisabled("camera", "camera-nokhwa"));
                }
                FrameSourceConfig::Camera {
                    index: args.camera_index,
                }
            }
        };

        let backend = build_backend(args.backend, args.model, args.labels, args.input_size)?;

        let gesture_timeout =
            (args.gesture_timeout_ms > 0).then(|| Duration::from_millis(args.gesture_timeout_ms));

        Ok(Self {
            session: SessionConfig {
                countdown_ticks: args.countdown_ticks,
                tick_interval: Duration::from_millis(args.tick_ms),
                gesture_timeout,
            },
            stream: StreamSettings {
                fps: args.fps,
                classify_fps: args.classify_fps,
                ..StreamSettings::default()
            },
            source,
            backend,
            locale: args.locale,
            auto_rounds: args.auto_rounds,
        })
    }
}

#[cfg(feature = "classifier-ort")]
fn build_backend(
    kind: BackendKind,
    model: Option<PathBuf>,
    labels: Option<PathBuf>,
    input_size: u32,
) -> Result<ClassifierBackend, ConfigError> {
    match kind {
        BackendKind::Placeholder => Ok(ClassifierBackend::Placeholder),
        BackendKind::Ort => {
            let (Some(model_path), Some(labels_path)) = (model, labels) else {
                return Err(ConfigError::MissingModel);
            };
            if input_size == 0 {
                return Err(ConfigError::Zero("input-size"));
            }
            Ok(ClassifierBackend::Ort {
                model_path,
                labels_path,
                input_size,
            })
        }
    }
}

#[cfg(not(feature = "classifier-ort"))]
fn build_backend(
    kind: BackendKind,
    _model: Option<PathBuf>,
    _labels: Option<PathBuf>,
    _input_size: u32,
) -> Result<ClassifierBackend, ConfigError> {
    match kind {
        BackendKind::Placeholder => Ok(ClassifierBackend::Placeholder),
        BackendKind::Ort => Err(ConfigError::FeatureDisabled("ort backend", "classifier-ort")),
    }
}
