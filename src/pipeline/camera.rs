use anyhow::{Context, Result};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
};

use super::source::{FrameSink, FrameStream, LatestFrameSender, pump};
use crate::types::Frame;

/// Human-readable names of the attached cameras, in `--camera-index` order.
pub fn available_cameras() -> Result<Vec<String>> {
    let cameras = query(ApiBackend::Auto).context("camera query failed")?;
    Ok(cameras.iter().map(|info| info.human_name()).collect())
}

fn open_camera(index: u32) -> Result<Camera> {
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
    let mut camera = Camera::new(CameraIndex::Index(index), requested)?;
    camera.open_stream()?;
    Ok(camera)
}

/// Captures from camera `index`, paced by the device itself.
pub fn start_camera_stream(
    index: u32,
    classify_fps: u32,
    preview_tx: LatestFrameSender,
    classify_tx: LatestFrameSender,
) -> Result<FrameStream> {
    // Fail fast before spawning the capture thread.
    open_camera(index)?;

    Ok(FrameStream::spawn(move |stop| {
        let mut camera = match open_camera(index) {
            Ok(camera) => camera,
            Err(err) => {
                log::error!("failed to open camera {index}: {err:?}");
                return;
            }
        };
        let sink = FrameSink::new(preview_tx, classify_tx, classify_fps);
        pump(&stop, sink, None, || capture_frame(&mut camera));
    }))
}

fn capture_frame(camera: &mut Camera) -> Option<Frame> {
    let decoded = camera
        .frame()
        .and_then(|buffer| buffer.decode_image::<RgbFormat>())
        .map_err(|err| log::warn!("camera frame dropped: {err:?}"))
        .ok()?;

    let (width, height) = decoded.dimensions();
    let rgba = rgb_to_rgba(decoded.as_raw());
    (!rgba.is_empty()).then(|| Frame::new(rgba, width, height))
}

fn rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3)
        .flat_map(|px| [px[0], px[1], px[2], u8::MAX])
        .collect()
}
