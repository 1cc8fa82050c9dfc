use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::types::Frame;

/// Running frame producer. Stops and joins its thread when dropped.
#[derive(Debug)]
pub struct FrameStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FrameStream {
    pub(crate) fn spawn<F>(body: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = thread::spawn(move || body(stop_flag));
        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sending half of a one-slot frame channel. A new frame replaces the one still pending.
#[derive(Clone, Debug)]
pub struct LatestFrameSender {
    tx: Sender<Frame>,
    slot: Receiver<Frame>,
}

pub fn latest_frame_channel() -> (LatestFrameSender, Receiver<Frame>) {
    let (tx, rx) = bounded(1);
    let sender = LatestFrameSender {
        tx,
        slot: rx.clone(),
    };
    (sender, rx)
}

impl LatestFrameSender {
    pub fn send(&self, frame: Frame) {
        let frame = match self.tx.try_send(frame) {
            Err(TrySendError::Full(frame)) => frame,
            _ => return,
        };
        // Evict the pending frame; the consumer may have taken it in the meantime.
        let _ = self.slot.try_recv();
        let _ = self.tx.try_send(frame);
    }
}

/// Fans frames out to the preview and, throttled, to the classifier.
pub struct FrameSink {
    preview_tx: LatestFrameSender,
    classify_tx: LatestFrameSender,
    classify_interval: Duration,
    last_classified: Option<Instant>,
}

impl FrameSink {
    pub fn new(
        preview_tx: LatestFrameSender,
        classify_tx: LatestFrameSender,
        classify_fps: u32,
    ) -> Self {
        Self {
            preview_tx,
            classify_tx,
            classify_interval: Duration::from_millis(1_000 / u64::from(classify_fps.max(1))),
            last_classified: None,
        }
    }

    pub fn push(&mut self, frame: Frame) {
        let due = self
            .last_classified
            .is_none_or(|last| frame.timestamp.duration_since(last) >= self.classify_interval);

        if due {
            self.last_classified = Some(frame.timestamp);
            self.classify_tx.send(frame.clone());
        }
        self.preview_tx.send(frame);
    }
}

/// Feeds `sink` from `next` until `stop` is raised, sleeping `pace` between frames.
/// `next` returning `None` skips a beat.
pub(crate) fn pump<F>(
    stop: &AtomicBool,
    mut sink: FrameSink,
    pace: Option<Duration>,
    mut next: F,
) where
    F: FnMut() -> Option<Frame>,
{
    while !stop.load(Ordering::Relaxed) {
        if let Some(frame) = next() {
            sink.push(frame);
        }
        if let Some(pace) = pace {
            thread::sleep(pace);
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct StreamSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub classify_fps: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            fps: 30,
            classify_fps: 10,
        }
    }
}

impl StreamSettings {
    fn frame_interval(&self) -> Duration {
        Duration::from_millis(1_000 / u64::from(self.fps.max(1)))
    }
}

// Full dark-to-bright sweep, so every placeholder band shows up.
const SYNTHETIC_PERIOD: Duration = Duration::from_secs(6);

/// Generated frames whose brightness sweeps up and down over time.
pub fn start_synthetic_stream(
    settings: StreamSettings,
    preview_tx: LatestFrameSender,
    classify_tx: LatestFrameSender,
) -> FrameStream {
    FrameStream::spawn(move |stop| {
        let sink = FrameSink::new(preview_tx, classify_tx, settings.classify_fps);
        let started = Instant::now();
        let pixels = (settings.width as usize) * (settings.height as usize);

        pump(&stop, sink, Some(settings.frame_interval()), || {
            let value = synthetic_brightness(started.elapsed());
            let rgba = [value, value, value, 255].repeat(pixels);
            Some(Frame::new(rgba, settings.width, settings.height))
        });
    })
}

fn synthetic_brightness(elapsed: Duration) -> u8 {
    let period = SYNTHETIC_PERIOD.as_secs_f32();
    let phase = (elapsed.as_secs_f32() % period) / period;
    let triangle = if phase < 0.5 { phase * 2.0 } else { 2.0 - phase * 2.0 };
    (triangle * 255.0).round() as u8
}

/// Loops over every PNG/JPEG image in `dir`, in file name order.
pub fn start_replay_stream(
    dir: &Path,
    settings: StreamSettings,
    preview_tx: LatestFrameSender,
    classify_tx: LatestFrameSender,
) -> Result<FrameStream> {
    // Fail fast before spawning the replay thread.
    let frames = load_replay_frames(dir)?;
    log::info!("replaying {} frames from {}", frames.len(), dir.display());

    Ok(FrameStream::spawn(move |stop| {
        let sink = FrameSink::new(preview_tx, classify_tx, settings.classify_fps);
        let mut templates = frames.iter().cycle();

        pump(&stop, sink, Some(settings.frame_interval()), || {
            let mut frame = templates.next()?.clone();
            frame.timestamp = Instant::now();
            Some(frame)
        });
    }))
}

pub fn load_replay_frames(dir: &Path) -> Result<Vec<Frame>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read frame directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_supported_image(path))
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(anyhow!("no PNG or JPEG frames found in {}", dir.display()));
    }

    paths
        .iter()
        .map(|path| {
            let image = image::open(path)
                .with_context(|| format!("failed to decode frame {}", path.display()))?
                .to_rgba8();
            let (width, height) = image.dimensions();
            Ok(Frame::new(image.into_raw(), width, height))
        })
        .collect()
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ["png", "jpg", "jpeg"]
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gesture-rps-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn frame_at(start: Instant, offset_ms: u64, width: u32) -> Frame {
        let mut frame = Frame::new(vec![0; width as usize * 4], width, 1);
        frame.timestamp = start + Duration::from_millis(offset_ms);
        frame
    }

    #[test]
    fn sink_throttles_classifier_frames() {
        let (preview_tx, preview_rx) = latest_frame_channel();
        let (classify_tx, classify_rx) = latest_frame_channel();
        let mut sink = FrameSink::new(preview_tx, classify_tx, 10);

        let start = Instant::now();
        let mut previewed = 0;
        let mut classified = 0;
        for offset_ms in [0u64, 20, 60, 120, 150, 230] {
            sink.push(frame_at(start, offset_ms, 1));
            previewed += preview_rx.try_iter().count();
            classified += classify_rx.try_iter().count();
        }

        assert_eq!(previewed, 6);
        assert_eq!(classified, 3);
    }

    #[test]
    fn busy_consumers_get_the_newest_frame() {
        let (preview_tx, preview_rx) = latest_frame_channel();
        let (classify_tx, classify_rx) = latest_frame_channel();
        let mut sink = FrameSink::new(preview_tx, classify_tx, 1_000);

        let start = Instant::now();
        for (width, offset_ms) in [(1, 0u64), (2, 10), (3, 20)] {
            sink.push(frame_at(start, offset_ms, width));
        }

        assert_eq!(preview_rx.try_recv().map(|f| f.width).ok(), Some(3));
        assert_eq!(classify_rx.try_recv().map(|f| f.width).ok(), Some(3));
        assert!(classify_rx.try_recv().is_err());
    }

    #[test]
    fn latest_sender_refills_after_the_consumer_takes_a_frame() {
        let (tx, rx) = latest_frame_channel();
        let start = Instant::now();
        tx.send(frame_at(start, 0, 1));
        assert_eq!(rx.try_recv().map(|f| f.width).ok(), Some(1));
        tx.send(frame_at(start, 5, 2));
        tx.send(frame_at(start, 10, 4));
        assert_eq!(rx.try_recv().map(|f| f.width).ok(), Some(4));
    }

    #[test]
    fn synthetic_brightness_sweeps() {
        assert_eq!(synthetic_brightness(Duration::ZERO), 0);
        assert_eq!(synthetic_brightness(SYNTHETIC_PERIOD / 2), 255);
        assert!(synthetic_brightness(SYNTHETIC_PERIOD / 4) > 100);
    }

    #[test]
    fn synthetic_stream_produces_frames() {
        let (preview_tx, preview_rx) = latest_frame_channel();
        let (classify_tx, classify_rx) = latest_frame_channel();
        let settings = StreamSettings {
            width: 4,
            height: 2,
            fps: 100,
            classify_fps: 100,
        };
        let stream = start_synthetic_stream(settings, preview_tx, classify_tx);

        let frame = preview_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!((frame.width, frame.height), (4, 2));
        assert_eq!(frame.rgba.len(), frame.expected_len());
        assert!(classify_rx.recv_timeout(Duration::from_secs(2)).is_ok());
        stream.stop();
    }

    #[test]
    fn replay_loads_images_in_name_order() {
        let dir = scratch_dir("replay");
        image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 10, 10, 255]))
            .save(dir.join("b.png"))
            .unwrap();
        image::RgbaImage::from_pixel(5, 4, image::Rgba([200, 200, 200, 255]))
            .save(dir.join("a.png"))
            .unwrap();
        fs::write(dir.join("notes.txt"), "not a frame").unwrap();

        let frames = load_replay_frames(&dir).unwrap();
        let sizes: Vec<(u32, u32)> = frames.iter().map(|f| (f.width, f.height)).collect();
        assert_eq!(sizes, vec![(5, 4), (3, 2)]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn replay_without_images_is_an_error() {
        let dir = scratch_dir("empty");
        let (preview_tx, _preview_rx) = latest_frame_channel();
        let (classify_tx, _classify_rx) = latest_frame_channel();
        let result = start_replay_stream(&dir, StreamSettings::default(), preview_tx, classify_tx);
        assert!(result.is_err());
        let _ = fs::remove_dir_all(&dir);
    }
}
