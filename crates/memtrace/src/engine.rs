use std::sync::Arc;
use std::time::Duration;

use memtrace_core::DetectionFrame;
use memtrace_hw::{Camera, Frame};
use memtrace_vision::{FaceAnalyzer, VisionError};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;

/// Pause after a failed dequeue before trying the camera again.
const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] memtrace_hw::CameraError),
    #[error("vision error: {0}")]
    Vision(#[from] VisionError),
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

pub type FrameReceiver = watch::Receiver<Option<Arc<Frame>>>;
pub type DetectionReceiver = watch::Receiver<Arc<DetectionFrame>>;

/// Something that turns a camera frame into face detections.
pub trait FrameDetector: Send + 'static {
    type Error: std::fmt::Display;

    fn detect(&mut self, frame: &Frame) -> Result<DetectionFrame, Self::Error>;
}

impl FrameDetector for FaceAnalyzer {
    type Error = VisionError;

    fn detect(&mut self, frame: &Frame) -> Result<DetectionFrame, VisionError> {
        self.analyze(frame.image.as_raw(), &frame.luma, frame.width(), frame.height())
    }
}

/// Run the camera on a dedicated OS thread, publishing each decoded frame.
///
/// Warmup frames are discarded first. The thread exits once every receiver
/// is gone.
pub fn spawn_capture(camera: Camera, warmup_frames: usize) -> Result<FrameReceiver, EngineError> {
    let (tx, rx) = watch::channel(None);

    std::thread::Builder::new()
        .name("memtrace-capture".into())
        .spawn(move || {
            let mut stream = match camera.stream() {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::error!(error = %e, "capture stream failed to start");
                    return;
                }
            };

            if warmup_frames > 0 {
                tracing::info!(count = warmup_frames, "discarding warmup frames");
                stream.skip(warmup_frames);
            }

            tracing::info!("capture thread started");
            loop {
                match stream.next_frame() {
                    Ok(frame) => {
                        if tx.send(Some(Arc::new(frame))).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "frame capture failed");
                        std::thread::sleep(CAPTURE_RETRY_DELAY);
                    }
                }
            }
            tracing::info!("capture thread exiting");
        })
        .map_err(|source| EngineError::Spawn { name: "capture", source })?;

    Ok(rx)
}

/// Run `detector` on a dedicated OS thread against the newest frame.
///
/// Frames that arrive while a detection is in flight are coalesced; only the
/// latest is analyzed. A failed detection is logged and the worker waits for
/// the next frame, leaving the previous result published.
pub fn spawn_detection<D: FrameDetector>(
    mut detector: D,
    mut frames: FrameReceiver,
    runtime: Handle,
) -> Result<DetectionReceiver, EngineError> {
    let (tx, rx) = watch::channel(Arc::new(DetectionFrame::empty()));

    std::thread::Builder::new()
        .name("memtrace-detect".into())
        .spawn(move || {
            tracing::info!("detection thread started");
            while runtime.block_on(frames.changed()).is_ok() {
                let Some(frame) = frames.borrow_and_update().clone() else {
                    continue;
                };

                match detector.detect(&frame) {
                    Ok(detections) => {
                        tracing::trace!(sequence = frame.sequence, faces = detections.face_count(), "detections published");
                        if tx.send(Arc::new(detections)).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(sequence = frame.sequence, error = %e, "face detection failed"),
                }
            }
            tracing::info!("detection thread exiting");
        })
        .map_err(|source| EngineError::Spawn { name: "detection", source })?;

    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memtrace_core::{BoundingBox, Detection, ExpressionScores};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Fails on sequence 1, otherwise reports `sequence` faces.
    struct StubDetector {
        calls: Arc<AtomicUsize>,
    }

    impl FrameDetector for StubDetector {
        type Error = String;

        fn detect(&mut self, frame: &Frame) -> Result<DetectionFrame, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if frame.sequence == 1 {
                return Err("model hiccup".into());
            }
            let face = Detection {
                bbox: BoundingBox { x: 0.0, y: 0.0, width: 1.0, height: 1.0, confidence: 0.9 },
                expressions: ExpressionScores::new(),
            };
            Ok(DetectionFrame::new(vec![face; frame.sequence as usize]))
        }
    }

    fn frame(sequence: u32) -> Option<Arc<Frame>> {
        Some(Arc::new(Frame::from_grey(&[0u8; 4], 2, 2, sequence).unwrap()))
    }

    fn wait_for_calls(calls: &AtomicUsize, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while calls.load(Ordering::SeqCst) < n {
            assert!(Instant::now() < deadline, "detector was not called");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_detection_recovers_after_error() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let (frame_tx, frame_rx) = watch::channel(None);

        let mut detections = spawn_detection(
            StubDetector { calls: Arc::clone(&calls) },
            frame_rx,
            runtime.handle().clone(),
        )
        .unwrap();
        assert_eq!(detections.borrow().face_count(), 0);

        frame_tx.send_replace(frame(1));
        wait_for_calls(&calls, 1);
        assert_eq!(detections.borrow().face_count(), 0);

        frame_tx.send_replace(frame(3));
        runtime.block_on(async {
            tokio::time::timeout(Duration::from_secs(5), detections.changed())
                .await
                .unwrap()
                .unwrap();
        });
        assert_eq!(detections.borrow().face_count(), 3);
    }

    #[test]
    fn test_detection_exits_when_frames_end() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (frame_tx, frame_rx) = watch::channel(None);
        let mut detections = spawn_detection(
            StubDetector { calls: Arc::new(AtomicUsize::new(0)) },
            frame_rx,
            runtime.handle().clone(),
        )
        .unwrap();

        drop(frame_tx);
        let closed = runtime.block_on(async {
            tokio::time::timeout(Duration::from_secs(5), detections.changed()).await.unwrap()
        });
        assert!(closed.is_err());
    }
}
