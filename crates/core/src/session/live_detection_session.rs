//! Runs face detection off the camera thread, one frame at a time.
//!
//! The camera thread calls [`LiveDetectionSession::submit_frame`] for every
//! frame. A frame goes through only if detection is enabled and nothing is in
//! flight; it is then handed, with its permit, to a single worker thread.
//! Results come back as [`DetectionEvent`]s on a channel the UI thread drains.
//! There is no cancellation: a detection that started always publishes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;

use crate::camera::domain::camera_frame::CameraFrame;
use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::input_image::InputImage;
use crate::session::detection_gate::{DetectionGate, DetectionPermit, GateRejection};
use crate::session::session_logger::SessionLogger;
use crate::shared::geometry::Size;

#[derive(Debug, Clone, PartialEq)]
pub enum DetectionEvent {
    Completed {
        faces: Vec<DetectedFace>,
        /// Raw sensor size of the frame the faces came from.
        image_size: Size,
    },
    Failed(String),
}

/// What happened to a submitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    Dispatched,
    DroppedDisabled,
    DroppedBusy,
    /// The worker has stopped; nothing will detect this frame.
    DroppedClosed,
}

#[derive(Debug, Default)]
struct SessionCounters {
    received: AtomicUsize,
    dispatched: AtomicUsize,
    dropped_disabled: AtomicUsize,
    dropped_busy: AtomicUsize,
    dropped_closed: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

/// Snapshot of the session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub received: usize,
    pub dispatched: usize,
    pub dropped_disabled: usize,
    pub dropped_busy: usize,
    pub dropped_closed: usize,
    pub completed: usize,
    pub failed: usize,
}

struct DetectionJob {
    frame: CameraFrame,
    permit: DetectionPermit,
}

pub struct LiveDetectionSession {
    gate: Arc<DetectionGate>,
    counters: Arc<SessionCounters>,
    jobs: Option<Sender<DetectionJob>>,
    worker: Option<JoinHandle<()>>,
}

impl LiveDetectionSession {
    /// Spawns the detection worker and returns the session plus the event
    /// stream for the UI thread.
    pub fn start(
        detector: Box<dyn FaceDetector>,
        detection_enabled: bool,
        logger: Box<dyn SessionLogger>,
    ) -> (Self, Receiver<DetectionEvent>) {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<DetectionJob>(1);
        let (event_tx, event_rx) = crossbeam_channel::unbounded::<DetectionEvent>();
        let counters = Arc::new(SessionCounters::default());

        let worker = spawn_worker(detector, job_rx, event_tx, Arc::clone(&counters), logger);

        let session = Self {
            gate: DetectionGate::new(detection_enabled),
            counters,
            jobs: Some(job_tx),
            worker: Some(worker),
        };
        (session, event_rx)
    }

    /// Camera-thread entry point. Never waits on a detection.
    pub fn submit_frame(&self, frame: CameraFrame) -> FrameDisposition {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let permit = match self.gate.try_acquire() {
            Ok(permit) => permit,
            Err(GateRejection::Disabled) => {
                self.counters.dropped_disabled.fetch_add(1, Ordering::Relaxed);
                return FrameDisposition::DroppedDisabled;
            }
            Err(GateRejection::Busy) => {
                self.counters.dropped_busy.fetch_add(1, Ordering::Relaxed);
                return FrameDisposition::DroppedBusy;
            }
        };

        let index = frame.index();
        // The permit guarantees the single job slot is free, so this cannot block.
        let sent = self
            .jobs
            .as_ref()
            .is_some_and(|jobs| jobs.send(DetectionJob { frame, permit }).is_ok());
        if !sent {
            log::warn!("Detection worker is gone; dropping frame {index}");
            self.counters.dropped_closed.fetch_add(1, Ordering::Relaxed);
            return FrameDisposition::DroppedClosed;
        }

        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        log::trace!("Frame {index} dispatched for detection");
        FrameDisposition::Dispatched
    }

    /// Applies from the next frame on; an in-flight detection still publishes.
    pub fn set_detection_enabled(&self, enabled: bool) {
        self.gate.set_enabled(enabled);
        log::debug!("Detection {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn is_detection_enabled(&self) -> bool {
        self.gate.is_enabled()
    }

    /// True while a detection is outstanding.
    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    pub fn stats(&self) -> SessionStats {
        let c = &self.counters;
        SessionStats {
            received: c.received.load(Ordering::Relaxed),
            dispatched: c.dispatched.load(Ordering::Relaxed),
            dropped_disabled: c.dropped_disabled.load(Ordering::Relaxed),
            dropped_busy: c.dropped_busy.load(Ordering::Relaxed),
            dropped_closed: c.dropped_closed.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
        }
    }
}

impl Drop for LiveDetectionSession {
    fn drop(&mut self) {
        drop(self.jobs.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Detection worker panicked");
            }
        }
    }
}

fn spawn_worker(
    mut detector: Box<dyn FaceDetector>,
    job_rx: Receiver<DetectionJob>,
    event_tx: Sender<DetectionEvent>,
    counters: Arc<SessionCounters>,
    mut logger: Box<dyn SessionLogger>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for DetectionJob { frame, permit } in job_rx {
            let image_size = frame.size();

            let t0 = Instant::now();
            let result = InputImage::from_frame(&frame).and_then(|input| {
                logger.timing("assemble", t0.elapsed().as_secs_f64() * 1000.0);
                let t1 = Instant::now();
                let faces = detector.detect(&input);
                logger.timing("detect", t1.elapsed().as_secs_f64() * 1000.0);
                faces
            });

            let event = match result {
                Ok(faces) => {
                    counters.completed.fetch_add(1, Ordering::Relaxed);
                    logger.metric("faces", faces.len() as f64);
                    DetectionEvent::Completed { faces, image_size }
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    log::warn!("Frame {}: {e}", frame.index());
                    DetectionEvent::Failed(e.to_string())
                }
            };

            // A closed receiver only means nobody is watching any more.
            let _ = event_tx.send(event);
            drop(permit);

            let done = counters.completed.load(Ordering::Relaxed)
                + counters.failed.load(Ordering::Relaxed);
            logger.cycle(done);
        }
        logger.summary();
    })
}
