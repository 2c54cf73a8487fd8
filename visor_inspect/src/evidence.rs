//! Evidence capture: rate-limited sampling and tracked background writing.
//!
//! The sampler decides per frame whether the current classification
//! deserves a persisted evidence frame; the writer performs the disk I/O on
//! its own thread so persistence latency never stalls the inspection
//! cadence. The writer is tracked, not fire-and-forget: the queue is
//! bounded (a full queue drops the capture with a warning) and the thread
//! is joined on shutdown.

use crate::camera::Frame;
use serde::Serialize;
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use visor_common::detection::Detection;

// ─── Sampler ────────────────────────────────────────────────────────

/// One evidence capture, handed to the background writer.
///
/// Owns its frame snapshot — the capture must never share mutable frame
/// memory with the loop, which overwrites its buffer next iteration.
#[derive(Debug, Clone)]
pub struct CaptureTask {
    /// Destination image path.
    pub path: PathBuf,
    /// Owned frame snapshot.
    pub frame: Frame,
    /// Detections of the captured frame, for the audit sidecar.
    pub detections: Vec<Detection>,
    /// Resolved class that triggered the capture.
    pub resolved: String,
    /// Wall-clock capture time, milliseconds since the Unix epoch.
    pub wall_ms: u64,
}

/// Rate-limited evidence sampling decision.
///
/// Pure apart from its own cooldown state: no I/O, never blocks. The
/// cooldown runs on the monotonic clock (`Instant`), so wall-clock jumps
/// cannot re-open or extend the window.
pub struct EvidenceSampler {
    dir: PathBuf,
    labels: HashSet<String>,
    cooldown: Duration,
    last_capture: Option<Instant>,
    /// Disambiguates paths when captures land in the same millisecond
    /// (also across quick restarts, together with the wall timestamp).
    counter: u64,
}

impl EvidenceSampler {
    /// Create a sampler capturing `labels` into `dir`, at most once per
    /// `cooldown`.
    pub fn new<I, S>(dir: impl Into<PathBuf>, cooldown: Duration, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dir: dir.into(),
            labels: labels.into_iter().map(Into::into).collect(),
            cooldown,
            last_capture: None,
            counter: 0,
        }
    }

    /// Decide whether this frame's resolution triggers a capture.
    ///
    /// Returns a [`CaptureTask`] when `resolved` is one of the configured
    /// labels and the cooldown window has elapsed. `last_capture` advances
    /// only when a capture actually fires.
    pub fn maybe_capture(
        &mut self,
        resolved: Option<&str>,
        now: Instant,
        frame: &Frame,
        detections: &[Detection],
    ) -> Option<CaptureTask> {
        let label = resolved?;
        if !self.labels.contains(label) {
            return None;
        }
        if let Some(last) = self.last_capture {
            if now.duration_since(last) < self.cooldown {
                return None;
            }
        }

        self.last_capture = Some(now);
        self.counter += 1;

        let wall_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let path = self
            .dir
            .join(format!("{label}_{wall_ms}_{:06}.ppm", self.counter));

        Some(CaptureTask {
            path,
            frame: frame.clone(),
            detections: detections.to_vec(),
            resolved: label.to_string(),
            wall_ms,
        })
    }
}

// ─── Store ──────────────────────────────────────────────────────────

/// Evidence image writer seam.
pub trait EvidenceStore: Send {
    /// Persist one frame at `path`.
    ///
    /// # Errors
    /// Any I/O failure; the caller logs and drops the capture.
    fn write_image(&self, path: &Path, frame: &Frame) -> io::Result<()>;
}

/// Filesystem store writing binary PPM (P6) images.
pub struct FsEvidenceStore;

impl EvidenceStore for FsEvidenceStore {
    fn write_image(&self, path: &Path, frame: &Frame) -> io::Result<()> {
        if !frame.is_well_formed() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "frame buffer {} bytes, expected {}",
                    frame.data.len(),
                    frame.expected_len()
                ),
            ));
        }

        let mut file = std::fs::File::create(path)?;
        write!(file, "P6\n{} {}\n255\n", frame.width, frame.height)?;
        file.write_all(&frame.data)?;
        Ok(())
    }
}

/// Audit metadata written beside each evidence image.
#[derive(Debug, Serialize)]
struct Sidecar<'a> {
    station: &'a str,
    wall_ms: u64,
    resolved: &'a str,
    detections: &'a [Detection],
}

// ─── Writer ─────────────────────────────────────────────────────────

/// Tracked background evidence writer.
///
/// Owns a worker thread fed by a bounded channel. [`dispatch`] never
/// blocks: when the queue is full the capture is dropped and counted by
/// the caller. [`shutdown`] closes the channel and joins the worker, so no
/// capture work outlives the runtime.
///
/// [`dispatch`]: EvidenceWriter::dispatch
/// [`shutdown`]: EvidenceWriter::shutdown
pub struct EvidenceWriter {
    tx: Option<SyncSender<CaptureTask>>,
    worker: Option<JoinHandle<u64>>,
}

impl EvidenceWriter {
    /// Spawn the writer thread.
    ///
    /// `queue_depth` bounds in-flight captures; `station` is stamped into
    /// every sidecar.
    pub fn spawn(store: Box<dyn EvidenceStore>, station: String, queue_depth: usize) -> Self {
        let (tx, rx) = mpsc::sync_channel::<CaptureTask>(queue_depth);

        let worker = thread::Builder::new()
            .name("evidence-writer".to_string())
            .spawn(move || {
                let mut written = 0u64;
                while let Ok(task) = rx.recv() {
                    match store.write_image(&task.path, &task.frame) {
                        Ok(()) => {
                            written += 1;
                            if let Err(e) = write_sidecar(&task, &station) {
                                warn!(path = %task.path.display(), error = %e, "sidecar write failed");
                            }
                            debug!(path = %task.path.display(), "evidence written");
                        }
                        Err(e) => {
                            warn!(path = %task.path.display(), error = %e, "evidence write failed");
                        }
                    }
                }
                written
            })
            .expect("spawn evidence writer thread");

        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    /// Hand a capture to the worker without blocking.
    ///
    /// Returns `false` when the capture was dropped (queue full or writer
    /// already shut down).
    pub fn dispatch(&self, task: CaptureTask) -> bool {
        let Some(tx) = self.tx.as_ref() else {
            return false;
        };
        match tx.try_send(task) {
            Ok(()) => true,
            Err(TrySendError::Full(task)) => {
                warn!(path = %task.path.display(), "evidence queue full, capture dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Close the queue and join the worker. Returns the number of images
    /// written over the writer's lifetime.
    pub fn shutdown(mut self) -> u64 {
        self.tx.take();
        match self.worker.take() {
            Some(worker) => worker.join().unwrap_or_else(|_| {
                warn!("evidence writer thread panicked");
                0
            }),
            None => 0,
        }
    }
}

fn write_sidecar(task: &CaptureTask, station: &str) -> io::Result<()> {
    let sidecar = Sidecar {
        station,
        wall_ms: task.wall_ms,
        resolved: &task.resolved,
        detections: &task.detections,
    };
    let json = serde_json::to_vec_pretty(&sidecar)?;
    std::fs::write(task.path.with_extension("json"), json)
}
