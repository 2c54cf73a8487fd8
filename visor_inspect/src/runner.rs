//! The inspection loop orchestrator.
//!
//! One sequential loop drives acquire → detect → resolve → encode → submit
//! per frame, keeping each frame's actuation decision causally tied to that
//! frame's detections. Evidence persistence is the only concurrent work
//! (dispatched to the tracked writer). PLC faults never terminate the loop:
//! inspection keeps running while reconnection is governed by exponential
//! backoff.

use crate::camera::{FrameSource, GrabError};
use crate::config::{InspectionConfig, OnEmpty};
use crate::detect::Detector;
use crate::evidence::{EvidenceSampler, EvidenceWriter};
use crate::outcome::{FrameFlags, FrameOutcome, InspectionObserver, NullObserver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use visor_common::actuation::{ActuationTable, EncodeError};
use visor_common::policy::PriorityPolicy;
use visor_plc::{LinkState, PlcLink};

// ─── Loop Statistics ────────────────────────────────────────────────

/// O(1) per-iteration counters. Updated with no allocation, logged
/// periodically and on shutdown.
#[derive(Debug, Clone, Default)]
pub struct LoopStats {
    /// Loop iterations, including ones that yielded no frame.
    pub iterations: u64,
    /// Frames acquired and processed.
    pub frames: u64,
    /// Total detections across all frames.
    pub detections: u64,
    /// Acquisition timeouts.
    pub grab_timeouts: u64,
    /// Acquisition failures other than timeout.
    pub grab_failures: u64,
    /// Detector failures.
    pub detect_failures: u64,
    /// Successful PLC submissions.
    pub submits: u64,
    /// Decisions not reported because the link was down.
    pub submits_skipped: u64,
    /// Failed PLC submissions (link faulted).
    pub submit_failures: u64,
    /// Resolved labels missing from the actuation table.
    pub encode_failures: u64,
    /// Evidence captures dispatched.
    pub captures: u64,
    /// Evidence captures dropped (queue full).
    pub captures_dropped: u64,
    /// Successful reconnects after a fault.
    pub reconnects: u64,
}

impl LoopStats {
    /// Create a new zeroed stats instance.
    pub const fn new() -> Self {
        Self {
            iterations: 0,
            frames: 0,
            detections: 0,
            grab_timeouts: 0,
            grab_failures: 0,
            detect_failures: 0,
            submits: 0,
            submits_skipped: 0,
            submit_failures: 0,
            encode_failures: 0,
            captures: 0,
            captures_dropped: 0,
            reconnects: 0,
        }
    }
}

// ─── Reconnect Backoff ──────────────────────────────────────────────

/// Exponential backoff for PLC reconnect attempts.
///
/// Delay doubles per consecutive failure from `initial` up to `max`, and
/// resets on success. Keeps a sustained outage from turning into one
/// connect attempt per frame against a dead endpoint.
#[derive(Debug)]
struct ReconnectBackoff {
    initial: Duration,
    max: Duration,
    failures: u32,
    next_attempt: Option<Instant>,
}

impl ReconnectBackoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            failures: 0,
            next_attempt: None,
        }
    }

    /// True when an attempt is allowed at `now`.
    fn ready(&self, now: Instant) -> bool {
        self.next_attempt.is_none_or(|at| now >= at)
    }

    /// Register a failed attempt (or a fresh fault) and schedule the next.
    fn record_failure(&mut self, now: Instant) {
        self.failures += 1;
        let shift = (self.failures - 1).min(16);
        let delay = self.initial.saturating_mul(1u32 << shift).min(self.max);
        self.next_attempt = Some(now + delay);
    }

    /// Register a successful connect.
    fn record_success(&mut self) {
        self.failures = 0;
        self.next_attempt = None;
    }

    /// Delay currently scheduled before the next attempt, if any.
    fn current_delay(&self, now: Instant) -> Option<Duration> {
        self.next_attempt.map(|at| at.saturating_duration_since(now))
    }
}

// ─── Inspection Core ────────────────────────────────────────────────

/// The inspection loop.
///
/// Owns all collaborators for the lifetime of the run; nothing here is a
/// process-wide singleton. The loop stops cleanly when the running flag is
/// cleared (signal handler), finishing the current iteration first.
pub struct InspectionCore {
    camera: Box<dyn FrameSource>,
    detector: Box<dyn Detector>,
    link: PlcLink,
    policy: PriorityPolicy,
    table: ActuationTable,
    sampler: EvidenceSampler,
    writer: Option<EvidenceWriter>,
    observer: Box<dyn InspectionObserver>,
    grab_timeout: Duration,
    on_empty: OnEmpty,
    idle_code: Option<i64>,
    backoff: ReconnectBackoff,
    running: Arc<AtomicBool>,
    stats: LoopStats,
}

impl InspectionCore {
    /// Assemble the loop from configuration and collaborators.
    ///
    /// The configuration must already be validated; `writer` is `None`
    /// when evidence capture is disabled.
    pub fn new(
        config: &InspectionConfig,
        camera: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        link: PlcLink,
        writer: Option<EvidenceWriter>,
    ) -> Self {
        let sampler = EvidenceSampler::new(
            config.evidence.dir.clone(),
            Duration::from_millis(config.evidence.cooldown_ms),
            config.evidence.labels.iter().cloned(),
        );

        Self {
            camera,
            detector,
            link,
            policy: config.priority_policy(),
            table: config.actuation_table(),
            sampler,
            writer,
            observer: Box::new(NullObserver),
            grab_timeout: Duration::from_millis(config.camera.grab_timeout_ms),
            on_empty: config.policy.on_empty,
            idle_code: config.policy.idle_code,
            backoff: ReconnectBackoff::new(
                Duration::from_millis(config.plc.initial_backoff_ms),
                Duration::from_millis(config.plc.max_backoff_ms),
            ),
            running: Arc::new(AtomicBool::new(true)),
            stats: LoopStats::new(),
        }
    }

    /// Replace the (default no-op) display observer.
    pub fn set_observer(&mut self, observer: Box<dyn InspectionObserver>) {
        self.observer = observer;
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Loop statistics so far.
    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Current PLC link state.
    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    /// Run until the running flag clears.
    ///
    /// Blocks the calling thread. Each iteration is bounded by the grab
    /// timeout plus the PLC I/O timeout — no unbounded wait anywhere.
    pub fn run(&mut self) {
        info!(
            camera = self.camera.name(),
            detector = self.detector.name(),
            "inspection loop starting"
        );
        self.running.store(true, Ordering::SeqCst);

        while self.running.load(Ordering::SeqCst) {
            let _ = self.step();

            if self.stats.iterations % 1000 == 0 {
                debug!(
                    frames = self.stats.frames,
                    submits = self.stats.submits,
                    submit_failures = self.stats.submit_failures,
                    grab_timeouts = self.stats.grab_timeouts,
                    captures = self.stats.captures,
                    "inspection loop running"
                );
            }
        }

        info!(
            frames = self.stats.frames,
            detections = self.stats.detections,
            submits = self.stats.submits,
            submit_failures = self.stats.submit_failures,
            captures = self.stats.captures,
            "inspection loop stopped"
        );
    }

    /// Run one acquire → detect → resolve → actuate iteration.
    ///
    /// Returns the frame outcome, or `None` when no frame was processed
    /// (acquisition or detector failure — both recoverable by design).
    pub fn step(&mut self) -> Option<FrameOutcome> {
        self.stats.iterations += 1;
        self.maybe_reconnect();

        let frame = match self.camera.try_get_frame(self.grab_timeout) {
            Ok(frame) => frame,
            Err(GrabError::Timeout { timeout_ms }) => {
                self.stats.grab_timeouts += 1;
                warn!(timeout_ms, "frame acquisition timed out");
                return None;
            }
            Err(GrabError::Grab(reason)) => {
                self.stats.grab_failures += 1;
                warn!(%reason, "frame grab failed");
                return None;
            }
        };
        self.stats.frames += 1;

        let detections = match self.detector.infer(&frame) {
            Ok(detections) => detections,
            Err(e) => {
                self.stats.detect_failures += 1;
                warn!(error = %e, seq = frame.seq, "detector failed, skipping frame");
                return None;
            }
        };

        let mut flags = FrameFlags::empty();
        if !detections.is_empty() {
            flags.insert(FrameFlags::DETECTED);
            self.stats.detections += detections.len() as u64;
        }

        let resolved = self.policy.resolve(&detections);

        let code = match self.table.encode(resolved) {
            Ok(Some(code)) => Some(code),
            Ok(None) => match self.on_empty {
                OnEmpty::Suppress => None,
                OnEmpty::Idle => self.idle_code,
            },
            Err(EncodeError::UnknownLabel(label)) => {
                // Policy/actuation tables disagree with what the detector
                // emits — a configuration inconsistency, surfaced loudly.
                self.stats.encode_failures += 1;
                flags.insert(FrameFlags::ENCODE_FAILED);
                error!(
                    label = %label,
                    "resolved label has no actuation code; check policy.codes"
                );
                None
            }
        };

        if let Some(code) = code {
            if self.link.state().is_connected() {
                match self.link.submit(code) {
                    Ok(()) => {
                        self.stats.submits += 1;
                        flags.insert(FrameFlags::SUBMITTED);
                    }
                    Err(e) => {
                        self.stats.submit_failures += 1;
                        flags.insert(FrameFlags::SUBMIT_FAILED);
                        error!(error = %e, code, "PLC submit failed, continuing inspection");
                        // A mid-write fault counts against the backoff
                        // schedule like a failed connect attempt.
                        self.backoff.record_failure(Instant::now());
                    }
                }
            } else {
                self.stats.submits_skipped += 1;
                debug!(code, state = ?self.link.state(), "PLC down, decision not reported");
            }
        }

        if let Some(task) = self
            .sampler
            .maybe_capture(resolved, Instant::now(), &frame, &detections)
        {
            let dispatched = self
                .writer
                .as_ref()
                .map(|writer| writer.dispatch(task))
                .unwrap_or(false);
            if dispatched {
                self.stats.captures += 1;
                flags.insert(FrameFlags::CAPTURED);
            } else {
                self.stats.captures_dropped += 1;
                flags.insert(FrameFlags::CAPTURE_DROPPED);
            }
        }

        let outcome = FrameOutcome {
            seq: frame.seq,
            resolved: resolved.map(str::to_string),
            detections,
            code,
            flags,
        };
        self.observer.frame_inspected(&outcome);
        Some(outcome)
    }

    /// Attempt to (re)connect the link, honoring the backoff schedule.
    fn maybe_reconnect(&mut self) {
        if self.link.state().is_connected() {
            return;
        }
        let now = Instant::now();
        if !self.backoff.ready(now) {
            return;
        }

        let was_faulted = self.link.state() == LinkState::Faulted;
        match self.link.connect() {
            Ok(()) => {
                if was_faulted {
                    self.stats.reconnects += 1;
                }
                self.backoff.record_success();
            }
            Err(_) => {
                // The link already logged the cause.
                self.backoff.record_failure(now);
                if let Some(delay) = self.backoff.current_delay(now) {
                    debug!(delay_ms = delay.as_millis() as u64, "next PLC connect attempt scheduled");
                }
            }
        }
    }

    /// Release all resources: disconnect the PLC and join the evidence
    /// writer. The camera releases on drop.
    pub fn shutdown(&mut self) {
        info!("shutdown requested");
        self.running.store(false, Ordering::SeqCst);
        self.link.disconnect();

        if let Some(writer) = self.writer.take() {
            let written = writer.shutdown();
            info!(written, "evidence writer stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_ceiling() {
        let mut backoff =
            ReconnectBackoff::new(Duration::from_millis(500), Duration::from_millis(3000));
        let base = Instant::now();

        assert!(backoff.ready(base));

        backoff.record_failure(base);
        assert_eq!(backoff.current_delay(base), Some(Duration::from_millis(500)));
        assert!(!backoff.ready(base + Duration::from_millis(499)));
        assert!(backoff.ready(base + Duration::from_millis(500)));

        backoff.record_failure(base);
        assert_eq!(backoff.current_delay(base), Some(Duration::from_millis(1000)));
        backoff.record_failure(base);
        assert_eq!(backoff.current_delay(base), Some(Duration::from_millis(2000)));
        backoff.record_failure(base);
        // Clamped to the ceiling.
        assert_eq!(backoff.current_delay(base), Some(Duration::from_millis(3000)));
        backoff.record_failure(base);
        assert_eq!(backoff.current_delay(base), Some(Duration::from_millis(3000)));
    }

    #[test]
    fn backoff_resets_on_success() {
        let mut backoff =
            ReconnectBackoff::new(Duration::from_millis(500), Duration::from_millis(3000));
        let base = Instant::now();

        backoff.record_failure(base);
        backoff.record_failure(base);
        backoff.record_success();

        assert!(backoff.ready(base));
        backoff.record_failure(base);
        assert_eq!(backoff.current_delay(base), Some(Duration::from_millis(500)));
    }

    #[test]
    fn backoff_shift_is_bounded() {
        let mut backoff = ReconnectBackoff::new(Duration::from_millis(500), Duration::MAX);
        let base = Instant::now();
        // Far past any realistic failure count — must not overflow.
        for _ in 0..100 {
            backoff.record_failure(base);
        }
        assert!(backoff.current_delay(base).is_some());
    }

    #[test]
    fn loop_stats_start_zeroed() {
        let stats = LoopStats::new();
        assert_eq!(stats.iterations, 0);
        assert_eq!(stats.frames, 0);
        assert_eq!(stats.submit_failures, 0);
    }
}
