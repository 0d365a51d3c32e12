use std::mem;
use teamsight_core::frame::FrameError;
use teamsight_core::{
    ColorQuantizer, Detector, Frame, FrameAnalyzer, FrameSource, Notifier, PresenceEvent,
    PresenceState, SessionStore, SessionSynchronizer,
};
use thiserror::Error;
use tokio::sync::{oneshot, watch};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("frame pipeline error: {0}")]
    Frame(#[from] FrameError),
    #[error("session store failed to initialize: {0}")]
    StoreInit(String),
    #[error("session store failed its health check")]
    StoreUnhealthy,
    #[error("store initialization task exited")]
    ChannelClosed,
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub arrivals: u64,
    pub departures: u64,
}

/// Wait for the store initialization task, then gate startup on its health.
///
/// The frame loop must not begin until this returns `Ok`.
pub async fn wait_for_store<S, E>(ready: oneshot::Receiver<Result<S, E>>) -> Result<S, EngineError>
where
    S: SessionStore,
    E: std::fmt::Display,
{
    let store = ready
        .await
        .map_err(|_| EngineError::ChannelClosed)?
        .map_err(|e| EngineError::StoreInit(e.to_string()))?;

    if !store.health_check().await {
        return Err(EngineError::StoreUnhealthy);
    }
    tracing::info!("session store ready");
    Ok(store)
}

/// The sequential per-frame pipeline: detect, analyze, debounce, sync.
///
/// Each frame is fully processed, including its store writes, before the
/// next one is pulled from the source.
pub struct FrameLoop<F, D, Q, S, N> {
    source: F,
    detector: D,
    analyzer: FrameAnalyzer<Q>,
    sync: SessionSynchronizer<S, N>,
    state: PresenceState,
    max_frames: Option<u64>,
    stats: LoopStats,
}

impl<F, D, Q, S, N> FrameLoop<F, D, Q, S, N>
where
    F: FrameSource,
    D: Detector,
    Q: ColorQuantizer,
    S: SessionStore,
    N: Notifier,
{
    pub fn new(
        source: F,
        detector: D,
        analyzer: FrameAnalyzer<Q>,
        sync: SessionSynchronizer<S, N>,
        absence_threshold: u32,
    ) -> Self {
        Self {
            source,
            detector,
            analyzer,
            sync,
            state: PresenceState::new(absence_threshold),
            max_frames: None,
            stats: LoopStats::default(),
        }
    }

    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Run one frame through the pipeline.
    pub async fn process_frame(&mut self, frame: &Frame) -> Result<(), EngineError> {
        let detections = self.detector.detect(frame)?;
        let observation = self.analyzer.analyze(frame, &detections);
        self.stats.frames += 1;

        let step = mem::take(&mut self.state).step(observation.face_present(), frame.captured_at);
        self.state = step.state;
        tracing::debug!(
            frame = frame.sequence,
            faces = observation.detections.len(),
            streak = self.state.no_face_streak(),
            "frame processed"
        );

        match step.event {
            Some(PresenceEvent::Arrived) => {
                let session = self
                    .sync
                    .open(observation.team, observation.shirt_colors, frame.captured_at)
                    .await;
                self.state = mem::take(&mut self.state).with_session(session);
                self.stats.arrivals += 1;
            }
            Some(PresenceEvent::Departed(session)) => {
                // The session stays closed in memory either way.
                if let Err(err) = self.sync.close(&session).await {
                    tracing::debug!(session_id = %session.id, error = %err, "departure not persisted");
                }
                self.stats.departures += 1;
            }
            None => {}
        }

        Ok(())
    }

    /// Pull frames until the source ends, the frame budget is spent, or
    /// `shutdown` flips to true.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<LoopStats, EngineError> {
        loop {
            if *shutdown.borrow_and_update() {
                tracing::info!(frames = self.stats.frames, "shutdown requested");
                break;
            }
            if self.max_frames.is_some_and(|max| self.stats.frames >= max) {
                tracing::info!(frames = self.stats.frames, "frame budget reached");
                break;
            }

            let Some(frame) = self.source.next_frame()? else {
                tracing::info!(frames = self.stats.frames, "frame source exhausted");
                break;
            };
            self.process_frame(&frame).await?;
            tokio::task::yield_now().await;
        }

        if let Some(session) = self.state.current_session().filter(|s| s.is_open()) {
            tracing::warn!(session_id = %session.id, "stopping with an open session");
        }
        Ok(self.stats)
    }
}
