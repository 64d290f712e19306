//! Game Session Management
//!
//! One game session per connection. The session owns the run, the gesture
//! recording of the current attempt and the events and window changes not
//! yet sent to the client.
//!
//! The session task runs the tick loop at the configured rate. Between
//! ticks it applies queued commands; on each tick it drains the gesture
//! slot, simulates and emits frames at the snapshot cadence.

use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::config::GameConfig;
use crate::core::rng::{derive_run_seed, DeterministicRng};
use crate::game::events::GameEvent;
use crate::game::input::GestureRecording;
use crate::game::invariant::InvariantViolation;
use crate::game::level::Course;
use crate::game::observation::{GestureObservation, GestureSlot};
use crate::game::state::{RunMode, RunState};
use crate::game::tick::tick;
use crate::game::world::WindowDelta;
use crate::network::protocol::{
    hash_hex, CourseInfo, ErrorCode, FrameUpdate, ModeSelection, RunSummary, ServerError,
    ServerMessage,
};
use crate::network::scores::HighScoreBoard;

/// Unique session identifier. Also the key run seeds are derived from.
pub type SessionId = [u8; 16];

/// Fresh random session identifier.
pub fn new_session_id() -> SessionId {
    uuid::Uuid::new_v4().into_bytes()
}

/// Configuration for a game session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Simulation tuning.
    pub game: GameConfig,
    /// Ticks per second.
    pub tick_rate: u32,
    /// Send a frame every this many simulated ticks.
    pub snapshot_every: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            tick_rate: crate::TICK_RATE,
            snapshot_every: 2,
        }
    }
}

impl SessionConfig {
    /// Fixed tick interval in seconds.
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}

/// Commands applied between ticks.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Start,
    Restart,
    Reset,
    NextLevel,
    SelectMode {
        mode: ModeSelection,
        level: Option<u32>,
    },
    LoadCourse(Course),
    SubmitScore { name: String },
}

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("run invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("no finished run to submit")]
    NothingToSubmit,
}

/// Per-connection session.
pub struct GameSession {
    id: SessionId,
    config: SessionConfig,
    run: RunState,
    recording: GestureRecording,
    pending_events: Vec<GameEvent>,
    pending_window: WindowDelta,
    /// Last ended run, until its score is submitted.
    finished: Option<RunSummary>,
}

impl GameSession {
    /// New session with an idle endless run.
    pub fn new(id: SessionId, config: SessionConfig) -> Result<Self, SessionError> {
        let run = RunState::new(config.game.clone(), RunMode::Endless, id)?;
        let recording = GestureRecording::new(run.seed, run.mode.clone(), config.dt());

        Ok(Self {
            id,
            config,
            run,
            recording,
            pending_events: Vec::new(),
            pending_window: WindowDelta::default(),
            finished: None,
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Session id as hex.
    pub fn id_hex(&self) -> String {
        hex::encode(self.id)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn run(&self) -> &RunState {
        &self.run
    }

    /// Recording of the current attempt.
    pub fn recording(&self) -> &GestureRecording {
        &self.recording
    }

    /// Apply a run command.
    ///
    /// Commands that are invalid for the current phase are ignored.
    /// `SubmitScore` is handled by [`handle_command`], which owns the board.
    pub fn apply(&mut self, command: SessionCommand) -> Result<Vec<ServerMessage>, SessionError> {
        let mut replies = Vec::new();

        match command {
            SessionCommand::Start => {
                if self.run.start() {
                    self.begin_recording();
                }
            }
            SessionCommand::Restart => {
                if self.run.restart()? {
                    self.begin_recording();
                }
            }
            SessionCommand::Reset => {
                self.run.reset()?;
            }
            SessionCommand::NextLevel => {
                if self.run.next_level()? {
                    self.begin_recording();
                    replies.extend(self.course_loaded());
                }
            }
            SessionCommand::SelectMode { mode, level } => {
                let mode = match mode {
                    ModeSelection::Endless => RunMode::Endless,
                    ModeSelection::Heist => {
                        let seed = derive_run_seed(&self.id, self.run.attempt + 1);
                        let course = Course::generate(level.unwrap_or(0), &mut DeterministicRng::new(seed));
                        RunMode::Heist(course)
                    }
                };
                info!("Session {} selected {} mode", self.id_hex(), mode.label());
                self.run.select_mode(mode)?;
                replies.extend(self.course_loaded());
            }
            SessionCommand::LoadCourse(course) => {
                info!(
                    "Session {} loaded course {:?} ({} obstacles)",
                    self.id_hex(),
                    course.level.name,
                    course.len()
                );
                self.run.select_mode(RunMode::Heist(course))?;
                replies.extend(self.course_loaded());
            }
            SessionCommand::SubmitScore { .. } => {
                debug!("SubmitScore reached GameSession::apply, ignoring");
            }
        }

        Ok(replies)
    }

    /// Run one tick with the observation drained from the slot.
    ///
    /// Returns the messages to send. An invariant violation resets the run
    /// and is reported to the client; only a failing reset is an error.
    pub fn step(&mut self, observation: Option<GestureObservation>) -> Result<Vec<ServerMessage>, SessionError> {
        let result = match tick(&mut self.run, observation.as_ref(), self.config.dt()) {
            Ok(result) => result,
            Err(violation) => return self.recover(violation),
        };

        if result.simulated {
            self.recording.record(result.tick, observation.as_ref());
        }
        self.pending_events.extend(result.events);
        self.pending_window.extend(result.window);

        let ended_now = result.simulated && result.run_ended;
        let frame_due = if result.simulated {
            ended_now || result.tick % self.config.snapshot_every.max(1) == 0
        } else {
            !self.pending_events.is_empty() || !self.pending_window.is_empty()
        };

        let mut messages = Vec::new();
        if frame_due {
            messages.push(ServerMessage::Frame(self.frame()));
        }
        if ended_now {
            let summary = self.summary();
            info!(
                "Session {} run ended: {:?}, score {}, {} ticks",
                self.id_hex(),
                summary.phase,
                summary.score,
                summary.ticks
            );
            self.finished = Some(summary.clone());
            messages.push(ServerMessage::RunEnded(summary));
        }

        Ok(messages)
    }

    /// Drain pending events and window changes into a frame.
    pub fn frame(&mut self) -> FrameUpdate {
        FrameUpdate {
            snapshot: self.run.snapshot(),
            events: std::mem::take(&mut self.pending_events),
            window: std::mem::take(&mut self.pending_window),
            state_hash: hash_hex(&self.run.compute_hash()),
        }
    }

    /// Summary of the current attempt.
    pub fn summary(&self) -> RunSummary {
        let recording_hash = match self.recording.digest() {
            Ok(hash) => Some(hash_hex(&hash)),
            Err(e) => {
                warn!("Failed to encode recording: {}", e);
                None
            }
        };

        RunSummary {
            phase: self.run.phase(),
            mode: self.run.mode.label().to_string(),
            level: self.run.mode.course().map(|c| c.level.name.clone()),
            score: self.run.score(),
            distance: self.run.distance(),
            ticks: self.run.tick,
            obstacles_passed: self.run.machine.obstacles_passed(),
            seed: self.run.seed,
            recording_hash,
        }
    }

    /// Take the last ended run for score submission. Each run is submitted once.
    pub fn take_submission(&mut self) -> Result<RunSummary, SessionError> {
        self.finished.take().ok_or(SessionError::NothingToSubmit)
    }

    fn begin_recording(&mut self) {
        self.recording = GestureRecording::new(self.run.seed, self.run.mode.clone(), self.config.dt());
    }

    fn course_loaded(&self) -> Option<ServerMessage> {
        self.run
            .mode
            .course()
            .map(|course| ServerMessage::CourseLoaded(CourseInfo::from_course(course)))
    }

    fn recover(&mut self, violation: InvariantViolation) -> Result<Vec<ServerMessage>, SessionError> {
        error!(
            "Session {} tick {} violated an invariant: {}",
            self.id_hex(),
            self.run.tick,
            violation
        );

        self.run.reset()?;
        self.begin_recording();

        Ok(vec![ServerMessage::Error(ServerError::new(
            ErrorCode::RunReset,
            violation.to_string(),
        ))])
    }
}

/// Apply one command, including score submission.
pub async fn handle_command(
    session: &mut GameSession,
    command: SessionCommand,
    scores: &RwLock<HighScoreBoard>,
) -> Result<Vec<ServerMessage>, SessionError> {
    match command {
        SessionCommand::SubmitScore { name } => match session.take_submission() {
            Ok(summary) => {
                let rank = scores
                    .write()
                    .await
                    .submit(&name, summary.score, summary.level, Utc::now());
                Ok(vec![ServerMessage::ScoreSubmitted { rank }])
            }
            Err(e) => Ok(vec![ServerMessage::Error(ServerError::new(
                ErrorCode::NothingToSubmit,
                e.to_string(),
            ))]),
        },
        other => session.apply(other),
    }
}

/// Run the session tick loop until the client goes away.
///
/// Ends when the command channel or the outbound channel closes.
#[instrument(skip_all, fields(session = %session.id_hex()))]
pub async fn run_session_loop(
    mut session: GameSession,
    slot: GestureSlot,
    mut commands: mpsc::Receiver<SessionCommand>,
    outbound: mpsc::Sender<ServerMessage>,
    scores: Arc<RwLock<HighScoreBoard>>,
) -> Result<(), SessionError> {
    let tick_duration = Duration::from_micros(1_000_000 / session.config().tick_rate.max(1) as u64);
    let mut tick_interval = interval(tick_duration);
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    debug!("Session loop started");

    loop {
        tick_interval.tick().await;

        // Commands first, so a start takes effect on this tick
        loop {
            match commands.try_recv() {
                Ok(command) => {
                    for message in handle_command(&mut session, command, &scores).await? {
                        if outbound.send(message).await.is_err() {
                            return Ok(());
                        }
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("Command channel closed, ending session loop");
                    return Ok(());
                }
            }
        }

        for message in session.step(slot.take())? {
            if outbound.send(message).await.is_err() {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::level::LevelDescriptor;
    use crate::game::state::GamePhase;

    fn session() -> GameSession {
        GameSession::new([7; 16], SessionConfig::default()).unwrap()
    }

    fn course(tokens: &[&str]) -> Course {
        Course::from_tokens(
            LevelDescriptor {
                name: "Test Wing".to_string(),
                ..LevelDescriptor::default()
            },
            tokens,
        )
        .unwrap()
    }

    fn frames(messages: &[ServerMessage]) -> usize {
        messages
            .iter()
            .filter(|m| matches!(m, ServerMessage::Frame(_)))
            .count()
    }

    #[test]
    fn test_idle_session_flushes_initial_window_once() {
        let mut session = session();

        let first = session.step(None).unwrap();
        assert_eq!(frames(&first), 1);
        if let ServerMessage::Frame(frame) = &first[0] {
            assert!(!frame.window.spawned.is_empty());
            assert_eq!(frame.snapshot.phase, GamePhase::Idle);
        }

        // Nothing changes while idle
        assert!(session.step(None).unwrap().is_empty());
    }

    #[test]
    fn test_frames_follow_snapshot_cadence() {
        let mut session = GameSession::new(
            [1; 16],
            SessionConfig {
                snapshot_every: 3,
                ..SessionConfig::default()
            },
        )
        .unwrap();
        session.step(None).unwrap();
        session.apply(SessionCommand::Start).unwrap();

        let mut sent = 0;
        for _ in 0..9 {
            sent += frames(&session.step(None).unwrap());
        }

        assert_eq!(session.run().tick, 9);
        assert_eq!(sent, 3);
    }

    #[test]
    fn test_events_accumulate_between_frames() {
        let mut session = GameSession::new(
            [2; 16],
            SessionConfig {
                snapshot_every: 10,
                ..SessionConfig::default()
            },
        )
        .unwrap();
        session.apply(SessionCommand::Start).unwrap();

        // The start transition is only delivered with the first frame
        let mut first_frame = None;
        for _ in 0..10 {
            for message in session.step(None).unwrap() {
                if let ServerMessage::Frame(frame) = message {
                    first_frame.get_or_insert(frame);
                }
            }
        }

        let frame = first_frame.unwrap();
        assert!(frame.events.iter().any(|e| matches!(
            e.data,
            crate::game::events::GameEventData::PhaseChanged { new_phase: GamePhase::Playing, .. }
        )));
    }

    #[test]
    fn test_select_heist_replies_with_course() {
        let mut session = session();

        let replies = session
            .apply(SessionCommand::SelectMode {
                mode: ModeSelection::Heist,
                level: Some(1),
            })
            .unwrap();

        match &replies[..] {
            [ServerMessage::CourseLoaded(info)] => {
                assert_eq!(info.level.name, "Gallery 2");
                assert_eq!(info.catalog_index, Some(1));
                assert_eq!(info.length, 15);
            }
            other => panic!("unexpected replies {:?}", other),
        }
        assert_eq!(session.run().mode.label(), "heist");

        // Back to endless: no course
        let replies = session
            .apply(SessionCommand::SelectMode {
                mode: ModeSelection::Endless,
                level: None,
            })
            .unwrap();
        assert!(replies.is_empty());
        assert_eq!(session.run().mode, RunMode::Endless);
    }

    #[test]
    fn test_finished_run_can_be_submitted_once() {
        let mut session = session();
        session.apply(SessionCommand::LoadCourse(course(&[]))).unwrap();
        session.apply(SessionCommand::Start).unwrap();

        // Empty course completes on its first tick
        let messages = session.step(None).unwrap();
        let summary = messages
            .iter()
            .find_map(|m| match m {
                ServerMessage::RunEnded(summary) => Some(summary.clone()),
                _ => None,
            })
            .unwrap();

        assert_eq!(summary.phase, GamePhase::LevelComplete);
        assert_eq!(summary.level.as_deref(), Some("Test Wing"));
        assert!(summary.recording_hash.is_some());

        assert_eq!(session.take_submission().unwrap(), summary);
        assert!(matches!(session.take_submission(), Err(SessionError::NothingToSubmit)));
    }

    #[test]
    fn test_restart_starts_new_recording() {
        let mut session = session();
        session.apply(SessionCommand::LoadCourse(course(&[]))).unwrap();
        session.apply(SessionCommand::Start).unwrap();
        session.step(None).unwrap();
        let first_seed = session.recording().seed;

        session.apply(SessionCommand::Restart).unwrap();

        assert_eq!(session.run().phase(), GamePhase::Playing);
        assert_ne!(session.recording().seed, first_seed);
        assert_eq!(session.recording().end_tick, 0);
    }

    #[tokio::test]
    async fn test_submit_score_through_board() {
        let scores = RwLock::new(HighScoreBoard::default());
        let mut session = session();

        // Nothing finished yet
        let replies = handle_command(
            &mut session,
            SessionCommand::SubmitScore { name: "ana".into() },
            &scores,
        )
        .await
        .unwrap();
        assert!(matches!(
            &replies[..],
            [ServerMessage::Error(ServerError { code: ErrorCode::NothingToSubmit, .. })]
        ));

        session.apply(SessionCommand::LoadCourse(course(&[]))).unwrap();
        session.apply(SessionCommand::Start).unwrap();
        session.step(None).unwrap();

        let replies = handle_command(
            &mut session,
            SessionCommand::SubmitScore { name: "ana".into() },
            &scores,
        )
        .await
        .unwrap();
        assert!(matches!(&replies[..], [ServerMessage::ScoreSubmitted { rank: Some(1) }]));

        let board = scores.read().await;
        assert_eq!(board.len(), 1);
        assert_eq!(board.entries()[0].name, "ana");
        assert_eq!(board.entries()[0].level.as_deref(), Some("Test Wing"));
    }

    #[tokio::test]
    async fn test_session_loop_runs_until_commands_close() {
        let scores = Arc::new(RwLock::new(HighScoreBoard::default()));
        let slot = GestureSlot::new();
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(64);

        let handle = tokio::spawn(run_session_loop(session(), slot.clone(), cmd_rx, out_tx, scores));

        cmd_tx.send(SessionCommand::Start).await.unwrap();
        slot.publish(GestureObservation::neutral(0));

        let mut playing_frame = false;
        while let Ok(Some(message)) =
            tokio::time::timeout(Duration::from_secs(2), out_rx.recv()).await
        {
            if let ServerMessage::Frame(frame) = message {
                if frame.snapshot.phase == GamePhase::Playing && frame.snapshot.tick > 0 {
                    playing_frame = true;
                    break;
                }
            }
        }
        assert!(playing_frame);

        drop(cmd_tx);
        let result = tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap();
        assert!(result.unwrap().is_ok());
    }
}
