//! # Sync Client
//!
//! Client-side world sync with prediction and smoothing.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       SYNC CLIENT                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  inbound queue ──▶ decode ──▶ ReconciliationEngine          │
//! │                        │            │                       │
//! │                        ▼            ▼                       │
//! │              VelocityEstimator   EntityRegistry             │
//! │                        │            │                       │
//! │                        └─────┬──────┘                       │
//! │                              ▼                              │
//! │            MotionPredictor + RotationSmoother (per frame)   │
//! │                              │                              │
//! │                              ▼                              │
//! │                         ViewBinder                          │
//! │                                                             │
//! │  direct_player ──▶ ControlThrottle ──▶ Transport            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs on the caller's loop thread. The transport only pushes
//! into the inbound queue; the queue is drained at the start of each
//! [`SyncClient::update`], never concurrently with prediction.

mod controls;
mod throttle;

pub use controls::ControlVector;
pub use throttle::ControlThrottle;

use std::fmt;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use nebula_core::{heading_degrees, EntityId, EntityKind, EntitySnapshot, Vec2, WorldBounds};

use crate::config::SyncConfig;
use crate::error::{ConfigResult, LifecycleError};
use crate::integration::{Transport, ViewBinder};
use crate::interpolation::RotationSmoother;
use crate::prediction::{MotionPredictor, VelocityEstimator};
use crate::protocol::{decode_event, events, InboundMessage, PositionEcho, ServerEvent, WorldTick};
use crate::reconciliation::{ReconciliationEngine, TickReport};

/// Top-level game lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GameState {
    /// Nothing set up yet.
    #[default]
    NotInitialized,
    /// World bounds known, waiting for start.
    Initializing,
    /// Prediction and sends active.
    Running,
    /// Frozen; inbound is still drained.
    Paused,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotInitialized => "not-initialized",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Session state, separate from the game lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkState {
    /// Never joined.
    #[default]
    Idle,
    /// Joined a session.
    Joined,
    /// Transport reported a disconnect.
    Disconnected,
}

/// Running counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Ticks applied to the registry.
    pub ticks_applied: u64,
    /// Records or messages dropped while decoding.
    pub records_dropped: u64,
    /// Partial updates for unknown ids.
    pub unknown_id_updates: u64,
    /// Player updates that named a non-player entity.
    pub wrong_kind_updates: u64,
    /// Duplicate adds ignored.
    pub duplicate_adds: u64,
    /// Entities evicted by reconciliation.
    pub entities_evicted: u64,
    /// `player.move` messages sent.
    pub moves_sent: u64,
    /// Velocity samples accepted.
    pub velocity_samples_accepted: u64,
    /// Velocity samples rejected.
    pub velocity_samples_rejected: u64,
}

impl SyncStats {
    fn record_tick(&mut self, report: &TickReport) {
        self.ticks_applied += 1;
        self.unknown_id_updates += report.unknown_ids as u64;
        self.wrong_kind_updates += report.wrong_kind as u64;
        self.duplicate_adds += report.duplicates as u64;
        self.entities_evicted += report.evicted.len() as u64;
    }
}

/// Client-side sync engine for one player.
pub struct SyncClient<V: ViewBinder, T: Transport> {
    /// Configuration.
    config: SyncConfig,
    /// Game lifecycle.
    state: GameState,
    /// Session state.
    link: LinkState,
    /// Local player id for the current session.
    local_id: Option<EntityId>,
    /// Set after join/reset until a full `world.newObjects` arrives.
    awaiting_snapshot: bool,
    /// World rectangle for clamping.
    bounds: WorldBounds,
    /// Registry and view bindings.
    engine: ReconciliationEngine<V>,
    /// Speed calibration.
    estimator: VelocityEstimator,
    /// Dead reckoning.
    predictor: MotionPredictor,
    /// Rotation tweens.
    rotations: RotationSmoother,
    /// Outbound rate limit.
    throttle: ControlThrottle,
    /// Outbound transport.
    transport: T,
    /// Inbound queue, sending half (handed to the transport).
    inbound_tx: Sender<InboundMessage>,
    /// Inbound queue, receiving half.
    inbound_rx: Receiver<InboundMessage>,
    /// Latest local control.
    control: ControlVector,
    /// Last position echo and when it arrived.
    last_echo: Option<(Vec2, Instant)>,
    /// Counters.
    stats: SyncStats,
}

impl<V: ViewBinder, T: Transport> SyncClient<V, T> {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration fails validation.
    pub fn new(config: SyncConfig, views: V, transport: T) -> ConfigResult<Self> {
        config.validate()?;
        let (inbound_tx, inbound_rx) = crossbeam_channel::unbounded();
        let mut throttle = ControlThrottle::new(config.throttle_interval());
        throttle.disable();

        Ok(Self {
            state: GameState::NotInitialized,
            link: LinkState::Idle,
            local_id: None,
            awaiting_snapshot: true,
            bounds: WorldBounds::default(),
            engine: ReconciliationEngine::new(views),
            estimator: VelocityEstimator::new(&config),
            predictor: MotionPredictor::new(&config),
            rotations: RotationSmoother::new(config.rotation_duration_ms),
            throttle,
            transport,
            inbound_tx,
            inbound_rx,
            control: ControlVector::default(),
            last_echo: None,
            stats: SyncStats::default(),
            config,
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// NotInitialized → Initializing.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] from any other state.
    pub fn init(&mut self, bounds: WorldBounds) -> Result<(), LifecycleError> {
        self.transition(GameState::Initializing, &[GameState::NotInitialized])?;
        self.bounds = bounds;
        Ok(())
    }

    /// Initializing | Paused → Running.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] from any other state.
    pub fn start(&mut self) -> Result<(), LifecycleError> {
        self.transition(
            GameState::Running,
            &[GameState::Initializing, GameState::Paused],
        )
    }

    /// Running → Paused.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] from any other state.
    pub fn pause(&mut self) -> Result<(), LifecycleError> {
        self.transition(GameState::Paused, &[GameState::Running])
    }

    /// Forces Paused and discards all predicted and registry state.
    ///
    /// A full snapshot is required before controls are sent again.
    pub fn reset(&mut self) {
        let destroyed = self.engine.clear().len();
        self.engine.set_local_player_id(self.local_id);
        self.rotations.clear();
        self.estimator.reset();
        self.throttle.disable();
        self.control = ControlVector::default();
        self.last_echo = None;
        self.awaiting_snapshot = true;
        tracing::info!(
            "Reset from {} ({} entities discarded)",
            self.state,
            destroyed
        );
        self.state = GameState::Paused;
    }

    fn transition(&mut self, to: GameState, allowed: &[GameState]) -> Result<(), LifecycleError> {
        if !allowed.contains(&self.state) {
            return Err(LifecycleError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        tracing::info!("Game state {} -> {}", self.state, to);
        self.state = to;
        Ok(())
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Starts a session as `local_id`.
    ///
    /// The registry is rebuilt from scratch; controls are held back until the
    /// first `world.newObjects` of the session arrives.
    pub fn join(&mut self, local_id: EntityId) {
        let discarded = self.engine.clear().len();
        self.rotations.clear();
        self.local_id = Some(local_id);
        self.engine.set_local_player_id(Some(local_id));
        self.link = LinkState::Joined;
        self.awaiting_snapshot = true;
        self.throttle.disable();
        self.last_echo = None;
        tracing::info!("Joined as {} ({} stale entities discarded)", local_id, discarded);
    }

    fn handle_disconnect(&mut self) {
        if self.link == LinkState::Disconnected {
            return;
        }
        self.link = LinkState::Disconnected;
        self.awaiting_snapshot = true;
        self.throttle.disable();
        tracing::info!(
            "Disconnected; {} entities frozen",
            self.engine.registry().len()
        );
    }

    /// Records the local control vector and queues it for sending.
    ///
    /// The control always steers local prediction.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotJoined`] when there is no live session;
    /// nothing is queued for sending in that case.
    pub fn direct_player(&mut self, now: Instant, control: ControlVector) -> Result<(), LifecycleError> {
        self.control = control;
        let (registry, _) = self.engine.parts_mut();
        if let Some(me) = registry.local_player_mut() {
            me.heading = control.heading;
            me.traction = control.traction;
        }
        if self.link != LinkState::Joined {
            return Err(LifecycleError::NotJoined);
        }
        self.throttle.submit(now, control.to_command());
        Ok(())
    }

    /// Steers toward a pointer at `pointer` on a screen of size `screen`.
    ///
    /// Traction saturates at the configured live area.
    ///
    /// # Errors
    ///
    /// Same as [`Self::direct_player`].
    pub fn direct_pointer(&mut self, now: Instant, pointer: Vec2, screen: Vec2) -> Result<(), LifecycleError> {
        let control =
            ControlVector::from_pointer(pointer, screen, self.config.pointer_live_area_ratio);
        self.direct_player(now, control)
    }

    // =========================================================================
    // Frame
    // =========================================================================

    /// Sending half of the inbound queue, for the transport.
    #[must_use]
    pub fn inbound_sender(&self) -> Sender<InboundMessage> {
        self.inbound_tx.clone()
    }

    /// Runs one frame.
    ///
    /// Drains the inbound queue, then, while Running, predicts every entity,
    /// pushes views and releases a throttled control if one is due.
    pub fn update(&mut self, now: Instant, frame_dt: Duration) {
        while let Ok(message) = self.inbound_rx.try_recv() {
            self.handle_message(message, now);
        }

        if self.state != GameState::Running {
            return;
        }

        self.advance(frame_dt);

        if let Some(command) = self.throttle.poll(now) {
            self.transport
                .emit(events::PLAYER_MOVE, command.to_payload(self.config.control_precision));
            self.stats.moves_sent += 1;
        }
    }

    fn advance(&mut self, frame_dt: Duration) {
        let dt = frame_dt.as_secs_f32();
        let dt_ms = dt * 1000.0;
        let speed = self.estimator.estimate();
        let frozen = self.link != LinkState::Joined;
        // The local player faces its input, not the last echoed heading.
        let local_target =
            (self.control.heading != Vec2::ZERO).then(|| self.control.rotation_degrees());
        let (registry, views) = self.engine.parts_mut();

        for entity in registry.all_mut() {
            if frozen && !entity.is_local {
                continue;
            }
            self.predictor.step(entity, dt, speed, &self.bounds);
            views.set_position(entity.id, entity.position);

            if entity.kind == EntityKind::Player {
                let target = match local_target {
                    Some(degrees) if entity.is_local => degrees,
                    _ => heading_degrees(entity.heading),
                };
                let rotation = self.rotations.update(entity.id, target, dt_ms);
                views.set_rotation(entity.id, rotation);
            }
        }
    }

    /// Applies one inbound message immediately.
    pub fn handle_message(&mut self, message: InboundMessage, now: Instant) {
        let (name, payload) = match message {
            InboundMessage::Disconnected => {
                self.handle_disconnect();
                return;
            }
            InboundMessage::Event { name, payload } => (name, payload),
        };

        let decoded = match decode_event(&name, &payload) {
            Ok(decoded) => decoded,
            Err(err) => {
                self.stats.records_dropped += 1;
                if err.is_warning() {
                    tracing::warn!("Ignored {}: {}", name, err);
                } else {
                    tracing::warn!("Dropped {}: {}", name, err);
                }
                return;
            }
        };
        for err in &decoded.dropped {
            tracing::warn!("Dropped record in {}: {}", name, err);
        }
        self.stats.records_dropped += decoded.dropped.len() as u64;

        match decoded.value {
            ServerEvent::Tick(tick) => self.apply_tick(&name, &tick),
            ServerEvent::PlayerPosition(echo) => self.apply_position_echo(echo, now),
            ServerEvent::PlayerMe(me) => {
                if self.link != LinkState::Joined {
                    tracing::debug!("player.me outside a session ignored");
                    return;
                }
                if self.local_id.is_some_and(|id| id != me.id) {
                    tracing::warn!("player.me for {} replaces local id", me.id);
                }
                self.local_id = Some(me.id);
                if self.engine.bind_local(&EntitySnapshot::Player(me)) {
                    tracing::debug!("Local player created");
                }
            }
            ServerEvent::GameStatus(status) => {
                tracing::info!(
                    "World bounds {:?}, {} factions",
                    status.bounds,
                    status.faction_ids.len()
                );
                self.bounds = status.bounds;
            }
            ServerEvent::Notice { name, payload } => {
                tracing::info!("{}: {}", name, payload);
            }
        }
    }

    fn apply_tick(&mut self, name: &str, tick: &WorldTick) {
        if self.link != LinkState::Joined {
            tracing::debug!("{} outside a session ignored", name);
            return;
        }
        let report = self.engine.apply_tick(tick);
        for id in &report.evicted {
            self.rotations.remove(*id);
        }
        self.stats.record_tick(&report);

        if self.awaiting_snapshot && name == events::NEW_OBJECTS {
            self.awaiting_snapshot = false;
            self.throttle.enable();
            tracing::info!(
                "Full snapshot received ({} entities), controls enabled",
                self.engine.registry().len()
            );
        }
    }

    fn apply_position_echo(&mut self, echo: PositionEcho, now: Instant) {
        let previous = self.last_echo;
        let (registry, _) = self.engine.parts_mut();
        let Some(me) = registry.local_player_mut() else {
            tracing::debug!("Position echo before local player exists");
            return;
        };

        if let Some((old, at)) = previous {
            let elapsed_ms = echo
                .elapsed_ms
                .unwrap_or_else(|| now.saturating_duration_since(at).as_secs_f32() * 1000.0);
            match self.estimator.observe(old, echo.position, elapsed_ms, me.traction) {
                Ok(_) => self.stats.velocity_samples_accepted += 1,
                Err(_) => self.stats.velocity_samples_rejected += 1,
            }
        }
        me.authoritative = echo.position;
        self.last_echo = Some((echo.position, now));
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Game lifecycle state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> GameState {
        self.state
    }

    /// Session state.
    #[inline]
    #[must_use]
    pub const fn link(&self) -> LinkState {
        self.link
    }

    /// Local player id for the current session.
    #[inline]
    #[must_use]
    pub const fn local_id(&self) -> Option<EntityId> {
        self.local_id
    }

    /// Returns true if controls are currently sent.
    #[must_use]
    pub const fn controls_enabled(&self) -> bool {
        self.throttle.is_enabled()
    }

    /// World bounds in use.
    #[inline]
    #[must_use]
    pub const fn bounds(&self) -> &WorldBounds {
        &self.bounds
    }

    /// Latest local control.
    #[inline]
    #[must_use]
    pub const fn control(&self) -> ControlVector {
        self.control
    }

    /// Counters.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Registry and view bindings.
    #[must_use]
    pub const fn engine(&self) -> &ReconciliationEngine<V> {
        &self.engine
    }

    /// Speed calibration.
    #[must_use]
    pub const fn estimator(&self) -> &VelocityEstimator {
        &self.estimator
    }

    /// Rotation tweens.
    #[must_use]
    pub const fn rotations(&self) -> &RotationSmoother {
        &self.rotations
    }

    /// The view binder.
    #[must_use]
    pub const fn views(&self) -> &V {
        self.engine.views().binder()
    }

    /// The transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// The transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }
}
