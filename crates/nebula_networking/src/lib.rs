//! # NEBULA Networking - World Sync
//!
//! Keeps a local view of a remote, authoritative arena consistent, smooth
//! and cheap to transmit.
//!
//! ## Architecture
//!
//! - **Protocol**: positional JSON arrays, length-checked before decoding
//! - **Registry**: identity-stable entity store, rebuilt on every join
//! - **Reconciliation**: add → change → evict, in that order, per tick
//! - **Prediction**: dead reckoning with a speed calibrated from echoes
//! - **Interpolation**: shortest-path rotation across the ±180° seam
//! - **Client**: lifecycle state machine and throttled control output
//!
//! ## Data Flow
//!
//! ```text
//! SERVER                                CLIENT
//!   |                                     |
//!   |--- world.* / player.position ------>| queue → decode → registry
//!   |                                     | every frame: predict, smooth
//!   |<-- player.move (≤ 1 per 100ms) -----|
//!   |                                     |
//! ```
//!
//! The client never runs the simulation. It predicts between corrections and
//! accepts bounded error.
//!
//! ## Example
//!
//! ```rust,ignore
//! use nebula_networking::{SyncClient, SyncConfig, RecordingViews, RecordingTransport};
//!
//! let mut client = SyncClient::new(SyncConfig::default(), views, transport)?;
//! client.init(bounds)?;
//! client.start()?;
//! client.join(my_id);
//! loop {
//!     client.update(Instant::now(), FRAME);
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod client;
pub mod config;
pub mod error;
pub mod integration;
pub mod interpolation;
pub mod prediction;
pub mod protocol;
pub mod reconciliation;
pub mod registry;
pub mod simulation;

// Re-exports for convenience
pub use client::{ControlThrottle, ControlVector, GameState, LinkState, SyncClient, SyncStats};
pub use config::SyncConfig;
pub use error::{ConfigError, ConfigResult, LifecycleError, WireError, WireResult};
pub use integration::{
    RecordingTransport, RecordingViews, Transport, ViewBinder, ViewCall, ViewHandle, ViewSet,
};
pub use interpolation::{RotationSmoother, RotationTween, TweenPhase};
pub use prediction::{MotionPredictor, MotionState, SampleRejection, VelocityEstimator};
pub use protocol::{decode_event, InboundMessage, MoveCommand, ServerEvent, WorldTick};
pub use reconciliation::{ReconciliationEngine, TickReport};
pub use registry::{EntityRegistry, UpdateOutcome};
pub use simulation::{NetworkConditions, ScriptedWorld, WorldConfig, WorldStats};

/// Render/update loop rate of the reference client (frames per second).
pub const FRAME_RATE: u32 = 30;

/// Duration of one frame at [`FRAME_RATE`] in milliseconds.
pub const FRAME_DURATION_MS: u64 = 1000 / FRAME_RATE as u64;
