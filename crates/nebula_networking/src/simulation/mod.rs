//! # Scripted World
//!
//! A deterministic stand-in for the authoritative server.
//!
//! ## Features
//!
//! - Bots wandering at a fixed true speed
//! - Feeds spawned and consumed
//! - The local player moved by `player.move` commands
//! - Latency, jitter and loss on every outbound message
//!
//! The world speaks the same wire format as the real server, so the client
//! under test cannot tell the difference. All randomness comes from one
//! seeded [`ChaCha8Rng`].
//!
//! ## Delivery model
//!
//! The session runs over one ordered, reliable stream. A lost segment is
//! resent after a retransmission timeout and everything queued behind it
//! waits:
//!
//! ```text
//! sent:       m1   m2   m3   m4
//!                  (lost)
//! delivered:  m1 ─────────── m2 m3 m4
//!                 ◀── RTO ──▶
//! ```
//!
//! Messages are never dropped or reordered, only delayed.

use std::collections::HashSet;

use nebula_core::{
    Angular, EntityId, FeedSnapshot, PartialUpdate, PlayerSnapshot, Vec2, WorldBounds,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};

use crate::protocol::{encode_feed, encode_partial_update, encode_player, events, InboundMessage};

/// Delay before a lost segment is resent (ms).
pub const RETRANSMIT_TIMEOUT_MS: f64 = 200.0;

/// Network conditions for simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkConditions {
    /// Base latency in milliseconds.
    pub base_latency_ms: u32,
    /// Jitter (variance) in milliseconds.
    pub jitter_ms: u32,
    /// Segment loss percentage (0-100). Lost segments are retransmitted.
    pub loss_percent: u8,
}

impl NetworkConditions {
    /// Perfect network conditions (LAN).
    pub const PERFECT: Self = Self {
        base_latency_ms: 0,
        jitter_ms: 0,
        loss_percent: 0,
    };

    /// Good network conditions (fiber).
    pub const GOOD: Self = Self {
        base_latency_ms: 20,
        jitter_ms: 5,
        loss_percent: 0,
    };

    /// Average network conditions (cable).
    pub const AVERAGE: Self = Self {
        base_latency_ms: 50,
        jitter_ms: 20,
        loss_percent: 1,
    };

    /// Poor network conditions (mobile/wifi).
    pub const POOR: Self = Self {
        base_latency_ms: 100,
        jitter_ms: 50,
        loss_percent: 5,
    };

    /// Looks up a preset by name.
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "perfect" => Some(Self::PERFECT),
            "good" => Some(Self::GOOD),
            "average" => Some(Self::AVERAGE),
            "poor" => Some(Self::POOR),
            _ => None,
        }
    }

    /// Draws a one-way latency in milliseconds.
    pub fn sample_latency(&self, rng: &mut impl Rng) -> f64 {
        let jitter = if self.jitter_ms > 0 {
            let j = f64::from(self.jitter_ms);
            rng.gen_range(-j..=j)
        } else {
            0.0
        };
        (f64::from(self.base_latency_ms) + jitter).max(0.0)
    }

    /// Returns true if the segment carrying a message is lost in transit.
    pub fn segment_lost(&self, rng: &mut impl Rng) -> bool {
        self.loss_percent > 0 && rng.gen_range(0..100u8) < self.loss_percent
    }
}

impl Default for NetworkConditions {
    fn default() -> Self {
        Self::GOOD
    }
}

/// Configuration for the scripted world.
#[derive(Clone, Debug)]
pub struct WorldConfig {
    /// RNG seed.
    pub seed: u64,
    /// Speed at full traction (units per second).
    pub true_speed: f32,
    /// World rectangle.
    pub bounds: WorldBounds,
    /// Number of wandering bots.
    pub bot_count: usize,
    /// Number of feeds kept alive.
    pub feed_count: usize,
    /// Size of players.
    pub player_size: f32,
    /// Size of feeds.
    pub feed_size: f32,
    /// Chance per step that a bot picks a new heading.
    pub turn_chance: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 0x0b5e_55ed,
            true_speed: 240.0,
            bounds: WorldBounds::new(Vec2::new(-1000.0, -1000.0), Vec2::new(1000.0, 1000.0)),
            bot_count: 8,
            feed_count: 40,
            player_size: 30.0,
            feed_size: 10.0,
            turn_chance: 0.02,
        }
    }
}

/// A moving body in the scripted world.
#[derive(Clone, Debug)]
struct Body {
    id: EntityId,
    position: Vec2,
    heading: Vec2,
    traction: f32,
    score: f32,
}

/// Delivery counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldStats {
    /// Messages queued for delivery.
    pub messages_sent: u64,
    /// Messages that had to be retransmitted.
    pub messages_retransmitted: u64,
    /// Feeds eaten by bots.
    pub feeds_consumed: u64,
    /// Moves received from the client.
    pub moves_received: u64,
}

/// Deterministic authoritative world.
pub struct ScriptedWorld {
    config: WorldConfig,
    conditions: NetworkConditions,
    rng: ChaCha8Rng,
    clock_ms: f64,
    local: Body,
    bots: Vec<Body>,
    feeds: Vec<FeedSnapshot>,
    next_id: u64,
    in_flight: Vec<(f64, u64, InboundMessage)>,
    sequence: u64,
    last_delivery_ms: f64,
    last_echo_ms: f64,
    stats: WorldStats,
}

impl ScriptedWorld {
    /// Creates and populates a world.
    #[must_use]
    pub fn new(config: WorldConfig, conditions: NetworkConditions) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let center = config.bounds.center();
        let local = Body {
            id: EntityId(1),
            position: center,
            heading: Vec2::ZERO,
            traction: 0.0,
            score: 0.0,
        };

        let mut world = Self {
            config,
            conditions,
            rng,
            clock_ms: 0.0,
            local,
            bots: Vec::new(),
            feeds: Vec::new(),
            next_id: 2,
            in_flight: Vec::new(),
            sequence: 0,
            last_delivery_ms: 0.0,
            last_echo_ms: 0.0,
            stats: WorldStats::default(),
        };
        for _ in 0..world.config.bot_count {
            let id = world.allocate_id();
            let position = world.random_point(world.config.player_size * 0.5);
            let heading = world.random_heading();
            let traction = world.rng.gen_range(0.3..=1.0);
            world.bots.push(Body {
                id,
                position,
                heading,
                traction,
                score: 0.0,
            });
        }
        world.refill_feeds();
        world
    }

    /// Id of the player driven by the client.
    #[must_use]
    pub const fn local_id(&self) -> EntityId {
        self.local.id
    }

    /// World bounds.
    #[must_use]
    pub const fn bounds(&self) -> &WorldBounds {
        &self.config.bounds
    }

    /// True speed at full traction.
    #[must_use]
    pub const fn true_speed(&self) -> f32 {
        self.config.true_speed
    }

    /// Authoritative position of the local player.
    #[must_use]
    pub const fn local_position(&self) -> Vec2 {
        self.local.position
    }

    /// World clock (ms).
    #[must_use]
    pub const fn clock_ms(&self) -> f64 {
        self.clock_ms
    }

    /// Delivery counters.
    #[must_use]
    pub const fn stats(&self) -> &WorldStats {
        &self.stats
    }

    /// Ids of every live entity.
    #[must_use]
    pub fn current_ids(&self) -> HashSet<EntityId> {
        std::iter::once(self.local.id)
            .chain(self.bots.iter().map(|b| b.id))
            .chain(self.feeds.iter().map(|f| f.id))
            .collect()
    }

    /// Messages a fresh session receives: status, identity, full snapshot.
    ///
    /// Delivered immediately, in order, without loss.
    #[must_use]
    pub fn join_messages(&self) -> Vec<InboundMessage> {
        let b = &self.config.bounds;
        let half = self.config.player_size * 0.5;
        let status = json!({
            "world": { "bounds": { "minX": b.min_x, "minY": b.min_y, "maxX": b.max_x, "maxY": b.max_y } },
            "factions": [],
        });
        let me = json!({
            "uid": self.local.id.raw(),
            "size": self.config.player_size,
            "vertices": [{ "x": half, "y": 0.0 }, { "x": -half, "y": half }, { "x": -half, "y": -half }],
            "state": {
                "pos": { "x": self.local.position.x, "y": self.local.position.y },
                "angular": { "pos": 0.0, "vel": 0.0, "acc": 0.0 },
            },
            "score": self.local.score,
        });

        let mut objects: Vec<Value> = Vec::with_capacity(1 + self.bots.len() + self.feeds.len());
        objects.push(Value::Array(encode_player(&self.player_snapshot(&self.local))));
        for bot in &self.bots {
            objects.push(Value::Array(encode_player(&self.player_snapshot(bot))));
        }
        for feed in &self.feeds {
            objects.push(Value::Array(encode_feed(feed)));
        }

        vec![
            InboundMessage::event(events::GAME_STATUS, status),
            InboundMessage::event(events::PLAYER_ME, me),
            InboundMessage::event(
                events::NEW_OBJECTS,
                json!({ "current": self.sorted_ids(), "objects": objects }),
            ),
        ]
    }

    /// Applies a `player.move` payload `[hx, hy, traction]` from the client.
    ///
    /// Malformed payloads are ignored.
    pub fn receive_move(&mut self, payload: &Value) {
        let Some([hx, hy, t]) = payload
            .as_array()
            .and_then(|a| a.iter().map(Value::as_f64).collect::<Option<Vec<f64>>>())
            .and_then(|n| <[f64; 3]>::try_from(n).ok())
        else {
            tracing::debug!("Scripted world ignored move {}", payload);
            return;
        };
        self.local.heading = Vec2::new(hx as f32, hy as f32).normalize_or_zero();
        self.local.traction = (t as f32).clamp(0.0, 1.0);
        self.stats.moves_received += 1;
    }

    /// Advances the world by `dt_ms` and queues the resulting messages.
    pub fn step(&mut self, dt_ms: f64) {
        self.clock_ms += dt_ms;
        let dt = (dt_ms / 1000.0) as f32;
        let speed = self.config.true_speed;
        let area = self.config.bounds.inset(self.config.player_size * 0.5);

        self.local.position = area.clamp(
            self.local.position + self.local.heading * (speed * dt * self.local.traction),
        );

        for i in 0..self.bots.len() {
            if self.rng.gen_bool(self.config.turn_chance) {
                let heading = self.random_heading();
                self.bots[i].heading = heading;
                self.bots[i].traction = self.rng.gen_range(0.3..=1.0);
            }
            let bot = &mut self.bots[i];
            let next = bot.position + bot.heading * (speed * dt * bot.traction);
            let clamped = area.clamp(next);
            if clamped != next {
                // Bounce off the wall.
                bot.heading = Vec2::new(-bot.heading.x, -bot.heading.y);
            }
            bot.position = clamped;
        }

        let eaten = self.consume_feeds();
        let spawned = self.refill_feeds();
        self.queue_updates();

        if !eaten.is_empty() || !spawned.is_empty() {
            let objects: Vec<Value> = spawned
                .iter()
                .map(|f| Value::Array(encode_feed(f)))
                .collect();
            let name = if objects.is_empty() {
                events::REMOVED_OBJECTS
            } else {
                events::NEW_OBJECTS
            };
            let payload = json!({ "current": self.sorted_ids(), "objects": objects });
            self.queue(name, payload);
        }
    }

    /// Removes and returns every message due at the current clock, in
    /// delivery order.
    pub fn drain_due(&mut self) -> Vec<InboundMessage> {
        let now = self.clock_ms;
        let mut due: Vec<(f64, u64, InboundMessage)> = Vec::new();
        let mut i = 0;
        while i < self.in_flight.len() {
            if self.in_flight[i].0 <= now {
                due.push(self.in_flight.swap_remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        due.into_iter().map(|(_, _, m)| m).collect()
    }

    fn queue_updates(&mut self) {
        let mut records: Vec<Value> = Vec::with_capacity(self.bots.len() + 1);
        for body in std::iter::once(&self.local).chain(self.bots.iter()) {
            let update = PartialUpdate {
                id: body.id,
                size: self.config.player_size,
                heading: body.heading,
                traction: body.traction,
                position: body.position,
                score: body.score,
            };
            records.push(Value::Array(encode_partial_update(&update)));
        }
        self.queue(events::UPDATE_PLAYERS, Value::Array(records));

        let elapsed = self.clock_ms - self.last_echo_ms;
        self.last_echo_ms = self.clock_ms;
        self.queue(
            events::PLAYER_POSITION,
            json!([self.local.position.x, self.local.position.y, elapsed]),
        );
    }

    fn queue(&mut self, name: &str, payload: Value) {
        let mut latency = self.conditions.sample_latency(&mut self.rng);
        if self.conditions.segment_lost(&mut self.rng) {
            latency += RETRANSMIT_TIMEOUT_MS;
            self.stats.messages_retransmitted += 1;
        }
        // Nothing overtakes an earlier message on the stream.
        let deliver_at = (self.clock_ms + latency).max(self.last_delivery_ms);
        self.last_delivery_ms = deliver_at;
        self.sequence += 1;
        self.in_flight
            .push((deliver_at, self.sequence, InboundMessage::event(name, payload)));
        self.stats.messages_sent += 1;
    }

    fn consume_feeds(&mut self) -> Vec<EntityId> {
        let reach = (self.config.player_size + self.config.feed_size) * 0.5;
        let mut eaten = Vec::new();
        for bot in &mut self.bots {
            self.feeds.retain(|feed| {
                if feed.position.distance(bot.position) <= reach {
                    bot.score += 1.0;
                    eaten.push(feed.id);
                    false
                } else {
                    true
                }
            });
        }
        self.stats.feeds_consumed += eaten.len() as u64;
        eaten
    }

    fn refill_feeds(&mut self) -> Vec<FeedSnapshot> {
        let mut spawned = Vec::new();
        while self.feeds.len() < self.config.feed_count {
            let feed = FeedSnapshot {
                id: self.allocate_id(),
                size: self.config.feed_size,
                position: self.random_point(self.config.feed_size * 0.5),
            };
            self.feeds.push(feed);
            spawned.push(feed);
        }
        spawned
    }

    fn player_snapshot(&self, body: &Body) -> PlayerSnapshot {
        let half = self.config.player_size * 0.5;
        PlayerSnapshot {
            id: body.id,
            size: self.config.player_size,
            vertices: vec![
                Vec2::new(half, 0.0),
                Vec2::new(-half, half),
                Vec2::new(-half, -half),
            ],
            heading: body.heading,
            traction: body.traction,
            position: body.position,
            angular: Angular::default(),
            score: body.score,
            nickname: Some(format!("bot-{}", body.id.raw())),
            faction: None,
        }
    }

    fn sorted_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.current_ids().into_iter().map(EntityId::raw).collect();
        ids.sort_unstable();
        ids
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    fn random_point(&mut self, margin: f32) -> Vec2 {
        let area = self.config.bounds.inset(margin);
        Vec2::new(
            sample_span(&mut self.rng, area.min_x, area.max_x),
            sample_span(&mut self.rng, area.min_y, area.max_y),
        )
    }

    fn random_heading(&mut self) -> Vec2 {
        let angle: f32 = self.rng.gen_range(-std::f32::consts::PI..std::f32::consts::PI);
        Vec2::new(angle.cos(), angle.sin())
    }
}

fn sample_span(rng: &mut ChaCha8Rng, min: f32, max: f32) -> f32 {
    if max > min {
        rng.gen_range(min..max)
    } else {
        min
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{decode_event, ServerEvent};

    fn world(conditions: NetworkConditions) -> ScriptedWorld {
        ScriptedWorld::new(WorldConfig::default(), conditions)
    }

    #[test]
    fn test_join_messages_decode() {
        let w = world(NetworkConditions::PERFECT);
        let messages = w.join_messages();
        assert_eq!(messages.len(), 3);
        for message in &messages {
            let InboundMessage::Event { name, payload } = message else {
                panic!("unexpected disconnect");
            };
            let decoded = decode_event(name, payload).unwrap();
            assert!(decoded.dropped.is_empty(), "{name}: {:?}", decoded.dropped);
        }
    }

    #[test]
    fn test_same_seed_same_world() {
        let mut a = world(NetworkConditions::AVERAGE);
        let mut b = world(NetworkConditions::AVERAGE);
        for _ in 0..50 {
            a.step(33.0);
            b.step(33.0);
        }
        assert_eq!(a.drain_due(), b.drain_due());
        assert_eq!(a.stats(), b.stats());
    }

    #[test]
    fn test_move_drives_local_player() {
        let mut w = world(NetworkConditions::PERFECT);
        let start = w.local_position();
        w.receive_move(&json!([1.0, 0.0, 0.5]));
        w.step(1000.0);
        let moved = w.local_position().x - start.x;
        assert!((moved - w.true_speed() * 0.5).abs() < 1e-2);
    }

    #[test]
    fn test_malformed_move_ignored() {
        let mut w = world(NetworkConditions::PERFECT);
        w.receive_move(&json!([1.0, "x"]));
        assert_eq!(w.stats().moves_received, 0);
    }

    #[test]
    fn test_perfect_network_delivers_every_step() {
        let mut w = world(NetworkConditions::PERFECT);
        w.step(33.0);
        let due = w.drain_due();
        let mut saw_echo = false;
        for message in &due {
            if let InboundMessage::Event { name, payload } = message {
                if let Ok(decoded) = decode_event(name, payload) {
                    if let ServerEvent::PlayerPosition(echo) = decoded.value {
                        assert_eq!(echo.elapsed_ms, Some(33.0));
                        saw_echo = true;
                    }
                }
            }
        }
        assert!(saw_echo);
        assert_eq!(w.stats().messages_retransmitted, 0);
    }

    #[test]
    fn test_lossy_stream_keeps_every_echo_in_order() {
        let mut w = world(NetworkConditions::POOR);
        let steps = 600;
        let mut echoes = 0;
        for _ in 0..steps {
            w.step(33.0);
            for message in w.drain_due() {
                let InboundMessage::Event { name, payload } = message else {
                    continue;
                };
                if name != events::PLAYER_POSITION {
                    continue;
                }
                let Ok(decoded) = decode_event(&name, &payload) else {
                    continue;
                };
                if let ServerEvent::PlayerPosition(echo) = decoded.value {
                    assert_eq!(echo.elapsed_ms, Some(33.0));
                    echoes += 1;
                }
            }
        }
        // Let the tail of the stream arrive without stepping the world.
        w.clock_ms += 1000.0;
        echoes += w
            .drain_due()
            .iter()
            .filter(|m| matches!(m, InboundMessage::Event { name, .. } if name == events::PLAYER_POSITION))
            .count();

        assert!(w.stats().messages_retransmitted > 0);
        assert_eq!(echoes, steps);
    }

    #[test]
    fn test_latency_holds_messages() {
        let mut w = world(NetworkConditions::POOR);
        w.step(1.0);
        // Poor latency is at least 50ms; nothing is due 1ms in.
        assert!(w.drain_due().is_empty());
        w.step(500.0);
        assert!(!w.drain_due().is_empty());
    }

    #[test]
    fn test_presets() {
        assert_eq!(NetworkConditions::preset("poor"), Some(NetworkConditions::POOR));
        assert!(NetworkConditions::preset("lunar").is_none());
    }
}
