//! Game session: the single owner of the authoritative world.
//!
//! One task holds the `GameState` and alternates between the inbound
//! command channel and the tick interval, so every command's effects land
//! atomically between ticks and nothing needs a lock. Connection tasks talk
//! to it through `SessionHandle`; broadcasts leave through bounded
//! per-client outbound queues so one slow client can never stall the loop.
//!
//! Tick order: scheduled tasks, inactivity sweep, bot (re)spawn, bot
//! advance, weapon fire resolution, full-snapshot broadcast.

use std::sync::Arc;
use std::time::Instant;

use hashbrown::HashMap;
use smallvec::SmallVec;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::game::schedule::Task;
use crate::game::state::{EliminationReason, GameState, PlayerId};
use crate::game::systems::{bot, combat};
use crate::game::systems::combat::CombatEvent;
use crate::game::tuning::Tuning;
use crate::net::protocol::{
    encode, BotSnapshot, ClientMessage, GameSnapshot, InitialState, PlayerSnapshot, ServerMessage,
};
use crate::util::vec2::Vec2;

/// Frames queued per client before the slowest ones start dropping
const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Stats line cadence, in seconds of ticks
const STATS_INTERVAL_SECS: u64 = 30;

/// Encoded frame handed to every client's writer task
pub type OutboundFrame = Arc<Vec<u8>>;

/// Commands delivered to the session task by connection tasks
#[derive(Debug)]
pub enum Command {
    /// A client finished its handshake; `outbound` is its frame queue
    Connect {
        id: PlayerId,
        outbound: mpsc::Sender<OutboundFrame>,
    },
    /// The client's connection is gone (close, error, or leave)
    Disconnect { id: PlayerId },
    /// A decoded inbound message from this client
    Message { id: PlayerId, message: ClientMessage },
}

/// Cloneable handle connection tasks use to reach the session task
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl SessionHandle {
    /// Queue a command; a closed session means shutdown, so errors are moot
    pub fn send(&self, command: Command) {
        let _ = self.tx.send(command);
    }
}

/// Spawn the session task and return the handle connections use
pub fn spawn(config: ServerConfig, tuning: Tuning) -> SessionHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(config, tuning, rx));
    SessionHandle { tx }
}

async fn run(config: ServerConfig, tuning: Tuning, mut rx: mpsc::UnboundedReceiver<Command>) {
    let tick_duration = config.tick_duration();
    let mut session = GameSession::new(&config, tuning);

    let mut ticker = interval(tick_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Game session started at {} Hz", config.tick_rate);
    let start = Instant::now();
    let mut last_tick = start;

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(command) => {
                    let now_ms = start.elapsed().as_millis() as u64;
                    session.handle_command(command, now_ms);
                }
                // Every handle dropped: the endpoint is shutting down.
                None => break,
            },
            _ = ticker.tick() => {
                let now = Instant::now();
                let delta_ms = now.duration_since(last_tick).as_secs_f32() * 1000.0;
                last_tick = now;
                let now_ms = now.duration_since(start).as_millis() as u64;
                session.tick(now_ms, delta_ms);
            }
        }
    }

    info!("Game session stopped");
}

/// The session state machine. Synchronous by design; only the session task
/// calls into it.
pub struct GameSession {
    state: GameState,
    clients: HashMap<PlayerId, mpsc::Sender<OutboundFrame>>,
    bot_enabled: bool,
    test_mode: bool,
    stats_interval_ticks: u64,
}

impl GameSession {
    pub fn new(config: &ServerConfig, tuning: Tuning) -> Self {
        let tick_interval_ms = config.tick_duration().as_millis() as u64;
        Self {
            state: GameState::new(tuning, tick_interval_ms),
            clients: HashMap::new(),
            bot_enabled: config.bot_enabled,
            test_mode: config.test_mode,
            stats_interval_ticks: (config.tick_rate as u64 * STATS_INTERVAL_SECS).max(1),
        }
    }

    /// Direct world access, for tests and benchmarks
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Direct mutable world access, for tests and benchmarks
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn handle_command(&mut self, command: Command, now_ms: u64) {
        match command {
            Command::Connect { id, outbound } => self.on_connect(id, outbound, now_ms),
            Command::Disconnect { id } => self.on_disconnect(id),
            Command::Message { id, message } => self.on_message(id, message, now_ms),
        }
    }

    fn on_connect(&mut self, id: PlayerId, outbound: mpsc::Sender<OutboundFrame>, now_ms: u64) {
        self.clients.insert(id, outbound);
        self.state.add_player(id, now_ms);
        info!(player = %id, players = self.state.player_count(), "Player joined");

        let arena = &self.state.tuning().arena;
        let initial = InitialState {
            your_id: id,
            arena_width: arena.width,
            arena_height: arena.height,
            obstacles: self.state.obstacles.clone(),
            players: self
                .state
                .players
                .values()
                .map(PlayerSnapshot::from_player)
                .collect(),
            bot: self.state.bot.as_ref().map(BotSnapshot::from_bot),
        };
        self.unicast(&id, &ServerMessage::GameState(initial));
        self.unicast(
            &id,
            &ServerMessage::GameConfig {
                bot_enabled: self.bot_enabled,
                test_mode: self.test_mode,
            },
        );
        self.unicast(
            &id,
            &ServerMessage::TestModeStatus {
                enabled: self.test_mode,
            },
        );

        if let Some(player) = self.state.get_player(&id) {
            let joined = ServerMessage::PlayerJoined {
                player: PlayerSnapshot::from_player(player),
            };
            self.broadcast_except(&id, &joined);
        }
    }

    fn on_disconnect(&mut self, id: PlayerId) {
        self.clients.remove(&id);
        if self.state.remove_player(&id).is_some() {
            info!(player = %id, players = self.state.player_count(), "Player left");
            self.broadcast(&ServerMessage::PlayerLeft { id });
        }
    }

    fn on_message(&mut self, id: PlayerId, message: ClientMessage, now_ms: u64) {
        if !message.is_valid() {
            warn!(player = %id, "Dropping message with non-finite numbers");
            return;
        }

        match message {
            ClientMessage::PlayerUpdate {
                position,
                rotation,
                velocity,
            } => {
                let velocity = velocity.unwrap_or(Vec2::ZERO);
                if !self.state.update_player(&id, position, rotation, velocity, now_ms) {
                    // Update raced a disconnect; stale ids are a miss.
                    return;
                }
                let events = combat::resolve_bot_contact(&mut self.state, &id);
                self.emit_combat_events(&events);
                let events = combat::resolve_obstacle_contact(&mut self.state, &id, now_ms);
                self.emit_combat_events(&events);
            }
            ClientMessage::Collision { target_id, .. } => {
                // The reported force is ignored; damage comes from registry
                // velocities only.
                let events = combat::resolve_player_collision(&mut self.state, &id, &target_id);
                self.emit_combat_events(&events);
            }
            ClientMessage::BoostActivated => {
                self.broadcast_except(&id, &ServerMessage::PlayerBoosting { id });
            }
            ClientMessage::PlayerDied { id: reported } => {
                if reported != id {
                    warn!(player = %id, reported = %reported, "Dropping death report for another player");
                    return;
                }
                if self.state.mark_eliminated(&id) {
                    self.broadcast(&ServerMessage::PlayerEliminated {
                        id,
                        reason: EliminationReason::SelfReported,
                    });
                }
            }
            ClientMessage::RequestRespawn => {
                if let Some(position) = self.state.respawn_player(&id, now_ms) {
                    let health = self.state.tuning().player.max_health;
                    self.broadcast(&ServerMessage::PlayerRespawned {
                        id,
                        position,
                        health,
                    });
                }
            }
            ClientMessage::UpdateScore { trick_score, kills } => {
                if let Some((trick_score, kills)) = self.state.record_score(&id, trick_score, kills)
                {
                    let score = self.state.get_player(&id).map_or(0, |p| p.score);
                    self.broadcast(&ServerMessage::ScoreUpdate {
                        id,
                        score,
                        trick_score,
                        kills,
                    });
                }
            }
        }
    }

    /// One authoritative tick: drain due tasks, sweep the inactive, keep the
    /// bot alive and moving, resolve its fire, broadcast the world.
    pub fn tick(&mut self, now_ms: u64, delta_ms: f32) {
        self.state.tick += 1;

        self.drain_scheduled_tasks(now_ms);
        self.sweep_inactive(now_ms);

        // Initial spawn. A destroyed bot stays in place (alive=false) until
        // its scheduled respawn replaces it, so this fires only once.
        if self.bot_enabled && self.state.bot.is_none() {
            self.spawn_bot(now_ms);
        }

        if let Some(frame) = bot::advance(&mut self.state, now_ms, delta_ms) {
            if frame.did_fire {
                if let Some(b) = self.state.live_bot() {
                    self.broadcast(&ServerMessage::BotFired {
                        position: b.position,
                        rotation: b.rotation,
                    });
                }
                let events = combat::resolve_machine_gun_fire(&mut self.state);
                self.emit_combat_events(&events);
            }
        }

        if let Some(b) = self.state.live_bot() {
            let update = ServerMessage::BotUpdate {
                bot: BotSnapshot::from_bot(b),
            };
            self.broadcast(&update);
        }

        let snapshot = GameSnapshot::from_state(&self.state);
        self.broadcast(&ServerMessage::GameUpdate(snapshot));

        if self.state.tick % self.stats_interval_ticks == 0 {
            let bot_state = self.state.bot.as_ref().map(|b| b.state);
            info!(
                tick = self.state.tick,
                players = self.state.player_count(),
                bot = ?bot_state,
                "Session stats"
            );
        }
    }

    fn drain_scheduled_tasks(&mut self, now_ms: u64) {
        while let Some(task) = self.state.schedule.pop_due(self.state.tick) {
            match task {
                Task::ClearInvincibility(id) => {
                    self.state.clear_invincibility(&id, now_ms);
                }
                Task::RespawnPlayer(id) => {
                    if let Some(position) = self.state.respawn_player(&id, now_ms) {
                        let health = self.state.tuning().player.max_health;
                        self.broadcast(&ServerMessage::PlayerRespawned {
                            id,
                            position,
                            health,
                        });
                    }
                }
                Task::SpawnBot => {
                    if self.bot_enabled {
                        self.spawn_bot(now_ms);
                    }
                }
            }
        }
    }

    fn sweep_inactive(&mut self, now_ms: u64) {
        for id in self.state.sweep_inactive(now_ms) {
            warn!(player = %id, "Evicting inactive player");
            self.clients.remove(&id);
            self.broadcast(&ServerMessage::PlayerEliminated {
                id,
                reason: EliminationReason::Inactivity,
            });
            self.broadcast(&ServerMessage::PlayerLeft { id });
        }
    }

    fn spawn_bot(&mut self, now_ms: u64) {
        let bot = self.state.spawn_bot(now_ms);
        let spawned = ServerMessage::BotSpawned {
            bot: BotSnapshot::from_bot(bot),
        };
        info!("Bot spawned");
        self.broadcast(&spawned);
    }

    fn emit_combat_events(&mut self, events: &[CombatEvent]) {
        let mut messages: SmallVec<[ServerMessage; 4]> = SmallVec::new();
        for event in events {
            match *event {
                CombatEvent::PlayerDamaged {
                    id,
                    health,
                    damage,
                    kind,
                } => messages.push(ServerMessage::PlayerDamaged {
                    id,
                    health,
                    damage,
                    kind,
                }),
                CombatEvent::PlayerEliminated { id, reason } => {
                    messages.push(ServerMessage::PlayerEliminated { id, reason });
                }
                CombatEvent::BotEliminated {
                    eliminated_by,
                    points,
                } => {
                    messages.push(ServerMessage::BotEliminated {
                        eliminated_by,
                        points,
                    });
                    // Exactly one such event per bot death, so the respawn
                    // is scheduled exactly once.
                    let delay = self.state.tuning().bot.respawn_delay_ms;
                    self.state.schedule_in_ms(delay, Task::SpawnBot);
                }
                CombatEvent::ScoreUpdate {
                    id,
                    score,
                    trick_score,
                    kills,
                } => messages.push(ServerMessage::ScoreUpdate {
                    id,
                    score,
                    trick_score,
                    kills,
                }),
            }
        }
        for message in &messages {
            self.broadcast(message);
        }
    }

    fn unicast(&self, id: &PlayerId, message: &ServerMessage) {
        let frame = match encode(message) {
            Ok(data) => Arc::new(data),
            Err(e) => {
                warn!("Failed to encode unicast message: {}", e);
                return;
            }
        };
        if let Some(outbound) = self.clients.get(id) {
            Self::deliver(id, outbound, frame);
        }
    }

    fn broadcast(&self, message: &ServerMessage) {
        if self.clients.is_empty() {
            return;
        }
        let frame = match encode(message) {
            Ok(data) => Arc::new(data),
            Err(e) => {
                warn!("Failed to encode broadcast message: {}", e);
                return;
            }
        };
        for (id, outbound) in &self.clients {
            Self::deliver(id, outbound, frame.clone());
        }
    }

    fn broadcast_except(&self, skip: &PlayerId, message: &ServerMessage) {
        if self.clients.len() <= 1 {
            return;
        }
        let frame = match encode(message) {
            Ok(data) => Arc::new(data),
            Err(e) => {
                warn!("Failed to encode broadcast message: {}", e);
                return;
            }
        };
        for (id, outbound) in &self.clients {
            if id != skip {
                Self::deliver(id, outbound, frame.clone());
            }
        }
    }

    /// Queue a frame without waiting. A full queue drops the frame (the
    /// client is behind; the next snapshot supersedes it); a closed queue
    /// means the writer died and the disconnect path is already in flight.
    fn deliver(id: &PlayerId, outbound: &mpsc::Sender<OutboundFrame>, frame: OutboundFrame) {
        match outbound.try_send(frame) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(player = %id, "Outbound queue full, dropping frame");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// Create a per-client outbound frame queue at the standard depth
pub fn outbound_channel() -> (mpsc::Sender<OutboundFrame>, mpsc::Receiver<OutboundFrame>) {
    mpsc::channel(OUTBOUND_QUEUE_DEPTH)
}
