//! Authoritative world state.
//!
//! `GameState` owns every entity and is the single place registry invariants
//! are enforced: health clamping, one elimination per death, invincibility
//! windows, arena bounds. It is mutated only from the session task (one
//! message or one tick at a time), so none of this needs synchronization.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::schedule::{Task, TaskQueue};
use crate::game::systems::arena;
use crate::game::tuning::Tuning;
use crate::util::vec2::{Vec2, Vec3};

pub type PlayerId = Uuid;

/// Why a player left the land of the living
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EliminationReason {
    Collision,
    MachineGun,
    Inactivity,
    SelfReported,
}

/// What dealt a damage tick, relayed to clients for effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DamageKind {
    Collision,
    BotContact,
    MachineGun,
    Obstacle,
}

/// A connected vehicle
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    // Transform, overwritten by every accepted update message
    pub position: Vec3,
    pub rotation: f32,
    pub velocity: Vec2,
    // Combat state
    pub health: i32,
    pub invincible: bool,
    pub eliminated: bool,
    // Scoreboard counters
    pub score: u32,
    pub kills: u32,
    pub trick_score: u32,
    // Housekeeping, server clock in ms
    pub joined_ms: u64,
    pub last_update_ms: u64,
    pub last_obstacle_hit_ms: Option<u64>,
    pub invincible_until_ms: u64,
}

impl Player {
    pub fn new(id: PlayerId, position: Vec3, max_health: i32, now_ms: u64) -> Self {
        Self {
            id,
            position,
            rotation: 0.0,
            velocity: Vec2::ZERO,
            health: max_health,
            invincible: true,
            eliminated: false,
            score: 0,
            kills: 0,
            trick_score: 0,
            joined_ms: now_ms,
            last_update_ms: now_ms,
            last_obstacle_hit_ms: None,
            invincible_until_ms: 0,
        }
    }

    /// Alive and not under spawn protection; only these can be hit or targeted
    #[inline]
    pub fn is_vulnerable(&self) -> bool {
        !self.invincible && !self.eliminated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BotState {
    Idle,
    Pursue,
    Attack,
}

/// The singleton turret bot
#[derive(Debug, Clone)]
pub struct Bot {
    pub position: Vec3,
    pub rotation: f32,
    pub velocity: Vec2,
    pub health: i32,
    pub alive: bool,
    pub state: BotState,
    pub target_player_id: Option<PlayerId>,
    /// Cached result of the throttled obstacle check
    pub has_line_of_sight: bool,
    /// `None` until the first shot / check / sighting after spawn
    pub last_fire_ms: Option<u64>,
    pub last_los_check_ms: Option<u64>,
    pub last_target_sight_ms: Option<u64>,
    pub waypoint: Vec2,
    pub waypoint_set_ms: u64,
}

impl Bot {
    pub fn spawn(position: Vec3, waypoint: Vec2, health: i32, now_ms: u64) -> Self {
        Self {
            position,
            rotation: 0.0,
            velocity: Vec2::ZERO,
            health,
            alive: true,
            state: BotState::Idle,
            target_player_id: None,
            has_line_of_sight: false,
            last_fire_ms: None,
            last_los_check_ms: None,
            last_target_sight_ms: None,
            waypoint,
            waypoint_set_ms: now_ms,
        }
    }

    /// Apply incoming damage scaled by the bot's vulnerability.
    ///
    /// Returns `true` exactly once, on the hit that crosses health to zero.
    pub fn take_damage(&mut self, amount: i32, vulnerability: f32) -> bool {
        if amount <= 0 || !self.alive {
            return false;
        }
        let scaled = (amount as f32 * vulnerability).floor() as i32;
        self.health -= scaled.max(0);
        if self.health <= 0 {
            self.health = 0;
            self.alive = false;
            return true;
        }
        false
    }
}

/// Result of one damage application against a player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageApplied {
    pub health: i32,
    /// True only on the application that crossed health to zero
    pub eliminated: bool,
}

/// Static arena furniture, used for contact damage and line-of-sight
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Obstacle {
    pub position: Vec2,
    pub radius: f32,
    pub damage: i32,
}

/// The whole authoritative world
pub struct GameState {
    pub players: HashMap<PlayerId, Player>,
    pub bot: Option<Bot>,
    pub obstacles: Vec<Obstacle>,
    pub tick: u64,
    pub schedule: TaskQueue,
    tuning: Tuning,
    tick_interval_ms: u64,
}

impl GameState {
    pub fn new(tuning: Tuning, tick_interval_ms: u64) -> Self {
        let obstacles = arena::generate_obstacles(&tuning);
        Self {
            players: HashMap::new(),
            bot: None,
            obstacles,
            tick: 0,
            schedule: TaskQueue::new(),
            tuning,
            tick_interval_ms: tick_interval_ms.max(1),
        }
    }

    #[inline]
    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    #[inline]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn get_player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn get_player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// Schedule a task `delay_ms` from now, rounded up to whole ticks
    pub fn schedule_in_ms(&mut self, delay_ms: u64, task: Task) {
        let ticks = delay_ms.div_ceil(self.tick_interval_ms).max(1);
        self.schedule.push(self.tick + ticks, task);
    }

    /// Create a player at a random spawn with spawn protection
    pub fn add_player(&mut self, id: PlayerId, now_ms: u64) -> &Player {
        let position = arena::random_spawn_position(&self.tuning.arena);
        let mut player = Player::new(id, position, self.tuning.player.max_health, now_ms);
        player.invincible_until_ms = now_ms + self.tuning.player.invincibility_ms;
        self.players.insert(id, player);
        let delay = self.tuning.player.invincibility_ms;
        self.schedule_in_ms(delay, Task::ClearInvincibility(id));
        &self.players[&id]
    }

    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Player> {
        self.players.remove(id)
    }

    /// Accept a position/rotation/velocity report from a client.
    ///
    /// The position is clamped to the arena before storage; stale ids are a
    /// no-op. Returns whether the player existed.
    pub fn update_player(
        &mut self,
        id: &PlayerId,
        position: Vec3,
        rotation: f32,
        velocity: Vec2,
        now_ms: u64,
    ) -> bool {
        let arena = self.tuning.arena.clone();
        match self.players.get_mut(id) {
            Some(player) => {
                player.position = arena::clamp_position(&arena, position);
                player.rotation = rotation;
                player.velocity = velocity;
                player.last_update_ms = now_ms;
                true
            }
            None => false,
        }
    }

    /// Apply damage to a player, clamping health and firing elimination at
    /// most once. Invincible, eliminated, or missing players take nothing.
    pub fn apply_damage(&mut self, id: &PlayerId, amount: i32) -> Option<DamageApplied> {
        if amount <= 0 {
            return None;
        }
        let respawn_delay = self.tuning.player.respawn_delay_ms;
        let player = self.players.get_mut(id)?;
        if !player.is_vulnerable() {
            return None;
        }
        player.health = (player.health - amount).max(0);
        let mut eliminated = false;
        if player.health == 0 {
            player.eliminated = true;
            eliminated = true;
        }
        let result = DamageApplied {
            health: player.health,
            eliminated,
        };
        if eliminated {
            self.schedule_in_ms(respawn_delay, Task::RespawnPlayer(*id));
        }
        Some(result)
    }

    /// Force-eliminate a player regardless of current health (client-asserted
    /// death, debug triggers). Idempotent; returns true on the transition.
    pub fn mark_eliminated(&mut self, id: &PlayerId) -> bool {
        let respawn_delay = self.tuning.player.respawn_delay_ms;
        match self.players.get_mut(id) {
            Some(player) if !player.eliminated => {
                player.eliminated = true;
                player.health = 0;
                self.schedule_in_ms(respawn_delay, Task::RespawnPlayer(*id));
                true
            }
            _ => false,
        }
    }

    /// Bring an eliminated player back at a fresh spawn with full health and
    /// a new protection window. Returns the new position, or `None` if the
    /// player is gone or was never eliminated.
    pub fn respawn_player(&mut self, id: &PlayerId, now_ms: u64) -> Option<Vec3> {
        let position = arena::random_spawn_position(&self.tuning.arena);
        let max_health = self.tuning.player.max_health;
        let invincibility_ms = self.tuning.player.invincibility_ms;
        let player = self.players.get_mut(id)?;
        if !player.eliminated {
            return None;
        }
        player.position = position;
        player.velocity = Vec2::ZERO;
        player.health = max_health;
        player.eliminated = false;
        player.invincible = true;
        player.invincible_until_ms = now_ms + invincibility_ms;
        self.schedule_in_ms(invincibility_ms, Task::ClearInvincibility(*id));
        Some(position)
    }

    /// End spawn protection, unless a later respawn pushed the window out.
    /// Returns true if protection actually ended.
    pub fn clear_invincibility(&mut self, id: &PlayerId, now_ms: u64) -> bool {
        match self.players.get_mut(id) {
            Some(player) if player.invincible && now_ms >= player.invincible_until_ms => {
                player.invincible = false;
                true
            }
            _ => false,
        }
    }

    /// Remove players that have gone silent. Returns the evicted ids; calling
    /// it again immediately evicts nobody.
    pub fn sweep_inactive(&mut self, now_ms: u64) -> Vec<PlayerId> {
        let timeout = self.tuning.player.inactivity_timeout_ms;
        let evicted: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|(_, p)| now_ms.saturating_sub(p.last_update_ms) > timeout)
            .map(|(id, _)| *id)
            .collect();
        for id in &evicted {
            self.players.remove(id);
        }
        evicted
    }

    /// Store client-reported scoreboard counters. Returns the new values.
    pub fn record_score(
        &mut self,
        id: &PlayerId,
        trick_score: Option<u32>,
        kills: Option<u32>,
    ) -> Option<(u32, u32)> {
        let player = self.players.get_mut(id)?;
        if let Some(trick) = trick_score {
            player.trick_score = trick;
        }
        if let Some(kills) = kills {
            player.kills = kills;
        }
        Some((player.trick_score, player.kills))
    }

    /// Credit a bot kill to a player. Returns the new (score, kills).
    pub fn award_bot_kill(&mut self, id: &PlayerId, points: u32) -> Option<(u32, u32)> {
        let player = self.players.get_mut(id)?;
        player.score += points;
        player.kills += 1;
        Some((player.score, player.kills))
    }

    /// (Re)create the bot at a random spawn inside its wander margin
    pub fn spawn_bot(&mut self, now_ms: u64) -> &Bot {
        let margin = self.tuning.bot.boundary_margin;
        let position = Vec3::from_xz(arena::random_point(&self.tuning.arena, margin), 0.0);
        let waypoint = arena::random_point(&self.tuning.arena, margin);
        self.bot
            .insert(Bot::spawn(position, waypoint, self.tuning.bot.health, now_ms))
    }

    /// The bot, if spawned and alive
    pub fn live_bot(&self) -> Option<&Bot> {
        self.bot.as_ref().filter(|b| b.alive)
    }
}
