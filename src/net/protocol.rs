//! Wire protocol: tagged message enums and snapshot types.
//!
//! Every payload has a fixed schema; frames that fail to decode are dropped
//! at the transport boundary and never touch game state. Encoding is bincode
//! with the legacy config (fixed-size little-endian integers, compatible
//! with the browser client's decoder).

use serde::{Deserialize, Serialize};

use crate::game::state::{
    Bot, BotState, DamageKind, EliminationReason, GameState, Obstacle, Player, PlayerId,
};
use crate::util::vec2::{Vec2, Vec3};

/// Messages from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Position/rotation/velocity report for the sender's vehicle
    PlayerUpdate {
        position: Vec3,
        rotation: f32,
        /// Missing velocity defaults to zero at the boundary
        velocity: Option<Vec2>,
    },
    /// Client-reported contact with another player. The force number is a
    /// hint only; damage is re-derived server-side from registry velocities.
    Collision {
        target_id: PlayerId,
        impact_force: f32,
    },
    /// Relay-only boost notification
    BoostActivated,
    /// Client-asserted self-elimination (debug/test triggers)
    PlayerDied { id: PlayerId },
    /// Bring an eliminated sender back immediately
    RequestRespawn,
    /// Client-reported scoreboard counters
    UpdateScore {
        trick_score: Option<u32>,
        kills: Option<u32>,
    },
}

impl ClientMessage {
    /// Boundary validation: reject payloads whose numbers would poison the
    /// simulation. Returns `false` for messages that must be dropped.
    pub fn is_valid(&self) -> bool {
        match self {
            ClientMessage::PlayerUpdate {
                position,
                rotation,
                velocity,
            } => {
                position.is_finite()
                    && rotation.is_finite()
                    && velocity.map_or(true, |v| v.is_finite())
            }
            ClientMessage::Collision { impact_force, .. } => impact_force.is_finite(),
            _ => true,
        }
    }
}

/// Messages from server to client (broadcast unless noted)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Full initial state, unicast to a client right after connect
    GameState(InitialState),
    /// Feature flags, unicast once per connection after `GameState`
    GameConfig { bot_enabled: bool, test_mode: bool },
    /// Test-mode flag, unicast once per connection
    TestModeStatus { enabled: bool },
    /// Full snapshot, broadcast every tick
    GameUpdate(GameSnapshot),
    PlayerJoined {
        player: PlayerSnapshot,
    },
    PlayerLeft {
        id: PlayerId,
    },
    PlayerDamaged {
        id: PlayerId,
        health: i32,
        damage: i32,
        kind: DamageKind,
    },
    PlayerEliminated {
        id: PlayerId,
        reason: EliminationReason,
    },
    PlayerRespawned {
        id: PlayerId,
        position: Vec3,
        health: i32,
    },
    PlayerBoosting {
        id: PlayerId,
    },
    ScoreUpdate {
        id: PlayerId,
        score: u32,
        trick_score: u32,
        kills: u32,
    },
    BotSpawned {
        bot: BotSnapshot,
    },
    /// Sent each tick while the bot is alive
    BotUpdate {
        bot: BotSnapshot,
    },
    BotEliminated {
        eliminated_by: PlayerId,
        points: u32,
    },
    BotFired {
        position: Vec3,
        rotation: f32,
    },
}

/// Everything a client needs to build the scene on connect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialState {
    pub your_id: PlayerId,
    pub arena_width: f32,
    pub arena_height: f32,
    pub obstacles: Vec<Obstacle>,
    pub players: Vec<PlayerSnapshot>,
    pub bot: Option<BotSnapshot>,
}

/// Full game state for one broadcast tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub tick: u64,
    pub players: Vec<PlayerSnapshot>,
    pub bot: Option<BotSnapshot>,
    pub player_count: u32,
}

impl GameSnapshot {
    pub fn from_state(state: &GameState) -> Self {
        Self {
            tick: state.tick,
            players: state
                .players
                .values()
                .map(PlayerSnapshot::from_player)
                .collect(),
            bot: state.bot.as_ref().map(BotSnapshot::from_bot),
            player_count: state.player_count() as u32,
        }
    }
}

/// Per-player state as broadcast to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub position: Vec3,
    pub rotation: f32,
    pub velocity: Vec2,
    pub health: i32,
    pub invincible: bool,
    pub eliminated: bool,
    pub score: u32,
    pub kills: u32,
    pub trick_score: u32,
}

impl PlayerSnapshot {
    pub fn from_player(player: &Player) -> Self {
        Self {
            id: player.id,
            position: player.position,
            rotation: player.rotation,
            velocity: player.velocity,
            health: player.health,
            invincible: player.invincible,
            eliminated: player.eliminated,
            score: player.score,
            kills: player.kills,
            trick_score: player.trick_score,
        }
    }
}

/// Bot state as broadcast to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSnapshot {
    pub position: Vec3,
    pub rotation: f32,
    pub velocity: Vec2,
    pub health: i32,
    pub alive: bool,
    pub state: BotState,
    pub target_player_id: Option<PlayerId>,
}

impl BotSnapshot {
    pub fn from_bot(bot: &Bot) -> Self {
        Self {
            position: bot.position,
            rotation: bot.rotation,
            velocity: bot.velocity,
            health: bot.health,
            alive: bot.alive,
            state: bot.state,
            target_player_id: bot.target_player_id,
        }
    }
}

/// Encode a message using bincode with the legacy config
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| EncodeError(e.to_string()))
}

/// Decode a message using bincode with the legacy config
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tuning::Tuning;
    use uuid::Uuid;

    #[test]
    fn test_player_update_round_trip() {
        let msg = ClientMessage::PlayerUpdate {
            position: Vec3::new(10.0, 1.5, -20.0),
            rotation: 0.7,
            velocity: Some(Vec2::new(0.4, -0.2)),
        };
        let decoded: ClientMessage = decode(&encode(&msg).unwrap()).unwrap();
        match decoded {
            ClientMessage::PlayerUpdate {
                position,
                rotation,
                velocity,
            } => {
                assert_eq!(position, Vec3::new(10.0, 1.5, -20.0));
                assert_eq!(rotation, 0.7);
                assert_eq!(velocity, Some(Vec2::new(0.4, -0.2)));
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_validation_rejects_non_finite_numbers() {
        let bad_position = ClientMessage::PlayerUpdate {
            position: Vec3::new(f32::NAN, 0.0, 0.0),
            rotation: 0.0,
            velocity: None,
        };
        assert!(!bad_position.is_valid());

        let bad_velocity = ClientMessage::PlayerUpdate {
            position: Vec3::ZERO,
            rotation: 0.0,
            velocity: Some(Vec2::new(f32::INFINITY, 0.0)),
        };
        assert!(!bad_velocity.is_valid());

        let bad_force = ClientMessage::Collision {
            target_id: Uuid::new_v4(),
            impact_force: f32::NAN,
        };
        assert!(!bad_force.is_valid());

        let good = ClientMessage::PlayerUpdate {
            position: Vec3::ZERO,
            rotation: 0.0,
            velocity: None,
        };
        assert!(good.is_valid());
    }

    #[test]
    fn test_collision_report_round_trip() {
        let target_id = Uuid::new_v4();
        let msg = ClientMessage::Collision {
            target_id,
            impact_force: 2.5,
        };
        let decoded: ClientMessage = decode(&encode(&msg).unwrap()).unwrap();
        match decoded {
            ClientMessage::Collision { target_id: tid, .. } => assert_eq!(tid, target_id),
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_snapshot_from_state() {
        let mut state = GameState::new(Tuning::default(), 50);
        let id = Uuid::new_v4();
        state.add_player(id, 0);
        state.spawn_bot(0);
        state.tick = 42;

        let snapshot = GameSnapshot::from_state(&state);
        assert_eq!(snapshot.tick, 42);
        assert_eq!(snapshot.player_count, 1);
        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.players[0].id, id);
        assert!(snapshot.players[0].invincible);
        assert!(snapshot.bot.as_ref().unwrap().alive);

        let decoded: GameSnapshot = decode(&encode(&snapshot).unwrap()).unwrap();
        assert_eq!(decoded.tick, 42);
        assert_eq!(decoded.players.len(), 1);
    }

    #[test]
    fn test_server_event_round_trip() {
        let id = Uuid::new_v4();
        let msg = ServerMessage::PlayerDamaged {
            id,
            health: 55,
            damage: 20,
            kind: DamageKind::MachineGun,
        };
        let decoded: ServerMessage = decode(&encode(&msg).unwrap()).unwrap();
        match decoded {
            ServerMessage::PlayerDamaged {
                id: pid,
                health,
                damage,
                kind,
            } => {
                assert_eq!(pid, id);
                assert_eq!(health, 55);
                assert_eq!(damage, 20);
                assert_eq!(kind, DamageKind::MachineGun);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_invalid_decode() {
        let garbage = vec![0xFF, 0xFE, 0xFD];
        let result: Result<ClientMessage, _> = decode(&garbage);
        assert!(result.is_err());
    }
}
