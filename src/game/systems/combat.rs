//! Collision and damage resolution.
//!
//! Player-vs-player damage is re-derived server-side from relative velocity
//! rather than trusting client numbers. Player-vs-bot and player-vs-obstacle
//! contacts are resolved inline whenever a position update arrives. Machine
//! gun fire lands on every player inside the arc with distance falloff.
//!
//! All damage flows through the registry so invariants (clamping, spawn
//! protection, one elimination per death) hold on every path.

use crate::game::state::{
    DamageKind, EliminationReason, GameState, PlayerId,
};
use crate::game::systems::arena;
use crate::game::tuning::ImpactTuning;
use crate::util::vec2::{normalize_angle, Vec2};

/// Side effects of a resolution pass, in emission order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatEvent {
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
    BotEliminated {
        eliminated_by: PlayerId,
        points: u32,
    },
    ScoreUpdate {
        id: PlayerId,
        score: u32,
        trick_score: u32,
        kills: u32,
    },
}

/// Base ramming damage from a relative speed. Contact below the minimum
/// impact speed is a graze and deals nothing.
fn impact_damage(relative_speed: f32, impact: &ImpactTuning) -> i32 {
    if relative_speed < impact.min_speed {
        return 0;
    }
    ((relative_speed * impact.damage_scale).floor() as i32).min(impact.damage_cap)
}

/// Reflect the component of `velocity` moving into the contact, then damp.
/// `normal` points from the other party towards the owner of the velocity.
fn bounce(velocity: Vec2, normal: Vec2, impact: &ImpactTuning) -> Vec2 {
    let approach = velocity.dot(normal);
    if approach >= 0.0 {
        return velocity;
    }
    (velocity - normal * ((1.0 + impact.restitution) * approach)) * impact.damping
}

/// Resolve a client-reported collision between two players.
///
/// Damage is asymmetric: the slower party at impact takes the heavier
/// multiplier, the rammer the lighter one. The collision is void when
/// either side is missing, eliminated, or under spawn protection.
pub fn resolve_player_collision(
    state: &mut GameState,
    reporter: &PlayerId,
    target: &PlayerId,
) -> Vec<CombatEvent> {
    let impact = state.tuning().impact.clone();
    let mut events = Vec::new();

    if reporter == target {
        return events;
    }

    let (relative_speed, reporter_speed, target_speed) =
        match (state.get_player(reporter), state.get_player(target)) {
            (Some(a), Some(b)) => {
                if !a.is_vulnerable() || !b.is_vulnerable() {
                    return events;
                }
                (
                    (a.velocity - b.velocity).length(),
                    a.velocity.length(),
                    b.velocity.length(),
                )
            }
            _ => return events,
        };

    let base = impact_damage(relative_speed, &impact);
    if base == 0 {
        return events;
    }

    // Slower party takes the heavier hit. Near-equal speeds count both as
    // the rammer, so a mutual graze stays light.
    const SPEED_TIE_EPSILON: f32 = 1e-6;
    let (reporter_mult, target_mult) = if target_speed - reporter_speed > SPEED_TIE_EPSILON {
        (impact.slower_mult, impact.faster_mult)
    } else if reporter_speed - target_speed > SPEED_TIE_EPSILON {
        (impact.faster_mult, impact.slower_mult)
    } else {
        (impact.faster_mult, impact.faster_mult)
    };

    apply_collision_damage(state, reporter, base, reporter_mult, &mut events);
    apply_collision_damage(state, target, base, target_mult, &mut events);
    events
}

fn apply_collision_damage(
    state: &mut GameState,
    id: &PlayerId,
    base: i32,
    mult: f32,
    events: &mut Vec<CombatEvent>,
) {
    let damage = (base as f32 * mult).floor() as i32;
    if let Some(hit) = state.apply_damage(id, damage) {
        events.push(CombatEvent::PlayerDamaged {
            id: *id,
            health: hit.health,
            damage,
            kind: DamageKind::Collision,
        });
        if hit.eliminated {
            events.push(CombatEvent::PlayerEliminated {
                id: *id,
                reason: EliminationReason::Collision,
            });
        }
    }
}

/// Resolve overlap between a player and the live bot.
///
/// Positions are pushed apart along the contact normal, velocities bounce
/// with restitution and damping, and the ramming damage is split: the bot
/// takes it scaled up by its vulnerability, the player takes the base if
/// not protected. Destroying the bot credits the player.
pub fn resolve_bot_contact(state: &mut GameState, id: &PlayerId) -> Vec<CombatEvent> {
    let impact = state.tuning().impact.clone();
    let arena = state.tuning().arena.clone();
    let combined = state.tuning().player.radius + state.tuning().bot.radius;
    let vulnerability = state.tuning().bot.vulnerability;
    let kill_points = state.tuning().bot.kill_points;

    let mut events = Vec::new();

    let (base, bot_died) = match (state.bot.as_mut(), state.players.get_mut(id)) {
        (Some(bot), Some(player)) if bot.alive && !player.eliminated => {
            let to_player = player.position.xz() - bot.position.xz();
            let distance = to_player.length();
            if distance >= combined {
                return events;
            }
            let normal = if distance > f32::EPSILON {
                to_player * (1.0 / distance)
            } else {
                Vec2::new(0.0, 1.0)
            };

            let relative_speed = (player.velocity - bot.velocity).length();
            let base = impact_damage(relative_speed, &impact);

            // Separate along the normal so the pair no longer overlaps.
            let half_overlap = (combined - distance) * 0.5;
            player.position.x += normal.x * half_overlap;
            player.position.z += normal.z * half_overlap;
            bot.position.x -= normal.x * half_overlap;
            bot.position.z -= normal.z * half_overlap;
            player.position = arena::clamp_position(&arena, player.position);
            bot.position = arena::clamp_position(&arena, bot.position);

            player.velocity = bounce(player.velocity, normal, &impact);
            bot.velocity = bounce(bot.velocity, -normal, &impact);

            // A graze still separates and bounces, but draws no blood.
            let died = if base > 0 {
                bot.take_damage(base, vulnerability)
            } else {
                false
            };
            (base, died)
        }
        _ => return events,
    };

    if base > 0 {
        if let Some(hit) = state.apply_damage(id, base) {
            events.push(CombatEvent::PlayerDamaged {
                id: *id,
                health: hit.health,
                damage: base,
                kind: DamageKind::BotContact,
            });
            if hit.eliminated {
                events.push(CombatEvent::PlayerEliminated {
                    id: *id,
                    reason: EliminationReason::Collision,
                });
            }
        }
    }

    if bot_died {
        events.push(CombatEvent::BotEliminated {
            eliminated_by: *id,
            points: kill_points,
        });
        if state.award_bot_kill(id, kill_points).is_some() {
            if let Some(player) = state.get_player(id) {
                events.push(CombatEvent::ScoreUpdate {
                    id: *id,
                    score: player.score,
                    trick_score: player.trick_score,
                    kills: player.kills,
                });
            }
        }
    }

    events
}

/// Resolve overlap between a player and the static rocks.
///
/// The player is pushed fully out of any rock it sits inside. Contact
/// damage applies at most once per cooldown window per player.
pub fn resolve_obstacle_contact(
    state: &mut GameState,
    id: &PlayerId,
    now_ms: u64,
) -> Vec<CombatEvent> {
    let arena = state.tuning().arena.clone();
    let player_radius = state.tuning().player.radius;
    let cooldown_ms = state.tuning().impact.obstacle_hit_cooldown_ms;

    let mut events = Vec::new();

    let pending_damage = {
        let player = match state.players.get_mut(id) {
            Some(player) if !player.eliminated => player,
            _ => return events,
        };

        let mut pending = None;
        for obstacle in &state.obstacles {
            let combined = player_radius + obstacle.radius;
            let offset = player.position.xz() - obstacle.position;
            let distance = offset.length();
            if distance >= combined {
                continue;
            }
            let normal = if distance > f32::EPSILON {
                offset * (1.0 / distance)
            } else {
                Vec2::new(0.0, 1.0)
            };
            player.position.x = obstacle.position.x + normal.x * combined;
            player.position.z = obstacle.position.z + normal.z * combined;
            player.position = arena::clamp_position(&arena, player.position);

            let cooled = match player.last_obstacle_hit_ms {
                Some(last) => now_ms.saturating_sub(last) >= cooldown_ms,
                None => true,
            };
            if pending.is_none() && cooled {
                pending = Some(obstacle.damage);
            }
        }
        pending
    };

    if let Some(damage) = pending_damage {
        if let Some(hit) = state.apply_damage(id, damage) {
            if let Some(player) = state.get_player_mut(id) {
                player.last_obstacle_hit_ms = Some(now_ms);
            }
            events.push(CombatEvent::PlayerDamaged {
                id: *id,
                health: hit.health,
                damage,
                kind: DamageKind::Obstacle,
            });
            if hit.eliminated {
                events.push(CombatEvent::PlayerEliminated {
                    id: *id,
                    reason: EliminationReason::Collision,
                });
            }
        }
    }

    events
}

/// Land a machine gun burst on every player inside the firing arc.
///
/// Damage falls off linearly from the close multiplier at the muzzle to
/// the far multiplier at maximum range.
pub fn resolve_machine_gun_fire(state: &mut GameState) -> Vec<CombatEvent> {
    let cfg = state.tuning().bot.clone();
    let (origin, rotation) = match state.live_bot() {
        Some(bot) => (bot.position.xz(), bot.rotation),
        None => return Vec::new(),
    };
    let half_arc = cfg.machine_gun_arc / 2.0;

    let hits: Vec<(PlayerId, i32)> = state
        .players
        .iter()
        .filter_map(|(id, player)| {
            if !player.is_vulnerable() {
                return None;
            }
            let offset = player.position.xz() - origin;
            let distance = offset.length();
            if distance > cfg.machine_gun_range {
                return None;
            }
            let aim = normalize_angle(offset.bearing() - rotation);
            if aim.abs() > half_arc {
                return None;
            }
            let t = (distance / cfg.machine_gun_range).clamp(0.0, 1.0);
            let mult = cfg.arc_damage_max_mult
                + (cfg.arc_damage_min_mult - cfg.arc_damage_max_mult) * t;
            let damage = (cfg.machine_gun_damage as f32 * mult).floor() as i32;
            Some((*id, damage))
        })
        .collect();

    let mut events = Vec::new();
    for (id, damage) in hits {
        if let Some(hit) = state.apply_damage(&id, damage) {
            events.push(CombatEvent::PlayerDamaged {
                id,
                health: hit.health,
                damage,
                kind: DamageKind::MachineGun,
            });
            if hit.eliminated {
                events.push(CombatEvent::PlayerEliminated {
                    id,
                    reason: EliminationReason::MachineGun,
                });
            }
        }
    }
    events
}
