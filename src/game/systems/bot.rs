//! Turret bot controller.
//!
//! A per-tick finite-state machine (idle, pursue, attack) driving the
//! singleton NPC: target acquisition, throttled line-of-sight checks,
//! waypoint wander, standoff keeping and fire gating. Hit resolution for
//! shots belongs to the combat system; this module only signals `did_fire`.

use hashbrown::HashMap;

use crate::game::state::{Bot, BotState, GameState, Obstacle, Player, PlayerId};
use crate::game::systems::arena;
use crate::game::tuning::{ArenaTuning, BotTuning};
use crate::util::vec2::{normalize_angle, Vec2};

/// Waypoint counts as reached inside this distance
const WAYPOINT_REACHED_DISTANCE: f32 = 20.0;
/// Give up on an unreachable waypoint after this long
const WAYPOINT_TIMEOUT_MS: u64 = 10_000;
/// Integration step cap; bounds position error when ticks stall
const MAX_STEP_MS: f32 = 50.0;
/// The bot never pushes closer to a wall than this
const WALL_PADDING: f32 = 10.0;
/// Half-arc the bot must be aimed within before it fires
const AIM_TOLERANCE: f32 = std::f32::consts::FRAC_PI_6;

// Per-state forward speed multipliers
const CORNER_ESCAPE_SPEED: f32 = 0.8;
const EDGE_AVOID_SPEED: f32 = 0.6;
const WANDER_SPEED: f32 = 0.3;
const PURSUE_SPEED: f32 = 0.7;
const ATTACK_ADVANCE_SPEED: f32 = 0.5;
const ATTACK_REVERSE_SPEED: f32 = -0.3;

/// Output of one controller step
#[derive(Debug, Clone, Copy)]
pub struct BotFrame {
    pub did_fire: bool,
}

#[derive(Debug, Clone, Copy)]
struct TargetCandidate {
    id: PlayerId,
    position: Vec2,
    distance: f32,
}

/// Advance the bot by one tick.
///
/// Picks the closest vulnerable player, re-decides the state from scratch,
/// steers, and integrates movement. Returns `None` when the bot is absent
/// or dead.
pub fn advance(state: &mut GameState, now_ms: u64, delta_ms: f32) -> Option<BotFrame> {
    let cfg = state.tuning().bot.clone();
    let arena = state.tuning().arena.clone();

    let bot = state.bot.as_mut()?;
    if !bot.alive {
        return None;
    }

    let target = closest_vulnerable(&state.players, bot.position.xz());
    decide_state(bot, target.as_ref(), &state.obstacles, &cfg, now_ms);

    let did_fire = match bot.state {
        BotState::Idle => {
            steer_idle(bot, &cfg, &arena, now_ms, delta_ms);
            false
        }
        BotState::Pursue => {
            if let Some(t) = &target {
                steer_pursue(bot, t.position, &cfg, delta_ms);
            }
            false
        }
        BotState::Attack => match &target {
            Some(t) => bot.has_line_of_sight && steer_attack(bot, t, &cfg, now_ms, delta_ms),
            None => false,
        },
    };

    integrate(bot, &cfg, &arena, now_ms, delta_ms);

    Some(BotFrame { did_fire })
}

/// Nearest player the bot is allowed to engage, measured in the XZ plane
fn closest_vulnerable(players: &HashMap<PlayerId, Player>, from: Vec2) -> Option<TargetCandidate> {
    let mut closest: Option<TargetCandidate> = None;
    for (id, player) in players {
        if !player.is_vulnerable() {
            continue;
        }
        let distance = from.distance_to(player.position.xz());
        if closest.as_ref().map_or(true, |c| distance < c.distance) {
            closest = Some(TargetCandidate {
                id: *id,
                position: player.position.xz(),
                distance,
            });
        }
    }
    closest
}

/// Re-decide the state for this tick from distance, sight and target memory.
/// Nothing is sticky; conditions must hold again next tick.
fn decide_state(
    bot: &mut Bot,
    target: Option<&TargetCandidate>,
    obstacles: &[Obstacle],
    cfg: &BotTuning,
    now_ms: u64,
) {
    let has_sight = match target {
        Some(t) => keep_line_of_sight(bot, t.position, obstacles, cfg, now_ms),
        None => {
            bot.has_line_of_sight = false;
            false
        }
    };
    let memory_expired = match bot.last_target_sight_ms {
        Some(seen) => now_ms.saturating_sub(seen) > cfg.target_memory_ms,
        None => true,
    };

    let (next_state, next_target) = match target {
        None => (BotState::Idle, None),
        // A clear sight check above just refreshed the memory timer, so an
        // expired memory here means the target has been unseen too long.
        Some(_) if memory_expired => (BotState::Idle, None),
        Some(t) if t.distance <= cfg.machine_gun_range * 0.8 && has_sight => {
            (BotState::Attack, Some(t.id))
        }
        Some(t) if t.distance <= cfg.detection_range && (has_sight || !memory_expired) => {
            (BotState::Pursue, Some(t.id))
        }
        _ => (BotState::Idle, None),
    };
    bot.state = next_state;
    bot.target_player_id = next_target;
}

/// Throttled line-of-sight to the target position.
///
/// Recomputes at most every `los_check_interval_ms` and reuses the cached
/// answer in between. A computed clear check refreshes target memory.
fn keep_line_of_sight(
    bot: &mut Bot,
    target: Vec2,
    obstacles: &[Obstacle],
    cfg: &BotTuning,
    now_ms: u64,
) -> bool {
    let due = match bot.last_los_check_ms {
        Some(checked) => now_ms.saturating_sub(checked) >= cfg.los_check_interval_ms,
        None => true,
    };
    if !due {
        return bot.has_line_of_sight;
    }

    bot.last_los_check_ms = Some(now_ms);
    bot.has_line_of_sight = !segment_blocked(bot.position.xz(), target, obstacles);
    if bot.has_line_of_sight {
        bot.last_target_sight_ms = Some(now_ms);
    }
    bot.has_line_of_sight
}

/// Whether any obstacle circle cuts the segment between two points.
///
/// An obstacle blocks when its center is closer to the carrier line than
/// its radius and its projection lands strictly between the endpoints.
fn segment_blocked(from: Vec2, to: Vec2, obstacles: &[Obstacle]) -> bool {
    let span = to - from;
    let distance = span.length();
    if distance <= f32::EPSILON {
        return false;
    }
    let dir = span * (1.0 / distance);

    obstacles.iter().any(|obstacle| {
        let offset = obstacle.position - from;
        let along = offset.dot(dir);
        if along <= 0.0 || along >= distance {
            return false;
        }
        let perp_sq = offset.length_sq() - along * along;
        perp_sq < obstacle.radius * obstacle.radius
    })
}

fn steer_idle(bot: &mut Bot, cfg: &BotTuning, arena: &ArenaTuning, now_ms: u64, delta_ms: f32) {
    let edge_x = arena.half_width() - bot.position.x.abs();
    let edge_z = arena.half_height() - bot.position.z.abs();

    // Cornered: two walls close at once. Turn hard for the center and skip
    // the waypoint logic this tick.
    if edge_x < cfg.corner_margin && edge_z < cfg.corner_margin {
        turn_towards(bot, Vec2::ZERO, cfg.turn_speed * 1.5);
        set_forward_velocity(bot, cfg, CORNER_ESCAPE_SPEED, delta_ms);
        return;
    }

    let to_waypoint = bot.position.xz().distance_to(bot.waypoint);
    if to_waypoint < WAYPOINT_REACHED_DISTANCE
        || now_ms.saturating_sub(bot.waypoint_set_ms) > WAYPOINT_TIMEOUT_MS
    {
        bot.waypoint = arena::random_point(arena, cfg.boundary_margin);
        bot.waypoint_set_ms = now_ms;
    }

    turn_towards(bot, bot.waypoint, cfg.turn_speed);

    if edge_x < cfg.boundary_margin || edge_z < cfg.boundary_margin {
        // Drifting along a wall: bend back towards the center.
        turn_towards(bot, Vec2::ZERO, cfg.turn_speed * 1.5);
        set_forward_velocity(bot, cfg, EDGE_AVOID_SPEED, delta_ms);
    } else {
        set_forward_velocity(bot, cfg, WANDER_SPEED, delta_ms);
    }
}

fn steer_pursue(bot: &mut Bot, target: Vec2, cfg: &BotTuning, delta_ms: f32) {
    turn_towards(bot, target, cfg.turn_speed);
    set_forward_velocity(bot, cfg, PURSUE_SPEED, delta_ms);
}

/// Aim, hold the standoff band, and fire when every gate passes.
/// Returns whether a shot went out this tick.
fn steer_attack(
    bot: &mut Bot,
    target: &TargetCandidate,
    cfg: &BotTuning,
    now_ms: u64,
    delta_ms: f32,
) -> bool {
    let aim_error = turn_towards(bot, target.position, cfg.turn_speed * 1.5);

    if target.distance < cfg.min_attack_range {
        set_forward_velocity(bot, cfg, ATTACK_REVERSE_SPEED, delta_ms);
    } else if target.distance > cfg.optimal_attack_range {
        set_forward_velocity(bot, cfg, ATTACK_ADVANCE_SPEED, delta_ms);
    }
    // Inside the band the bot holds and lets friction bleed the rest off.

    let cooled = match bot.last_fire_ms {
        Some(fired) => now_ms.saturating_sub(fired) >= cfg.fire_interval_ms,
        None => true,
    };
    if target.distance <= cfg.machine_gun_range && aim_error.abs() < AIM_TOLERANCE && cooled {
        bot.last_fire_ms = Some(now_ms);
        return true;
    }
    false
}

/// Rotate at most `max_step` radians towards the bearing of `target`.
/// Returns the aim error before the turn.
fn turn_towards(bot: &mut Bot, target: Vec2, max_step: f32) -> f32 {
    let bearing = (target - bot.position.xz()).bearing();
    let error = normalize_angle(bearing - bot.rotation);
    bot.rotation = normalize_angle(bot.rotation + error.signum() * error.abs().min(max_step));
    error
}

/// Replace (not add to) the velocity with a forward push along the heading
fn set_forward_velocity(bot: &mut Bot, cfg: &BotTuning, speed_mult: f32, delta_ms: f32) {
    let speed = cfg.move_speed * speed_mult * (delta_ms / 1000.0).min(0.1);
    bot.velocity = Vec2::from_heading(bot.rotation) * speed;
}

/// Clamp speed, move, decay, and stop dead at walls
fn integrate(bot: &mut Bot, cfg: &BotTuning, arena: &ArenaTuning, now_ms: u64, delta_ms: f32) {
    bot.velocity = bot.velocity.clamp_length(cfg.max_velocity);

    let step_ms = delta_ms.min(MAX_STEP_MS);
    bot.position.x += bot.velocity.x * step_ms;
    bot.position.z += bot.velocity.z * step_ms;

    bot.velocity = bot.velocity * cfg.friction;

    // Walls are an inelastic stop on that axis, never a bounce, and force
    // a fresh waypoint so the bot stops grinding into them.
    let limit_x = arena.half_width() - WALL_PADDING;
    let limit_z = arena.half_height() - WALL_PADDING;
    let mut hit_wall = false;
    if bot.position.x.abs() > limit_x {
        bot.position.x = limit_x.copysign(bot.position.x);
        bot.velocity.x = 0.0;
        hit_wall = true;
    }
    if bot.position.z.abs() > limit_z {
        bot.position.z = limit_z.copysign(bot.position.z);
        bot.velocity.z = 0.0;
        hit_wall = true;
    }
    if hit_wall {
        bot.waypoint = arena::random_point(arena, cfg.boundary_margin);
        bot.waypoint_set_ms = now_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tuning::Tuning;
    use crate::util::vec2::Vec3;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};
    use uuid::Uuid;

    const TICK_MS: f32 = 50.0;

    fn test_state() -> GameState {
        test_state_with(Tuning::default())
    }

    fn test_state_with(tuning: Tuning) -> GameState {
        let mut state = GameState::new(tuning, 50);
        // Deterministic sight for tests; obstacles are injected explicitly.
        state.obstacles.clear();
        state.spawn_bot(0);
        let bot = state.bot.as_mut().unwrap();
        bot.position = Vec3::ZERO;
        bot.rotation = 0.0;
        bot.velocity = Vec2::ZERO;
        bot.waypoint = Vec2::new(0.0, 200.0);
        bot.waypoint_set_ms = 1_000;
        state
    }

    fn add_vulnerable_player(state: &mut GameState, position: Vec3) -> PlayerId {
        let id = Uuid::new_v4();
        state.add_player(id, 0);
        let player = state.get_player_mut(&id).unwrap();
        player.invincible = false;
        player.position = position;
        id
    }

    #[test]
    fn test_attack_head_on_fires_first_eligible_tick() {
        let mut state = test_state();
        add_vulnerable_player(&mut state, Vec3::new(0.0, 0.0, 40.0));

        let frame = advance(&mut state, 1_000, TICK_MS).unwrap();

        let bot = state.bot.as_ref().unwrap();
        assert_eq!(bot.state, BotState::Attack);
        assert!(frame.did_fire);
        assert_eq!(bot.last_fire_ms, Some(1_000));
        // Target dead ahead: zero aim error, no turn.
        assert_eq!(bot.rotation, 0.0);
    }

    #[test]
    fn test_fire_respects_cooldown() {
        let mut state = test_state();
        add_vulnerable_player(&mut state, Vec3::new(0.0, 0.0, 40.0));

        assert!(advance(&mut state, 1_000, TICK_MS).unwrap().did_fire);
        assert!(!advance(&mut state, 1_200, TICK_MS).unwrap().did_fire);
        assert!(advance(&mut state, 1_600, TICK_MS).unwrap().did_fire);
        assert_eq!(state.bot.as_ref().unwrap().last_fire_ms, Some(1_600));
    }

    #[test]
    fn test_pursues_inside_detection_range() {
        let mut state = test_state();
        let id = add_vulnerable_player(&mut state, Vec3::new(0.0, 0.0, 100.0));

        advance(&mut state, 1_000, TICK_MS);

        let bot = state.bot.as_ref().unwrap();
        assert_eq!(bot.state, BotState::Pursue);
        assert_eq!(bot.target_player_id, Some(id));
        // Cautious approach moves the bot towards the target.
        assert!(bot.position.z > 0.0);
    }

    #[test]
    fn test_idle_beyond_detection_range() {
        let mut state = test_state();
        add_vulnerable_player(&mut state, Vec3::new(0.0, 0.0, 400.0));

        advance(&mut state, 1_000, TICK_MS);

        let bot = state.bot.as_ref().unwrap();
        assert_eq!(bot.state, BotState::Idle);
        assert_eq!(bot.target_player_id, None);
    }

    #[test]
    fn test_invincible_and_eliminated_players_not_targeted() {
        let mut state = test_state();
        let shielded = Uuid::new_v4();
        state.add_player(shielded, 0);
        state.get_player_mut(&shielded).unwrap().position = Vec3::new(0.0, 0.0, 30.0);

        let downed = add_vulnerable_player(&mut state, Vec3::new(0.0, 0.0, 35.0));
        state.get_player_mut(&downed).unwrap().eliminated = true;

        advance(&mut state, 1_000, TICK_MS);
        assert_eq!(state.bot.as_ref().unwrap().state, BotState::Idle);
    }

    #[test]
    fn test_targets_closest_vulnerable_player() {
        let mut state = test_state();
        add_vulnerable_player(&mut state, Vec3::new(0.0, 0.0, 100.0));
        let near = add_vulnerable_player(&mut state, Vec3::new(45.0, 0.0, 0.0));

        advance(&mut state, 1_000, TICK_MS);

        let bot = state.bot.as_ref().unwrap();
        assert_eq!(bot.state, BotState::Pursue);
        assert_eq!(bot.target_player_id, Some(near));
    }

    #[test]
    fn test_blocked_sight_denies_attack() {
        let mut state = test_state();
        add_vulnerable_player(&mut state, Vec3::new(0.0, 0.0, 40.0));
        state.obstacles.push(Obstacle {
            position: Vec2::new(0.0, 20.0),
            radius: 10.0,
            damage: 5,
        });

        advance(&mut state, 1_000, TICK_MS);

        let bot = state.bot.as_ref().unwrap();
        assert!(!bot.has_line_of_sight);
        // Never seen the target, so there is no memory to pursue on.
        assert_eq!(bot.state, BotState::Idle);
    }

    #[test]
    fn test_target_memory_grants_pursue_grace() {
        let mut state = test_state();
        add_vulnerable_player(&mut state, Vec3::new(0.0, 0.0, 40.0));
        state.obstacles.push(Obstacle {
            position: Vec2::new(0.0, 20.0),
            radius: 10.0,
            damage: 5,
        });
        state.bot.as_mut().unwrap().last_target_sight_ms = Some(900);

        advance(&mut state, 1_000, TICK_MS);
        assert_eq!(state.bot.as_ref().unwrap().state, BotState::Pursue);

        // Memory runs out while sight stays blocked.
        advance(&mut state, 5_000, TICK_MS);
        assert_eq!(state.bot.as_ref().unwrap().state, BotState::Idle);
        assert_eq!(state.bot.as_ref().unwrap().target_player_id, None);
    }

    #[test]
    fn test_sight_check_is_throttled() {
        let mut state = test_state();
        add_vulnerable_player(&mut state, Vec3::new(0.0, 0.0, 100.0));

        advance(&mut state, 1_000, TICK_MS);
        assert!(state.bot.as_ref().unwrap().has_line_of_sight);

        // A wall appears, but the cached clear result is still in force.
        state.obstacles.push(Obstacle {
            position: Vec2::new(0.0, 50.0),
            radius: 10.0,
            damage: 5,
        });
        advance(&mut state, 1_040, TICK_MS);
        assert!(state.bot.as_ref().unwrap().has_line_of_sight);
        assert_eq!(state.bot.as_ref().unwrap().state, BotState::Pursue);

        // Next due check notices; memory keeps the pursuit alive.
        advance(&mut state, 1_110, TICK_MS);
        assert!(!state.bot.as_ref().unwrap().has_line_of_sight);
        assert_eq!(state.bot.as_ref().unwrap().state, BotState::Pursue);
    }

    #[test]
    fn test_obstacle_on_midpoint_blocks_beside_it_clears() {
        let from = Vec2::ZERO;
        let to = Vec2::new(0.0, 100.0);
        let rock = |x: f32, z: f32| Obstacle {
            position: Vec2::new(x, z),
            radius: 5.0,
            damage: 5,
        };

        assert!(segment_blocked(from, to, &[rock(0.0, 50.0)]));
        // Perpendicular offset beyond the radius clears it.
        assert!(!segment_blocked(from, to, &[rock(5.1, 50.0)]));
        // Behind, beyond, or exactly on an endpoint never blocks.
        assert!(!segment_blocked(from, to, &[rock(0.0, -30.0)]));
        assert!(!segment_blocked(from, to, &[rock(0.0, 150.0)]));
        assert!(!segment_blocked(from, to, &[rock(0.0, 0.0)]));
        assert!(!segment_blocked(from, to, &[]));
        // Degenerate zero-length segment is always clear.
        assert!(!segment_blocked(from, from, &[rock(0.0, 0.0)]));
    }

    #[test]
    fn test_idle_wanders_towards_waypoint() {
        let mut state = test_state();

        advance(&mut state, 1_000, TICK_MS);

        let bot = state.bot.as_ref().unwrap();
        assert_eq!(bot.state, BotState::Idle);
        assert!(bot.position.z > 0.0);
        assert_eq!(bot.position.x, 0.0);
        assert!(bot.velocity.length() <= state.tuning().bot.max_velocity);
    }

    #[test]
    fn test_waypoint_repicked_when_reached() {
        let mut state = test_state();
        state.bot.as_mut().unwrap().waypoint = Vec2::new(0.0, 10.0);

        advance(&mut state, 2_000, TICK_MS);

        let bot = state.bot.as_ref().unwrap();
        assert_eq!(bot.waypoint_set_ms, 2_000);
        assert!(bot.waypoint.x.abs() <= 400.0);
        assert!(bot.waypoint.z.abs() <= 400.0);
    }

    #[test]
    fn test_waypoint_repicked_after_timeout() {
        let mut state = test_state();
        state.bot.as_mut().unwrap().waypoint_set_ms = 0;

        advance(&mut state, 11_000, TICK_MS);
        assert_eq!(state.bot.as_ref().unwrap().waypoint_set_ms, 11_000);
    }

    #[test]
    fn test_corner_overrides_waypoint_logic() {
        let mut state = test_state();
        let bot = state.bot.as_mut().unwrap();
        bot.position = Vec3::new(420.0, 0.0, 420.0);
        bot.rotation = FRAC_PI_4;
        // Standing on the waypoint; normal logic would repick it.
        bot.waypoint = Vec2::new(410.0, 410.0);
        bot.waypoint_set_ms = 500;

        advance(&mut state, 2_000, TICK_MS);

        let bot = state.bot.as_ref().unwrap();
        assert_eq!(bot.waypoint, Vec2::new(410.0, 410.0));
        assert_eq!(bot.waypoint_set_ms, 500);
        // Turned away from the corner, towards the center.
        assert!(bot.rotation < FRAC_PI_4);
        assert!(bot.velocity.length() > 0.0);
    }

    #[test]
    fn test_wall_stops_dead_and_forces_new_waypoint() {
        let mut state = test_state();
        let bot = state.bot.as_mut().unwrap();
        bot.position = Vec3::new(489.0, 0.0, 0.0);
        bot.rotation = FRAC_PI_2;

        advance(&mut state, 3_000, TICK_MS);

        let bot = state.bot.as_ref().unwrap();
        assert_eq!(bot.position.x, 490.0);
        assert_eq!(bot.velocity.x, 0.0);
        assert_eq!(bot.waypoint_set_ms, 3_000);
    }

    #[test]
    fn test_velocity_clamped_while_holding_standoff() {
        let mut state = test_state();
        add_vulnerable_player(&mut state, Vec3::new(0.0, 0.0, 35.0));
        state.bot.as_mut().unwrap().velocity = Vec2::new(1.0, 1.0);

        advance(&mut state, 1_000, TICK_MS);

        let bot = state.bot.as_ref().unwrap();
        assert_eq!(bot.state, BotState::Attack);
        let max = state.tuning().bot.max_velocity;
        assert!(bot.velocity.length() <= max);
        // Position moved by at most one clamped step.
        assert!(bot.position.xz().length() <= max * TICK_MS + 1e-3);
    }

    #[test]
    fn test_reverses_when_inside_minimum_range() {
        let mut state = test_state();
        add_vulnerable_player(&mut state, Vec3::new(0.0, 0.0, 20.0));

        let frame = advance(&mut state, 1_000, TICK_MS).unwrap();

        let bot = state.bot.as_ref().unwrap();
        assert_eq!(bot.state, BotState::Attack);
        assert!(bot.position.z < 0.0, "expected to back away");
        // Backing up does not stop the gun.
        assert!(frame.did_fire);
    }

    #[test]
    fn test_advances_when_beyond_optimal_range() {
        let mut tuning = Tuning::default();
        tuning.bot.machine_gun_range = 80.0;
        let mut state = test_state_with(tuning);
        add_vulnerable_player(&mut state, Vec3::new(0.0, 0.0, 55.0));

        advance(&mut state, 1_000, TICK_MS);

        let bot = state.bot.as_ref().unwrap();
        assert_eq!(bot.state, BotState::Attack);
        assert!(bot.position.z > 0.0, "expected to close the gap");
    }

    #[test]
    fn test_dead_or_absent_bot_is_noop() {
        let mut state = test_state();
        state.bot.as_mut().unwrap().alive = false;
        assert!(advance(&mut state, 1_000, TICK_MS).is_none());

        state.bot = None;
        assert!(advance(&mut state, 1_000, TICK_MS).is_none());
    }
}
