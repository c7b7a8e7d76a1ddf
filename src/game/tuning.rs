//! Gameplay tuning.
//!
//! Defaults are the shipped game balance; every field can be overridden
//! through environment variables without code changes.

use std::f32::consts::PI;

/// Arena defaults
pub mod arena {
    /// Arena width along X, centered on the origin
    /// ENV: ARENA_WIDTH
    pub const WIDTH: f32 = 1000.0;
    /// Arena depth along Z, centered on the origin
    /// ENV: ARENA_HEIGHT
    pub const HEIGHT: f32 = 1000.0;
}

/// Player defaults
pub mod player {
    /// Full health granted on join and respawn
    /// ENV: PLAYER_MAX_HEALTH
    pub const MAX_HEALTH: i32 = 100;
    /// Collision radius of a vehicle
    /// ENV: PLAYER_RADIUS
    pub const RADIUS: f32 = 10.0;
    /// Spawn/respawn damage immunity window
    /// ENV: INVINCIBILITY_MS
    pub const INVINCIBILITY_MS: u64 = 5_000;
    /// Delay between elimination and automatic respawn
    /// ENV: RESPAWN_DELAY_MS
    pub const RESPAWN_DELAY_MS: u64 = 3_000;
    /// Players silent for this long are evicted
    /// ENV: INACTIVITY_TIMEOUT_MS
    pub const INACTIVITY_TIMEOUT_MS: u64 = 300_000;
}

/// Ramming-damage defaults (player vs player, player vs bot)
pub mod impact {
    /// Relative speed below which contact is a graze, not a hit
    /// ENV: MIN_IMPACT_SPEED
    pub const MIN_SPEED: f32 = 0.1;
    /// Damage per unit of relative speed
    /// ENV: IMPACT_DAMAGE_SCALE
    pub const DAMAGE_SCALE: f32 = 20.0;
    /// Hard cap on base damage from a single contact
    /// ENV: IMPACT_DAMAGE_CAP
    pub const DAMAGE_CAP: i32 = 50;
    /// Multiplier for the slower party (the one being rammed)
    /// ENV: COLLISION_SLOWER_MULT
    pub const SLOWER_MULT: f32 = 1.0;
    /// Multiplier for the faster party (the rammer)
    /// ENV: COLLISION_FASTER_MULT
    pub const FASTER_MULT: f32 = 0.25;
    /// Velocity reflection coefficient for bot contact
    /// ENV: BOUNCE_RESTITUTION
    pub const RESTITUTION: f32 = 0.5;
    /// Velocity damping applied after the bounce
    /// ENV: BOUNCE_DAMPING
    pub const DAMPING: f32 = 0.8;
    /// Per-player cooldown between obstacle damage applications
    /// ENV: OBSTACLE_HIT_COOLDOWN_MS
    pub const OBSTACLE_HIT_COOLDOWN_MS: u64 = 500;
}

/// Turret bot defaults (BOT_* env prefix)
pub mod bot {
    /// ENV: BOT_HEALTH
    pub const HEALTH: i32 = 2_000;
    /// ENV: BOT_RADIUS
    pub const RADIUS: f32 = 10.0;
    /// Incoming damage multiplier; the bot is everyone's target
    /// ENV: BOT_VULNERABILITY
    pub const VULNERABILITY: f32 = 1.5;
    /// ENV: BOT_MACHINE_GUN_RANGE
    pub const MACHINE_GUN_RANGE: f32 = 50.0;
    /// Base damage per machine-gun hit before distance scaling
    /// ENV: BOT_MACHINE_GUN_DAMAGE
    pub const MACHINE_GUN_DAMAGE: i32 = 5;
    /// Full firing arc; hits land within half of this either side of forward
    /// ENV: BOT_MACHINE_GUN_ARC_DEG (degrees)
    pub const MACHINE_GUN_ARC: f32 = super::PI / 4.0;
    /// Minimum time between shots
    /// ENV: BOT_FIRE_INTERVAL_MS
    pub const FIRE_INTERVAL_MS: u64 = 500;
    /// Damage multiplier at point blank / at maximum range
    /// ENV: BOT_ARC_DAMAGE_MAX_MULT, BOT_ARC_DAMAGE_MIN_MULT
    pub const ARC_DAMAGE_MAX_MULT: f32 = 1.5;
    pub const ARC_DAMAGE_MIN_MULT: f32 = 0.5;
    /// ENV: BOT_DETECTION_RANGE
    pub const DETECTION_RANGE: f32 = 150.0;
    /// Standoff band while attacking
    /// ENV: BOT_MIN_ATTACK_RANGE, BOT_OPTIMAL_ATTACK_RANGE
    pub const MIN_ATTACK_RANGE: f32 = 30.0;
    pub const OPTIMAL_ATTACK_RANGE: f32 = 40.0;
    /// Grace period a lost line-of-sight target stays valid
    /// ENV: BOT_TARGET_MEMORY_MS
    pub const TARGET_MEMORY_MS: u64 = 3_000;
    /// Throttle for the obstacle line-of-sight test
    /// ENV: BOT_LOS_CHECK_INTERVAL_MS
    pub const LOS_CHECK_INTERVAL_MS: u64 = 100;
    /// ENV: BOT_RESPAWN_DELAY_MS
    pub const RESPAWN_DELAY_MS: u64 = 60_000;
    /// Score awarded to the player that destroys the bot
    /// ENV: BOT_KILL_POINTS
    pub const KILL_POINTS: u32 = 100;
    /// ENV: BOT_MOVE_SPEED
    pub const MOVE_SPEED: f32 = 3.0;
    /// Radians per update step at 1x multiplier
    /// ENV: BOT_TURN_SPEED
    pub const TURN_SPEED: f32 = 0.03;
    /// ENV: BOT_MAX_VELOCITY
    pub const MAX_VELOCITY: f32 = 0.07;
    /// Wander waypoints keep this far from the walls
    /// ENV: BOT_BOUNDARY_MARGIN
    pub const BOUNDARY_MARGIN: f32 = 100.0;
    /// ENV: BOT_FRICTION
    pub const FRICTION: f32 = 0.94;
    /// Distance from two adjacent walls that counts as a corner
    /// ENV: BOT_CORNER_MARGIN
    pub const CORNER_MARGIN: f32 = 150.0;
}

/// Obstacle field defaults (OBSTACLE_* env prefix)
pub mod obstacle {
    /// ENV: OBSTACLE_COUNT
    pub const COUNT: usize = 10;
    /// Radius range for generated rocks
    /// ENV: OBSTACLE_MIN_RADIUS, OBSTACLE_MAX_RADIUS
    pub const MIN_RADIUS: f32 = 4.0;
    pub const MAX_RADIUS: f32 = 10.0;
    /// Contact damage range for generated rocks
    /// ENV: OBSTACLE_MIN_DAMAGE, OBSTACLE_MAX_DAMAGE
    pub const MIN_DAMAGE: i32 = 5;
    pub const MAX_DAMAGE: i32 = 15;
    /// Keep-out radius around the arena center
    /// ENV: OBSTACLE_CENTER_CLEARANCE
    pub const CENTER_CLEARANCE: f32 = 50.0;
    /// Keep-out band along the arena edges
    /// ENV: OBSTACLE_EDGE_MARGIN
    pub const EDGE_MARGIN: f32 = 100.0;
}

#[derive(Debug, Clone)]
pub struct ArenaTuning {
    pub width: f32,
    pub height: f32,
}

impl ArenaTuning {
    #[inline]
    pub fn half_width(&self) -> f32 {
        self.width / 2.0
    }

    #[inline]
    pub fn half_height(&self) -> f32 {
        self.height / 2.0
    }
}

#[derive(Debug, Clone)]
pub struct PlayerTuning {
    pub max_health: i32,
    pub radius: f32,
    pub invincibility_ms: u64,
    pub respawn_delay_ms: u64,
    pub inactivity_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ImpactTuning {
    pub min_speed: f32,
    pub damage_scale: f32,
    pub damage_cap: i32,
    pub slower_mult: f32,
    pub faster_mult: f32,
    pub restitution: f32,
    pub damping: f32,
    pub obstacle_hit_cooldown_ms: u64,
}

#[derive(Debug, Clone)]
pub struct BotTuning {
    pub health: i32,
    pub radius: f32,
    pub vulnerability: f32,
    pub machine_gun_range: f32,
    pub machine_gun_damage: i32,
    pub machine_gun_arc: f32,
    pub fire_interval_ms: u64,
    pub arc_damage_max_mult: f32,
    pub arc_damage_min_mult: f32,
    pub detection_range: f32,
    pub min_attack_range: f32,
    pub optimal_attack_range: f32,
    pub target_memory_ms: u64,
    pub los_check_interval_ms: u64,
    pub respawn_delay_ms: u64,
    pub kill_points: u32,
    pub move_speed: f32,
    pub turn_speed: f32,
    pub max_velocity: f32,
    pub boundary_margin: f32,
    pub friction: f32,
    pub corner_margin: f32,
}

#[derive(Debug, Clone)]
pub struct ObstacleTuning {
    pub count: usize,
    pub min_radius: f32,
    pub max_radius: f32,
    pub min_damage: i32,
    pub max_damage: i32,
    pub center_clearance: f32,
    pub edge_margin: f32,
}

/// Every gameplay tunable, grouped by concern
#[derive(Debug, Clone)]
pub struct Tuning {
    pub arena: ArenaTuning,
    pub player: PlayerTuning,
    pub impact: ImpactTuning,
    pub bot: BotTuning,
    pub obstacle: ObstacleTuning,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            arena: ArenaTuning {
                width: arena::WIDTH,
                height: arena::HEIGHT,
            },
            player: PlayerTuning {
                max_health: player::MAX_HEALTH,
                radius: player::RADIUS,
                invincibility_ms: player::INVINCIBILITY_MS,
                respawn_delay_ms: player::RESPAWN_DELAY_MS,
                inactivity_timeout_ms: player::INACTIVITY_TIMEOUT_MS,
            },
            impact: ImpactTuning {
                min_speed: impact::MIN_SPEED,
                damage_scale: impact::DAMAGE_SCALE,
                damage_cap: impact::DAMAGE_CAP,
                slower_mult: impact::SLOWER_MULT,
                faster_mult: impact::FASTER_MULT,
                restitution: impact::RESTITUTION,
                damping: impact::DAMPING,
                obstacle_hit_cooldown_ms: impact::OBSTACLE_HIT_COOLDOWN_MS,
            },
            bot: BotTuning {
                health: bot::HEALTH,
                radius: bot::RADIUS,
                vulnerability: bot::VULNERABILITY,
                machine_gun_range: bot::MACHINE_GUN_RANGE,
                machine_gun_damage: bot::MACHINE_GUN_DAMAGE,
                machine_gun_arc: bot::MACHINE_GUN_ARC,
                fire_interval_ms: bot::FIRE_INTERVAL_MS,
                arc_damage_max_mult: bot::ARC_DAMAGE_MAX_MULT,
                arc_damage_min_mult: bot::ARC_DAMAGE_MIN_MULT,
                detection_range: bot::DETECTION_RANGE,
                min_attack_range: bot::MIN_ATTACK_RANGE,
                optimal_attack_range: bot::OPTIMAL_ATTACK_RANGE,
                target_memory_ms: bot::TARGET_MEMORY_MS,
                los_check_interval_ms: bot::LOS_CHECK_INTERVAL_MS,
                respawn_delay_ms: bot::RESPAWN_DELAY_MS,
                kill_points: bot::KILL_POINTS,
                move_speed: bot::MOVE_SPEED,
                turn_speed: bot::TURN_SPEED,
                max_velocity: bot::MAX_VELOCITY,
                boundary_margin: bot::BOUNDARY_MARGIN,
                friction: bot::FRICTION,
                corner_margin: bot::CORNER_MARGIN,
            },
            obstacle: ObstacleTuning {
                count: obstacle::COUNT,
                min_radius: obstacle::MIN_RADIUS,
                max_radius: obstacle::MAX_RADIUS,
                min_damage: obstacle::MIN_DAMAGE,
                max_damage: obstacle::MAX_DAMAGE,
                center_clearance: obstacle::CENTER_CLEARANCE,
                edge_margin: obstacle::EDGE_MARGIN,
            },
        }
    }
}

impl Tuning {
    /// Load tuning from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut t = Self::default();

        if let Ok(val) = std::env::var("ARENA_WIDTH") {
            t.arena.width = val.parse().unwrap_or(arena::WIDTH);
        }
        if let Ok(val) = std::env::var("ARENA_HEIGHT") {
            t.arena.height = val.parse().unwrap_or(arena::HEIGHT);
        }

        if let Ok(val) = std::env::var("PLAYER_MAX_HEALTH") {
            t.player.max_health = val.parse().unwrap_or(player::MAX_HEALTH);
        }
        if let Ok(val) = std::env::var("PLAYER_RADIUS") {
            t.player.radius = val.parse().unwrap_or(player::RADIUS);
        }
        if let Ok(val) = std::env::var("INVINCIBILITY_MS") {
            t.player.invincibility_ms = val.parse().unwrap_or(player::INVINCIBILITY_MS);
        }
        if let Ok(val) = std::env::var("RESPAWN_DELAY_MS") {
            t.player.respawn_delay_ms = val.parse().unwrap_or(player::RESPAWN_DELAY_MS);
        }
        if let Ok(val) = std::env::var("INACTIVITY_TIMEOUT_MS") {
            t.player.inactivity_timeout_ms = val.parse().unwrap_or(player::INACTIVITY_TIMEOUT_MS);
        }

        if let Ok(val) = std::env::var("MIN_IMPACT_SPEED") {
            t.impact.min_speed = val.parse().unwrap_or(impact::MIN_SPEED);
        }
        if let Ok(val) = std::env::var("IMPACT_DAMAGE_SCALE") {
            t.impact.damage_scale = val.parse().unwrap_or(impact::DAMAGE_SCALE);
        }
        if let Ok(val) = std::env::var("IMPACT_DAMAGE_CAP") {
            t.impact.damage_cap = val.parse().unwrap_or(impact::DAMAGE_CAP);
        }
        if let Ok(val) = std::env::var("COLLISION_SLOWER_MULT") {
            t.impact.slower_mult = val.parse().unwrap_or(impact::SLOWER_MULT);
        }
        if let Ok(val) = std::env::var("COLLISION_FASTER_MULT") {
            t.impact.faster_mult = val.parse().unwrap_or(impact::FASTER_MULT);
        }
        if let Ok(val) = std::env::var("BOUNCE_RESTITUTION") {
            t.impact.restitution = val.parse().unwrap_or(impact::RESTITUTION);
        }
        if let Ok(val) = std::env::var("BOUNCE_DAMPING") {
            t.impact.damping = val.parse().unwrap_or(impact::DAMPING);
        }
        if let Ok(val) = std::env::var("OBSTACLE_HIT_COOLDOWN_MS") {
            t.impact.obstacle_hit_cooldown_ms =
                val.parse().unwrap_or(impact::OBSTACLE_HIT_COOLDOWN_MS);
        }

        if let Ok(val) = std::env::var("BOT_HEALTH") {
            t.bot.health = val.parse().unwrap_or(bot::HEALTH);
        }
        if let Ok(val) = std::env::var("BOT_RADIUS") {
            t.bot.radius = val.parse().unwrap_or(bot::RADIUS);
        }
        if let Ok(val) = std::env::var("BOT_VULNERABILITY") {
            t.bot.vulnerability = val.parse().unwrap_or(bot::VULNERABILITY);
        }
        if let Ok(val) = std::env::var("BOT_MACHINE_GUN_RANGE") {
            t.bot.machine_gun_range = val.parse().unwrap_or(bot::MACHINE_GUN_RANGE);
        }
        if let Ok(val) = std::env::var("BOT_MACHINE_GUN_DAMAGE") {
            t.bot.machine_gun_damage = val.parse().unwrap_or(bot::MACHINE_GUN_DAMAGE);
        }
        if let Ok(val) = std::env::var("BOT_MACHINE_GUN_ARC_DEG") {
            t.bot.machine_gun_arc = val
                .parse::<f32>()
                .map(f32::to_radians)
                .unwrap_or(bot::MACHINE_GUN_ARC);
        }
        if let Ok(val) = std::env::var("BOT_FIRE_INTERVAL_MS") {
            t.bot.fire_interval_ms = val.parse().unwrap_or(bot::FIRE_INTERVAL_MS);
        }
        if let Ok(val) = std::env::var("BOT_ARC_DAMAGE_MAX_MULT") {
            t.bot.arc_damage_max_mult = val.parse().unwrap_or(bot::ARC_DAMAGE_MAX_MULT);
        }
        if let Ok(val) = std::env::var("BOT_ARC_DAMAGE_MIN_MULT") {
            t.bot.arc_damage_min_mult = val.parse().unwrap_or(bot::ARC_DAMAGE_MIN_MULT);
        }
        if let Ok(val) = std::env::var("BOT_DETECTION_RANGE") {
            t.bot.detection_range = val.parse().unwrap_or(bot::DETECTION_RANGE);
        }
        if let Ok(val) = std::env::var("BOT_MIN_ATTACK_RANGE") {
            t.bot.min_attack_range = val.parse().unwrap_or(bot::MIN_ATTACK_RANGE);
        }
        if let Ok(val) = std::env::var("BOT_OPTIMAL_ATTACK_RANGE") {
            t.bot.optimal_attack_range = val.parse().unwrap_or(bot::OPTIMAL_ATTACK_RANGE);
        }
        if let Ok(val) = std::env::var("BOT_TARGET_MEMORY_MS") {
            t.bot.target_memory_ms = val.parse().unwrap_or(bot::TARGET_MEMORY_MS);
        }
        if let Ok(val) = std::env::var("BOT_LOS_CHECK_INTERVAL_MS") {
            t.bot.los_check_interval_ms = val.parse().unwrap_or(bot::LOS_CHECK_INTERVAL_MS);
        }
        if let Ok(val) = std::env::var("BOT_RESPAWN_DELAY_MS") {
            t.bot.respawn_delay_ms = val.parse().unwrap_or(bot::RESPAWN_DELAY_MS);
        }
        if let Ok(val) = std::env::var("BOT_KILL_POINTS") {
            t.bot.kill_points = val.parse().unwrap_or(bot::KILL_POINTS);
        }
        if let Ok(val) = std::env::var("BOT_MOVE_SPEED") {
            t.bot.move_speed = val.parse().unwrap_or(bot::MOVE_SPEED);
        }
        if let Ok(val) = std::env::var("BOT_TURN_SPEED") {
            t.bot.turn_speed = val.parse().unwrap_or(bot::TURN_SPEED);
        }
        if let Ok(val) = std::env::var("BOT_MAX_VELOCITY") {
            t.bot.max_velocity = val.parse().unwrap_or(bot::MAX_VELOCITY);
        }
        if let Ok(val) = std::env::var("BOT_BOUNDARY_MARGIN") {
            t.bot.boundary_margin = val.parse().unwrap_or(bot::BOUNDARY_MARGIN);
        }
        if let Ok(val) = std::env::var("BOT_FRICTION") {
            t.bot.friction = val.parse().unwrap_or(bot::FRICTION);
        }
        if let Ok(val) = std::env::var("BOT_CORNER_MARGIN") {
            t.bot.corner_margin = val.parse().unwrap_or(bot::CORNER_MARGIN);
        }

        if let Ok(val) = std::env::var("OBSTACLE_COUNT") {
            t.obstacle.count = val.parse().unwrap_or(obstacle::COUNT);
        }
        if let Ok(val) = std::env::var("OBSTACLE_MIN_RADIUS") {
            t.obstacle.min_radius = val.parse().unwrap_or(obstacle::MIN_RADIUS);
        }
        if let Ok(val) = std::env::var("OBSTACLE_MAX_RADIUS") {
            t.obstacle.max_radius = val.parse().unwrap_or(obstacle::MAX_RADIUS);
        }
        if let Ok(val) = std::env::var("OBSTACLE_MIN_DAMAGE") {
            t.obstacle.min_damage = val.parse().unwrap_or(obstacle::MIN_DAMAGE);
        }
        if let Ok(val) = std::env::var("OBSTACLE_MAX_DAMAGE") {
            t.obstacle.max_damage = val.parse().unwrap_or(obstacle::MAX_DAMAGE);
        }
        if let Ok(val) = std::env::var("OBSTACLE_CENTER_CLEARANCE") {
            t.obstacle.center_clearance = val.parse().unwrap_or(obstacle::CENTER_CLEARANCE);
        }
        if let Ok(val) = std::env::var("OBSTACLE_EDGE_MARGIN") {
            t.obstacle.edge_margin = val.parse().unwrap_or(obstacle::EDGE_MARGIN);
        }

        tracing::info!(
            arena = format!("{}x{}", t.arena.width, t.arena.height),
            bot_health = t.bot.health,
            gun_range = t.bot.machine_gun_range,
            damage_cap = t.impact.damage_cap,
            obstacles = t.obstacle.count,
            "Tuning loaded"
        );

        t
    }

    /// Sanity-check relationships between tunables
    pub fn validate(&self) -> Result<(), String> {
        if self.arena.width <= 0.0 || self.arena.height <= 0.0 {
            return Err("arena dimensions must be positive".to_string());
        }
        if self.player.max_health <= 0 {
            return Err("player max health must be positive".to_string());
        }
        if self.bot.health <= 0 {
            return Err("bot health must be positive".to_string());
        }
        if self.bot.min_attack_range > self.bot.optimal_attack_range {
            return Err("bot min attack range cannot exceed optimal range".to_string());
        }
        if self.bot.machine_gun_range < self.bot.optimal_attack_range {
            return Err("bot gun range cannot be inside the standoff band".to_string());
        }
        if !(0.0..=1.0).contains(&self.bot.friction) {
            return Err("bot friction must be in [0, 1]".to_string());
        }
        if self.impact.damage_cap < 0 {
            return Err("impact damage cap cannot be negative".to_string());
        }
        if self.bot.arc_damage_min_mult > self.bot.arc_damage_max_mult {
            return Err("arc damage band is inverted".to_string());
        }
        if self.obstacle.min_radius > self.obstacle.max_radius
            || self.obstacle.min_damage > self.obstacle.max_damage
        {
            return Err("obstacle ranges are inverted".to_string());
        }
        Ok(())
    }
}
