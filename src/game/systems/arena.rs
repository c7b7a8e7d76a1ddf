//! Arena geometry: spawn positions, boundary clamping, obstacle placement.

use rand::Rng;

use crate::game::state::Obstacle;
use crate::game::tuning::{ArenaTuning, Tuning};
use crate::util::vec2::{Vec2, Vec3};

/// Attempts to place an obstacle clear of the others before giving up
const OBSTACLE_PLACEMENT_ATTEMPTS: u32 = 30;

/// Gap kept between generated obstacles
const OBSTACLE_SPACING: f32 = 10.0;

/// Random spawn position anywhere in the arena, on the ground plane
pub fn random_spawn_position(arena: &ArenaTuning) -> Vec3 {
    let mut rng = rand::thread_rng();
    let x = rng.gen::<f32>() * arena.width - arena.half_width();
    let z = rng.gen::<f32>() * arena.height - arena.half_height();
    Vec3::new(x, 0.0, z)
}

/// Random ground-plane point at least `margin` away from every wall.
///
/// A margin at or beyond the half extent collapses to the arena center.
pub fn random_point(arena: &ArenaTuning, margin: f32) -> Vec2 {
    let mut rng = rand::thread_rng();
    let extent_x = (arena.half_width() - margin).max(0.0);
    let extent_z = (arena.half_height() - margin).max(0.0);
    let x = if extent_x > 0.0 {
        rng.gen_range(-extent_x..extent_x)
    } else {
        0.0
    };
    let z = if extent_z > 0.0 {
        rng.gen_range(-extent_z..extent_z)
    } else {
        0.0
    };
    Vec2::new(x, z)
}

/// Clamp a position into the arena rectangle; Y passes through untouched
pub fn clamp_position(arena: &ArenaTuning, position: Vec3) -> Vec3 {
    Vec3::new(
        position.x.clamp(-arena.half_width(), arena.half_width()),
        position.y,
        position.z.clamp(-arena.half_height(), arena.half_height()),
    )
}

/// Whether a ground-plane point lies inside the arena rectangle
pub fn in_bounds(arena: &ArenaTuning, point: Vec2) -> bool {
    point.x.abs() <= arena.half_width() && point.z.abs() <= arena.half_height()
}

/// Scatter the rock field once at startup.
///
/// Rocks keep clear of the arena center (players spawn everywhere, the bot
/// wanders through the middle), stay off the walls, and avoid piling onto
/// each other. Radius and contact damage are randomized per rock.
pub fn generate_obstacles(tuning: &Tuning) -> Vec<Obstacle> {
    let mut rng = rand::thread_rng();
    let cfg = &tuning.obstacle;
    let mut obstacles: Vec<Obstacle> = Vec::with_capacity(cfg.count);

    for _ in 0..cfg.count {
        let radius = rng.gen_range(cfg.min_radius..=cfg.max_radius);
        let damage = rng.gen_range(cfg.min_damage..=cfg.max_damage);

        let mut position = random_point(&tuning.arena, cfg.edge_margin);
        for _ in 0..OBSTACLE_PLACEMENT_ATTEMPTS {
            let candidate = random_point(&tuning.arena, cfg.edge_margin);
            let clear_of_center = candidate.length() >= cfg.center_clearance;
            let clear_of_rocks = obstacles.iter().all(|o| {
                candidate.distance_to(o.position) >= radius + o.radius + OBSTACLE_SPACING
            });
            if clear_of_center && clear_of_rocks {
                position = candidate;
                break;
            }
        }

        obstacles.push(Obstacle {
            position,
            radius,
            damage,
        });
    }

    obstacles
}
