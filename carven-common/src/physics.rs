use crate::prelude::*;
use nalgebra::{vector, Vector3};
use std::{ops::RangeInclusive, sync::Arc};

use super::{
    aabb::Aabb,
    transform::Transform,
    world::{BlockPos, ChunkSnapshotCache, VoxelWorld},
    Axis,
};

pub const GRAVITY: f32 = 27.0;

// colliders tunnel through walls if a single sweep moves them further than
// one block; cut large sweeps into steps no longer than this.
const MAX_STEP_DISTANCE: f32 = 0.5;
const GROUND_PROBE: f32 = 1e-3;

#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct RigidBody {
    pub acceleration: Vector3<f32>,
    pub velocity: Vector3<f32>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AabbCollider {
    pub aabb: Aabb,
    pub on_ground: bool,
}

impl AabbCollider {
    pub fn new(aabb: Aabb) -> Self {
        Self {
            aabb,
            on_ground: false,
        }
    }

    /// The collision box of a character `width` wide and `height` tall whose
    /// transform origin sits at the center of its feet.
    pub fn character(width: f32, height: f32) -> Self {
        Self::new(Aabb {
            min: nalgebra::point![-width / 2.0, 0.0, -width / 2.0],
            max: nalgebra::point![width / 2.0, height, width / 2.0],
        })
    }
}

fn make_collision_bound(max: f32) -> i32 {
    if max.floor() == max {
        max.floor() as i32 - 1
    } else {
        max.floor() as i32
    }
}

fn make_collision_range(min: f32, max: f32) -> RangeInclusive<i32> {
    assert!(min < max);
    min.floor() as i32..=make_collision_bound(max)
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SweepOutcome {
    pub aabb: Aabb,
    /// Whether motion along each axis was cancelled by terrain.
    pub blocked: [bool; 3],
    pub on_ground: bool,
}

fn axis_leading_block(aabb: &Aabb, axis: Axis, negative: bool) -> i32 {
    let (min, max) = match axis {
        Axis::X => (aabb.min.x, aabb.max.x),
        Axis::Y => (aabb.min.y, aabb.max.y),
        Axis::Z => (aabb.min.z, aabb.max.z),
    };
    if negative {
        min.floor() as i32
    } else {
        make_collision_bound(max)
    }
}

/// Probe every block the leading face of `aabb` overlaps at depth `lead`
/// along `axis`.
fn leading_face_collides(
    cache: &mut ChunkSnapshotCache,
    aabb: &Aabb,
    axis: Axis,
    lead: i32,
) -> bool {
    let (ua, va) = match axis {
        Axis::X => ((aabb.min.y, aabb.max.y), (aabb.min.z, aabb.max.z)),
        Axis::Y => ((aabb.min.x, aabb.max.x), (aabb.min.z, aabb.max.z)),
        Axis::Z => ((aabb.min.x, aabb.max.x), (aabb.min.y, aabb.max.y)),
    };

    for u in make_collision_range(ua.0, ua.1) {
        for v in make_collision_range(va.0, va.1) {
            let pos = match axis {
                Axis::X => BlockPos::new([lead, u, v]),
                Axis::Y => BlockPos::new([u, lead, v]),
                Axis::Z => BlockPos::new([u, v, lead]),
            };
            if cache.solid(pos) {
                return true;
            }
        }
    }

    false
}

/// Sweep `aabb` along one axis by `delta`, stopping flush against the first
/// solid block in the way. Returns whether the motion was blocked.
fn sweep_axis(cache: &mut ChunkSnapshotCache, aabb: &mut Aabb, axis: Axis, delta: f32) -> bool {
    if delta == 0.0 {
        return false;
    }

    let negative = delta < 0.0;
    let steps = usize::max(1, (delta.abs() / MAX_STEP_DISTANCE).ceil() as usize);
    let step = delta / steps as f32;
    let mut axis_unit = vector![0.0, 0.0, 0.0];
    axis_unit[axis as usize] = 1.0;

    for _ in 0..steps {
        *aabb = aabb.translated(step * axis_unit);
        let lead = axis_leading_block(aabb, axis, negative);
        if leading_face_collides(cache, aabb, axis, lead) {
            let flush = if negative {
                lead as f32 + 1.0 - aabb.min[axis as usize]
            } else {
                lead as f32 - aabb.max[axis as usize]
            };
            *aabb = aabb.translated(flush * axis_unit);
            return true;
        }
    }

    false
}

fn probe_ground(cache: &mut ChunkSnapshotCache, aabb: &Aabb) -> bool {
    let y = (aabb.min.y - GROUND_PROBE).floor() as i32;
    for x in make_collision_range(aabb.min.x, aabb.max.x) {
        for z in make_collision_range(aabb.min.z, aabb.max.z) {
            if cache.solid(BlockPos::new([x, y, z])) {
                return true;
            }
        }
    }
    false
}

/// Move `aabb` by `delta`, resolving the X, Z, and Y axes independently in
/// that order. An axis whose leading face runs into a solid block is clamped
/// flush against it and reported blocked.
pub fn sweep_terrain(
    cache: &mut ChunkSnapshotCache,
    start: Aabb,
    delta: Vector3<f32>,
) -> SweepOutcome {
    let mut aabb = start;
    let mut blocked = [false; 3];

    blocked[Axis::X as usize] = sweep_axis(cache, &mut aabb, Axis::X, delta.x);
    blocked[Axis::Z as usize] = sweep_axis(cache, &mut aabb, Axis::Z, delta.z);
    blocked[Axis::Y as usize] = sweep_axis(cache, &mut aabb, Axis::Y, delta.y);

    let on_ground = probe_ground(cache, &aabb);

    SweepOutcome {
        aabb,
        blocked,
        on_ground,
    }
}

pub struct PreviousCollider {
    pub aabb_world: Aabb,
}

pub fn fix_previous_colliders(
    mut cmd: Commands,
    query: Query<(Entity, &AabbCollider, &Transform), Without<PreviousCollider>>,
) {
    query.for_each_mut(|(entity, collider, transform)| {
        cmd.entity(entity).insert(PreviousCollider {
            aabb_world: collider.aabb.transformed(transform),
        });
    });
}

pub fn update_previous_colliders(query: Query<(&AabbCollider, &Transform, &mut PreviousCollider)>) {
    query.for_each_mut(|(collider, transform, mut previous)| {
        previous.aabb_world = collider.aabb.transformed(transform);
    });
}

// should happen after most code that deals with transforms happens.
pub fn terrain_collision(
    world: Res<Arc<VoxelWorld>>,
    query: Query<(
        &mut AabbCollider,
        &PreviousCollider,
        &mut RigidBody,
        &mut Transform,
    )>,
) {
    let mut cache = ChunkSnapshotCache::new(&world);

    query.for_each_mut(
        |(mut collider, previous_collider, mut rigidbody, mut transform)| {
            let current_aabb = collider.aabb.transformed(&transform);
            let delta = current_aabb.center() - previous_collider.aabb_world.center();

            let outcome = sweep_terrain(&mut cache, previous_collider.aabb_world, delta);

            if outcome.blocked[Axis::X as usize] {
                rigidbody.velocity.x = 0.0;
                rigidbody.acceleration.x = 0.0;
            }
            if outcome.blocked[Axis::Y as usize] {
                rigidbody.velocity.y = 0.0;
                rigidbody.acceleration.y = 0.0;
            }
            if outcome.blocked[Axis::Z as usize] {
                rigidbody.velocity.z = 0.0;
                rigidbody.acceleration.z = 0.0;
            }

            collider.on_ground = outcome.on_ground;

            let correction = outcome.aabb.center() - current_aabb.center();
            transform.translation.vector += correction;
        },
    );
}

pub fn apply_gravity(query: Query<&mut RigidBody>) {
    query.for_each_mut(|mut rigidbody| {
        rigidbody.acceleration.y -= GRAVITY;
    });
}

pub fn apply_rigidbody_motion(time: Res<Time>, query: Query<(&mut RigidBody, &mut Transform)>) {
    query.for_each_mut(|(mut rigidbody, mut transform)| {
        let dt = time.delta_seconds();

        let a = rigidbody.acceleration;
        rigidbody.acceleration = vector![0.0, 0.0, 0.0];

        let dv = a * dt;
        rigidbody.velocity += dv;

        let dp = rigidbody.velocity * dt;
        transform.translation.vector += dp;
    });
}

#[derive(Debug, Default)]
pub struct PhysicsPlugin {}

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut AppBuilder) {
        app.add_system(apply_gravity.system());
        app.add_system_to_stage(
            CoreStage::PostUpdate,
            apply_rigidbody_motion.system().label(MotionApplication),
        );
    }
}

#[derive(Debug, Default)]
pub struct CollisionPlugin {}

impl Plugin for CollisionPlugin {
    fn build(&self, app: &mut AppBuilder) {
        app.add_system_to_stage(
            CoreStage::PostUpdate,
            terrain_collision
                .system()
                .label(CollisionResolution)
                .after(MotionApplication),
        );
        app.add_system_to_stage(CoreStage::PreUpdate, fix_previous_colliders.system());
        app.add_system_to_stage(CoreStage::PreUpdate, update_previous_colliders.system());
    }
}

#[derive(Debug, Hash, PartialEq, Eq, Clone, SystemLabel)]
pub struct MotionApplication;

#[derive(Debug, Hash, PartialEq, Eq, Clone, SystemLabel)]
pub struct CollisionResolution;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{chunk::Block, VoxelWorld};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn floor_world() -> Arc<VoxelWorld> {
        let world = VoxelWorld::new();
        for z in -8..8 {
            for x in -8..8 {
                world.set_block(BlockPos::new([x, 0, z]), Block::new(255, [7, 7, 7]));
            }
        }
        world
    }

    fn character_aabb_at(pos: [f32; 3]) -> Aabb {
        AabbCollider::character(0.8, 2.0)
            .aabb
            .translated(vector![pos[0], pos[1], pos[2]])
    }

    #[test]
    fn falling_box_lands_flush_on_the_floor() {
        // S6: a 0.8 x 2.0 box dropped from y=5 under gravity alone settles
        // with its feet on top of the floor voxel and reports grounded.
        let world = floor_world();
        let mut cache = ChunkSnapshotCache::new(&world);

        let mut aabb = character_aabb_at([0.0, 5.0, 0.0]);
        let mut velocity_y = 0.0f32;
        let dt = 1.0 / 60.0;
        let mut grounded = false;

        for _ in 0..240 {
            velocity_y -= GRAVITY * dt;
            let outcome = sweep_terrain(&mut cache, aabb, vector![0.0, velocity_y * dt, 0.0]);
            aabb = outcome.aabb;
            if outcome.blocked[Axis::Y as usize] {
                velocity_y = 0.0;
            }
            grounded = outcome.on_ground;
        }

        // floor voxel 0 occupies [0, 1); feet come to rest at y = 1
        assert_relative_eq!(aabb.min.y, 1.0, epsilon = 1e-4);
        assert!(grounded);
    }

    #[test]
    fn horizontal_sweep_stops_at_a_wall() {
        let world = floor_world();
        for y in 1..4 {
            world.set_block(BlockPos::new([3, y, 0]), Block::new(255, [0; 3]));
        }
        let mut cache = ChunkSnapshotCache::new(&world);

        let aabb = character_aabb_at([0.0, 1.0, 0.5]);
        let outcome = sweep_terrain(&mut cache, aabb, vector![5.0, 0.0, 0.0]);

        assert!(outcome.blocked[Axis::X as usize]);
        // flush against the wall block at x=3
        assert_relative_eq!(outcome.aabb.max.x, 3.0, epsilon = 1e-4);
        assert!(outcome.on_ground);
    }

    #[test]
    fn ceiling_blocks_upward_motion() {
        let world = floor_world();
        for z in -2..3 {
            for x in -2..3 {
                world.set_block(BlockPos::new([x, 4, z]), Block::new(255, [0; 3]));
            }
        }
        let mut cache = ChunkSnapshotCache::new(&world);

        let aabb = character_aabb_at([0.0, 1.0, 0.0]);
        let outcome = sweep_terrain(&mut cache, aabb, vector![0.0, 3.0, 0.0]);

        assert!(outcome.blocked[Axis::Y as usize]);
        // head flush against the ceiling at y=4
        assert_relative_eq!(outcome.aabb.max.y, 4.0, epsilon = 1e-4);
    }

    #[test]
    fn unobstructed_sweep_applies_the_full_delta() {
        let world = floor_world();
        let mut cache = ChunkSnapshotCache::new(&world);

        let aabb = character_aabb_at([0.0, 2.5, 0.0]);
        let outcome = sweep_terrain(&mut cache, aabb, vector![1.25, 0.5, -2.0]);

        assert_eq!(outcome.blocked, [false; 3]);
        assert_relative_eq!(outcome.aabb.min.x, -0.4 + 1.25, epsilon = 1e-5);
        assert_relative_eq!(outcome.aabb.min.y, 3.0, epsilon = 1e-5);
        assert!(!outcome.on_ground);
    }
}
