use crate::prelude::*;
use nalgebra::{vector, Point3, Vector3};
use std::sync::Arc;

use super::{
    physics::{AabbCollider, RigidBody},
    transform::Transform,
    world::{chunk::Block, Ray3, VoxelWorld},
};

/// One frame of controller input. The real input layer lives in the
/// embedding application; it fills this resource and the controllers consume
/// it.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct ControllerInput {
    /// Desired movement in the controller's local frame: `x` strafes right,
    /// `y` climbs (fly only), `z` moves forward. Components in `[-1, 1]`.
    pub movement: Vector3<f32>,
    pub jump: bool,
    pub break_block: bool,
    pub place_block: bool,
    /// Color given to placed blocks.
    pub place_color: [u8; 3],
}

fn look_ray(transform: &Transform) -> Ray3<f32> {
    Ray3 {
        direction: transform
            .rotation
            .to_quaternion()
            .transform_vector(&vector![0.0, 0.0, -1.0]),
        origin: Point3::from(transform.translation.vector),
    }
}

/// A free-flying camera body with raycast block break/place.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FlyController {
    pub speed: f32,
    pub reach: f32,
    prev_break: bool,
    prev_place: bool,
}

impl Default for FlyController {
    fn default() -> Self {
        Self {
            speed: 10.0,
            reach: 10.0,
            prev_break: false,
            prev_place: false,
        }
    }
}

impl FlyController {
    pub fn update(
        &mut self,
        world: &Arc<VoxelWorld>,
        input: &ControllerInput,
        transform: &mut Transform,
        dt: f32,
    ) {
        let movement = vector![input.movement.x, 0.0, -input.movement.z];
        transform.translate_local(self.speed * dt * movement);
        transform.translate_global(vector![0.0, self.speed * dt * input.movement.y, 0.0]);

        let break_edge = input.break_block && !self.prev_break;
        let place_edge = input.place_block && !self.prev_place;
        self.prev_break = input.break_block;
        self.prev_place = input.place_block;

        if !break_edge && !place_edge {
            return;
        }

        let hit = match world.raycast(look_ray(transform), self.reach) {
            Some(hit) => hit,
            None => return,
        };

        if break_edge {
            world.set_block(hit.pos, Block::EMPTY);
        } else if let Some(side) = hit.side {
            let normal = side.normal::<i32>();
            let target = hit.pos.offset([normal.x, normal.y, normal.z]);
            world.set_block(target, Block::new(255, input.place_color));
        }
    }
}

pub fn fly_controller(
    time: Res<Time>,
    input: Res<ControllerInput>,
    world: Res<Arc<VoxelWorld>>,
    query: Query<(&mut Transform, &mut FlyController)>,
) {
    query.for_each_mut(|(mut transform, mut controller)| {
        controller.update(&world, &input, &mut transform, time.delta_seconds());
    });
}

/// A walking character: an AABB body driven by horizontal input, gravity,
/// and a jump impulse. Collision itself is resolved by
/// [`crate::physics::terrain_collision`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CharacterController {
    pub speed: f32,
    pub jump_impulse: f32,
    prev_jump: bool,
}

impl Default for CharacterController {
    fn default() -> Self {
        Self {
            speed: 4.5,
            jump_impulse: 9.0,
            prev_jump: false,
        }
    }
}

impl CharacterController {
    pub fn update(
        &mut self,
        input: &ControllerInput,
        transform: &Transform,
        rigidbody: &mut RigidBody,
        collider: &AabbCollider,
    ) {
        // movement input steers in the yaw plane only
        let yaw = transform.rotation.yaw;
        let forward = vector![-yaw.sin(), 0.0, -yaw.cos()];
        let right = vector![yaw.cos(), 0.0, -yaw.sin()];

        let desired = self.speed * (input.movement.x * right + input.movement.z * forward);
        rigidbody.velocity.x = desired.x;
        rigidbody.velocity.z = desired.z;

        if input.jump && !self.prev_jump && collider.on_ground {
            rigidbody.velocity.y = self.jump_impulse;
        }
        self.prev_jump = input.jump;
    }
}

pub fn character_controller(
    input: Res<ControllerInput>,
    query: Query<(
        &Transform,
        &mut RigidBody,
        &AabbCollider,
        &mut CharacterController,
    )>,
) {
    query.for_each_mut(|(transform, mut rigidbody, collider, mut controller)| {
        controller.update(&input, transform, &mut rigidbody, &collider);
    });
}

#[derive(Debug, Default)]
pub struct ControllerPlugin {}

impl Plugin for ControllerPlugin {
    fn build(&self, app: &mut AppBuilder) {
        app.insert_resource(ControllerInput::default());
        app.add_system(fly_controller.system());
        app.add_system(character_controller.system());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{transform::EulerAngles, world::BlockPos};
    use approx::assert_relative_eq;

    fn looking_neg_x_from(pos: [f32; 3]) -> Transform {
        let mut transform = Transform::to(nalgebra::point![pos[0], pos[1], pos[2]]);
        transform.rotation = EulerAngles::new(0.0, std::f32::consts::FRAC_PI_2, 0.0);
        transform
    }

    #[test]
    fn place_attaches_to_the_hit_face() {
        let world = VoxelWorld::new();
        world.set_block(BlockPos::new([0, 0, 0]), Block::new(255, [1, 1, 1]));

        let mut transform = looking_neg_x_from([4.0, 0.0, 0.0]);
        let mut controller = FlyController::default();
        let input = ControllerInput {
            place_block: true,
            place_color: [200, 100, 50],
            ..Default::default()
        };

        controller.update(&world, &input, &mut transform, 0.0);

        let placed = world.block(BlockPos::new([1, 0, 0]));
        assert_eq!(placed, Block::new(255, [200, 100, 50]));
    }

    #[test]
    fn held_place_button_only_places_once() {
        let world = VoxelWorld::new();
        world.set_block(BlockPos::new([0, 0, 0]), Block::new(255, [1, 1, 1]));

        let mut transform = looking_neg_x_from([4.0, 0.0, 0.0]);
        let mut controller = FlyController::default();
        let input = ControllerInput {
            place_block: true,
            place_color: [9, 9, 9],
            ..Default::default()
        };

        controller.update(&world, &input, &mut transform, 0.0);
        assert!(world.solid(BlockPos::new([1, 0, 0])));

        // still held; the next nearest face would be on block (1, 0, 0)
        controller.update(&world, &input, &mut transform, 0.0);
        assert!(!world.solid(BlockPos::new([2, 0, 0])));
    }

    #[test]
    fn break_clears_the_hit_block() {
        let world = VoxelWorld::new();
        world.set_block(BlockPos::new([0, 0, 0]), Block::new(255, [1, 1, 1]));

        let mut transform = looking_neg_x_from([4.0, 0.0, 0.0]);
        let mut controller = FlyController::default();
        let input = ControllerInput {
            break_block: true,
            ..Default::default()
        };

        controller.update(&world, &input, &mut transform, 0.0);
        assert_eq!(world.block(BlockPos::new([0, 0, 0])), Block::EMPTY);
    }

    #[test]
    fn fly_moves_along_the_look_direction() {
        let world = VoxelWorld::new();
        let mut transform = looking_neg_x_from([0.0, 0.0, 0.0]);
        let mut controller = FlyController::default();
        let input = ControllerInput {
            movement: vector![0.0, 0.0, 1.0],
            ..Default::default()
        };

        controller.update(&world, &input, &mut transform, 0.5);
        // forward at 10 units/s for half a second, looking down -X
        assert_relative_eq!(transform.translation.vector.x, -5.0, epsilon = 1e-4);
        assert_relative_eq!(transform.translation.vector.y, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn jump_requires_ground_contact() {
        let mut rigidbody = RigidBody::default();
        let transform = Transform::default();
        let mut controller = CharacterController::default();

        let airborne = AabbCollider::character(0.8, 2.0);
        controller.update(
            &ControllerInput {
                jump: true,
                ..Default::default()
            },
            &transform,
            &mut rigidbody,
            &airborne,
        );
        assert_eq!(rigidbody.velocity.y, 0.0);

        let mut grounded = AabbCollider::character(0.8, 2.0);
        grounded.on_ground = true;
        let mut controller = CharacterController::default();
        controller.update(
            &ControllerInput {
                jump: true,
                ..Default::default()
            },
            &transform,
            &mut rigidbody,
            &grounded,
        );
        assert_eq!(rigidbody.velocity.y, controller.jump_impulse);
    }

    #[test]
    fn movement_input_sets_horizontal_velocity_only() {
        let mut rigidbody = RigidBody {
            velocity: vector![0.0, -3.0, 0.0],
            ..Default::default()
        };
        let transform = Transform::default();
        let mut controller = CharacterController::default();

        controller.update(
            &ControllerInput {
                movement: vector![0.0, 0.0, 1.0],
                ..Default::default()
            },
            &transform,
            &mut rigidbody,
            &AabbCollider::character(0.8, 2.0),
        );

        // default yaw faces -Z
        assert_relative_eq!(rigidbody.velocity.z, -controller.speed, epsilon = 1e-5);
        assert_relative_eq!(rigidbody.velocity.y, -3.0, epsilon = 1e-5);
    }
}
