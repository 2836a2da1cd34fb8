use nalgebra::{vector, Point3, Translation3, UnitQuaternion, Vector3};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EulerAngles {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl EulerAngles {
    pub fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    pub fn to_quaternion(&self) -> UnitQuaternion<f32> {
        UnitQuaternion::from_euler_angles(self.pitch, self.yaw, self.roll)
    }
}

/// Position, orientation, and scale of an entity. Orientation stays in euler
/// angles because the controllers clamp and wrap pitch/yaw directly.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub translation: Translation3<f32>,
    pub rotation: EulerAngles,
    pub scale: Vector3<f32>,
}

impl Transform {
    pub fn to(point: Point3<f32>) -> Self {
        Self {
            translation: Translation3::from(point),
            ..Default::default()
        }
    }

    /// Move in the entity's own frame; `translation` is rotated before it is
    /// applied.
    pub fn translate_local(&mut self, translation: Vector3<f32>) {
        let transformed_translation = self.rotation.to_quaternion() * translation;
        self.translation.vector += transformed_translation;
    }

    pub fn translate_global(&mut self, translation: Vector3<f32>) {
        self.translation.vector += translation.component_mul(&self.scale);
    }

    pub fn pos(&self) -> Point3<f32> {
        self.translation.vector.into()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            translation: Translation3::from(vector!(0.0, 0.0, 0.0)),
            rotation: EulerAngles::new(0.0, 0.0, 0.0),
            scale: vector!(1.0, 1.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::point;

    #[test]
    fn local_translation_follows_the_rotation() {
        let mut transform = Transform::default();
        transform.rotation.yaw = std::f32::consts::FRAC_PI_2;

        // -Z forward swings to -X under a quarter turn of yaw
        transform.translate_local(vector![0.0, 0.0, -1.0]);
        assert_relative_eq!(transform.pos().x, -1.0, epsilon = 1e-6);
        assert_relative_eq!(transform.pos().z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn global_translation_ignores_the_rotation() {
        let mut transform = Transform::to(point![1.0, 2.0, 3.0]);
        transform.rotation.yaw = 1.25;

        transform.translate_global(vector![0.0, 5.0, 0.0]);
        assert_eq!(transform.pos(), point![1.0, 7.0, 3.0]);
    }
}
