use crate::transform::Transform;
use nalgebra::{Point3, Vector3};

/// An axis-aligned box. Collision sweeps and chunk skipping work on these;
/// `min` must stay component-wise below `max`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn dimensions(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn translated(&self, translation: Vector3<f32>) -> Aabb {
        Aabb {
            min: self.min + translation,
            max: self.max + translation,
        }
    }

    /// The box carried into world space: recentered where `transform` puts
    /// it, with the half-extents stretched by the transform's scale. Scaling
    /// around the center keeps a scaled box from drifting away from its
    /// entity.
    pub fn transformed(&self, transform: &Transform) -> Aabb {
        let center = transform.translation * self.center();
        let half = 0.5 * self.dimensions().component_mul(&transform.scale);
        Aabb {
            min: center - half,
            max: center + half,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{point, vector};

    fn unit_box() -> Aabb {
        Aabb {
            min: point![0.0, 0.0, 0.0],
            max: point![1.0, 2.0, 1.0],
        }
    }

    #[test]
    fn center_and_dimensions() {
        let aabb = unit_box();
        assert_eq!(aabb.dimensions(), vector![1.0, 2.0, 1.0]);
        assert_eq!(aabb.center(), point![0.5, 1.0, 0.5]);
    }

    #[test]
    fn translation_moves_both_corners() {
        let aabb = unit_box().translated(vector![3.0, -1.0, 0.5]);
        assert_eq!(aabb.min, point![3.0, -1.0, 0.5]);
        assert_eq!(aabb.max, point![4.0, 1.0, 1.5]);
    }

    #[test]
    fn transform_scales_about_the_center() {
        let mut transform = Transform::to(point![5.0, 0.0, 0.0]);
        transform.scale = vector![2.0, 2.0, 2.0];

        let aabb = unit_box().transformed(&transform);
        assert_eq!(aabb.center(), point![5.5, 1.0, 0.5]);
        assert_eq!(aabb.dimensions(), vector![2.0, 4.0, 2.0]);
    }
}
