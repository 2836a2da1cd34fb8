use nalgebra::{vector, Vector3};
use num_traits::{One, Zero};
use std::ops::Neg;

pub mod aabb;
pub mod controller;
pub mod physics;
pub mod transform;
pub mod util;
pub mod world;

pub mod debug;

pub mod math {
    pub use nalgebra::{Matrix3, Matrix4, Point1, Point2, Point3, Vector2, Vector3, Vector4};
}

pub mod prelude {
    pub use super::util;

    pub use bevy_app::prelude::*;
    pub use bevy_core::prelude::*;
    pub use bevy_ecs::prelude::*;

    pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;
    pub use anyhow::{anyhow, bail};

    pub use nalgebra::{point, vector};
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

/// Six sides of a cube.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Side {
    /// Positive Y.
    Top,
    /// Negative Y.
    Bottom,
    /// Positive X.
    Right,
    /// Negative X.
    Left,
    /// Positive Z.
    Front,
    /// Negative Z.
    Back,
}

impl Side {
    pub fn facing_positive(&self) -> bool {
        match self {
            Side::Top | Side::Right | Side::Front => true,
            _ => false,
        }
    }

    pub fn normal<S: nalgebra::Scalar + One + Zero + Neg<Output = S>>(&self) -> Vector3<S> {
        match *self {
            Side::Top => vector!(S::zero(), S::one(), S::zero()),
            Side::Bottom => vector!(S::zero(), -S::one(), S::zero()),
            Side::Right => vector!(S::one(), S::zero(), S::zero()),
            Side::Left => vector!(-S::one(), S::zero(), S::zero()),
            Side::Front => vector!(S::zero(), S::zero(), S::one()),
            Side::Back => vector!(S::zero(), S::zero(), -S::one()),
        }
    }

    pub fn axis(&self) -> Axis {
        match self {
            Side::Left | Side::Right => Axis::X,
            Side::Top | Side::Bottom => Axis::Y,
            Side::Front | Side::Back => Axis::Z,
        }
    }

    /// The side whose outward normal points along `axis` against the sign of
    /// `step`. This is the face a ray stepping by `step` along `axis` enters
    /// a block through.
    pub fn entered_through(axis: Axis, step: i32) -> Side {
        match axis {
            Axis::X if step > 0 => Side::Left,
            Axis::X => Side::Right,
            Axis::Y if step > 0 => Side::Bottom,
            Axis::Y => Side::Top,
            Axis::Z if step > 0 => Side::Back,
            Axis::Z => Side::Front,
        }
    }

    /// take coordinates (u, v, l) where (u, v) is parallel to this face and
    /// convert it to a relative xyz coord
    pub fn uvl_to_xyz<S: nalgebra::Scalar + Copy + Zero + Neg<Output = S>>(
        &self,
        u: S,
        v: S,
        l: S,
    ) -> Vector3<S> {
        let axis = self.axis();
        let l = [-l, l][self.facing_positive() as usize];

        let mut vec = vector![S::zero(), S::zero(), S::zero()];
        vec[axis as usize % 3] = l;
        vec[(axis as usize + 1) % 3] = u;
        vec[(axis as usize + 2) % 3] = v;
        vec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uvl_is_face_relative() {
        // one step outward from the top face is one step along +Y
        assert_eq!(Side::Top.uvl_to_xyz(0, 0, 1), vector![0, 1, 0]);
        assert_eq!(Side::Bottom.uvl_to_xyz(0, 0, 1), vector![0, -1, 0]);
        // (u, v) spans the face plane
        assert_eq!(Side::Top.uvl_to_xyz(1, 0, 0), vector![0, 0, 1]);
        assert_eq!(Side::Right.uvl_to_xyz(0, 1, 0), vector![0, 0, 1]);
    }

    #[test]
    fn entered_through_opposes_step() {
        assert_eq!(Side::entered_through(Axis::Y, -1), Side::Top);
        assert_eq!(Side::entered_through(Axis::Y, 1), Side::Bottom);
        assert_eq!(Side::entered_through(Axis::X, 1), Side::Left);
        assert_eq!(Side::entered_through(Axis::Z, 1), Side::Back);
    }
}
