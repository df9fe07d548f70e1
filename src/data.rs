use cgmath::{Point3, Vector3, Zero};

/// A point owned by the external mass-spring integrator.
///
/// The folding core reads the coordinates once, to assign the point to a face,
/// and afterwards only writes kinematics back through this trait.
pub trait SpringVertex {
    fn coords(&self) -> Point3<f64>;

    fn set_position(&mut self, position: Point3<f64>);

    fn set_velocity(&mut self, velocity: Vector3<f64>);

    fn set_acceleration(&mut self, acceleration: Vector3<f64>);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexData {
    // The position of this vertex in 3-space
    pub position: Point3<f64>,

    // The current velocity of this vertex
    pub velocity: Vector3<f64>,

    // The current acceleration of this vertex
    pub acceleration: Vector3<f64>,
}

impl VertexData {
    pub fn new(position: Point3<f64>) -> VertexData {
        VertexData {
            position,
            velocity: Vector3::zero(),
            acceleration: Vector3::zero(),
        }
    }
}

impl SpringVertex for VertexData {
    fn coords(&self) -> Point3<f64> {
        self.position
    }

    fn set_position(&mut self, position: Point3<f64>) {
        self.position = position;
    }

    fn set_velocity(&mut self, velocity: Vector3<f64>) {
        self.velocity = velocity;
    }

    fn set_acceleration(&mut self, acceleration: Vector3<f64>) {
        self.acceleration = acceleration;
    }
}
