//! Pose and camera value types.

mod camera;
mod transform;

pub use camera::OrthographicCamera;
pub use transform::Transform;
