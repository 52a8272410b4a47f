use glam::{Mat4, Vec3, Vec4};

/// World basis. Objects face -Z when their orientation is identity, which
/// matches the right-handed, negative-z-forward camera convention.
pub const WORLD_FORWARD: Vec3 = Vec3::NEG_Z;
pub const WORLD_UP: Vec3 = Vec3::Y;
pub const WORLD_RIGHT: Vec3 = Vec3::X;

/// Right-handed perspective projection with reverse-Z depth: the near plane
/// maps to NDC depth 1 and the far plane to 0. `fov` is the vertical field
/// of view in degrees.
pub fn perspective_matrix(fov: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let sy = 1.0 / (0.5 * fov.to_radians()).tan();
    let sx = sy / aspect;
    let far_minus_near = far - near;
    let sz = near / far_minus_near;
    let sw = (far * near) / far_minus_near;

    Mat4::from_cols(
        Vec4::new(sx, 0.0, 0.0, 0.0),
        Vec4::new(0.0, sy, 0.0, 0.0),
        Vec4::new(0.0, 0.0, sz, -1.0),
        Vec4::new(0.0, 0.0, sw, 0.0),
    )
}

/// Right-handed orthographic projection with depth in [0, 1]: the near plane
/// maps to NDC depth 0 and the far plane to 1.
pub fn orthographic_matrix(
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
    near: f32,
    far: f32,
) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(2.0 / (right - left), 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 / (top - bottom), 0.0, 0.0),
        Vec4::new(0.0, 0.0, -1.0 / (far - near), 0.0),
        Vec4::new(
            (left + right) / (left - right),
            (top + bottom) / (bottom - top),
            near / (near - far),
            1.0,
        ),
    )
}

/// Rigid transform placing an object at `eye` with its -Z axis aimed at
/// `target`. This is the world matrix of a camera looking at `target`, not a
/// view matrix; invert it to get the view.
///
/// Falls back to [`WORLD_FORWARD`] as the up reference when `up` is parallel
/// to the view axis, so aiming straight up or down stays well defined.
pub fn look_at_matrix(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let z_axis = (eye - target).normalize();
    let mut x_axis = up.cross(z_axis);
    if x_axis.length_squared() < 1e-10 {
        x_axis = WORLD_FORWARD.cross(z_axis);
    }
    let x_axis = x_axis.normalize();
    let y_axis = z_axis.cross(x_axis);

    Mat4::from_cols(
        x_axis.extend(0.0),
        y_axis.extend(0.0),
        z_axis.extend(0.0),
        eye.extend(1.0),
    )
}
