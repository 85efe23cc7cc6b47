use nalgebra::{Point3, UnitQuaternion, Vector3};

pub type Real = f64;

pub type Vec3 = Vector3<Real>;
pub type Pt3 = Point3<Real>;
pub type Quat = UnitQuaternion<Real>;

/// Euclidean distance between two points.
///
/// Non-finite coordinates propagate into the result.
pub fn distance(a: &Pt3, b: &Pt3) -> Real {
    (b - a).norm()
}

/// Clamp `x` into `[lo, hi]` without panicking on NaN or inverted bounds.
///
/// Values below `lo` map to `lo`, values above `hi` map to `hi`, NaN passes through.
pub fn clamp_range(x: Real, lo: Real, hi: Real) -> Real {
    if x < lo {
        lo
    } else if x > hi {
        hi
    } else {
        x
    }
}

/// Quaternion of a rotation of `angle_deg` degrees about X, other Euler angles zero.
pub fn euler_x_to_quat(angle_deg: Real) -> Quat {
    UnitQuaternion::from_euler_angles(angle_deg.to_radians(), 0.0, 0.0)
}

/// `(x, w)` components of a quaternion, in the `[qx, qy, qz, qw]` storage order.
pub fn quat_xw(q: &Quat) -> (Real, Real) {
    let c = q.into_inner().coords;
    (c[0], c[3])
}
