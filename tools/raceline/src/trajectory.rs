//! Trajectory points with planar heading

use raceline_common::{Error, Result};

/// Pose and target speed of one trajectory sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub x_quat: f64,
    pub y_quat: f64,
    pub z_quat: f64,
    pub w_quat: f64,
    /// m/s
    pub speed: f64,
}

impl TrajectoryPoint {
    pub fn new(x: f64, y: f64, z: f64, yaw: f64, speed: f64) -> Self {
        let (x_quat, y_quat, z_quat, w_quat) = quat_from_yaw(yaw);
        Self {
            x,
            y,
            z,
            x_quat,
            y_quat,
            z_quat,
            w_quat,
            speed,
        }
    }

    pub fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn yaw(&self) -> f64 {
        2.0 * self.z_quat.atan2(self.w_quat)
    }
}

pub fn kmh_to_mps(kmh: f64) -> f64 {
    kmh / 3.6
}

pub fn yaw_between(from: (f64, f64), to: (f64, f64)) -> f64 {
    (to.1 - from.1).atan2(to.0 - from.0)
}

/// Unit quaternion `(x, y, z, w)` for a rotation about the z axis.
pub fn quat_from_yaw(yaw: f64) -> (f64, f64, f64, f64) {
    let (sin_half, cos_half) = (0.5 * yaw).sin_cos();
    (0.0, 0.0, sin_half, cos_half)
}

/// Heading at every point: the first point looks at the second, every other
/// point looks back along the segment that reached it.
pub fn headings(points: &[(f64, f64)]) -> Result<Vec<f64>> {
    if points.len() < 2 {
        return Err(Error::insufficient("trajectory heading", 2, points.len()));
    }
    Ok((0..points.len())
        .map(|i| {
            if i == 0 {
                yaw_between(points[0], points[1])
            } else {
                yaw_between(points[i - 1], points[i])
            }
        })
        .collect())
}

/// Trajectory along `points` with one speed per point.
pub fn build_trajectory(points: &[(f64, f64)], z: f64, speeds: &[f64]) -> Result<Vec<TrajectoryPoint>> {
    if speeds.len() != points.len() {
        return Err(Error::InvalidInput(format!(
            "{} speeds for {} points",
            speeds.len(),
            points.len()
        )));
    }
    let yaws = headings(points)?;
    Ok(points
        .iter()
        .zip(yaws)
        .zip(speeds)
        .map(|((&(x, y), yaw), &speed)| TrajectoryPoint::new(x, y, z, yaw, speed))
        .collect())
}

/// Trajectory along `points` at a constant speed.
pub fn constant_speed_trajectory(points: &[(f64, f64)], z: f64, speed: f64) -> Result<Vec<TrajectoryPoint>> {
    build_trajectory(points, z, &vec![speed; points.len()])
}

/// Index-wise midpoints of two bounds, truncated to the shorter one.
pub fn midline(left: &[(f64, f64)], right: &[(f64, f64)]) -> Vec<(f64, f64)> {
    left.iter()
        .zip(right)
        .map(|(l, r)| ((l.0 + r.0) * 0.5, (l.1 + r.1) * 0.5))
        .collect()
}
