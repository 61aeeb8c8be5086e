//! Geometric features over landmark points.
//!
//! Pure functions only. Distances are in normalized frame units and ignore
//! depth; angles are degrees in (-180, 180].

use crate::tracking::LandmarkPoint;

/// Smallest denominator any feature ratio divides by
pub const MIN_DENOMINATOR: f32 = 1e-6;

/// Planar Euclidean distance between two landmarks
pub fn distance(a: LandmarkPoint, b: LandmarkPoint) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

/// Roll of the shoulder line in degrees. Zero for level shoulders with the
/// right shoulder further along +x; positive when the right shoulder sits
/// lower in the frame (image y grows downward).
pub fn shoulder_roll(left: LandmarkPoint, right: LandmarkPoint) -> f32 {
    let angle = (right.y - left.y).atan2(right.x - left.x).to_degrees();
    normalize_angle(angle)
}

/// Wrap an angle in degrees into (-180, 180]
pub fn normalize_angle(degrees: f32) -> f32 {
    let wrapped = degrees % 360.0;
    if wrapped > 180.0 {
        wrapped - 360.0
    } else if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Shortest signed rotation taking `current` to `target`
pub fn angle_diff(target: f32, current: f32) -> f32 {
    normalize_angle(target - current)
}

/// `numerator / denominator` with the denominator clamped to
/// [`MIN_DENOMINATOR`]
pub fn safe_ratio(numerator: f32, denominator: f32) -> f32 {
    numerator / denominator.max(MIN_DENOMINATOR)
}

/// Map a normalized coordinate to pixels, centred on the frame middle:
/// `(coord - 0.5) * dimension * sensitivity`
pub fn to_screen(coord: f32, dimension: f32, sensitivity: f32) -> f32 {
    (coord - 0.5) * dimension * sensitivity
}
