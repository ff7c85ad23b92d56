//! Junction angle math and great-circle distances.
//!
//! Angles follow the turn convention of the expansion pipeline: the angle
//! at a junction is measured between the approach direction and the
//! departure direction, 180 means going straight through, values below
//! 180 are turns to the right, values above 180 turns to the left, and 0
//! is a full u-turn.

use geo::HaversineDistance;
use geo::Point;

/// Going perfectly straight through a junction.
pub const STRAIGHT_ANGLE: f64 = 180.0;
/// Deviations below this are not worth announcing at all.
pub const MAXIMAL_ALLOWED_NO_TURN_DEVIATION: f64 = 2.0;
/// Angle between two nearly indistinguishable roads.
pub const NARROW_TURN_ANGLE: f64 = 35.0;
/// Deviation that still counts as straight if it is the only narrow turn.
pub const FUZZY_STRAIGHT_ANGLE: f64 = 15.0;
/// Required ratio between neighbor deviations for an obvious choice.
pub const DISTINCTION_RATIO: f64 = 2.0;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Both components finite and inside the WGS84 envelope.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Web-mercator latitude projection, so angles at a junction are measured
/// on a locally conformal plane instead of raw lat/lon space.
fn lat_to_y(lat: f64) -> f64 {
    (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0)
        .tan()
        .ln()
        .to_degrees()
}

/// Oriented turn angle at `pivot` in `[0, 360)`.
///
/// `first` lies on the approach, `third` on the departure. Degenerate
/// inputs (coincident points) read as straight through.
pub fn compute_angle(first: Coordinate, pivot: Coordinate, third: Coordinate) -> f64 {
    if first == pivot || pivot == third {
        return STRAIGHT_ANGLE;
    }

    let v1x = pivot.lon - first.lon;
    let v1y = lat_to_y(pivot.lat) - lat_to_y(first.lat);
    let v2x = third.lon - pivot.lon;
    let v2y = lat_to_y(third.lat) - lat_to_y(pivot.lat);

    let mut angle = (v2y.atan2(v2x) - v1y.atan2(v1x)).to_degrees() + 180.0;
    while angle < 0.0 {
        angle += 360.0;
    }
    while angle >= 360.0 {
        angle -= 360.0;
    }
    angle
}

/// Smaller of the two arcs between `angle` and `other`, in `[0, 180]`.
pub fn angular_deviation(angle: f64, other: f64) -> f64 {
    let difference = (angle - other).abs() % 360.0;
    difference.min(360.0 - difference)
}

/// Great-circle distance in meters.
pub fn great_circle_distance(from: Coordinate, to: Coordinate) -> f64 {
    let p1 = Point::new(from.lon, from.lat);
    let p2 = Point::new(to.lon, to.lat);
    p1.haversine_distance(&p2)
}
