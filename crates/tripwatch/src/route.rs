//! Turns a trip's GPS samples into something a map can draw.
//!
//! Every sample becomes a marker; the last one is the vehicle's current
//! position and is tagged so it can be drawn differently. With two or more
//! samples the plan also carries a path through all of them and a routed
//! overlay computed by a [`RouteSolver`].

use geo::{Coord, HaversineLength, LineString, Simplify};
use std::sync::Arc;
use tripwatch_protocol::Coordinate;

/// Meters per degree of latitude, good enough for tolerances
const METERS_PER_DEGREE: f64 = 111_320.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RouteColor {
    Blue,
    Green,
    Red,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    /// A past sample
    Trail,
    /// The most recent sample
    Current,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RouteMarker {
    pub index: usize,
    pub position: Coordinate,
    pub kind: MarkerKind,
}

impl RouteMarker {
    pub fn color(&self) -> RouteColor {
        match self.kind {
            MarkerKind::Trail => RouteColor::Blue,
            MarkerKind::Current => RouteColor::Green,
        }
    }
}

/// A styled line through a sequence of coordinates
#[derive(Clone, Debug, PartialEq)]
pub struct RoutePath {
    pub points: Vec<Coordinate>,
    pub color: RouteColor,
    pub weight: u8,
    pub opacity: f32,
}

impl RoutePath {
    fn red(points: Vec<Coordinate>) -> Self {
        Self {
            points,
            color: RouteColor::Red,
            weight: 5,
            opacity: 0.7,
        }
    }

    /// Great-circle length in meters
    pub fn length_meters(&self) -> f64 {
        to_line_string(&self.points).haversine_length()
    }
}

/// Axis-aligned box around a set of coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    fn around(points: &[Coordinate]) -> Option<Self> {
        let mut finite = points.iter().filter(|c| c.is_finite());
        let first = finite.next()?;
        let init = Bounds {
            min_lat: first.lat,
            max_lat: first.lat,
            min_lng: first.lng,
            max_lng: first.lng,
        };
        Some(finite.fold(init, |b, c| Bounds {
            min_lat: b.min_lat.min(c.lat),
            max_lat: b.max_lat.max(c.lat),
            min_lng: b.min_lng.min(c.lng),
            max_lng: b.max_lng.max(c.lng),
        }))
    }

    /// Grow each side by `fraction` of the span (at least a tiny margin so
    /// a single point still has an area)
    pub fn padded(&self, fraction: f64) -> Self {
        let lat_pad = ((self.max_lat - self.min_lat) * fraction).max(1e-4);
        let lng_pad = ((self.max_lng - self.min_lng) * fraction).max(1e-4);
        Bounds {
            min_lat: self.min_lat - lat_pad,
            max_lat: self.max_lat + lat_pad,
            min_lng: self.min_lng - lng_pad,
            max_lng: self.max_lng + lng_pad,
        }
    }
}

/// Everything needed to draw one trip on a map
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoutePlan {
    pub markers: Vec<RouteMarker>,
    /// Straight segments through every sample, in order
    pub path: Option<RoutePath>,
    /// Overlay produced by the route solver
    pub routed: Option<RoutePath>,
}

impl RoutePlan {
    pub fn current_position(&self) -> Option<Coordinate> {
        self.markers
            .iter()
            .find(|m| m.kind == MarkerKind::Current)
            .map(|m| m.position)
    }

    /// Where a map should center: the current position, else the first sample
    pub fn center(&self) -> Option<Coordinate> {
        self.current_position()
            .or_else(|| self.markers.first().map(|m| m.position))
    }

    pub fn is_drawable(&self) -> bool {
        self.path.is_some()
    }

    pub fn length_meters(&self) -> f64 {
        self.path.as_ref().map_or(0.0, RoutePath::length_meters)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let points: Vec<Coordinate> = self.markers.iter().map(|m| m.position).collect();
        Bounds::around(&points)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("need at least 2 waypoints, got {0}")]
    TooFewWaypoints(usize),
    #[error("waypoint {0} is not a finite coordinate")]
    NonFiniteWaypoint(usize),
}

/// Computes a route between waypoints
pub trait RouteSolver: Send + Sync {
    fn solve(&self, waypoints: &[Coordinate]) -> Result<Vec<Coordinate>, RouteError>;
}

/// Ramer–Douglas–Peucker simplification of the recorded track.
///
/// First and last waypoints are always kept.
#[derive(Clone, Copy, Debug)]
pub struct SimplifyingSolver {
    pub tolerance_meters: f64,
}

impl Default for SimplifyingSolver {
    fn default() -> Self {
        Self {
            tolerance_meters: 15.0,
        }
    }
}

impl RouteSolver for SimplifyingSolver {
    fn solve(&self, waypoints: &[Coordinate]) -> Result<Vec<Coordinate>, RouteError> {
        if waypoints.len() < 2 {
            return Err(RouteError::TooFewWaypoints(waypoints.len()));
        }
        if let Some(bad) = waypoints.iter().position(|c| !c.is_finite()) {
            return Err(RouteError::NonFiniteWaypoint(bad));
        }

        let epsilon = self.tolerance_meters.max(0.0) / METERS_PER_DEGREE;
        let simplified = to_line_string(waypoints).simplify(&epsilon);
        Ok(simplified
            .coords()
            .map(|c| Coordinate::new(c.y, c.x))
            .collect())
    }
}

fn to_line_string(points: &[Coordinate]) -> LineString<f64> {
    points
        .iter()
        .map(|c| Coord { x: c.lng, y: c.lat })
        .collect::<Vec<_>>()
        .into()
}

/// Builds [`RoutePlan`]s with a configurable solver
#[derive(Clone)]
pub struct RouteBuilder {
    solver: Arc<dyn RouteSolver>,
}

impl Default for RouteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RouteBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteBuilder").finish_non_exhaustive()
    }
}

impl RouteBuilder {
    pub fn new() -> Self {
        Self::with_solver(SimplifyingSolver::default())
    }

    pub fn with_solver(solver: impl RouteSolver + 'static) -> Self {
        Self {
            solver: Arc::new(solver),
        }
    }

    pub fn build(&self, locations: &[Coordinate]) -> RoutePlan {
        let last = locations.len().saturating_sub(1);
        let markers = locations
            .iter()
            .enumerate()
            .map(|(index, position)| RouteMarker {
                index,
                position: *position,
                kind: if index == last {
                    MarkerKind::Current
                } else {
                    MarkerKind::Trail
                },
            })
            .collect();

        if locations.len() < 2 {
            return RoutePlan {
                markers,
                path: None,
                routed: None,
            };
        }

        let routed = match self.solver.solve(locations) {
            Ok(points) => Some(RoutePath::red(points)),
            Err(e) => {
                tracing::warn!(error = %e, samples = locations.len(), "route overlay unavailable");
                None
            }
        };

        RoutePlan {
            markers,
            path: Some(RoutePath::red(locations.to_vec())),
            routed,
        }
    }
}
