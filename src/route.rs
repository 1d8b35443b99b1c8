//! Route providers.
//!
//! A route is an ordered polyline from one coordinate to another. The
//! simulator only needs a finite sequence it can walk by index, so any
//! backend (mock, OSRM, precomputed table) can sit behind [`RouteProvider`].

use std::time::Duration;

use crate::error::RideError;
use crate::geo::distance_meters;
use crate::models::Coordinate;

/// Trait for routing backends.
///
/// Implementations must be `Send + Sync` so the provider can be shared by the
/// simulator and its background fetches.
#[async_trait::async_trait]
pub trait RouteProvider: Send + Sync + 'static {
    /// Ordered coordinates from `from` to `to`, endpoints included.
    async fn fetch_route(&self, from: Coordinate, to: Coordinate) -> Result<Vec<Coordinate>, RideError>;
}

/// `points` evenly spaced coordinates from `from` to `to`, both included.
/// Fewer than two points still returns both endpoints.
pub fn straight_line(from: Coordinate, to: Coordinate, points: usize) -> Vec<Coordinate> {
    let points = points.max(2);
    let last = (points - 1) as f64;
    (0..points)
        .map(|i| {
            if i + 1 == points {
                return to;
            }
            let t = i as f64 / last;
            Coordinate::new(from.lat + (to.lat - from.lat) * t, from.lng + (to.lng - from.lng) * t)
        })
        .collect()
}

/// Mock provider producing a street-grid style route: north/south first,
/// then east/west, with a point roughly every `spacing_meters`.
#[derive(Debug, Clone)]
pub struct MockRouteProvider {
    spacing_meters: f64,
    latency: Duration,
}

impl MockRouteProvider {
    pub fn new(spacing_meters: f64, latency: Duration) -> Self {
        Self {
            spacing_meters: spacing_meters.max(1.0),
            latency,
        }
    }

    /// Provider without artificial latency, safe to poll outside a tokio runtime.
    pub fn instant(spacing_meters: f64) -> Self {
        Self::new(spacing_meters, Duration::ZERO)
    }

    /// Builds the polyline synchronously.
    pub fn build_route(&self, from: Coordinate, to: Coordinate) -> Vec<Coordinate> {
        if from == to {
            return vec![from];
        }
        let corner = Coordinate::new(to.lat, from.lng);
        let first = distance_meters(from, corner);
        let second = distance_meters(corner, to);

        let segments_for = |meters: f64| (meters / self.spacing_meters).ceil() as usize;
        let mut path = Vec::new();
        for (start, end, meters) in [(from, corner, first), (corner, to, second)] {
            let segments = segments_for(meters);
            if segments == 0 {
                continue;
            }
            let leg = straight_line(start, end, segments + 1);
            // the corner is shared by both legs
            let skip = usize::from(!path.is_empty());
            path.extend(leg.into_iter().skip(skip));
        }
        if path.is_empty() {
            path = vec![from, to];
        }
        path
    }
}

impl Default for MockRouteProvider {
    fn default() -> Self {
        Self::new(50.0, Duration::from_millis(300))
    }
}

#[async_trait::async_trait]
impl RouteProvider for MockRouteProvider {
    async fn fetch_route(&self, from: Coordinate, to: Coordinate) -> Result<Vec<Coordinate>, RideError> {
        if !from.is_valid() || !to.is_valid() {
            return Err(RideError::RouteUnavailable("invalid route endpoints".to_string()));
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let path = self.build_route(from, to);
        log::debug!("Mock route {:?} -> {:?}: {} points", from, to, path.len());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_includes_endpoints() {
        let from = Coordinate::new(0.0, 0.0);
        let to = Coordinate::new(1.0, 2.0);
        let line = straight_line(from, to, 5);
        assert_eq!(line.len(), 5);
        assert_eq!(line[0], from);
        assert_eq!(line[4], to);
        assert_eq!(line[2], Coordinate::new(0.5, 1.0));
        assert_eq!(straight_line(from, to, 0).len(), 2);
    }

    #[test]
    fn mock_route_turns_at_the_corner() {
        let provider = MockRouteProvider::instant(50.0);
        let from = Coordinate::new(47.9186, 106.9170);
        let to = Coordinate::new(47.92, 106.93);

        let path = futures::executor::block_on(provider.fetch_route(from, to)).unwrap();
        assert_eq!(path.first(), Some(&from));
        assert_eq!(path.last(), Some(&to));
        assert!(path.contains(&Coordinate::new(to.lat, from.lng)));
        // ~155 m north then ~970 m east at 50 m spacing
        assert!((20..=26).contains(&path.len()), "unexpected length {}", path.len());
        for pair in path.windows(2) {
            assert!(distance_meters(pair[0], pair[1]) <= 50.0 + 1e-6);
        }
    }

    #[test]
    fn mock_route_for_same_point_is_single_point() {
        let provider = MockRouteProvider::instant(50.0);
        let here = Coordinate::new(47.9, 106.9);
        assert_eq!(provider.build_route(here, here), vec![here]);
    }

    #[test]
    fn mock_route_rejects_invalid_endpoints() {
        let provider = MockRouteProvider::instant(50.0);
        let result = futures::executor::block_on(
            provider.fetch_route(Coordinate::new(120.0, 0.0), Coordinate::new(0.0, 0.0)),
        );
        assert!(matches!(result, Err(RideError::RouteUnavailable(_))));
    }
}
