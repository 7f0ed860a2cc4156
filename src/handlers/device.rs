use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::models::error::{CompanionError, Result};
use crate::models::position::{Position, PositionOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    Denied,
}

#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn request(&self) -> PermissionOutcome;
}

/// Platforms that never prompt for location access.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPermissionRequired;

#[async_trait]
impl PermissionProvider for NoPermissionRequired {
    async fn request(&self) -> PermissionOutcome {
        PermissionOutcome::Granted
    }
}

#[async_trait]
pub trait PositionProvider: Send + Sync {
    async fn current_position(&self, options: &PositionOptions) -> Result<Position>;
}

#[derive(Debug, Clone, Copy)]
pub struct FixedPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl FixedPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

#[async_trait]
impl PositionProvider for FixedPosition {
    async fn current_position(&self, _options: &PositionOptions) -> Result<Position> {
        Ok(Position::now(self.latitude, self.longitude))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RoutePoint {
    Pair([f64; 2]),
    Named { latitude: f64, longitude: f64 },
}

impl From<RoutePoint> for (f64, f64) {
    fn from(point: RoutePoint) -> Self {
        match point {
            RoutePoint::Pair([lat, lon]) => (lat, lon),
            RoutePoint::Named { latitude, longitude } => (latitude, longitude),
        }
    }
}

/// Replays a recorded route, one point per request, wrapping at the end.
#[derive(Debug)]
pub struct RoutePlayback {
    points: Vec<(f64, f64)>,
    cursor: AtomicUsize,
}

impl RoutePlayback {
    pub fn new(points: Vec<(f64, f64)>) -> Result<Self> {
        if points.is_empty() {
            return Err(CompanionError::validation("Route must contain at least one point"));
        }
        Ok(Self { points, cursor: AtomicUsize::new(0) })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let points: Vec<RoutePoint> = serde_json::from_str(json)?;
        Self::new(points.into_iter().map(Into::into).collect())
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let route = Self::from_json(&raw)?;
        debug!("Loaded route with {} points from {:?}", route.points.len(), path.as_ref());
        Ok(route)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[async_trait]
impl PositionProvider for RoutePlayback {
    async fn current_position(&self, _options: &PositionOptions) -> Result<Position> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.points.len();
        let (latitude, longitude) = self.points[index];
        Ok(Position::now(latitude, longitude))
    }
}
