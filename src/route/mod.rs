//! Iterative waypoint route plotting.
//!
//! A route is walked from the origin toward the destination in jump-range
//! steps. Each step asks a [`SystemLookup`](crate::lookup::SystemLookup) for
//! systems around an ideal waypoint, ranks them with a [`RoutingMetric`] and
//! moves the cursor to the winner.

pub mod cancel;
pub mod metric;
pub mod plotter;
pub mod worker;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Point3D;
use crate::lookup::{LookupError, WebLookup};
use crate::System;

pub use cancel::CancelToken;
pub use metric::RoutingMetric;
pub use plotter::RoutePlotter;
pub use worker::{spawn_route, RouteHandle};

pub const DEFAULT_FROM_NAME: &str = "START POINT";
pub const DEFAULT_TO_NAME: &str = "END POINT";
pub const UNRESOLVED_WAYPOINT_NAME: &str = "WAYPOINT";

/// Above this many estimated jumps a caller should ask before plotting.
pub const LARGE_ROUTE_JUMPS: usize = 100;

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("jump range must be a positive number of light-years, got {0}")]
    InvalidJumpRange(f64),
    #[error("{which} coordinates are not finite: {point:?}")]
    InvalidCoordinates { which: &'static str, point: Point3D },
    #[error("unknown routing metric: {0}")]
    UnknownMetric(String),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("failed to start route worker: {0}")]
    WorkerStart(#[source] std::io::Error),
    #[error("route worker panicked")]
    WorkerPanicked,
}

/// Frame Shift Drive injection boosts, applied as a jump range multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsdBoost {
    Basic,
    Standard,
    Premium,
}

impl FsdBoost {
    pub fn multiplier(self) -> f64 {
        match self {
            FsdBoost::Basic => 1.25,
            FsdBoost::Standard => 1.5,
            FsdBoost::Premium => 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub from: Point3D,
    pub to: Point3D,
    pub max_range: f64,
    #[serde(default)]
    pub metric: RoutingMetric,
    #[serde(default)]
    pub fsd_boost: Option<FsdBoost>,
    #[serde(default)]
    pub web_lookup: WebLookup,
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde(default)]
    pub to_name: Option<String>,
}

impl RouteRequest {
    pub fn new(from: Point3D, to: Point3D, max_range: f64, metric: RoutingMetric) -> Self {
        RouteRequest {
            from,
            to,
            max_range,
            metric,
            fsd_boost: None,
            web_lookup: WebLookup::None,
            from_name: None,
            to_name: None,
        }
    }

    pub fn with_names(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from_name = Some(from.into());
        self.to_name = Some(to.into());
        self
    }

    pub fn with_fsd_boost(mut self, boost: FsdBoost) -> Self {
        self.fsd_boost = Some(boost);
        self
    }

    pub fn with_web_lookup(mut self, web_lookup: WebLookup) -> Self {
        self.web_lookup = web_lookup;
        self
    }

    pub fn validate(&self) -> Result<(), PlotError> {
        if !self.max_range.is_finite() || self.max_range <= 0.0 {
            return Err(PlotError::InvalidJumpRange(self.max_range));
        }
        if !self.from.is_finite() {
            return Err(PlotError::InvalidCoordinates {
                which: "origin",
                point: self.from,
            });
        }
        if !self.to.is_finite() {
            return Err(PlotError::InvalidCoordinates {
                which: "destination",
                point: self.to,
            });
        }
        Ok(())
    }

    /// Jump range after any FSD boost.
    pub fn effective_range(&self) -> f64 {
        self.max_range * self.fsd_boost.map_or(1.0, FsdBoost::multiplier)
    }

    pub fn straight_line_distance(&self) -> f64 {
        self.from.distance(&self.to)
    }

    pub fn estimated_jumps(&self) -> usize {
        (self.straight_line_distance() / self.max_range) as usize
    }

    pub fn needs_jump_confirmation(&self) -> bool {
        self.estimated_jumps() > LARGE_ROUTE_JUMPS
    }

    pub fn origin_name(&self) -> String {
        display_name(self.from_name.as_deref(), DEFAULT_FROM_NAME)
    }

    pub fn destination_name(&self) -> String {
        display_name(self.to_name.as_deref(), DEFAULT_TO_NAME)
    }
}

/// Strips an `@` suffix (body or station) from a system name.
pub fn system_name_only(name: &str) -> &str {
    name.split('@').next().unwrap_or(name).trim()
}

/// A body or station name (`System @ Body`) is not a system, so it gets the
/// generic label instead.
fn display_name(name: Option<&str>, fallback: &str) -> String {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() && !n.contains('@') => n.to_string(),
        _ => fallback.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Origin,
    Waypoint,
    Destination,
}

/// One row of a plotted route, streamed as it is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub kind: EntryKind,
    pub name: String,
    /// Resolved system, `None` for synthetic and unresolved rows.
    pub system: Option<System>,
    /// Resolved position, or the ideal waypoint when unresolved.
    pub position: Point3D,
    pub waypoint: Option<Point3D>,
    pub distance_from_previous: Option<f64>,
    pub waypoint_distance: Option<f64>,
    pub deviation: Option<f64>,
}

impl RouteEntry {
    pub fn is_resolved(&self) -> bool {
        self.system.is_some()
    }

    pub(crate) fn marker(kind: EntryKind, name: String, position: Point3D, distance: Option<f64>) -> Self {
        RouteEntry {
            kind,
            name,
            system: None,
            position,
            waypoint: None,
            distance_from_previous: distance,
            waypoint_distance: None,
            deviation: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotStatus {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlottedRoute {
    /// Systems resolved at waypoints, in route order.
    pub systems: Vec<System>,
    pub status: PlotStatus,
    pub straight_line_distance: f64,
    pub travelled_distance: f64,
}

impl PlottedRoute {
    pub fn is_complete(&self) -> bool {
        self.status == PlotStatus::Completed
    }
}
