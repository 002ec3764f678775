use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Point3D;
use crate::System;

/// Which external star databases a lookup may consult when its local data
/// has nothing near the requested point. Passed through untouched by the
/// plotter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebLookup {
    #[default]
    None,
    Edsm,
    Spansh,
    SpanshThenEdsm,
    All,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("system lookup unavailable: {0}")]
    Unavailable(String),
    #[error("system lookup timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("system lookup failed: {0}")]
    Failed(String),
}

impl LookupError {
    /// Transient failures leave a waypoint unresolved instead of aborting the route.
    pub fn is_transient(&self) -> bool {
        matches!(self, LookupError::Unavailable(_) | LookupError::Timeout(_))
    }
}

/// Spatial system index consumed by the route plotter.
///
/// Implementations must tolerate blocking calls from the plotter's worker
/// thread; caching and retries are theirs to decide.
pub trait SystemLookup {
    /// Returns up to `limit` systems near `point`, nearest first. `radius` of
    /// `None` places no bound on how far away a system may be.
    fn find_systems_near(
        &self,
        point: Point3D,
        radius: Option<f64>,
        limit: usize,
        web_lookup: WebLookup,
    ) -> Result<Vec<System>, LookupError>;

    fn find_nearest_system_to(
        &self,
        point: Point3D,
        radius: Option<f64>,
        web_lookup: WebLookup,
    ) -> Result<Option<System>, LookupError> {
        Ok(self
            .find_systems_near(point, radius, 1, web_lookup)?
            .into_iter()
            .next())
    }

    fn distance(&self, a: &Point3D, b: &Point3D) -> f64 {
        a.distance(b)
    }
}

impl<T: SystemLookup + ?Sized> SystemLookup for &T {
    fn find_systems_near(
        &self,
        point: Point3D,
        radius: Option<f64>,
        limit: usize,
        web_lookup: WebLookup,
    ) -> Result<Vec<System>, LookupError> {
        (**self).find_systems_near(point, radius, limit, web_lookup)
    }

    fn distance(&self, a: &Point3D, b: &Point3D) -> f64 {
        (**self).distance(a, b)
    }
}

impl<T: SystemLookup + ?Sized> SystemLookup for std::sync::Arc<T> {
    fn find_systems_near(
        &self,
        point: Point3D,
        radius: Option<f64>,
        limit: usize,
        web_lookup: WebLookup,
    ) -> Result<Vec<System>, LookupError> {
        (**self).find_systems_near(point, radius, limit, web_lookup)
    }

    fn distance(&self, a: &Point3D, b: &Point3D) -> f64 {
        (**self).distance(a, b)
    }
}
