use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geometry::Point3D;
use crate::route::PlotError;
use crate::System;

/// How a waypoint's candidate systems are ranked.
///
/// The discriminant order is stable: it is the index stored in saved settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMetric {
    #[default]
    NearestToWaypoint,
    MinimumDeviation,
    #[serde(rename = "nearest_with_deviation_cap_100")]
    NearestWithDeviationCap100,
    #[serde(rename = "nearest_with_deviation_cap_250")]
    NearestWithDeviationCap250,
    #[serde(rename = "nearest_with_deviation_cap_500")]
    NearestWithDeviationCap500,
    NearestPlusHalfDeviation,
}

impl RoutingMetric {
    pub const ALL: [RoutingMetric; 6] = [
        RoutingMetric::NearestToWaypoint,
        RoutingMetric::MinimumDeviation,
        RoutingMetric::NearestWithDeviationCap100,
        RoutingMetric::NearestWithDeviationCap250,
        RoutingMetric::NearestWithDeviationCap500,
        RoutingMetric::NearestPlusHalfDeviation,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            RoutingMetric::NearestToWaypoint => "nearest_to_waypoint",
            RoutingMetric::MinimumDeviation => "minimum_deviation",
            RoutingMetric::NearestWithDeviationCap100 => "nearest_with_deviation_cap_100",
            RoutingMetric::NearestWithDeviationCap250 => "nearest_with_deviation_cap_250",
            RoutingMetric::NearestWithDeviationCap500 => "nearest_with_deviation_cap_500",
            RoutingMetric::NearestPlusHalfDeviation => "nearest_plus_half_deviation",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RoutingMetric::NearestToWaypoint => "Nearest to Waypoint",
            RoutingMetric::MinimumDeviation => "Minimum Deviation from Path",
            RoutingMetric::NearestWithDeviationCap100 => "Nearest to Waypoint with dev<=100ly",
            RoutingMetric::NearestWithDeviationCap250 => "Nearest to Waypoint with dev<=250ly",
            RoutingMetric::NearestWithDeviationCap500 => "Nearest to Waypoint with dev<=500ly",
            RoutingMetric::NearestPlusHalfDeviation => "Nearest to Waypoint + Deviation / 2",
        }
    }

    /// Deviation limit for the capped metrics.
    pub fn deviation_cap(self) -> Option<f64> {
        match self {
            RoutingMetric::NearestWithDeviationCap100 => Some(100.0),
            RoutingMetric::NearestWithDeviationCap250 => Some(250.0),
            RoutingMetric::NearestWithDeviationCap500 => Some(500.0),
            _ => None,
        }
    }

    /// Radius handed to the lookup around each waypoint.
    pub fn search_radius(self) -> Option<f64> {
        self.deviation_cap()
    }

    /// Picks the best candidate for `waypoint` on the `origin`→`destination`
    /// line. Exact ties keep the earliest candidate.
    pub fn select<'a>(
        self,
        candidates: &'a [System],
        waypoint: Point3D,
        origin: Point3D,
        destination: Point3D,
    ) -> Option<Scored<'a>> {
        let scored = candidates.iter().map(|system| Scored {
            system,
            waypoint_distance: system.pos.distance(&waypoint),
            deviation: system.pos.distance_to_line(&origin, &destination),
        });

        match self {
            RoutingMetric::NearestToWaypoint => min_by_key(scored, |s| s.waypoint_distance),
            RoutingMetric::MinimumDeviation => min_by_key(scored, |s| s.deviation),
            RoutingMetric::NearestPlusHalfDeviation => {
                min_by_key(scored, |s| s.waypoint_distance + s.deviation / 2.0)
            }
            RoutingMetric::NearestWithDeviationCap100
            | RoutingMetric::NearestWithDeviationCap250
            | RoutingMetric::NearestWithDeviationCap500 => {
                let cap = self.deviation_cap().unwrap_or(f64::INFINITY);
                let all: Vec<Scored<'a>> = scored.collect();
                min_by_key(
                    all.iter().copied().filter(|s| s.deviation <= cap),
                    |s| s.waypoint_distance,
                )
                .or_else(|| min_by_key(all.iter().copied(), |s| s.waypoint_distance))
            }
        }
    }
}

/// A candidate with the measurements the metrics rank on.
#[derive(Debug, Clone, Copy)]
pub struct Scored<'a> {
    pub system: &'a System,
    pub waypoint_distance: f64,
    pub deviation: f64,
}

fn min_by_key<'a, I, F>(iter: I, key: F) -> Option<Scored<'a>>
where
    I: Iterator<Item = Scored<'a>>,
    F: Fn(&Scored<'a>) -> f64,
{
    iter.fold(None, |best: Option<(Scored<'a>, f64)>, candidate| {
        let score = key(&candidate);
        // unscorable candidates never win
        if score.is_nan() {
            return best;
        }
        match best {
            Some((_, best_score)) if best_score <= score => best,
            _ => Some((candidate, score)),
        }
    })
    .map(|(scored, _)| scored)
}

impl fmt::Display for RoutingMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl FromStr for RoutingMetric {
    type Err = PlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(index) = trimmed.parse::<usize>() {
            return Self::from_index(index).ok_or_else(|| PlotError::UnknownMetric(s.to_string()));
        }
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| PlotError::UnknownMetric(s.to_string()))
    }
}
