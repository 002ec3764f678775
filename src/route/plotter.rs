use std::ops::ControlFlow;

use log::{debug, info, warn};

use crate::geometry::Point3D;
use crate::lookup::SystemLookup;
use crate::route::{
    CancelToken, EntryKind, PlotError, PlotStatus, PlottedRoute, RouteEntry, RouteRequest,
    UNRESOLVED_WAYPOINT_NAME,
};
use crate::System;

/// Most candidates requested from the lookup per waypoint.
pub const DEFAULT_CANDIDATE_LIMIT: usize = 1000;

/// Steps this close to a whole number of jumps are not rounded up to another hop.
const HOP_EPSILON: f64 = 1e-9;

/// Walks a validated [`RouteRequest`] one waypoint at a time.
#[derive(Debug, Clone)]
pub struct RoutePlotter {
    request: RouteRequest,
    candidate_limit: usize,
}

impl RoutePlotter {
    pub fn new(request: RouteRequest) -> Result<Self, PlotError> {
        request.validate()?;
        Ok(RoutePlotter {
            request,
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
        })
    }

    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = limit.max(1);
        self
    }

    pub fn request(&self) -> &RouteRequest {
        &self.request
    }

    /// Number of waypoints a route of `distance` takes at the effective range.
    pub fn hop_count(&self, distance: f64) -> usize {
        let range = self.request.effective_range();
        if distance <= range {
            0
        } else {
            (distance / range - HOP_EPSILON).ceil() as usize
        }
    }

    /// Plots the route, handing each entry to `on_entry` as soon as it is known.
    ///
    /// The walk stops early when `cancel` is observed at the top of a step or
    /// when `on_entry` breaks; the systems resolved so far are still returned
    /// and no destination entry is emitted. A break on the destination entry
    /// itself also leaves the route cancelled. Transient lookup failures leave a
    /// waypoint unresolved, anything else from the lookup aborts the plot.
    pub fn route_iterative<L, F>(
        &self,
        lookup: &L,
        cancel: &CancelToken,
        mut on_entry: F,
    ) -> Result<PlottedRoute, PlotError>
    where
        L: SystemLookup + ?Sized,
        F: FnMut(RouteEntry) -> ControlFlow<()>,
    {
        let req = &self.request;
        let origin = req.from;
        let destination = req.to;
        let range = req.effective_range();
        let total = lookup.distance(&origin, &destination);

        let mut route = PlottedRoute {
            systems: Vec::new(),
            status: PlotStatus::Completed,
            straight_line_distance: total,
            travelled_distance: 0.0,
        };

        info!(
            "Plotting {} -> {} ({:.2} ly, range {:.2} ly, metric {})",
            req.origin_name(),
            req.destination_name(),
            total,
            range,
            req.metric
        );

        if total == 0.0 {
            let entry = RouteEntry::marker(
                EntryKind::Destination,
                req.destination_name(),
                destination,
                Some(0.0),
            );
            if on_entry(entry).is_break() {
                route.status = PlotStatus::Cancelled;
            }
            return Ok(route);
        }

        if cancel.is_cancelled() {
            return Ok(cancelled(route, 0));
        }
        let start = RouteEntry::marker(EntryKind::Origin, req.origin_name(), origin, None);
        if on_entry(start).is_break() {
            return Ok(cancelled(route, 0));
        }

        let hops = self.hop_count(total);
        let mut cursor = origin;
        // distances are reported from the last real system, never from a gap
        let mut last_resolved = origin;
        let mut walked = 0.0_f64;

        for hop in 1..=hops {
            if cancel.is_cancelled() {
                return Ok(cancelled(route, hop - 1));
            }

            let target = (hop as f64 * range).min(total);
            let step = target - walked;
            walked = target;
            let waypoint = cursor.towards(&destination, step);

            let entry = match self.resolve(lookup, cursor, waypoint)? {
                Some((system, waypoint_distance, deviation)) => RouteEntry {
                    kind: EntryKind::Waypoint,
                    name: system.name.clone(),
                    position: system.pos,
                    distance_from_previous: Some(lookup.distance(&last_resolved, &system.pos)),
                    system: Some(system),
                    waypoint: Some(waypoint),
                    waypoint_distance: Some(waypoint_distance),
                    deviation: Some(deviation),
                },
                None => RouteEntry {
                    kind: EntryKind::Waypoint,
                    name: UNRESOLVED_WAYPOINT_NAME.to_string(),
                    system: None,
                    position: waypoint,
                    waypoint: Some(waypoint),
                    distance_from_previous: Some(lookup.distance(&last_resolved, &waypoint)),
                    waypoint_distance: None,
                    deviation: None,
                },
            };

            debug!(
                "Waypoint {hop}/{hops}: {} at {:?} (waypoint dist {:?}, deviation {:?})",
                entry.name, entry.position, entry.waypoint_distance, entry.deviation
            );

            cursor = entry.position;
            if let Some(system) = &entry.system {
                route.travelled_distance += entry.distance_from_previous.unwrap_or(0.0);
                last_resolved = system.pos;
                route.systems.push(system.clone());
            }

            if on_entry(entry).is_break() {
                return Ok(cancelled(route, hop));
            }
        }

        if cancel.is_cancelled() {
            return Ok(cancelled(route, hops));
        }

        let last_leg = lookup.distance(&last_resolved, &destination);
        route.travelled_distance += last_leg;
        let end = RouteEntry::marker(
            EntryKind::Destination,
            req.destination_name(),
            destination,
            Some(last_leg),
        );
        // an undelivered destination row means the consumer never saw the end
        if on_entry(end).is_break() {
            return Ok(cancelled(route, hops));
        }

        info!(
            "Route complete: {} of {} waypoints resolved, {:.2} ly travelled",
            route.systems.len(),
            hops,
            route.travelled_distance
        );
        Ok(route)
    }

    /// Best system around `waypoint` that is closer to the destination than `cursor`.
    fn resolve<L>(
        &self,
        lookup: &L,
        cursor: Point3D,
        waypoint: Point3D,
    ) -> Result<Option<(System, f64, f64)>, PlotError>
    where
        L: SystemLookup + ?Sized,
    {
        let req = &self.request;
        let candidates = match lookup.find_systems_near(
            waypoint,
            req.metric.search_radius(),
            self.candidate_limit,
            req.web_lookup,
        ) {
            Ok(candidates) => candidates,
            Err(err) if err.is_transient() => {
                warn!("Lookup near {waypoint:?} failed, leaving waypoint unresolved: {err}");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let remaining = cursor.distance(&req.to);
        let ahead: Vec<System> = candidates
            .into_iter()
            .filter(|s| s.pos.distance(&req.to) < remaining)
            .collect();

        Ok(req
            .metric
            .select(&ahead, waypoint, req.from, req.to)
            .map(|best| (best.system.clone(), best.waypoint_distance, best.deviation)))
    }
}

fn cancelled(mut route: PlottedRoute, hops_done: usize) -> PlottedRoute {
    info!(
        "Route plotting stopped after {hops_done} waypoints ({} resolved)",
        route.systems.len()
    );
    route.status = PlotStatus::Cancelled;
    route
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{LookupError, WebLookup};
    use crate::route::{FsdBoost, RoutingMetric};
    use assert_approx_eq::assert_approx_eq;
    use std::cell::Cell;

    /// Places a system 3ly above every requested point.
    struct Shadow;

    impl SystemLookup for Shadow {
        fn find_systems_near(
            &self,
            point: Point3D,
            _radius: Option<f64>,
            _limit: usize,
            _web_lookup: WebLookup,
        ) -> Result<Vec<System>, LookupError> {
            let name = format!("Near {:.0}", point.x);
            Ok(vec![System::new(point.x as u64, name, point + Point3D::new(0.0, 3.0, 0.0))])
        }
    }

    struct Empty;

    impl SystemLookup for Empty {
        fn find_systems_near(
            &self,
            _point: Point3D,
            _radius: Option<f64>,
            _limit: usize,
            _web_lookup: WebLookup,
        ) -> Result<Vec<System>, LookupError> {
            Ok(Vec::new())
        }
    }

    /// Fails every other call.
    struct Flaky {
        calls: Cell<usize>,
        fatal: bool,
    }

    impl SystemLookup for Flaky {
        fn find_systems_near(
            &self,
            point: Point3D,
            radius: Option<f64>,
            limit: usize,
            web_lookup: WebLookup,
        ) -> Result<Vec<System>, LookupError> {
            let n = self.calls.get();
            self.calls.set(n + 1);
            if n % 2 == 1 {
                return Err(if self.fatal {
                    LookupError::Failed("database closed".into())
                } else {
                    LookupError::Unavailable("EDSM".into())
                });
            }
            Shadow.find_systems_near(point, radius, limit, web_lookup)
        }
    }

    fn request(to_x: f64, range: f64) -> RouteRequest {
        RouteRequest::new(
            Point3D::ORIGIN,
            Point3D::new(to_x, 0.0, 0.0),
            range,
            RoutingMetric::NearestToWaypoint,
        )
        .with_names("Sol", "Colonia")
    }

    fn collect<L: SystemLookup>(req: RouteRequest, lookup: &L) -> (Vec<RouteEntry>, PlottedRoute) {
        let plotter = RoutePlotter::new(req).expect("valid request");
        let mut entries = Vec::new();
        let route = plotter
            .route_iterative(lookup, &CancelToken::new(), |e| {
                entries.push(e);
                ControlFlow::Continue(())
            })
            .expect("plot");
        (entries, route)
    }

    #[test]
    fn single_hop_emits_origin_and_destination_only() {
        let (entries, route) = collect(request(80.0, 100.0), &Shadow);
        let kinds: Vec<EntryKind> = entries.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EntryKind::Origin, EntryKind::Destination]);
        assert_eq!(entries[1].name, "Colonia");
        assert_eq!(entries[1].position, Point3D::new(80.0, 0.0, 0.0));
        assert!(route.systems.is_empty());
        assert!(route.is_complete());
        assert_approx_eq!(route.travelled_distance, 80.0);
    }

    #[test]
    fn same_origin_and_destination_is_a_single_entry() {
        struct Panicky;
        impl SystemLookup for Panicky {
            fn find_systems_near(
                &self,
                _: Point3D,
                _: Option<f64>,
                _: usize,
                _: WebLookup,
            ) -> Result<Vec<System>, LookupError> {
                panic!("no lookups expected");
            }
        }
        let (entries, route) = collect(request(0.0, 10.0), &Panicky);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::Destination);
        assert!(route.systems.is_empty());
    }

    #[test]
    fn waypoint_count_is_ceiling_of_distance_over_range() {
        for (distance, expected) in [(250.0, 3), (300.0, 3), (301.0, 4), (1000.0, 10)] {
            let (entries, route) = collect(request(distance, 100.0), &Shadow);
            let waypoints = entries
                .iter()
                .filter(|e| e.kind == EntryKind::Waypoint)
                .count();
            assert_eq!(waypoints, expected, "distance {distance}");
            assert_eq!(route.systems.len(), expected);
            assert_eq!(entries.last().map(|e| e.kind), Some(EntryKind::Destination));
        }
    }

    #[test]
    fn waypoints_progress_toward_the_destination() {
        let (entries, _) = collect(request(450.0, 100.0), &Shadow);
        let xs: Vec<f64> = entries
            .iter()
            .filter(|e| e.kind == EntryKind::Waypoint)
            .map(|e| e.position.x)
            .collect();
        assert!(xs.windows(2).all(|w| w[0] < w[1]), "{xs:?}");
        for e in entries.iter().filter(|e| e.kind == EntryKind::Waypoint) {
            assert_approx_eq!(e.waypoint_distance.expect("resolved"), 3.0);
        }
        // only the first waypoint still lies on the origin-destination line
        assert_approx_eq!(entries[1].deviation.expect("resolved"), 3.0);
    }

    #[test]
    fn cursor_follows_the_resolved_system() {
        let (entries, _) = collect(request(300.0, 100.0), &Shadow);
        let first = &entries[1];
        let second = &entries[2];
        // the second waypoint is measured from the first system, not the line
        let expected = first.position.towards(&Point3D::new(300.0, 0.0, 0.0), 100.0);
        let waypoint = second.waypoint.expect("waypoint");
        assert_approx_eq!(waypoint.x, expected.x);
        assert_approx_eq!(waypoint.y, expected.y);
        assert_approx_eq!(second.distance_from_previous.expect("distance"), first.position.distance(&second.position));
    }

    #[test]
    fn unresolved_waypoints_advance_along_the_ideal_line() {
        let (entries, route) = collect(request(250.0, 100.0), &Empty);
        let waypoints: Vec<&RouteEntry> = entries
            .iter()
            .filter(|e| e.kind == EntryKind::Waypoint)
            .collect();
        assert_eq!(waypoints.len(), 3);
        assert!(waypoints.iter().all(|e| e.name == UNRESOLVED_WAYPOINT_NAME && !e.is_resolved()));
        assert_approx_eq!(waypoints[0].position.x, 100.0);
        assert_approx_eq!(waypoints[2].position.x, 250.0);
        assert!(route.systems.is_empty());
        assert!(route.is_complete());
        assert_approx_eq!(route.travelled_distance, 250.0);
    }

    #[test]
    fn distances_skip_over_unresolved_waypoints() {
        // resolves on the line, except around x=200
        struct Gap;
        impl SystemLookup for Gap {
            fn find_systems_near(
                &self,
                point: Point3D,
                _: Option<f64>,
                _: usize,
                _: WebLookup,
            ) -> Result<Vec<System>, LookupError> {
                if (point.x - 200.0).abs() < 1.0 {
                    return Ok(Vec::new());
                }
                Ok(vec![System::new(point.x as u64, format!("S{:.0}", point.x), point)])
            }
        }
        let (entries, route) = collect(request(400.0, 100.0), &Gap);
        let rows: Vec<(&str, f64)> = entries
            .iter()
            .skip(1)
            .map(|e| (e.name.as_str(), e.distance_from_previous.expect("distance")))
            .collect();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].0, "S100");
        assert_approx_eq!(rows[0].1, 100.0);
        assert_eq!(rows[1].0, UNRESOLVED_WAYPOINT_NAME);
        assert_approx_eq!(rows[1].1, 100.0);
        assert_eq!(rows[2].0, "S300");
        assert_approx_eq!(rows[2].1, 200.0);
        assert_eq!(rows[3].0, "S400");
        assert_approx_eq!(rows[3].1, 100.0);
        assert_eq!(rows[4].0, "Colonia");
        assert_approx_eq!(rows[4].1, 0.0);
        assert_approx_eq!(route.travelled_distance, 400.0);
    }

    #[test]
    fn destination_leg_starts_at_the_last_resolved_system() {
        // the only system sits on the first waypoint
        struct First;
        impl SystemLookup for First {
            fn find_systems_near(
                &self,
                point: Point3D,
                _: Option<f64>,
                _: usize,
                _: WebLookup,
            ) -> Result<Vec<System>, LookupError> {
                if point.x < 150.0 {
                    Ok(vec![System::new(1, "First", point)])
                } else {
                    Ok(Vec::new())
                }
            }
        }
        let (entries, route) = collect(request(300.0, 100.0), &First);
        let end = entries.last().expect("destination");
        assert_eq!(end.kind, EntryKind::Destination);
        assert_approx_eq!(end.distance_from_previous.expect("distance"), 200.0);
        assert_approx_eq!(route.travelled_distance, 300.0);
    }

    #[test]
    fn undelivered_destination_is_not_a_completed_route() {
        let plotter = RoutePlotter::new(request(300.0, 100.0)).expect("valid");
        let route = plotter
            .route_iterative(&Shadow, &CancelToken::new(), |e| {
                if e.kind == EntryKind::Destination {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .expect("plot");
        assert_eq!(route.status, PlotStatus::Cancelled);
        assert_eq!(route.systems.len(), 3);
    }

    #[test]
    fn transient_lookup_failures_leave_gaps() {
        let flaky = Flaky {
            calls: Cell::new(0),
            fatal: false,
        };
        let (entries, route) = collect(request(400.0, 100.0), &flaky);
        let resolved: Vec<bool> = entries
            .iter()
            .filter(|e| e.kind == EntryKind::Waypoint)
            .map(RouteEntry::is_resolved)
            .collect();
        assert_eq!(resolved, vec![true, false, true, false]);
        assert_eq!(route.systems.len(), 2);
    }

    #[test]
    fn fatal_lookup_failures_abort() {
        let flaky = Flaky {
            calls: Cell::new(0),
            fatal: true,
        };
        let plotter = RoutePlotter::new(request(400.0, 100.0)).expect("valid");
        let err = plotter
            .route_iterative(&flaky, &CancelToken::new(), |_| ControlFlow::Continue(()))
            .unwrap_err();
        assert!(matches!(err, PlotError::Lookup(LookupError::Failed(_))));
    }

    #[test]
    fn cancellation_is_observed_before_the_next_waypoint() {
        let plotter = RoutePlotter::new(request(1000.0, 100.0)).expect("valid");
        let cancel = CancelToken::new();
        let mut entries = Vec::new();
        let route = plotter
            .route_iterative(&Shadow, &cancel, |e| {
                if e.kind == EntryKind::Waypoint && entries.len() == 2 {
                    cancel.cancel();
                }
                entries.push(e);
                ControlFlow::Continue(())
            })
            .expect("plot");
        assert_eq!(route.status, PlotStatus::Cancelled);
        // origin + two waypoints, nothing after the signal
        assert_eq!(entries.len(), 3);
        assert_eq!(route.systems.len(), 2);
        assert!(entries.iter().all(|e| e.kind != EntryKind::Destination));
    }

    #[test]
    fn consumer_break_stops_the_walk() {
        let plotter = RoutePlotter::new(request(1000.0, 100.0)).expect("valid");
        let mut seen = 0;
        let route = plotter
            .route_iterative(&Shadow, &CancelToken::new(), |_| {
                seen += 1;
                if seen == 4 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .expect("plot");
        assert_eq!(seen, 4);
        assert_eq!(route.systems.len(), 3);
        assert!(!route.is_complete());
    }

    #[test]
    fn fsd_boost_lengthens_each_hop() {
        let (entries, _) = collect(request(300.0, 100.0).with_fsd_boost(FsdBoost::Premium), &Shadow);
        let waypoints = entries
            .iter()
            .filter(|e| e.kind == EntryKind::Waypoint)
            .count();
        assert_eq!(waypoints, 2);
    }

    #[test]
    fn candidates_behind_the_cursor_are_ignored() {
        // the origin system sits exactly on the line, so a bare minimum
        // deviation would pick it every time
        struct WithOrigin;
        impl SystemLookup for WithOrigin {
            fn find_systems_near(
                &self,
                point: Point3D,
                _: Option<f64>,
                _: usize,
                _: WebLookup,
            ) -> Result<Vec<System>, LookupError> {
                Ok(vec![
                    System::new(1, "Sol", Point3D::ORIGIN),
                    System::new(2, "Ahead", point + Point3D::new(0.0, 0.0, 4.0)),
                ])
            }
        }
        let mut req = request(200.0, 100.0);
        req.metric = RoutingMetric::MinimumDeviation;
        let (_, route) = collect(req, &WithOrigin);
        let names: Vec<&str> = route.systems.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Ahead", "Ahead"]);
    }

    #[test]
    fn invalid_range_is_rejected_before_plotting() {
        assert!(matches!(
            RoutePlotter::new(request(300.0, 0.0)),
            Err(PlotError::InvalidJumpRange(_))
        ));
    }
}
