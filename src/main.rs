use std::env;
use std::sync::Arc;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use log::{info, warn};
use once_cell::sync::Lazy;
use route_plotter::catalogue::SystemCatalogue;
use route_plotter::data::read_catalogue_from_file;
use route_plotter::lookup::WebLookup;
use route_plotter::route::worker::DEFAULT_CHANNEL_CAPACITY;
use route_plotter::route::{
    spawn_route, FsdBoost, PlotStatus, RouteEntry, RoutePlotter, RouteRequest, RoutingMetric,
};
use route_plotter::{Point3D, System};
use serde::{Deserialize, Serialize};

static SAMPLE_CATALOGUE: Lazy<SystemCatalogue> = Lazy::new(|| {
    // Handful of well known systems; point ROUTE_CATALOGUE_PATH at a built catalogue in production.
    SystemCatalogue::new(vec![
        System::new(1, "Sol", Point3D::new(0.0, 0.0, 0.0)),
        System::new(2, "Alpha Centauri", Point3D::new(3.03, -0.09, 3.16)),
        System::new(3, "Barnard's Star", Point3D::new(-3.03, 1.38, 4.94)),
        System::new(4, "Shinrarta Dezhra", Point3D::new(55.72, 17.59, 27.16)),
        System::new(5, "Deciat", Point3D::new(122.63, -0.81, -47.28)),
        System::new(6, "Maia", Point3D::new(-81.78, -149.44, -343.38)),
        System::new(7, "Colonia", Point3D::new(-9530.5, -910.28, 19808.13)),
        System::new(8, "Sagittarius A*", Point3D::new(25.22, -20.91, 25899.97)),
        System::new(9, "Beagle Point", Point3D::new(-1111.56, -134.22, 65269.75)),
    ])
});

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Endpoint {
    Coords([f64; 3]),
    Point(Point3D),
    Name(String),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum EngineRequest {
    Nearest {
        origin: [f64; 3],
        radius: Option<f64>,
        count: usize,
    },
    Plot {
        from: Endpoint,
        to: Endpoint,
        max_range: f64,
        #[serde(default)]
        metric: RoutingMetric,
        #[serde(default)]
        fsd_boost: Option<FsdBoost>,
        #[serde(default)]
        web_lookup: WebLookup,
        #[serde(default)]
        from_name: Option<String>,
        #[serde(default)]
        to_name: Option<String>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum EngineResponse {
    Nearest {
        systems: Vec<NearestResult>,
    },
    Plot {
        entries: Vec<RouteEntry>,
        systems: Vec<System>,
        status: PlotStatus,
        straight_line_distance: f64,
        travelled_distance: f64,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Serialize)]
struct NearestResult {
    id: u64,
    name: String,
    distance: f64,
}

struct HandlerConfig {
    catalogue_path: Option<String>,
    channel_capacity: usize,
}

impl HandlerConfig {
    fn from_env() -> Self {
        let channel_capacity = env::var("ROUTE_CHANNEL_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CHANNEL_CAPACITY);
        HandlerConfig {
            catalogue_path: env::var("ROUTE_CATALOGUE_PATH").ok(),
            channel_capacity,
        }
    }

    fn load_catalogue(&self) -> Result<SystemCatalogue, Error> {
        match &self.catalogue_path {
            Some(path) => {
                let catalogue = read_catalogue_from_file(path)?;
                info!("Loaded {} systems from {path}", catalogue.len());
                Ok(catalogue)
            }
            None => {
                warn!("ROUTE_CATALOGUE_PATH not set, using the built-in sample catalogue");
                Ok(SAMPLE_CATALOGUE.clone())
            }
        }
    }
}

fn resolve_endpoint(
    catalogue: &SystemCatalogue,
    endpoint: Endpoint,
) -> Result<(Point3D, Option<String>), String> {
    match endpoint {
        Endpoint::Coords(pos) => Ok((pos.into(), None)),
        Endpoint::Point(pos) => Ok((pos, None)),
        Endpoint::Name(name) => {
            let bare = route_plotter::route::system_name_only(&name);
            catalogue
                .by_name(bare)
                .map(|s| (s.pos, Some(s.name.clone())))
                .ok_or_else(|| format!("Unknown system {bare}"))
        }
    }
}

async fn handle_request(
    req: EngineRequest,
    catalogue: Arc<SystemCatalogue>,
    channel_capacity: usize,
) -> Result<EngineResponse, Error> {
    match req {
        EngineRequest::Nearest {
            origin,
            radius,
            count,
        } => {
            let systems = catalogue
                .nearest(origin.into(), radius, count)
                .into_iter()
                .map(|(s, d)| NearestResult {
                    id: s.id,
                    name: s.name.clone(),
                    distance: d,
                })
                .collect();
            Ok(EngineResponse::Nearest { systems })
        }
        EngineRequest::Plot {
            from,
            to,
            max_range,
            metric,
            fsd_boost,
            web_lookup,
            from_name,
            to_name,
        } => {
            let (from, found_from) = match resolve_endpoint(&catalogue, from) {
                Ok(found) => found,
                Err(message) => return Ok(EngineResponse::Error { message }),
            };
            let (to, found_to) = match resolve_endpoint(&catalogue, to) {
                Ok(found) => found,
                Err(message) => return Ok(EngineResponse::Error { message }),
            };
            // caller supplied labels win over catalogue names
            let from_name = from_name.or(found_from);
            let to_name = to_name.or(found_to);

            let request = RouteRequest {
                from,
                to,
                max_range,
                metric,
                fsd_boost,
                web_lookup,
                from_name,
                to_name,
            };
            let plotter = match RoutePlotter::new(request) {
                Ok(plotter) => plotter,
                Err(err) => {
                    return Ok(EngineResponse::Error {
                        message: err.to_string(),
                    })
                }
            };
            if plotter.request().needs_jump_confirmation() {
                warn!(
                    "Plotting a large route ({} jumps)",
                    plotter.request().estimated_jumps()
                );
            }

            let mut handle = spawn_route(plotter, catalogue, channel_capacity)?;
            let mut entries = Vec::new();
            while let Some(entry) = handle.recv().await {
                entries.push(entry);
            }
            let route = tokio::task::spawn_blocking(move || handle.join()).await??;

            Ok(EngineResponse::Plot {
                entries,
                systems: route.systems,
                status: route.status,
                straight_line_distance: route.straight_line_distance,
                travelled_distance: route.travelled_distance,
            })
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();
    let config = HandlerConfig::from_env();
    let catalogue = Arc::new(config.load_catalogue()?);
    let channel_capacity = config.channel_capacity;
    let func = service_fn(move |event: LambdaEvent<EngineRequest>| {
        handle_request(event.payload, Arc::clone(&catalogue), channel_capacity)
    });
    lambda_runtime::run(func).await
}
