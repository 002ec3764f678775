use std::env;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use log::{info, warn};
use reqwest::blocking::Client;
use route_plotter::catalogue::SystemCatalogue;
use route_plotter::data::write_catalogue_to_file;
use route_plotter::{Point3D, System};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

/// One record of an EDSM-style systems dump.
#[derive(Debug, Deserialize)]
struct DumpSystem {
    id: Option<u64>,
    id64: Option<u64>,
    name: String,
    coords: Option<DumpCoords>,
}

#[derive(Debug, Deserialize)]
struct DumpCoords {
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Debug, Serialize)]
struct CatalogueMetadata {
    source: String,
    systems: usize,
    skipped: usize,
    generated_at_epoch: u64,
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let Some(source) = args.next() else {
        bail!("usage: build_catalogue <dump.json | https://...> [output-dir]");
    };
    let output_dir = PathBuf::from(args.next().unwrap_or_else(|| "data".to_string()));

    // keeps a downloaded dump alive until it has been parsed
    let mut _download = None;
    let dump_path = if source.starts_with("http://") || source.starts_with("https://") {
        let client = Client::builder()
            .user_agent("route-plotter-catalogue-builder/0.1")
            .build()?;
        info!("Downloading systems dump from {source}");
        let file = download_dump(&client, &source)?;
        let path = file.path().to_path_buf();
        _download = Some(file);
        path
    } else {
        PathBuf::from(&source)
    };

    let (catalogue, skipped) = build_catalogue_from_dump(&dump_path)
        .with_context(|| format!("failed to build catalogue from {}", dump_path.display()))?;

    fs::create_dir_all(&output_dir).context("failed to create catalogue output directory")?;
    let catalogue_path = output_dir.join("systems.bin");
    write_catalogue_to_file(&catalogue, &catalogue_path)
        .with_context(|| format!("failed to write catalogue to {}", catalogue_path.display()))?;

    let metadata = CatalogueMetadata {
        source,
        systems: catalogue.len(),
        skipped,
        generated_at_epoch: current_epoch_seconds(),
    };
    let metadata_path = output_dir.join("systems.meta.json");
    let metadata_json = serde_json::to_vec_pretty(&metadata)?;
    fs::write(&metadata_path, metadata_json)
        .with_context(|| format!("failed to write metadata to {}", metadata_path.display()))?;

    info!(
        "Wrote catalogue to {} ({} systems, {} skipped)",
        catalogue_path.display(),
        metadata.systems,
        metadata.skipped
    );

    Ok(())
}

fn download_dump(client: &Client, url: &str) -> Result<NamedTempFile> {
    let mut response = client
        .get(url)
        .send()
        .with_context(|| format!("failed to download {url}"))?
        .error_for_status()
        .context("systems dump download returned an error status")?;
    let mut file = NamedTempFile::new()?;
    response.copy_to(&mut file)?;
    Ok(file)
}

fn build_catalogue_from_dump(path: &Path) -> Result<(SystemCatalogue, usize)> {
    let file = fs::File::open(path)
        .with_context(|| format!("failed to open systems dump at {}", path.display()))?;
    let records: Vec<DumpSystem> = serde_json::from_reader(BufReader::new(file))
        .context("systems dump is not a JSON array of systems")?;

    let mut systems = Vec::with_capacity(records.len());
    let mut skipped = 0usize;
    for (idx, record) in records.into_iter().enumerate() {
        let Some(coords) = record.coords else {
            warn!("System {} has no coordinates, skipping", record.name);
            skipped += 1;
            continue;
        };
        let id = record.id64.or(record.id).unwrap_or(idx as u64);
        systems.push(System::new(
            id,
            record.name,
            Point3D::new(coords.x, coords.y, coords.z),
        ));
    }

    Ok((SystemCatalogue::new(systems), skipped))
}

fn current_epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
