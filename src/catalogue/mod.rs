use std::collections::HashMap;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::geometry::Point3D;
use crate::lookup::{LookupError, SystemLookup, WebLookup};
use crate::spatial::kd_tree::KDTree;
use crate::System;

/// In-memory star system list with a spatial index and a name index.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SystemCatalogue {
    pub systems: Vec<System>,
    #[serde(skip)]
    tree: KDTree,
    #[serde(skip)]
    name_index: HashMap<String, usize>,
}

impl SystemCatalogue {
    pub fn new(systems: Vec<System>) -> Self {
        let mut catalogue = SystemCatalogue {
            systems,
            tree: KDTree::default(),
            name_index: HashMap::new(),
        };
        catalogue.rebuild_indices();
        catalogue
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Case-insensitive name lookup.
    pub fn index_of_name(&self, name: &str) -> Option<usize> {
        self.name_index.get(&name.to_lowercase()).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&System> {
        self.index_of_name(name).map(|idx| &self.systems[idx])
    }

    /// Up to `n` systems near `target`, nearest first, with their distances.
    pub fn nearest(&self, target: Point3D, radius: Option<f64>, n: usize) -> Vec<(&System, f64)> {
        self.tree
            .nearest(target, radius, n)
            .into_iter()
            .map(|(idx, dist)| (&self.systems[idx], dist))
            .collect()
    }

    pub fn rebuild_indices(&mut self) {
        let points: Vec<Point3D> = self.systems.iter().map(|s| s.pos).collect();
        self.tree = KDTree::build(&points);
        self.name_index = self
            .systems
            .iter()
            .enumerate()
            .map(|(idx, system)| (system.name.to_lowercase(), idx))
            .collect();
    }
}

impl SystemLookup for SystemCatalogue {
    fn find_systems_near(
        &self,
        point: Point3D,
        radius: Option<f64>,
        limit: usize,
        web_lookup: WebLookup,
    ) -> Result<Vec<System>, LookupError> {
        // local data only; the policy matters to web-backed lookups
        trace!("catalogue lookup near {point:?} radius {radius:?} (web lookup {web_lookup:?} ignored)");
        Ok(self
            .nearest(point, radius, limit)
            .into_iter()
            .map(|(system, _)| system.clone())
            .collect())
    }
}
