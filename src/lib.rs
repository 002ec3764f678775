pub mod catalogue;
pub mod data;
pub mod geometry;
pub mod lookup;
pub mod route;
pub mod spatial;

use serde::{Deserialize, Serialize};

pub use geometry::Point3D;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct System {
    pub id: u64,
    pub name: String,
    /// Position in galactic coordinates (light-years)
    pub pos: Point3D,
}

impl System {
    pub fn new(id: u64, name: impl Into<String>, pos: Point3D) -> Self {
        System {
            id,
            name: name.into(),
            pos,
        }
    }
}
