//! Operational point locations imported from CSV

use super::infra::{OperationalPoint, RawInfra};
use super::track_section::OperationalPointPart;
use crate::imports::*;
use serde_this_or_that::as_bool;

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpLocation {
    /// Id of the operational point
    #[serde(rename = "Location ID")]
    pub location_id: String,
    #[serde(rename = "UIC")]
    pub uic: Option<u32>,
    /// Label of the track section carrying this part
    #[serde(rename = "Track")]
    pub track: String,
    #[serde(rename = "Offset (m)")]
    pub offset: si::Length,
    #[serde(rename = "Is Main")]
    #[serde(deserialize_with = "as_bool")]
    pub is_main: bool,
}
pub type LocationMap = HashMap<String, Vec<OpLocation>>;

pub fn import_locations<P: AsRef<Path>>(filepath: P) -> anyhow::Result<LocationMap> {
    let filepath = filepath.as_ref();
    let file_read = File::open(filepath)
        .with_context(|| format!("Could not open {}", filepath.display()))?;
    let mut reader = csv::Reader::from_reader(file_read);
    let mut location_map = LocationMap::default();
    for result in reader.deserialize() {
        let location: OpLocation = result?;
        location_map
            .entry(location.location_id.clone())
            .or_default()
            .push(location);
    }
    Ok(location_map)
}

impl RawInfra {
    /// Adds one operational point per entry of `locations` and its parts to the named tracks
    pub fn add_locations(&mut self, locations: &LocationMap) -> anyhow::Result<()> {
        let mut ids: Vec<&String> = locations.keys().collect();
        ids.sort();
        for id in ids {
            ensure!(
                self.operational_points.iter().all(|op| &op.id != id),
                "Operational point `{id}` already exists in infra `{}`",
                self.id
            );
            let parts = &locations[id];
            let uic = parts.iter().find_map(|loc| loc.uic);
            for loc in parts {
                let track = self
                    .track_sections
                    .iter_mut()
                    .find(|t| t.id == loc.track)
                    .with_context(|| {
                        format!("Location `{id}` references unknown track `{}`", loc.track)
                    })?;
                track.operational_points.push(OperationalPointPart {
                    operational_point: id.clone(),
                    position: loc.offset,
                    siding: !loc.is_main,
                });
            }
            self.operational_points.push(OperationalPoint {
                id: id.clone(),
                uic,
                name: id.clone(),
            });
        }
        Ok(())
    }
}
