//! Infrastructure graph and paths through it

pub mod builder;
mod infra;
mod infra_cache;
pub mod location;
pub mod path;
mod topology;
mod track_idx;
mod track_section;
mod zone;

pub use builder::{InfraBuilder, TrackRef};
pub use infra::*;
pub use infra_cache::InfraCache;
pub use location::{import_locations, LocationMap, OpLocation};
pub use path::*;
pub use topology::*;
pub use track_idx::TrackIdx;
pub use track_section::*;
pub use zone::ZoneKey;
