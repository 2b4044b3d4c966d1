//! Train paths: routing between steps and profiles merged along the route

mod path_profile;
mod train_path;

pub use path_profile::*;
pub use train_path::*;
