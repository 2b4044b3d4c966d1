//! Most restrictive speed profile construction

mod etcs;
mod mrsp;

pub use etcs::*;
pub use mrsp::*;
