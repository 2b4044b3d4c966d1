//! Rolling stock, running resistance and per-point train state

mod rolling_stock;
mod train_res;
mod train_state;

pub use rolling_stock::*;
pub use train_res::*;
pub use train_state::*;
