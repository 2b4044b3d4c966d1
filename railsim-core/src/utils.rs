//! Module containing miscellaneous utility functions.

use crate::imports::*;

/// Default relative tolerance for float comparisons
pub const REL_TOL: f64 = 1e-3;

#[macro_export]
/// Generates a String similar to output of `dbg` but without printing
macro_rules! format_dbg {
    ($dbg_expr:expr) => {
        format!(
            "[{}:{}] {}: {:?}",
            file!(),
            line!(),
            stringify!($dbg_expr),
            $dbg_expr
        )
    };
    () => {
        format!("[{}:{}]", file!(), line!())
    };
}

/// Returns true if `val1` and `val2` are within a relative tolerance of `epsilon`, or within
/// an absolute tolerance of `epsilon` when either value is near zero
pub fn almost_eq(val1: f64, val2: f64, epsilon: Option<f64>) -> bool {
    let epsilon = epsilon.unwrap_or(REL_TOL);
    ((val2 - val1) / (val1 + val2)).abs() < epsilon || (val2 - val1).abs() < epsilon
}

pub fn almost_eq_uom<D, U>(
    val1: &uom::si::Quantity<D, U, f64>,
    val2: &uom::si::Quantity<D, U, f64>,
    epsilon: Option<f64>,
) -> bool
where
    D: uom::si::Dimension + ?Sized,
    U: uom::si::Units<f64> + ?Sized,
{
    almost_eq(val1.value, val2.value, epsilon)
}

/// Returns true if `val1` is less than `val2` or almost equal to it
pub fn almost_le_uom<D, U>(
    val1: &uom::si::Quantity<D, U, f64>,
    val2: &uom::si::Quantity<D, U, f64>,
    epsilon: Option<f64>,
) -> bool
where
    D: uom::si::Dimension + ?Sized,
    U: uom::si::Units<f64> + ?Sized,
{
    val1.value < val2.value || almost_eq(val1.value, val2.value, epsilon)
}

/// Returns true if `x` is sorted in non-decreasing order
pub fn is_sorted<T: PartialOrd>(x: &[T]) -> bool {
    x.windows(2).all(|w| w[0] <= w[1])
}

/// Interpolates `y` at `x_new` from breakpoints `x`, clamping outside the range.
///
/// # Arguments
/// - `x_new`: point at which to interpolate
/// - `x`: breakpoints, sorted ascending
/// - `y`: values at `x`
pub fn interp1d(x_new: f64, x: &[f64], y: &[f64]) -> anyhow::Result<f64> {
    ensure!(
        x.len() == y.len() && !x.is_empty(),
        "{}\n`x` and `y` must be nonempty and of equal length",
        format_dbg!((x.len(), y.len()))
    );
    if x_new <= x[0] {
        return Ok(y[0]);
    }
    let last = x.len() - 1;
    if x_new >= x[last] {
        return Ok(y[last]);
    }
    let i = x.partition_point(|&xi| xi <= x_new) - 1;
    let frac = (x_new - x[i]) / (x[i + 1] - x[i]);
    Ok(y[i] + frac * (y[i + 1] - y[i]))
}

/// Hands out sequential ids.  Replaces process-wide counters: each generator owns its allocator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAllocator {
    prefix: String,
    next: u64,
}

impl IdAllocator {
    /// Allocator producing labels like `{prefix}.0`, `{prefix}.1`, ...
    pub fn new<S: Into<String>>(prefix: S) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn next_label(&mut self) -> String {
        let id = self.next_id();
        format!("{}.{id}", self.prefix)
    }
}
