use crate::imports::*;

/// Direction of travel of a search hint along a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    Unk,
    Fwd,
    Bwd,
}

/// Has method that returns offset from start of a [TrainPath](crate::track::TrainPath)
pub trait GetOffset {
    /// Returns offset from start of the path
    fn get_offset(&self) -> si::Length;
}

/// Contains method to calculate the index immediately before `offset` given the previous calculated
/// index, `idx`, and a direction `Dir`.
pub trait LinSearchHint {
    /// Calculate the index immediately before `offset` given the previous calculated index, `idx`,
    /// and a direction `Dir`.
    fn calc_idx(&self, offset: si::Length, idx: usize, dir: &Dir) -> anyhow::Result<usize>;
}

impl<T: GetOffset> LinSearchHint for [T] {
    /// # Arguments
    /// - `offset`: position along the path
    /// - `idx`: previously found index, used as the starting point of the scan
    /// - `dir`: direction in which `offset` moved since `idx` was found
    fn calc_idx(&self, offset: si::Length, mut idx: usize, dir: &Dir) -> anyhow::Result<usize> {
        let (first, last) = match (self.first(), self.last()) {
            (Some(first), Some(last)) => (first.get_offset(), last.get_offset()),
            _ => bail!("{}\nCannot search an empty profile!", format_dbg!()),
        };
        ensure!(
            idx < self.len(),
            "{}\nHint idx {} out of bounds for profile of len {}!",
            format_dbg!(),
            idx,
            self.len()
        );
        if dir != &Dir::Bwd {
            ensure!(
                offset <= last,
                "{}\nOffset in forward direction larger than last slice offset at idx: {}!",
                format_dbg!(),
                idx
            );
            while idx + 1 < self.len() && self[idx + 1].get_offset() <= offset {
                idx += 1;
            }
        }
        if dir != &Dir::Fwd {
            ensure!(
                first <= offset,
                "{}\nOffset in reverse direction smaller than first slice offset at idx: {}!",
                format_dbg!(),
                idx
            );
            while idx > 0 && offset < self[idx].get_offset() {
                idx -= 1;
            }
        }
        Ok(idx)
    }
}
