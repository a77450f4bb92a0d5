//! Index-space boxes and domain partitioning.

use crate::error::DatasetError;

/// A box of cells `[start, end)` in domain index space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    /// First cell along each axis (inclusive).
    pub start: [usize; 3],
    /// One past the last cell along each axis.
    pub end: [usize; 3],
}

impl Region {
    /// The whole domain.
    pub fn whole(dims: [usize; 3]) -> Self {
        Self {
            start: [0; 3],
            end: dims,
        }
    }

    /// Cells along each axis.
    pub fn dims(&self) -> [usize; 3] {
        [0, 1, 2].map(|a| self.end[a] - self.start[a])
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        self.dims().iter().product()
    }

    /// Whether the cell at `index` lies inside.
    pub fn contains(&self, index: [usize; 3]) -> bool {
        (0..3).all(|a| self.start[a] <= index[a] && index[a] < self.end[a])
    }

    fn bisect(&self) -> Option<(Region, Region)> {
        let dims = self.dims();
        let axis = (0..3).max_by_key(|&a| (dims[a], 3 - a))?;
        if dims[axis] < 2 {
            return None;
        }
        let mid = self.start[axis] + dims[axis] / 2;
        let mut left = *self;
        let mut right = *self;
        left.end[axis] = mid;
        right.start[axis] = mid;
        Some((left, right))
    }
}

/// Split a domain into `nprocs` boxes by repeated bisection.
///
/// Every round halves each box along its longest axis (the lowest axis
/// on ties), so `nprocs` must be a power of two. The boxes tile the
/// domain exactly and are returned in bisection order.
pub fn partition(dims: [usize; 3], nprocs: usize) -> Result<Vec<Region>, DatasetError> {
    if nprocs == 0 || !nprocs.is_power_of_two() {
        return Err(DatasetError::InvalidRegion {
            reason: format!("nprocs must be a power of two, got {nprocs}"),
        });
    }
    let mut regions = vec![Region::whole(dims)];
    while regions.len() < nprocs {
        let mut next = Vec::with_capacity(regions.len() * 2);
        for region in &regions {
            let (left, right) = region.bisect().ok_or_else(|| DatasetError::InvalidRegion {
                reason: format!("cannot split {dims:?} into {nprocs} grids"),
            })?;
            next.push(left);
            next.push(right);
        }
        regions = next;
    }
    Ok(regions)
}
