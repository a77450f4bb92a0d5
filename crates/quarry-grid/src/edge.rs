//! Ghost-cell fill behavior at the domain boundary.

/// How ghost cells outside the domain are filled.
///
/// # Examples
///
/// ```
/// use quarry_grid::EdgeBehavior;
///
/// // Clamp: out-of-domain cells repeat the boundary cell.
/// assert_eq!(EdgeBehavior::Clamp.resolve(-2, 8), 0);
/// assert_eq!(EdgeBehavior::Clamp.resolve(9, 8), 7);
///
/// // Wrap: the domain is periodic.
/// assert_eq!(EdgeBehavior::Wrap.resolve(-2, 8), 6);
/// assert_eq!(EdgeBehavior::Wrap.resolve(9, 8), 1);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EdgeBehavior {
    /// Out-of-domain index maps to the nearest boundary cell.
    #[default]
    Clamp,
    /// Out-of-domain index wraps to the opposite side (periodic).
    Wrap,
}

impl EdgeBehavior {
    /// Map a possibly out-of-domain index onto `0..len`.
    ///
    /// `len` must be non-zero.
    pub fn resolve(self, index: isize, len: usize) -> usize {
        let n = len as isize;
        match self {
            Self::Clamp => index.clamp(0, n - 1) as usize,
            Self::Wrap => index.rem_euclid(n) as usize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn interior_indices_are_unchanged() {
        for i in 0..5 {
            assert_eq!(EdgeBehavior::Clamp.resolve(i, 5), i as usize);
            assert_eq!(EdgeBehavior::Wrap.resolve(i, 5), i as usize);
        }
    }

    proptest! {
        #[test]
        fn resolved_index_is_in_range(index in -100isize..100, len in 1usize..20) {
            prop_assert!(EdgeBehavior::Clamp.resolve(index, len) < len);
            prop_assert!(EdgeBehavior::Wrap.resolve(index, len) < len);
        }

        #[test]
        fn wrap_is_periodic(index in -50isize..50, len in 1usize..20) {
            let shifted = index + len as isize;
            prop_assert_eq!(
                EdgeBehavior::Wrap.resolve(index, len),
                EdgeBehavior::Wrap.resolve(shifted, len)
            );
        }
    }
}
