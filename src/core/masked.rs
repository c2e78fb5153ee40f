use crate::types::{ensure_shape, SicResult};
use ndarray::{Array2, Zip};
use num_traits::Float;

/// A grid of samples paired with per-pixel invalid flags.
///
/// `mask[[i, j]] == true` means the sample at `(i, j)` is invalid. The payload
/// under an invalid flag is kept (it is whatever the arithmetic produced) but
/// must not be read as a measurement; use [`MaskedGrid::get`] or
/// [`MaskedGrid::filled`] to consume the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedGrid<T> {
    data: Array2<T>,
    mask: Array2<bool>,
}

impl<T: Copy> MaskedGrid<T> {
    /// Pair a data grid with its invalid flags
    pub fn new(data: Array2<T>, mask: Array2<bool>) -> SicResult<Self> {
        ensure_shape("masked grid", data.dim(), mask.dim())?;
        Ok(Self { data, mask })
    }

    /// Callers guarantee `data` and `mask` share a shape
    pub(crate) fn from_parts_unchecked(data: Array2<T>, mask: Array2<bool>) -> Self {
        debug_assert_eq!(data.dim(), mask.dim());
        Self { data, mask }
    }

    /// Grid with every sample valid
    pub fn from_data(data: Array2<T>) -> Self {
        let mask = Array2::from_elem(data.dim(), false);
        Self { data, mask }
    }

    /// Grid with every sample invalid
    pub fn fully_masked(data: Array2<T>) -> Self {
        let mask = Array2::from_elem(data.dim(), true);
        Self { data, mask }
    }

    /// Build a grid from data, marking samples invalid where `is_invalid` holds
    pub fn from_data_where<F>(data: Array2<T>, is_invalid: F) -> Self
    where
        F: Fn(T) -> bool,
    {
        let mask = data.map(|&v| is_invalid(v));
        Self { data, mask }
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn mask(&self) -> &Array2<bool> {
        &self.mask
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample at `index`, or `None` when it is invalid or out of bounds
    pub fn get(&self, index: (usize, usize)) -> Option<T> {
        match (self.data.get(index), self.mask.get(index)) {
            (Some(&value), Some(&false)) => Some(value),
            _ => None,
        }
    }

    /// Raw payload at `index`, regardless of the invalid flag
    pub fn raw(&self, index: (usize, usize)) -> Option<T> {
        self.data.get(index).copied()
    }

    /// Out-of-bounds indices count as masked
    pub fn is_masked(&self, index: (usize, usize)) -> bool {
        self.mask.get(index).copied().unwrap_or(true)
    }

    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|&&m| !m).count()
    }

    pub fn masked_count(&self) -> usize {
        self.len() - self.valid_count()
    }

    pub fn all_masked(&self) -> bool {
        self.mask.iter().all(|&m| m)
    }

    /// Iterate over the valid samples only
    pub fn valid_values(&self) -> impl Iterator<Item = T> + '_ {
        self.data
            .iter()
            .zip(self.mask.iter())
            .filter(|&(_, &m)| !m)
            .map(|(&v, _)| v)
    }

    /// Additionally invalidate every sample where `condition` holds.
    /// Flags already set are never cleared.
    pub fn masked_where(&self, condition: &Array2<bool>) -> SicResult<Self> {
        ensure_shape("mask combination", self.dim(), condition.dim())?;
        let mask = Zip::from(&self.mask)
            .and(condition)
            .map_collect(|&m, &c| m || c);
        Ok(Self {
            data: self.data.clone(),
            mask,
        })
    }

    /// Additionally invalidate every sample whose payload satisfies `predicate`
    pub fn masked_by<F>(&self, predicate: F) -> Self
    where
        F: Fn(T) -> bool,
    {
        let mask = Zip::from(&self.data)
            .and(&self.mask)
            .map_collect(|&v, &m| m || predicate(v));
        Self {
            data: self.data.clone(),
            mask,
        }
    }

    /// Pixel-wise choice between two grids, payload and flag together
    pub fn select(condition: &Array2<bool>, when_true: &Self, when_false: &Self) -> SicResult<Self> {
        ensure_shape("masked select", condition.dim(), when_true.dim())?;
        ensure_shape("masked select", condition.dim(), when_false.dim())?;
        let data = Zip::from(condition)
            .and(&when_true.data)
            .and(&when_false.data)
            .map_collect(|&c, &t, &f| if c { t } else { f });
        let mask = Zip::from(condition)
            .and(&when_true.mask)
            .and(&when_false.mask)
            .map_collect(|&c, &t, &f| if c { t } else { f });
        Ok(Self { data, mask })
    }

    /// Write `value` wherever `condition` holds. Written samples become valid.
    pub fn assign_where(&self, condition: &Array2<bool>, value: T) -> SicResult<Self> {
        ensure_shape("masked assignment", self.dim(), condition.dim())?;
        let data = Zip::from(&self.data)
            .and(condition)
            .map_collect(|&v, &c| if c { value } else { v });
        let mask = Zip::from(&self.mask)
            .and(condition)
            .map_collect(|&m, &c| m && !c);
        Ok(Self { data, mask })
    }

    /// Apply `f` to every payload, keeping the invalid flags
    pub fn map<U, F>(&self, f: F) -> MaskedGrid<U>
    where
        U: Copy,
        F: Fn(T) -> U,
    {
        MaskedGrid {
            data: self.data.map(|&v| f(v)),
            mask: self.mask.clone(),
        }
    }

    /// Combine two grids pixel by pixel. The result is invalid wherever
    /// either operand is.
    pub fn zip_with<U, V, F>(&self, other: &MaskedGrid<U>, f: F) -> SicResult<MaskedGrid<V>>
    where
        U: Copy,
        V: Copy,
        F: Fn(T, U) -> V,
    {
        ensure_shape("masked arithmetic", self.dim(), other.dim())?;
        let data = Zip::from(&self.data)
            .and(&other.data)
            .map_collect(|&a, &b| f(a, b));
        let mask = Zip::from(&self.mask)
            .and(&other.mask)
            .map_collect(|&a, &b| a || b);
        Ok(MaskedGrid { data, mask })
    }

    /// Payload with every invalid sample replaced by `fill`
    pub fn filled(&self, fill: T) -> Array2<T> {
        Zip::from(&self.data)
            .and(&self.mask)
            .map_collect(|&v, &m| if m { fill } else { v })
    }

    pub fn into_parts(self) -> (Array2<T>, Array2<bool>) {
        (self.data, self.mask)
    }
}

impl<T: Float> MaskedGrid<T> {
    /// Invalidate NaN and infinite samples
    pub fn fix_invalid(&self) -> Self {
        let mask = Zip::from(&self.data)
            .and(&self.mask)
            .map_collect(|&v, &m| m || !v.is_finite());
        Self {
            data: self.data.clone(),
            mask,
        }
    }

    /// Mean of the valid samples, `None` if there are none
    pub fn mean(&self) -> Option<T> {
        let mut sum = T::zero();
        let mut count = 0usize;
        for v in self.valid_values() {
            sum = sum + v;
            count += 1;
        }
        if count == 0 {
            return None;
        }
        T::from(count).map(|n| sum / n)
    }

    /// (min, max) of the valid samples
    pub fn min_max(&self) -> Option<(T, T)> {
        self.valid_values().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}
