use crate::core::masked::MaskedGrid;
use crate::types::{ensure_shape, CloudClass, SicError, SicResult};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Neighbourhood used when grouping pixels into components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Connectivity {
    /// Horizontal and vertical neighbours
    #[default]
    Four,
    /// Horizontal, vertical and diagonal neighbours
    Eight,
}

/// Parameters for removing spurious open-water patches near the pole
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupParams {
    /// Only clear pixels poleward of this latitude (degrees) are inspected
    pub latitude_threshold: f32,
    /// Components with more pixels than this are reset to "not processed"
    pub max_component_size: usize,
    pub connectivity: Connectivity,
}

impl Default for CleanupParams {
    fn default() -> Self {
        Self {
            latitude_threshold: 80.0,
            max_component_size: 10,
            connectivity: Connectivity::Four,
        }
    }
}

impl CleanupParams {
    pub fn validate(&self) -> SicResult<()> {
        if !self.latitude_threshold.is_finite() || self.latitude_threshold.abs() > 90.0 {
            return Err(SicError::InvalidParameter(format!(
                "cleanup latitude must be within [-90, 90], got {}",
                self.latitude_threshold
            )));
        }
        Ok(())
    }
}

/// What a cleanup pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    /// Clear pixels poleward of the latitude threshold
    pub candidate_pixels: usize,
    pub components: usize,
    pub removed_components: usize,
    pub removed_pixels: usize,
}

/// Removes large contiguous "clear water" patches the cloud mask reports
/// near the pole, where open water of that extent does not occur.
pub struct CloudMaskCleaner {
    params: CleanupParams,
}

impl CloudMaskCleaner {
    pub fn new(params: CleanupParams) -> Self {
        Self { params }
    }

    pub fn standard() -> Self {
        Self::new(CleanupParams::default())
    }

    pub fn params(&self) -> &CleanupParams {
        &self.params
    }

    /// Cleaned copy of `cloudmask`; invalid flags are carried over unchanged
    pub fn clean(&self, cloudmask: &MaskedGrid<u8>, latitude: &MaskedGrid<f32>) -> SicResult<MaskedGrid<u8>> {
        self.clean_with_summary(cloudmask, latitude)
            .map(|(cleaned, _)| cleaned)
    }

    pub fn clean_with_summary(
        &self,
        cloudmask: &MaskedGrid<u8>,
        latitude: &MaskedGrid<f32>,
    ) -> SicResult<(MaskedGrid<u8>, CleanupSummary)> {
        ensure_shape("cloud mask cleanup (latitude)", cloudmask.dim(), latitude.dim())?;

        let clear = CloudClass::Clear.code();
        let threshold = self.params.latitude_threshold;

        // invalid codes or latitudes never join a component
        let candidates = Zip::from(cloudmask.data())
            .and(cloudmask.mask())
            .and(latitude.data())
            .and(latitude.mask())
            .map_collect(|&code, &code_invalid, &lat, &lat_invalid| {
                !code_invalid && !lat_invalid && code == clear && lat > threshold
            });

        let (labels, components) = label_components(&candidates, self.params.connectivity);
        let sizes = component_sizes(&labels, components);
        let remove: Vec<bool> = sizes
            .iter()
            .map(|&size| size > self.params.max_component_size)
            .collect();

        let summary = CleanupSummary {
            candidate_pixels: sizes.iter().skip(1).sum(),
            components,
            removed_components: remove.iter().skip(1).filter(|&&r| r).count(),
            removed_pixels: sizes
                .iter()
                .zip(&remove)
                .skip(1)
                .filter(|(_, &r)| r)
                .map(|(&s, _)| s)
                .sum(),
        };

        let not_processed = CloudClass::NotProcessed.code();
        let data = Zip::from(cloudmask.data())
            .and(&labels)
            .map_collect(|&code, &label| {
                if label > 0 && remove[label] {
                    not_processed
                } else {
                    code
                }
            });

        log::info!(
            "Cloud mask cleanup: {} of {} components above {:.1} deg removed ({} pixels)",
            summary.removed_components,
            summary.components,
            threshold,
            summary.removed_pixels
        );

        Ok((MaskedGrid::new(data, cloudmask.mask().clone())?, summary))
    }
}

/// Find the root label in the union-find parent table, compressing the path
fn find_root(parents: &mut [usize], label: usize) -> usize {
    let mut current = label;
    while current != parents[current] {
        parents[current] = parents[parents[current]];
        current = parents[current];
    }
    current
}

fn union_labels(parents: &mut [usize], a: usize, b: usize) {
    let root_a = find_root(parents, a);
    let root_b = find_root(parents, b);
    if root_a < root_b {
        parents[root_b] = root_a;
    } else if root_b < root_a {
        parents[root_a] = root_b;
    }
}

/// Two-pass connected component labelling with union-find.
///
/// Returns the label image (0 = background, components numbered 1..=n in
/// raster order of their first pixel) and the number of components `n`.
pub fn label_components(foreground: &Array2<bool>, connectivity: Connectivity) -> (Array2<usize>, usize) {
    let (rows, cols) = foreground.dim();
    let mut labels = Array2::<usize>::zeros((rows, cols));
    let mut parents: Vec<usize> = vec![0];

    for i in 0..rows {
        for j in 0..cols {
            if !foreground[[i, j]] {
                continue;
            }

            // neighbours already visited in raster order
            let mut neighbours = [0usize; 4];
            let mut count = 0;
            let mut push = |label: usize| {
                if label > 0 {
                    neighbours[count] = label;
                    count += 1;
                }
            };
            if i > 0 {
                push(labels[[i - 1, j]]);
            }
            if j > 0 {
                push(labels[[i, j - 1]]);
            }
            if connectivity == Connectivity::Eight && i > 0 {
                if j > 0 {
                    push(labels[[i - 1, j - 1]]);
                }
                if j + 1 < cols {
                    push(labels[[i - 1, j + 1]]);
                }
            }

            let neighbours = &neighbours[..count];
            match neighbours.iter().min() {
                None => {
                    let label = parents.len();
                    parents.push(label);
                    labels[[i, j]] = label;
                }
                Some(&smallest) => {
                    labels[[i, j]] = smallest;
                    for &other in neighbours {
                        if other != smallest {
                            union_labels(&mut parents, smallest, other);
                        }
                    }
                }
            }
        }
    }

    // consecutive final labels in order of first appearance
    let mut final_label = vec![0usize; parents.len()];
    let mut next = 0;
    for provisional in 1..parents.len() {
        let root = find_root(&mut parents, provisional);
        if final_label[root] == 0 {
            next += 1;
            final_label[root] = next;
        }
        final_label[provisional] = final_label[root];
    }

    labels.mapv_inplace(|l| final_label[l]);
    (labels, next)
}

/// Pixel count per label; index 0 holds the background count
pub fn component_sizes(labels: &Array2<usize>, components: usize) -> Vec<usize> {
    let mut sizes = vec![0usize; components + 1];
    for &label in labels.iter() {
        if let Some(size) = sizes.get_mut(label) {
            *size += 1;
        }
    }
    sizes
}
