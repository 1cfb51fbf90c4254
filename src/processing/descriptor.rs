use crate::models::FeatureVector;

/// Concatenates feature blocks into one descriptor.
///
/// `push_block` zero-centres a block and scales it to unit length so every
/// block carries the same weight regardless of its size or units.
/// `push_weighted` keeps the block's sign and shape but scales it to length
/// `weight`, for features whose absolute direction matters.
/// `push_raw` appends values untouched. `finish` unit-normalizes the result.
#[derive(Debug, Default)]
pub struct DescriptorBuilder {
    values: Vec<f64>,
}

impl DescriptorBuilder {
    pub fn with_capacity(capacity: usize) -> Self {
        DescriptorBuilder {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push_block(&mut self, block: &[f64]) -> &mut Self {
        if block.is_empty() {
            return self;
        }
        let mean = block.iter().sum::<f64>() / block.len() as f64;
        let centred: Vec<f64> = block.iter().map(|v| v - mean).collect();
        let norm = centred.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 1e-12 {
            self.values.extend(centred.iter().map(|v| v / norm));
        } else {
            self.values.extend(std::iter::repeat(0.0).take(block.len()));
        }
        self
    }

    pub fn push_weighted(&mut self, block: &[f64], weight: f64) -> &mut Self {
        let norm = block.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 1e-12 {
            self.values.extend(block.iter().map(|v| v * weight / norm));
        } else {
            self.values.extend(std::iter::repeat(0.0).take(block.len()));
        }
        self
    }

    pub fn push_raw(&mut self, block: &[f64]) -> &mut Self {
        self.values.extend_from_slice(block);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn finish(mut self) -> FeatureVector {
        unit_normalize(&mut self.values);
        FeatureVector::new(self.values)
    }
}

pub fn unit_normalize(values: &mut [f64]) {
    let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for v in values.iter_mut() {
            *v /= norm;
        }
    }
}

/// Histogram of `values` over `[min, max)` with `bins` buckets, normalized to sum to 1.
pub fn normalized_histogram(values: impl Iterator<Item = f64>, bins: usize, min: f64, max: f64) -> Vec<f64> {
    let mut hist = vec![0.0; bins];
    if bins == 0 || max <= min {
        return hist;
    }
    let width = (max - min) / bins as f64;
    let mut total = 0.0;
    for v in values {
        let index = (((v - min) / width).floor().max(0.0) as usize).min(bins - 1);
        hist[index] += 1.0;
        total += 1.0;
    }
    if total > 0.0 {
        for h in hist.iter_mut() {
            *h /= total;
        }
    }
    hist
}

/// Linear interpolation of `values` onto `target` evenly spaced points.
pub fn resample_linear(values: &[f64], target: usize) -> Vec<f64> {
    if target == 0 || values.is_empty() {
        return vec![0.0; target];
    }
    if values.len() == target {
        return values.to_vec();
    }
    if values.len() == 1 || target == 1 {
        return vec![values[0]; target];
    }
    let last = (values.len() - 1) as f64;
    (0..target)
        .map(|i| {
            let pos = i as f64 * last / (target - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(values.len() - 1);
            let frac = pos - lo as f64;
            values[lo] * (1.0 - frac) + values[hi] * frac
        })
        .collect()
}
