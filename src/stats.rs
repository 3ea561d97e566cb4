use crate::core::Bucket;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distribution {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub stddev: f64,
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn distribution(values: &[f64]) -> Option<Distribution> {
    let mean = mean(values)?;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(Distribution {
        count: values.len(),
        min,
        max,
        mean,
        stddev: variance.sqrt(),
    })
}

/// Fixed-width buckets from `min(0, smallest)` to the largest value. Every
/// value lands in exactly one bucket; the last bucket is closed on the right.
pub fn histogram(values: &[f64], buckets: usize) -> Vec<Bucket> {
    if values.is_empty() || buckets == 0 {
        return vec![];
    }

    let lower = values.iter().copied().fold(0.0_f64, f64::min);
    let upper = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if upper <= lower {
        return vec![Bucket {
            lower,
            upper: lower,
            count: values.len() as u64,
        }];
    }

    let width = (upper - lower) / buckets as f64;
    let mut out: Vec<Bucket> = (0..buckets)
        .map(|i| Bucket {
            lower: lower + width * i as f64,
            upper: if i + 1 == buckets {
                upper
            } else {
                lower + width * (i + 1) as f64
            },
            count: 0,
        })
        .collect();

    for v in values {
        let idx = (((v - lower) / width).floor() as usize).min(buckets - 1);
        out[idx].count += 1;
    }
    out
}
