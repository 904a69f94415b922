use super::variables::Stat;
use std::collections::BTreeMap;

/// Aggregate statistics of the valid pixels of one zone.
///
/// Every field is `None` when the zone has no valid pixel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZonalStats {
    pub count: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub sum: Option<f64>,
    pub std: Option<f64>,
    pub median: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
    pub range: Option<f64>,
    pub majority: Option<f64>,
    pub minority: Option<f64>,
    /// Fraction of valid pixels per class label (categorical rasters only).
    /// Mapped classes absent from a non-empty zone are 0.0.
    pub categories: BTreeMap<String, f64>,
}

impl ZonalStats {
    pub fn get(&self, stat: Stat) -> Option<f64> {
        match stat {
            Stat::Count => self.count,
            Stat::Min => self.min,
            Stat::Max => self.max,
            Stat::Mean => self.mean,
            Stat::Sum => self.sum,
            Stat::Std => self.std,
            Stat::Median => self.median,
            Stat::P25 => self.p25,
            Stat::P50 => self.p50,
            Stat::P75 => self.p75,
            Stat::P95 => self.p95,
            Stat::P99 => self.p99,
            Stat::Range => self.range,
            Stat::Majority => self.majority,
            Stat::Minority => self.minority,
        }
    }

    pub fn category(&self, label: &str) -> Option<f64> {
        self.categories.get(label).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.count.is_none()
    }
}

/// Percentile of sorted data with linear interpolation between ranks.
///
/// `q` is in percent. Panics on empty input.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = (q / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Compute the statistics of a set of valid pixel values.
///
/// `values` is sorted in place. `categories` enables the majority / minority
/// classes and the per-label fraction breakdown.
pub fn describe(values: &mut [f64], categories: Option<&[(i64, &str)]>) -> ZonalStats {
    if values.is_empty() {
        return ZonalStats::default();
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len() as f64;
    let sum: f64 = values.iter().sum();
    let mean = sum / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let min = values[0];
    let max = values[values.len() - 1];

    let mut stats = ZonalStats {
        count: Some(n),
        min: Some(min),
        max: Some(max),
        mean: Some(mean),
        sum: Some(sum),
        std: Some(variance.sqrt()),
        median: Some(percentile(values, 50.0)),
        p25: Some(percentile(values, 25.0)),
        p50: Some(percentile(values, 50.0)),
        p75: Some(percentile(values, 75.0)),
        p95: Some(percentile(values, 95.0)),
        p99: Some(percentile(values, 99.0)),
        range: Some(max - min),
        ..ZonalStats::default()
    };

    if let Some(classes) = categories {
        let counts = class_counts(values);

        // Ties resolve to the smallest class value (BTreeMap iteration order)
        let mut majority: Option<(i64, usize)> = None;
        let mut minority: Option<(i64, usize)> = None;
        for (&class, &count) in &counts {
            if majority.map_or(true, |(_, c)| count > c) {
                majority = Some((class, count));
            }
            if minority.map_or(true, |(_, c)| count < c) {
                minority = Some((class, count));
            }
        }
        stats.majority = majority.map(|(class, _)| class as f64);
        stats.minority = minority.map(|(class, _)| class as f64);

        for (class, label) in classes {
            let count = counts.get(class).copied().unwrap_or(0);
            stats.categories.insert(label.to_string(), count as f64 / n);
        }
    }

    stats
}

fn class_counts(values: &[f64]) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for value in values {
        *counts.entry(value.round() as i64).or_insert(0) += 1;
    }
    counts
}
