//! The data series the report charts are drawn from
//!
//! Rendering is left to whoever consumes these series.

use std::collections::{HashMap, HashSet};

use crate::ResultRow;

/// One bar of the recency histogram
#[derive(Clone, Copy, Debug, serde::Serialize, PartialEq)]
pub struct HistogramBin {
    /// Inclusive lower bound in days
    pub lower: f64,
    /// Upper bound in days, exclusive except for the last bin
    pub upper: f64,
    pub count: usize,
}

/// One point of the smoothed recency density curve
#[derive(Clone, Copy, Debug, serde::Serialize, PartialEq)]
pub struct DensityPoint {
    pub days: f64,
    pub density: f64,
}

/// The distinct salespeople, in the order they first appear
pub fn salespeople(rows: &[ResultRow]) -> Vec<&str> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|row| row.salesperson.as_str())
        .filter(|salesperson| seen.insert(*salesperson))
        .collect()
}

/// The number of rows per salesperson, most frequent first
///
/// Ties are ordered by name.
pub fn rows_per_salesperson(rows: &[ResultRow]) -> Vec<(&str, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.salesperson.as_str()).or_default() += 1;
    }

    let mut counts = counts.into_iter().collect::<Vec<_>>();
    counts.sort_by(|(a, a_count), (b, b_count)| b_count.cmp(a_count).then_with(|| a.cmp(b)));
    counts
}

/// Distributes the days since the last purchase over `bins` equal-width bins
pub fn recency_histogram(rows: &[ResultRow], bins: usize) -> Vec<HistogramBin> {
    let days = rows.iter().map(|row| row.days_since_last_purchase);
    let (min, max) = match (days.clone().min(), days.clone().max()) {
        (Some(min), Some(max)) if bins > 0 => (min as f64, max as f64),
        _ => return Vec::new(),
    };

    // a single distinct value still gets a bin of some width
    let (bins, width) = match max > min {
        true => (bins, (max - min) / bins as f64),
        false => (1, 1.0),
    };

    let mut histogram = (0..bins)
        .map(|idx| HistogramBin {
            lower: min + idx as f64 * width,
            upper: min + (idx + 1) as f64 * width,
            count: 0,
        })
        .collect::<Vec<_>>();

    for day in days {
        let idx = (((day as f64 - min) / width) as usize).min(bins - 1);
        histogram[idx].count += 1;
    }

    histogram
}

/// Gaussian kernel density estimate of the days since the last purchase
///
/// The bandwidth follows Scott's rule. The curve is sampled at `points`
/// evenly spaced positions reaching three bandwidths past the smallest and
/// largest value. Fewer than two distinct values have no density.
pub fn recency_density(rows: &[ResultRow], points: usize) -> Vec<DensityPoint> {
    let days = rows.iter()
        .map(|row| row.days_since_last_purchase as f64)
        .collect::<Vec<_>>();
    if days.len() < 2 || points < 2 {
        return Vec::new();
    }

    let n = days.len() as f64;
    let mean = days.iter().sum::<f64>() / n;
    let variance = days.iter().map(|day| (day - mean).powi(2)).sum::<f64>() / (n - 1.0);
    if variance <= 0.0 {
        return Vec::new();
    }

    let bandwidth = variance.sqrt() * n.powf(-0.2);
    let min = days.iter().copied().fold(f64::INFINITY, f64::min) - 3.0 * bandwidth;
    let max = days.iter().copied().fold(f64::NEG_INFINITY, f64::max) + 3.0 * bandwidth;
    let step = (max - min) / (points - 1) as f64;
    let norm = n * bandwidth * (2.0 * std::f64::consts::PI).sqrt();

    (0..points)
        .map(|idx| {
            let at = min + idx as f64 * step;
            let density = days.iter()
                .map(|day| (-0.5 * ((at - day) / bandwidth).powi(2)).exp())
                .sum::<f64>() / norm;
            DensityPoint { days: at, density }
        })
        .collect()
}
