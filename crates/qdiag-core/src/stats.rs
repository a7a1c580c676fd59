//! Shared descriptive statistics.
//!
//! Every reducer returns `None` on empty input so callers decide how an
//! absent statistic is reported. Variances are population variances.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn mean_abs(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().map(|v| v.abs()).sum::<f64>() / values.len() as f64)
}

pub fn variance(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    Some(values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64)
}

pub fn std_dev(values: &[f64]) -> Option<f64> {
    variance(values).map(f64::sqrt)
}

pub fn rms(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some((values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt())
}

pub fn max_abs(values: &[f64]) -> Option<f64> {
    values.iter().map(|v| v.abs()).reduce(f64::max)
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Consecutive differences `v[i+1] - v[i]`.
pub fn diff(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Sum of squared consecutive differences; 0 for fewer than two samples.
pub fn smoothness(values: &[f64]) -> f64 {
    values.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum()
}

/// Pearson correlation. `None` when lengths differ, input is empty, or
/// either side has zero variance.
pub fn corrcoef(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let (ma, mb) = (mean(a)?, mean(b)?);
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (x, y) in a.iter().zip(b) {
        cov += (x - ma) * (y - mb);
        va += (x - ma).powi(2);
        vb += (y - mb).powi(2);
    }
    if va == 0.0 || vb == 0.0 {
        return None;
    }
    Some(cov / (va.sqrt() * vb.sqrt()))
}

/// `num / den`, or 0 when `den` is zero.
pub fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// `count / total` as a fraction, or 0 when `total` is zero.
pub fn rate(count: usize, total: usize) -> f64 {
    ratio(count as f64, total as f64)
}

/// Most frequent integer value and its count. Values are truncated toward
/// zero; ties resolve to the smallest value.
pub fn mode(values: impl IntoIterator<Item = f64>) -> Option<(i64, usize)> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for v in values {
        if v.is_finite() {
            *counts.entry(v as i64).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .fold(None, |best: Option<(i64, usize)>, (value, count)| match best {
            Some((_, c)) if c >= count => best,
            _ => Some((value, count)),
        })
}

/// The `k` most frequent integer values with their counts, most frequent
/// first.
pub fn top_counts(values: impl IntoIterator<Item = f64>, k: usize) -> Vec<(i64, usize)> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for v in values {
        if v.is_finite() {
            *counts.entry(v as i64).or_default() += 1;
        }
    }
    let mut ranked: Vec<(i64, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(k);
    ranked
}

/// Values at the given indices; out-of-range indices are skipped.
pub fn select(values: &[f64], indices: &[usize]) -> Vec<f64> {
    indices.iter().filter_map(|&i| values.get(i).copied()).collect()
}

/// Value at `i`, NaN when out of range (so comparisons fail).
pub fn at(values: &[f64], i: usize) -> f64 {
    values.get(i).copied().unwrap_or(f64::NAN)
}

/// First and last value of the moving average of `|v|` with `window`.
pub fn moving_average_ends(values: &[f64], window: usize) -> Option<(f64, f64)> {
    if window == 0 || values.len() < window {
        return None;
    }
    let w = window as f64;
    let first = values[..window].iter().map(|v| v.abs()).sum::<f64>() / w;
    let last = values[values.len() - window..]
        .iter()
        .map(|v| v.abs())
        .sum::<f64>()
        / w;
    Some((first, last))
}

/// Mean of `|v|` over the first and second half (split at `len / 2`).
pub fn half_abs_means(values: &[f64]) -> Option<(f64, f64)> {
    let mid = values.len() / 2;
    if mid == 0 {
        return None;
    }
    Some((mean_abs(&values[..mid])?, mean_abs(&values[mid..])?))
}

/// A contiguous run of samples between two time resets (inclusive bounds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub start: usize,
    pub end: usize,
}

impl Episode {
    pub fn sample_count(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Split a time signal into episodes at every backwards jump larger than
/// `threshold`.
pub fn detect_episodes(time: &[f64], threshold: f64) -> Vec<Episode> {
    if time.is_empty() {
        return Vec::new();
    }
    let mut episodes = Vec::new();
    let mut start = 0;
    for i in 1..time.len() {
        if time[i] < time[i - 1] - threshold {
            episodes.push(Episode { start, end: i - 1 });
            start = i;
        }
    }
    episodes.push(Episode {
        start,
        end: time.len() - 1,
    });
    episodes
}

/// First and last index holding a nonzero value.
pub fn nonzero_range(values: &[f64]) -> Option<(usize, usize)> {
    let first = values.iter().position(|&v| v != 0.0)?;
    let last = values.iter().rposition(|&v| v != 0.0)?;
    Some((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn reducers_are_none_on_empty() {
        assert!(mean(&[]).is_none());
        assert!(variance(&[]).is_none());
        assert!(rms(&[]).is_none());
        assert!(max_abs(&[]).is_none());
        assert!(mode(Vec::<f64>::new()).is_none());
    }

    #[test]
    fn basic_moments() {
        let v = [1.0, -2.0, 3.0, -4.0];
        assert!(close(mean(&v).unwrap(), -0.5));
        assert!(close(mean_abs(&v).unwrap(), 2.5));
        assert!(close(variance(&v).unwrap(), 7.25));
        assert!(close(rms(&v).unwrap(), 7.5_f64.sqrt()));
        assert_eq!(max_abs(&v), Some(4.0));
        assert_eq!(min(&v), Some(-4.0));
        assert_eq!(max(&v), Some(3.0));
    }

    #[test]
    fn smoothness_sums_squared_steps() {
        assert_eq!(smoothness(&[1.0, 3.0, 2.0]), 5.0);
        assert_eq!(smoothness(&[7.0]), 0.0);
        assert_eq!(diff(&[1.0, 3.0, 2.0]), vec![2.0, -1.0]);
    }

    #[test]
    fn corrcoef_handles_degenerate_inputs() {
        assert!(close(corrcoef(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap(), 1.0));
        assert!(close(corrcoef(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap(), -1.0));
        assert!(corrcoef(&[1.0, 1.0], &[1.0, 2.0]).is_none());
        assert!(corrcoef(&[1.0], &[1.0, 2.0]).is_none());
    }

    #[test]
    fn zero_denominator_is_zero() {
        assert_eq!(ratio(5.0, 0.0), 0.0);
        assert_eq!(rate(3, 0), 0.0);
        assert_eq!(rate(1, 4), 0.25);
    }

    #[test]
    fn mode_prefers_smallest_on_tie() {
        assert_eq!(mode([50.0, 50.0, 51.0, 49.0, 49.0]), Some((49, 2)));
        assert_eq!(mode([50.0, 50.0, 51.0]), Some((50, 2)));
    }

    #[test]
    fn top_counts_ranked_by_frequency() {
        let top = top_counts([3.0, 50.0, 50.0, 51.0, 50.0, 3.0, 7.0], 2);
        assert_eq!(top, vec![(50, 3), (3, 2)]);
    }

    #[test]
    fn episodes_split_on_time_reset() {
        let t = [0.1, 0.2, 0.3, 0.1, 0.2, 5.0, 0.1];
        // 0.3 -> 0.1 is a reset of only 0.2, below threshold
        assert_eq!(detect_episodes(&t, 1.0).len(), 2);
        let t = [1.0, 2.0, 3.0, 0.5, 1.5];
        assert_eq!(
            detect_episodes(&t, 1.0),
            vec![Episode { start: 0, end: 2 }, Episode { start: 3, end: 4 }]
        );
        assert!(detect_episodes(&[], 1.0).is_empty());
    }

    #[test]
    fn nonzero_range_bounds() {
        assert_eq!(nonzero_range(&[0.0, 0.0, 1.0, 0.0, 2.0, 0.0]), Some((2, 4)));
        assert_eq!(nonzero_range(&[0.0, 0.0]), None);
    }

    #[test]
    fn moving_average_and_halves() {
        let v = [1.0, -1.0, 3.0, -3.0];
        assert_eq!(moving_average_ends(&v, 2), Some((1.0, 3.0)));
        assert_eq!(moving_average_ends(&v, 5), None);
        assert_eq!(half_abs_means(&v), Some((1.0, 3.0)));
    }

    #[test]
    fn select_skips_out_of_range() {
        assert_eq!(select(&[1.0, 2.0, 3.0], &[0, 2, 9]), vec![1.0, 3.0]);
        assert!(at(&[1.0], 5).is_nan());
    }
}
