//! Rolling-window statistics over grid-aligned columns.
//!
//! Windows are trailing and must be full: a window that is not yet full, or
//! that contains a missing value, produces `None` for that row.

/// Trailing mean over `window` rows.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| Some(mean(w)))
}

/// Trailing sample standard deviation (n - 1 denominator) over `window` rows.
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, sample_std)
}

fn rolling<F>(values: &[Option<f64>], window: usize, stat: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    if window == 0 {
        return vec![None; values.len()];
    }

    let mut buf = Vec::with_capacity(window);
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            buf.clear();
            for v in &values[i + 1 - window..=i] {
                buf.push((*v)?);
            }
            stat(&buf)
        })
        .collect()
}

/// Value `lag` rows earlier, `None` for the first `lag` rows.
pub fn shift(values: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| if i >= lag { values[i - lag] } else { None })
        .collect()
}

/// `values[i] - values[i - lag]`.
pub fn difference(values: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    let lagged = shift(values, lag);
    values.iter()
        .zip(lagged)
        .map(|(now, then)| Some((*now)? - then?))
        .collect()
}

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sample standard deviation. Needs at least two values.
pub fn sample_std(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    let m = mean(data);
    let variance = data.iter()
        .map(|value| {
            let diff = m - *value;
            diff * diff
        })
        .sum::<f64>() / (data.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Average step-to-step change. Needs at least two values.
pub fn mean_first_difference(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    let diffs: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();
    Some(mean(&diffs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|v| Some(*v)).collect()
    }

    #[test]
    fn test_rolling_mean_warm_up() {
        let out = rolling_mean(&some(&[1.0, 2.0, 3.0, 4.0]), 3);
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_rolling_mean_gap_poisons_window() {
        let out = rolling_mean(&[Some(1.0), None, Some(3.0), Some(5.0), Some(7.0)], 2);
        assert_eq!(out, vec![None, None, None, Some(4.0), Some(6.0)]);
    }

    #[test]
    fn test_rolling_std_is_sample_std() {
        let out = rolling_std(&some(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 8);
        // population std is 2.0; sample std is sqrt(32 / 7)
        assert_relative_eq!(out[7].unwrap(), (32.0f64 / 7.0).sqrt(), epsilon = 1e-12);
        assert!(out[6].is_none());
    }

    #[test]
    fn test_shift_and_difference() {
        let v = some(&[1.0, 3.0, 6.0, 10.0]);
        assert_eq!(shift(&v, 2), vec![None, None, Some(1.0), Some(3.0)]);
        assert_eq!(difference(&v, 1), vec![None, Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_mean_first_difference() {
        assert_eq!(mean_first_difference(&[1.0, 2.0, 4.0]), Some(1.5));
        assert_eq!(mean_first_difference(&[1.0]), None);
        assert_eq!(sample_std(&[3.0]), None);
    }
}
