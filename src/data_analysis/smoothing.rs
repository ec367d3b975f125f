// src/data_analysis/smoothing.rs

use ndarray::{Array1, Array2, Axis as NdAxis};

use crate::error::{AnalysisError, AnalysisResult};

/// Checks that a smoothing window is odd and within `[1, max]`.
pub fn validate_window(window: usize, max: usize, what: &str) -> AnalysisResult<()> {
    if window == 0 || window % 2 == 0 {
        return Err(AnalysisError::invalid_config(format!(
            "{} smoothing window must be odd and >= 1, got {}",
            what, window
        )));
    }
    if window > max {
        return Err(AnalysisError::invalid_config(format!(
            "{} smoothing window {} exceeds the {} available points",
            what, window, max
        )));
    }
    Ok(())
}

/// Centered moving average. Near the edges the window shrinks to the samples
/// that exist, so the output keeps the input's length and no phase shift.
/// A window of 1 returns the input unchanged.
pub fn moving_average_centered(data: &Array1<f64>, window_size: usize) -> Array1<f64> {
    let n = data.len();
    if window_size <= 1 || n == 0 {
        return data.to_owned();
    }
    let half = window_size / 2;

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    let mut running = 0.0;
    for &v in data.iter() {
        running += v;
        prefix.push(running);
    }

    Array1::from_shape_fn(n, |i| {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(n);
        (prefix[hi] - prefix[lo]) / (hi - lo) as f64
    })
}

/// Separable 2-D smoothing: a centered moving average along rows (time)
/// then along columns (frequency), with independent window sizes.
pub fn smooth_2d(matrix: &Array2<f64>, time_window: usize, freq_window: usize) -> Array2<f64> {
    let mut out = matrix.to_owned();
    if time_window > 1 {
        for mut column in out.axis_iter_mut(NdAxis(1)) {
            let smoothed = moving_average_centered(&column.to_owned(), time_window);
            column.assign(&smoothed);
        }
    }
    if freq_window > 1 {
        for mut row in out.axis_iter_mut(NdAxis(0)) {
            let smoothed = moving_average_centered(&row.to_owned(), freq_window);
            row.assign(&smoothed);
        }
    }
    out
}

/// Normalised Gaussian kernel reaching `truncate` standard deviations each side.
pub fn gaussian_kernel(sigma: f64, truncate: f64) -> Array1<f64> {
    if !(sigma > 0.0) {
        return Array1::ones(1);
    }
    let radius = (truncate * sigma + 0.5) as usize;
    let mut kernel = Array1::from_shape_fn(2 * radius + 1, |k| {
        let x = k as f64 - radius as f64;
        (-0.5 * x * x / (sigma * sigma)).exp()
    });
    let total = kernel.sum();
    kernel.mapv_inplace(|w| w / total);
    kernel
}

/// Gaussian smoothing of every row (along the column index). Samples beyond
/// the edges count as zero.
pub fn gaussian_smooth_rows(matrix: &Array2<f64>, sigma: f64) -> Array2<f64> {
    if !(sigma > 0.0) {
        return matrix.to_owned();
    }
    let kernel = gaussian_kernel(sigma, 4.0);
    let radius = kernel.len() / 2;
    let cols = matrix.ncols();
    let mut out = Array2::<f64>::zeros(matrix.raw_dim());
    for (row_in, mut row_out) in matrix.axis_iter(NdAxis(0)).zip(out.axis_iter_mut(NdAxis(0))) {
        for i in 0..cols {
            let mut acc = 0.0;
            for (k, &w) in kernel.iter().enumerate() {
                let j = i as isize + k as isize - radius as isize;
                if j >= 0 && (j as usize) < cols {
                    acc += w * row_in[j as usize];
                }
            }
            row_out[i] = acc;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_window_of_one_is_noop() {
        let data = array![1.0, 5.0, 2.0];
        assert_eq!(moving_average_centered(&data, 1), data);
    }

    #[test]
    fn test_centered_average_shrinks_at_edges() {
        let data = array![0.0, 3.0, 6.0, 9.0];
        let smoothed = moving_average_centered(&data, 3);
        assert_eq!(smoothed.to_vec(), vec![1.5, 3.0, 6.0, 7.5]);
    }

    #[test]
    fn test_validate_window() {
        assert!(validate_window(1, 10, "PSD").is_ok());
        assert!(validate_window(9, 10, "PSD").is_ok());
        assert!(validate_window(4, 10, "PSD").is_err());
        assert!(validate_window(0, 10, "PSD").is_err());
        assert!(validate_window(11, 10, "PSD").is_err());
    }

    #[test]
    fn test_gaussian_kernel_sums_to_one() {
        let k = gaussian_kernel(3.0, 4.0);
        assert_eq!(k.len(), 25);
        assert!((k.sum() - 1.0).abs() < 1e-12);
        assert!(k[12] > k[11] && (k[11] - k[13]).abs() < 1e-15);
    }

    #[test]
    fn test_gaussian_rows_spread_impulse_and_lose_mass_at_edges() {
        let mut m = Array2::<f64>::zeros((2, 41));
        m[[0, 20]] = 1.0;
        m[[1, 0]] = 1.0;
        let out = gaussian_smooth_rows(&m, 3.0);
        assert!((out.row(0).sum() - 1.0).abs() < 1e-12);
        assert!((out[[0, 19]] - out[[0, 21]]).abs() < 1e-15);
        // Half of the edge impulse falls outside the row.
        assert!(out.row(1).sum() < 0.6);
        assert_eq!(gaussian_smooth_rows(&m, 0.0), m);
    }

    #[test]
    fn test_smooth_2d_is_separable() {
        let m = array![[0.0, 0.0, 0.0], [3.0, 3.0, 3.0], [0.0, 0.0, 0.0]];
        let only_time = smooth_2d(&m, 3, 1);
        assert_eq!(only_time.column(0).to_vec(), vec![1.5, 1.0, 1.5]);
        let only_freq = smooth_2d(&m, 1, 3);
        assert_eq!(only_freq, m);
    }
}
