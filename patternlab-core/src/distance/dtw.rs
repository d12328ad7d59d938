//! Dynamic-programming core for banded, optionally penalized DTW.
//!
//! Point cost is the squared difference. The accumulated cost is returned
//! raw; normalization happens in [`super::DistanceEngine`].

/// Half-width in frames for a band expressed as a fraction of `len`.
///
/// Shared by the DTW band and the LB_Keogh envelope so both agree exactly.
#[inline]
pub fn band_radius(fraction: f64, len: usize) -> usize {
    if !fraction.is_finite() || fraction <= 0.0 {
        return 0;
    }
    (len as f64 * fraction).floor() as usize
}

/// Column range `[lo, hi]` allowed in row `i` of an `n x m` cost matrix.
///
/// With `n <= m` row `i` may visit columns `i - r ..= i + (m - n) + r`; the
/// `n > m` case is the transpose. Every row range is non-empty and shifts by
/// at most one column per row, so a warping path always exists and swapping
/// the inputs yields the transposed band.
#[inline]
fn row_bounds(i: usize, n: usize, m: usize, radius: Option<usize>) -> (usize, usize) {
    match radius {
        None => (0, m - 1),
        Some(r) => {
            let (below, above) = if n <= m {
                (r, m - n + r)
            } else {
                (n - m + r, r)
            };
            (i.saturating_sub(below), (i + above).min(m - 1))
        }
    }
}

/// Raw accumulated DTW cost between `x` and `y`.
///
/// - `radius`: Sakoe–Chiba style band half-width, `None` for unconstrained.
/// - `warp_penalty`: added to every horizontal/vertical step (ADTW); `0.0`
///   for plain DTW.
/// - `abandon_above`: if every cell of a completed row exceeds this value the
///   final cost must too, and `f64::INFINITY` is returned early.
///
/// Returns `f64::INFINITY` when either input is empty.
pub fn accumulated_cost(
    x: &[f64],
    y: &[f64],
    radius: Option<usize>,
    warp_penalty: f64,
    abandon_above: Option<f64>,
) -> f64 {
    let n = x.len();
    let m = y.len();
    if n == 0 || m == 0 {
        return f64::INFINITY;
    }

    // prev[j + 1] holds D[i - 1][j]; index 0 is the virtual border column.
    let mut prev = vec![f64::INFINITY; m + 1];
    let mut curr = vec![f64::INFINITY; m + 1];
    prev[0] = 0.0;

    for i in 0..n {
        let (lo, hi) = row_bounds(i, n, m, radius);
        curr.fill(f64::INFINITY);
        let mut row_min = f64::INFINITY;
        for j in lo..=hi {
            let d = x[i] - y[j];
            let diag = prev[j];
            let up = prev[j + 1] + warp_penalty;
            let left = curr[j] + warp_penalty;
            let cell = d * d + diag.min(up).min(left);
            curr[j + 1] = cell;
            row_min = row_min.min(cell);
        }
        if let Some(limit) = abandon_above {
            if row_min > limit {
                return f64::INFINITY;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
        // The border only seeds the first row.
        prev[0] = f64::INFINITY;
    }

    prev[m]
}

/// Keogh–Pazzani derivative estimate used by derivative DTW:
/// `((x[i] - x[i-1]) + (x[i+1] - x[i-1]) / 2) / 2` for interior points.
///
/// Series shorter than three points have no interior and are returned as-is.
pub fn slope_estimate(x: &[f64]) -> Vec<f64> {
    if x.len() < 3 {
        return x.to_vec();
    }
    x.windows(3)
        .map(|w| ((w[1] - w[0]) + (w[2] - w[0]) / 2.0) / 2.0)
        .collect()
}
