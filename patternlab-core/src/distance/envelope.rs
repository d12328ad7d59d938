//! LB_Keogh envelopes and lower bound.

use std::collections::VecDeque;

use super::dtw::band_radius;
use crate::domain::Envelope;

/// Running max/min over a symmetric window of half-width
/// `floor(len * window_fraction)`, clipped to the series bounds.
///
/// Uses monotone deques, so cost is linear in the series length regardless
/// of the window width.
pub fn compute_envelopes(series: &[f64], window_fraction: f64) -> Envelope {
    let n = series.len();
    let r = band_radius(window_fraction, n);
    let mut upper = Vec::with_capacity(n);
    let mut lower = Vec::with_capacity(n);
    let mut max_q: VecDeque<usize> = VecDeque::new();
    let mut min_q: VecDeque<usize> = VecDeque::new();
    let mut next = 0;

    for i in 0..n {
        let end = (i + r).min(n - 1);
        while next <= end {
            while max_q.back().is_some_and(|&b| series[b] <= series[next]) {
                max_q.pop_back();
            }
            max_q.push_back(next);
            while min_q.back().is_some_and(|&b| series[b] >= series[next]) {
                min_q.pop_back();
            }
            min_q.push_back(next);
            next += 1;
        }
        let start = i.saturating_sub(r);
        while max_q.front().is_some_and(|&f| f < start) {
            max_q.pop_front();
        }
        while min_q.front().is_some_and(|&f| f < start) {
            min_q.pop_front();
        }
        // Both deques hold at least index `end >= i` at this point.
        upper.push(max_q.front().map_or(series[i], |&f| series[f]));
        lower.push(min_q.front().map_or(series[i], |&f| series[f]));
    }

    Envelope { upper, lower }
}

/// LB_Keogh: square root of the summed squared excess of `query` outside
/// `[lower, upper]`, over the common prefix of the arrays.
pub fn lb_keogh(query: &[f64], upper: &[f64], lower: &[f64]) -> f64 {
    let len = query.len().min(upper.len()).min(lower.len());
    let sum: f64 = query[..len]
        .iter()
        .zip(&upper[..len])
        .zip(&lower[..len])
        .map(|((&q, &u), &l)| {
            if q > u {
                (q - u) * (q - u)
            } else if q < l {
                (l - q) * (l - q)
            } else {
                0.0
            }
        })
        .sum();
    sum.sqrt()
}
