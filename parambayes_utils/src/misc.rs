/// Numerically stable ln(Σ exp(xs))
///
/// Subtracts the max before exponentiating so that log-space weights far
/// below zero do not underflow to -inf.
///
/// # Example
///
/// ```rust
/// # use parambayes_utils::logsumexp;
/// let xs: Vec<f64> = vec![(0.5_f64).ln(), (0.5_f64).ln()];
/// assert!((logsumexp(&xs)).abs() < 1e-12);
/// ```
///
/// # Panics
///
/// Panics on an empty slice.
pub fn logsumexp(xs: &[f64]) -> f64 {
    match xs.len() {
        0 => panic!("empty container"),
        1 => xs[0],
        _ => {
            let maxval = xs
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, |acc, x| if x > acc { x } else { acc });
            if maxval == f64::NEG_INFINITY {
                return f64::NEG_INFINITY;
            }
            xs.iter()
                .fold(0.0_f64, |acc, x| acc + (x - maxval).exp())
                .ln()
                + maxval
        }
    }
}

/// Count the occurrences of each category in `[0, k)`
///
/// # Example
///
/// ```rust
/// # use parambayes_utils::bincount;
/// let draws: Vec<usize> = vec![0, 2, 2, 3];
/// assert_eq!(bincount(&draws, 4), vec![1, 0, 2, 1]);
/// ```
pub fn bincount(xs: &[usize], k: usize) -> Vec<u32> {
    let mut counts = vec![0_u32; k];
    xs.iter().for_each(|&ix| {
        counts[ix] += 1;
    });
    counts
}

/// The uniform probability vector [1/n, ..., 1/n]
///
/// # Panics
///
/// Panics if `n` is zero.
pub fn uniform_vec(n: usize) -> Vec<f64> {
    assert!(n > 0, "cannot build a zero-length probability vector");
    vec![(n as f64).recip(); n]
}

/// Rescale `xs` so its entries sum to 1
///
/// The entries must be non-negative and must not all be zero.
pub fn normalized(xs: &[f64]) -> Vec<f64> {
    let total: f64 = xs.iter().sum();
    assert!(total > 0.0, "cannot normalize a zero-mass vector");
    xs.iter().map(|x| x / total).collect()
}
