//! Scalar statistics used by the noise estimators: median, MAD, moments and
//! the complementary error function.


/// Gaussian MAD-to-sigma divisor: σ ≈ MAD / 0.6745.
pub const MAD_SIGMA_DIVISOR: f64 = 0.6745;

/// Median of `data`, reordering it in place (quickselect).
///
/// Returns NaN for an empty slice.
pub fn median_mut(data: &mut [f64]) -> f64 {
    let len = data.len();
    if len == 0 {
        return f64::NAN;
    }
    let mid = len / 2;
    let (left, upper, _) = data.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = *upper;
    if len % 2 == 1 {
        upper
    } else {
        let lower = left.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (lower + upper) * 0.5
    }
}

/// Median absolute deviation about the median, using `scratch` for the
/// deviations. Does not rescale to sigma.
pub fn mad_with_scratch(values: &[f64], scratch: &mut Vec<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    scratch.clear();
    scratch.extend_from_slice(values);
    let median = median_mut(scratch);
    for v in scratch.iter_mut() {
        *v = (*v - median).abs();
    }
    median_mut(scratch)
}

/// MAD rescaled to a Gaussian-equivalent standard deviation.
pub fn mad_sigma(values: &[f64]) -> f64 {
    let mut scratch = Vec::with_capacity(values.len());
    mad_with_scratch(values, &mut scratch) / MAD_SIGMA_DIVISOR
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by N).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mean = mean(values);
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Complementary error function.
///
/// Chebyshev fit with fractional error below 1.2e-7 everywhere, which is far
/// tighter than the rejection thresholds it feeds. NaN propagates.
pub fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let ans = t * poly.exp();
    if x >= 0.0 { ans } else { 2.0 - ans }
}
