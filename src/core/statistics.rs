//! Probability densities used by the surface classifier.

use num_traits::Float;

/// Gaussian probability density of `x` for mean `mu` and standard deviation `sigma`
pub fn normal_pdf<T: Float>(x: T, mu: T, sigma: T) -> T {
    let two = T::one() + T::one();
    let pi = T::from(std::f64::consts::PI).unwrap_or_else(T::nan);
    let norm = T::one() / ((two * pi).sqrt() * sigma);
    norm * (-(x - mu).powi(2) / (two * sigma.powi(2))).exp()
}

/// Log-normal probability density of `x`, where `mu` and `sigma` describe
/// `ln(x)`. Zero for non-positive `x`.
pub fn lognormal_pdf<T: Float>(x: T, mu: T, sigma: T) -> T {
    if x <= T::zero() {
        return T::zero();
    }
    let two = T::one() + T::one();
    let pi = T::from(std::f64::consts::PI).unwrap_or_else(T::nan);
    let z = (x.ln() - mu) / sigma;
    (-(z * z) / two).exp() / (x * sigma * (two * pi).sqrt())
}

/// Points where the Gaussian densities `N(m1, std1)` and `N(m2, std2)` are
/// equal, in ascending order.
///
/// These are the real roots of `a x^2 + b x + c = 0` with
/// `a = 1/(2 std1^2) - 1/(2 std2^2)`, `b = m2/std2^2 - m1/std1^2` and
/// `c = m1^2/(2 std1^2) - m2^2/(2 std2^2) - ln(std2/std1)`.
/// Equal distributions have no isolated crossing and return an empty vector.
pub fn gaussian_intersections(m1: f64, m2: f64, std1: f64, std2: f64) -> Vec<f64> {
    let v1 = std1 * std1;
    let v2 = std2 * std2;
    let a = 1.0 / (2.0 * v1) - 1.0 / (2.0 * v2);
    let b = m2 / v2 - m1 / v1;
    let c = m1 * m1 / (2.0 * v1) - m2 * m2 / (2.0 * v2) - (std2 / std1).ln();

    let mut roots = if a == 0.0 {
        if b == 0.0 {
            Vec::new()
        } else {
            vec![-c / b]
        }
    } else {
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            Vec::new()
        } else if discriminant == 0.0 {
            vec![-b / (2.0 * a)]
        } else {
            let sq = discriminant.sqrt();
            vec![(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)]
        }
    };
    roots.retain(|r| r.is_finite());
    roots.sort_by(|x, y| x.total_cmp(y));
    roots
}
