/// A natural cubic spline through `(t, y)` knots.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    t: Vec<f64>,
    y: Vec<f64>,

    /// Second derivative at each knot, zero at both ends.
    m: Vec<f64>,
}

impl CubicSpline {
    /// Returns `None` unless there are at least two knots, `t` and `y`
    /// have the same length, and `t` is strictly increasing.
    pub fn natural(t: &[f64], y: &[f64]) -> Option<Self> {
        let n = t.len();
        if n < 2 || y.len() != n || t.windows(2).any(|w| w[1] <= w[0]) {
            return None;
        }

        // Tridiagonal system for the interior second derivatives,
        // solved with the Thomas algorithm.
        let h: Vec<f64> = t.windows(2).map(|w| w[1] - w[0]).collect();
        let mut m = vec![0.0; n];
        if n > 2 {
            let inner = n - 2;
            let mut diag = Vec::with_capacity(inner);
            let mut rhs = Vec::with_capacity(inner);
            for i in 1..n - 1 {
                diag.push(2.0 * (h[i - 1] + h[i]));
                rhs.push(6.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]));
            }
            for k in 1..inner {
                let w = h[k] / diag[k - 1];
                diag[k] -= w * h[k];
                rhs[k] -= w * rhs[k - 1];
            }
            m[inner] = rhs[inner - 1] / diag[inner - 1];
            for k in (0..inner - 1).rev() {
                m[k + 1] = (rhs[k] - h[k + 1] * m[k + 2]) / diag[k];
            }
        }

        Some(Self {
            t: t.to_vec(),
            y: y.to_vec(),
            m,
        })
    }

    /// Value of the spline at `x`. Outside the knots the end segments
    /// are extended.
    pub fn eval(&self, x: f64) -> f64 {
        let last = self.t.len() - 2;
        let i = self.t.partition_point(|&ti| ti <= x).saturating_sub(1).min(last);
        let h = self.t[i + 1] - self.t[i];
        let a = (self.t[i + 1] - x) / h;
        let b = (x - self.t[i]) / h;
        a * self.y[i]
            + b * self.y[i + 1]
            + ((a * a * a - a) * self.m[i] + (b * b * b - b) * self.m[i + 1]) * h * h / 6.0
    }
}

#[cfg(test)]
mod tests {
    use super::CubicSpline;
    use approx::assert_relative_eq;

    #[test]
    fn test_passes_through_knots() {
        let t = [0.0, 1.0, 2.5, 4.0, 4.5];
        let y = [3.0, -1.0, 2.0, 2.0, 7.0];
        let spline = CubicSpline::natural(&t, &y).unwrap();
        for (ti, yi) in t.iter().zip(y) {
            assert_relative_eq!(spline.eval(*ti), yi, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_linear_data_stays_linear() {
        let t = [0.0, 1.0, 3.0, 6.0];
        let y = t.map(|v| 2.0 * v + 1.0);
        let spline = CubicSpline::natural(&t, &y).unwrap();
        assert_relative_eq!(spline.eval(2.0), 5.0, epsilon = 1e-12);
        assert_relative_eq!(spline.eval(5.25), 11.5, epsilon = 1e-12);
    }

    #[test]
    fn test_natural_three_knots() {
        // With M0 = M2 = 0 the middle second derivative is
        // 6 * (-1 - 1) / 4 = -3.
        let spline = CubicSpline::natural(&[0.0, 1.0, 2.0], &[0.0, 1.0, 0.0]).unwrap();
        assert_relative_eq!(spline.m[1], -3.0);
        assert_relative_eq!(spline.eval(0.5), 0.6875);
    }

    #[test]
    fn test_rejects_bad_knots() {
        assert!(CubicSpline::natural(&[0.0], &[1.0]).is_none());
        assert!(CubicSpline::natural(&[0.0, 0.0], &[1.0, 2.0]).is_none());
        assert!(CubicSpline::natural(&[0.0, 1.0], &[1.0]).is_none());
    }
}
