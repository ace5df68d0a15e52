use num_traits::{Float, FromPrimitive};

/// Returns `n` evenly spaced values from `start` to `end`, both
/// included.
///
/// Yields just `start` when `n == 1` and nothing when `n == 0`.
pub fn linspace<T>(start: T, end: T, n: usize) -> impl Iterator<Item = T>
where
    T: Float + FromPrimitive,
{
    let step = match n {
        0 | 1 => T::zero(),
        _ => (end - start) / T::from_usize(n - 1).unwrap_or_else(T::one),
    };
    (0..n).map(move |i| {
        if i + 1 == n && n > 1 {
            end
        } else {
            start + T::from_usize(i).unwrap_or_else(T::zero) * step
        }
    })
}

#[cfg(test)]
mod tests {
    use super::linspace;
    use approx::assert_relative_eq;

    #[test]
    fn test_linspace() {
        let v: Vec<f64> = linspace(1.0, 2.0, 5).collect();
        assert_eq!(v.len(), 5);
        assert_relative_eq!(v[1], 1.25);
        assert_eq!(v[4], 2.0);
        assert_eq!(linspace(3.0_f32, 9.0, 1).collect::<Vec<_>>(), vec![3.0]);
        assert_eq!(linspace(3.0_f32, 9.0, 0).count(), 0);
    }
}
