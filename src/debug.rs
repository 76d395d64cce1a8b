use num::Float;

/// Logs the offending tensors when `$a` contains a NaN.
///
/// `$b` and `$c` are the operands that produced `$a`.
#[macro_export]
macro_rules! check_nan {
    ($a:expr, $b:expr, $c: expr) => {{
        use burn::tensor::cast::ToElement;
        let nan_count = $a.clone().is_nan().int().sum().into_scalar().to_i64();
        if nan_count > 0 {
            let (a, b, c) = (format!("{}", $a), format!("{}", $b), format!("{}", $c));
            tracing::warn!(nan_count, %a, %b, %c, "found nan in line {}", line!());
        }
    }};
}

// Helper function for comparing floats
pub fn assert_approx_eq<F>(a: &F, b: &F, epsilon: F)
where
    F: Float + std::fmt::Display + std::fmt::Debug,
{
    assert!(
        (*a - *b).abs() <= epsilon,
        "Values differ: {:?} vs {:?} (tolerance: {:?})",
        *a,
        *b,
        epsilon
    );
}
