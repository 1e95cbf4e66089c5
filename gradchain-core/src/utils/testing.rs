use crate::tensor::Tensor;

/// Checks if a tensor is approximately equal to the expected shape and data.
/// Panics if shapes differ or any element differs by more than `tolerance`.
pub fn check_tensor_near(
    actual: &Tensor,
    expected_shape: (usize, usize),
    expected_data: &[f64],
    tolerance: f64,
) {
    assert_eq!(actual.shape(), expected_shape, "Shape mismatch");
    assert_eq!(
        actual.numel(),
        expected_data.len(),
        "Data length mismatch"
    );

    for (i, (a, e)) in actual.data().iter().zip(expected_data.iter()).enumerate() {
        let diff = (a - e).abs();
        if diff > tolerance {
            panic!(
                "Data mismatch at index {}: actual={:?}, expected={:?}, diff={:?}, tolerance={:?}",
                i, a, e, diff, tolerance
            );
        }
    }
}

/// Asserts that `actual` is a column vector of length `len`.
pub fn assert_column(actual: &Tensor, len: usize) {
    assert_eq!(actual.shape(), (len, 1), "expected a ({}, 1) column, got {}", len, actual);
}
