/// A trait for matrix-like types that can receive a Jacobian.
///
/// This trait provides a common interface for different matrix implementations,
/// allowing expression systems to write dense Jacobians into the caller's
/// preferred matrix type.
///
/// # Examples
///
/// ```rust
/// use battsym::prelude::Matrix;
/// use ndarray::Array2;
///
/// let mut mat: Array2<f64> = Matrix::zeros(2, 3);
/// mat.set(1, 2, 4.0);
/// assert_eq!(mat.dims(), (2, 3));
/// assert_eq!(mat[[1, 2]], 4.0);
/// ```
pub trait Matrix {
    /// Creates a new matrix of the specified dimensions filled with zeros.
    ///
    /// # Arguments
    /// * `rows` - Number of rows in the matrix
    /// * `cols` - Number of columns in the matrix
    fn zeros(rows: usize, cols: usize) -> Self;

    /// Returns the dimensions of the matrix as (rows, columns).
    fn dims(&self) -> (usize, usize);

    /// Writes `value` at (`row`, `col`).
    fn set(&mut self, row: usize, col: usize, value: f64);
}

impl Matrix for ndarray::Array2<f64> {
    fn zeros(rows: usize, cols: usize) -> Self {
        ndarray::Array2::zeros((rows, cols))
    }

    fn dims(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    fn set(&mut self, row: usize, col: usize, value: f64) {
        self[[row, col]] = value;
    }
}

/// Row-major nested vectors, one inner vector per row.
impl Matrix for Vec<Vec<f64>> {
    fn zeros(rows: usize, cols: usize) -> Self {
        vec![vec![0.0; cols]; rows]
    }

    fn dims(&self) -> (usize, usize) {
        (self.len(), self.first().map_or(0, |row| row.len()))
    }

    fn set(&mut self, row: usize, col: usize, value: f64) {
        self[row][col] = value;
    }
}

/// Implementation of Matrix trait for nalgebra's DMatrix<f64>.
#[cfg(feature = "nalgebra")]
impl Matrix for nalgebra::DMatrix<f64> {
    fn zeros(rows: usize, cols: usize) -> Self {
        nalgebra::DMatrix::zeros(rows, cols)
    }

    fn dims(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    fn set(&mut self, row: usize, col: usize, value: f64) {
        self[(row, col)] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_ndarray_matrix_operations() {
        let mut mat = <Array2<f64> as Matrix>::zeros(2, 3);
        assert_eq!(mat.dims(), (2, 3));
        assert!(mat.iter().all(|&x| x == 0.0));

        mat.set(0, 0, 1.0);
        mat.set(1, 2, 4.0);
        assert_eq!(mat, ndarray::array![[1.0, 0.0, 0.0], [0.0, 0.0, 4.0]]);
    }

    #[test]
    fn test_nested_vec_matrix_operations() {
        let mut mat = <Vec<Vec<f64>> as Matrix>::zeros(2, 2);
        assert_eq!(mat.dims(), (2, 2));
        mat.set(1, 0, 3.0);
        assert_eq!(mat, vec![vec![0.0, 0.0], vec![3.0, 0.0]]);
    }

    #[cfg(feature = "nalgebra")]
    #[test]
    fn test_nalgebra_matrix_operations() {
        let mut mat = <nalgebra::DMatrix<f64> as Matrix>::zeros(2, 3);
        assert_eq!(mat.dims(), (2, 3));
        mat.set(1, 2, 4.0);
        assert_eq!(mat[(1, 2)], 4.0);
    }
}
