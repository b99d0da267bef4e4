use ndarray::Array1;

/// A trait for vector-like types that can be used as state vectors.
///
/// This trait provides a common interface for different vector implementations,
/// allowing them to be used interchangeably when evaluating expressions and
/// expression systems.
///
/// # Examples
///
/// ```rust
/// use battsym::prelude::Vector;
///
/// let state = vec![1.0, 2.0, 3.0];
/// assert_eq!(Vector::len(&state), 3);
/// assert_eq!(state.to_array()[2], 3.0);
/// ```
pub trait Vector {
    /// Copies the values into an owned ndarray vector.
    fn to_array(&self) -> Array1<f64>;

    /// Returns the length of the vector.
    fn len(&self) -> usize;

    /// Checks if the vector is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Vector for [f64] {
    fn to_array(&self) -> Array1<f64> {
        Array1::from(self.to_vec())
    }

    fn len(&self) -> usize {
        <[f64]>::len(self)
    }
}

impl Vector for Vec<f64> {
    fn to_array(&self) -> Array1<f64> {
        Array1::from(self.clone())
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

/// Implementation of Vector trait for fixed-size arrays.
///
/// # Type Parameters
/// * `N` - The fixed size of the array
impl<const N: usize> Vector for [f64; N] {
    fn to_array(&self) -> Array1<f64> {
        Array1::from(self.to_vec())
    }

    fn len(&self) -> usize {
        N
    }
}

impl Vector for Array1<f64> {
    fn to_array(&self) -> Array1<f64> {
        self.clone()
    }

    fn len(&self) -> usize {
        Array1::len(self)
    }
}

/// Implementation of Vector trait for nalgebra's DVector<f64>.
///
/// # Examples
///
/// ```rust
/// use battsym::prelude::Vector;
/// use nalgebra::DVector;
///
/// let state = DVector::from_vec(vec![1.0, 2.0]);
/// assert_eq!(state.to_array().to_vec(), vec![1.0, 2.0]);
/// ```
#[cfg(feature = "nalgebra")]
impl Vector for nalgebra::DVector<f64> {
    fn to_array(&self) -> Array1<f64> {
        Array1::from(self.as_slice().to_vec())
    }

    fn len(&self) -> usize {
        self.nrows()
    }
}
