//! Reduction of branch probabilities and branch field values to a single
//! effective field.

use ndarray as nd;
use crate::{ Arr1, Arr2, error::LengthError };

/// Compute the effective field for every realization: the dot product of each
/// row of `probs` (shape `R × K`) with the `K` branch field values.
///
/// ```
/// use ndarray as nd;
/// use branchgrav::effective::compute_geff;
///
/// let geff = compute_geff(&nd::array![[0.5, 0.5]], &nd::array![1.0, 3.0]).unwrap();
/// assert_eq!(geff, nd::array![2.0]);
/// ```
pub fn compute_geff<S, T>(probs: &Arr2<S>, g_values: &Arr1<T>)
    -> Result<nd::Array1<f64>, LengthError>
where
    S: nd::Data<Elem = f64>,
    T: nd::Data<Elem = f64>,
{
    LengthError::check_len(probs.ncols(), g_values.len())?;
    Ok(probs.dot(g_values))
}

/// Compute the effective field for a single probability vector.
pub fn effective_field<S, T>(probs: &Arr1<S>, g_values: &Arr1<T>)
    -> Result<f64, LengthError>
where
    S: nd::Data<Elem = f64>,
    T: nd::Data<Elem = f64>,
{
    LengthError::check(probs, g_values)?;
    Ok(probs.dot(g_values))
}
