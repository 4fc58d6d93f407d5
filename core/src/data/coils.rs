use crate::{Error, Result};
use ndarray::Array3;
use num_complex::Complex32;

/// Per-coil complex sensitivity map, shaped (x, y, coil).
///
/// The map is built once and shared read-only across the encoding model
/// and any containers that reference it; wrap it in an `Arc` at the
/// sharing boundary and never mutate it afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CoilSensitivities {
    data: Array3<Complex32>,
}

impl CoilSensitivities {
    pub fn new(data: Array3<Complex32>) -> Self {
        Self { data }
    }

    /// Unit sensitivities, the trivial single-or-multi-coil map.
    pub fn uniform(nx: usize, ny: usize, ncoils: usize) -> Self {
        Self {
            data: Array3::from_elem((nx, ny, ncoils), Complex32::new(1.0, 0.0)),
        }
    }

    pub fn from_shape_vec(shape: (usize, usize, usize), values: Vec<Complex32>) -> Result<Self> {
        let data = Array3::from_shape_vec(shape, values).map_err(|e| {
            Error::Dimension(format!("coil sensitivity buffer does not match shape: {e}"))
        })?;
        Ok(Self { data })
    }

    pub fn nx(&self) -> usize {
        self.data.dim().0
    }

    pub fn ny(&self) -> usize {
        self.data.dim().1
    }

    pub fn ncoils(&self) -> usize {
        self.data.dim().2
    }

    pub fn value(&self, x: usize, y: usize, c: usize) -> Complex32 {
        self.data[(x, y, c)]
    }

    pub fn array(&self) -> &Array3<Complex32> {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_map_is_all_ones() {
        let coils = CoilSensitivities::uniform(4, 4, 2);
        assert_eq!(coils.ncoils(), 2);
        assert_eq!(coils.value(3, 1, 1), Complex32::new(1.0, 0.0));
    }

    #[test]
    fn mismatched_buffer_is_a_dimension_error() {
        let err = CoilSensitivities::from_shape_vec((2, 2, 2), vec![Complex32::default(); 7])
            .unwrap_err();
        assert!(matches!(err, crate::Error::Dimension(_)));
    }
}
