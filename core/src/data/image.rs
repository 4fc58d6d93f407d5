use crate::{Error, Result};
use num_complex::{Complex32, Complex64};

/// Wire identifiers for the supported image sample types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DataType {
    UnsignedShort = 1,
    Int = 4,
    Float = 5,
    Double = 6,
    ComplexFloat = 7,
    ComplexDouble = 8,
}

impl DataType {
    pub fn tag(self) -> u16 {
        self as u16
    }

    pub fn from_tag(tag: u16) -> Result<Self> {
        match tag {
            1 => Ok(Self::UnsignedShort),
            4 => Ok(Self::Int),
            5 => Ok(Self::Float),
            6 => Ok(Self::Double),
            7 => Ok(Self::ComplexFloat),
            8 => Ok(Self::ComplexDouble),
            other => Err(Error::Protocol(format!("unknown image data type tag {other}"))),
        }
    }
}

/// One of the supported image sample element types.
///
/// Conversion to and from `Complex32` follows the encoding model's
/// convention: non-complex types keep the real part only.
pub trait Sample: Copy + Default + std::ops::AddAssign + Send + 'static {
    const DATA_TYPE: DataType;
    /// Encoded size of one sample on the wire, in bytes.
    const WIRE_SIZE: usize;

    fn from_complex(z: Complex32) -> Self;
    fn to_complex(self) -> Complex32;
    fn write_le(self, out: &mut Vec<u8>);
    fn read_le(bytes: &[u8]) -> Self;
}

impl Sample for u16 {
    const DATA_TYPE: DataType = DataType::UnsignedShort;
    const WIRE_SIZE: usize = 2;

    fn from_complex(z: Complex32) -> Self {
        z.re as u16
    }

    fn to_complex(self) -> Complex32 {
        Complex32::new(self as f32, 0.0)
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }
}

impl Sample for i32 {
    const DATA_TYPE: DataType = DataType::Int;
    const WIRE_SIZE: usize = 4;

    fn from_complex(z: Complex32) -> Self {
        z.re as i32
    }

    fn to_complex(self) -> Complex32 {
        Complex32::new(self as f32, 0.0)
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl Sample for f32 {
    const DATA_TYPE: DataType = DataType::Float;
    const WIRE_SIZE: usize = 4;

    fn from_complex(z: Complex32) -> Self {
        z.re
    }

    fn to_complex(self) -> Complex32 {
        Complex32::new(self, 0.0)
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl Sample for f64 {
    const DATA_TYPE: DataType = DataType::Double;
    const WIRE_SIZE: usize = 8;

    fn from_complex(z: Complex32) -> Self {
        z.re as f64
    }

    fn to_complex(self) -> Complex32 {
        Complex32::new(self as f32, 0.0)
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        f64::from_le_bytes(bytes[..8].try_into().unwrap())
    }
}

impl Sample for Complex32 {
    const DATA_TYPE: DataType = DataType::ComplexFloat;
    const WIRE_SIZE: usize = 8;

    fn from_complex(z: Complex32) -> Self {
        z
    }

    fn to_complex(self) -> Complex32 {
        self
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.re.to_le_bytes());
        out.extend_from_slice(&self.im.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        Complex32::new(f32::read_le(&bytes[..4]), f32::read_le(&bytes[4..8]))
    }
}

impl Sample for Complex64 {
    const DATA_TYPE: DataType = DataType::ComplexDouble;
    const WIRE_SIZE: usize = 16;

    fn from_complex(z: Complex32) -> Self {
        Complex64::new(z.re as f64, z.im as f64)
    }

    fn to_complex(self) -> Complex32 {
        Complex32::new(self.re as f32, self.im as f32)
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.re.to_le_bytes());
        out.extend_from_slice(&self.im.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        Complex64::new(f64::read_le(&bytes[..8]), f64::read_le(&bytes[8..16]))
    }
}

/// A statically-typed 2-D image buffer in row-major layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Image<T> {
    cols: usize,
    rows: usize,
    data: Vec<T>,
}

impl<T: Sample> Image<T> {
    pub fn zeroed(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            data: vec![T::default(); cols * rows],
        }
    }

    pub fn from_vec(cols: usize, rows: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != cols * rows {
            return Err(Error::Dimension(format!(
                "image buffer holds {} samples, expected {}x{}",
                data.len(),
                cols,
                rows
            )));
        }
        Ok(Self { cols, rows, data })
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn at(&self, x: usize, y: usize) -> T {
        self.data[y * self.cols + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self.data[y * self.cols + x] = value;
    }

    pub fn add_at(&mut self, x: usize, y: usize, value: T) {
        self.data[y * self.cols + x] += value;
    }

    pub fn zero_fill(&mut self) {
        self.data.fill(T::default());
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

/// Type-erased image handle: a closed tagged variant over the supported
/// sample types. The tag and the buffer element type are one and the
/// same, so they can never disagree.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageWrap {
    UnsignedShort(Image<u16>),
    Int(Image<i32>),
    Float(Image<f32>),
    Double(Image<f64>),
    ComplexFloat(Image<Complex32>),
    ComplexDouble(Image<Complex64>),
}

/// Dispatches on an `ImageWrap`, binding the typed image in each arm.
macro_rules! with_image {
    ($wrap:expr, $im:ident => $body:expr) => {
        match $wrap {
            $crate::data::image::ImageWrap::UnsignedShort($im) => $body,
            $crate::data::image::ImageWrap::Int($im) => $body,
            $crate::data::image::ImageWrap::Float($im) => $body,
            $crate::data::image::ImageWrap::Double($im) => $body,
            $crate::data::image::ImageWrap::ComplexFloat($im) => $body,
            $crate::data::image::ImageWrap::ComplexDouble($im) => $body,
        }
    };
}
pub(crate) use with_image;

impl ImageWrap {
    /// A zero-filled image of the given sample type.
    pub fn zeroed(data_type: DataType, cols: usize, rows: usize) -> Self {
        match data_type {
            DataType::UnsignedShort => Self::UnsignedShort(Image::zeroed(cols, rows)),
            DataType::Int => Self::Int(Image::zeroed(cols, rows)),
            DataType::Float => Self::Float(Image::zeroed(cols, rows)),
            DataType::Double => Self::Double(Image::zeroed(cols, rows)),
            DataType::ComplexFloat => Self::ComplexFloat(Image::zeroed(cols, rows)),
            DataType::ComplexDouble => Self::ComplexDouble(Image::zeroed(cols, rows)),
        }
    }

    pub fn data_type(&self) -> DataType {
        with_image!(self, im => Self::data_type_of(im))
    }

    fn data_type_of<T: Sample>(_im: &Image<T>) -> DataType {
        T::DATA_TYPE
    }

    pub fn cols(&self) -> usize {
        with_image!(self, im => im.cols())
    }

    pub fn rows(&self) -> usize {
        with_image!(self, im => im.rows())
    }

    /// l2 norm over the sample buffer, via complex magnitude.
    pub fn norm(&self) -> f32 {
        with_image!(self, im => im
            .data()
            .iter()
            .map(|&v| v.to_complex().norm_sqr())
            .sum::<f32>()
            .sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_always_matches_buffer_type() {
        let wrap = ImageWrap::zeroed(DataType::ComplexFloat, 4, 4);
        assert_eq!(wrap.data_type(), DataType::ComplexFloat);
        assert!(matches!(wrap, ImageWrap::ComplexFloat(_)));
    }

    #[test]
    fn unknown_tag_is_a_protocol_error() {
        assert!(matches!(
            DataType::from_tag(42),
            Err(crate::Error::Protocol(_))
        ));
    }

    #[test]
    fn norm_of_unit_image() {
        let im = Image::from_vec(2, 2, vec![1.0f32; 4]).unwrap();
        let wrap = ImageWrap::Float(im);
        assert!((wrap.norm() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn non_complex_conversion_keeps_real_part() {
        let z = Complex32::new(3.7, -2.0);
        assert_eq!(i32::from_complex(z), 3);
        assert_eq!(f64::from_complex(z), 3.7f32 as f64);
        assert_eq!(Complex64::from_complex(z).im, -2.0);
    }

    #[test]
    fn mismatched_image_buffer_is_rejected() {
        assert!(matches!(
            Image::<f32>::from_vec(3, 3, vec![0.0; 8]),
            Err(crate::Error::Dimension(_))
        ));
    }
}
