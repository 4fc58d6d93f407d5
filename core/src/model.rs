//! Forward/adjoint acquisition-encoding operator.
//!
//! The forward operation simulates raw k-space acquisition from an
//! image through per-coil sensitivity weighting and a centered 2-D
//! FFT; the adjoint recovers an image estimate by the conjugate
//! operations. Both run locally, independent of the remote pipeline.

use crate::data::image::with_image;
use crate::data::{
    AcquisitionData, AcquisitionFlag, AcquisitionRecord, CoilSensitivities, EncodingHeader,
    Image, ImageData, ImageWrap, Sample,
};
use crate::math::CenteredFft2;
use crate::{Error, Result};
use ndarray::Array2;
use num_complex::Complex32;
use std::sync::Arc;

/// Column offset of the active image region inside the padded readout;
/// odd leftovers bias the extra padding to the high-index side.
pub fn padding_offset(readout: usize, matrix: usize) -> usize {
    (readout - matrix) / 2
}

/// Coil-weighted Fourier encoding operator.
///
/// Working parameters (readout length, coil map, template record) are
/// captured from a reference acquisition container at construction and
/// stay fixed for the model's lifetime.
pub struct AcquisitionModel {
    parameters: String,
    coils: Arc<CoilSensitivities>,
    template: AcquisitionRecord,
    readout: usize,
}

impl AcquisitionModel {
    pub fn new(reference: &AcquisitionData) -> Result<Self> {
        let parameters = reference
            .parameters()
            .ok_or_else(|| {
                Error::Configuration("reference container carries no header parameters".into())
            })?
            .to_string();
        let header = EncodingHeader::from_blob(&parameters)?;
        if reference.number() == 0 {
            return Err(Error::Configuration(
                "reference container holds no template acquisition".into(),
            ));
        }
        let coils = reference
            .coils()
            .ok_or_else(|| {
                Error::Configuration("reference container carries no coil sensitivities".into())
            })?
            .clone();
        let template = reference.acquisition(0)?.clone();
        let readout = header.readout();

        if coils.ncoils() != template.active_channels() as usize {
            return Err(Error::Dimension(format!(
                "coil map holds {} coils, acquisition records carry {} channels",
                coils.ncoils(),
                template.active_channels()
            )));
        }
        if template.num_samples() as usize != readout {
            return Err(Error::Dimension(format!(
                "acquisition records carry {} samples, encoded readout is {readout}",
                template.num_samples()
            )));
        }

        Ok(Self {
            parameters,
            coils,
            template,
            readout,
        })
    }

    pub fn readout(&self) -> usize {
        self.readout
    }

    pub fn ncoils(&self) -> usize {
        self.coils.ncoils()
    }

    /// Encodes one image into `matrix` k-space readout lines appended
    /// to `output`, then propagates the shared parameters and coil map
    /// and flushes the container.
    pub fn fwd(&self, image: &ImageWrap, output: &mut AcquisitionData) -> Result<()> {
        with_image!(image, im => self.fwd_typed(im, output))
    }

    /// Adjoint of `fwd`: accumulates the conjugate-weighted inverse
    /// transform of `matrix` consecutive records (starting at
    /// `image_index * matrix`) into the zeroed image buffer.
    pub fn bwd(
        &self,
        image: &mut ImageWrap,
        input: &AcquisitionData,
        image_index: usize,
    ) -> Result<()> {
        with_image!(image, im => self.bwd_typed(im, input, image_index))
    }

    /// `fwd` over a whole image collection in container order.
    pub fn fwd_all(&self, images: &ImageData, output: &mut AcquisitionData) -> Result<()> {
        for image in images.iter() {
            self.fwd(image, output)?;
        }
        Ok(())
    }

    /// `bwd` over a whole image collection, element position selecting
    /// the record window.
    pub fn bwd_all(&self, images: &mut ImageData, input: &AcquisitionData) -> Result<()> {
        for index in 0..images.number() {
            let image = images.image_mut(index)?;
            self.bwd(image, input, index)?;
        }
        Ok(())
    }

    fn check_geometry(&self, cols: usize, rows: usize) -> Result<usize> {
        if cols != rows {
            return Err(Error::Dimension(format!(
                "image is {cols}x{rows}, the encoding assumes a square matrix"
            )));
        }
        let matrix = rows;
        if self.readout < matrix {
            return Err(Error::Dimension(format!(
                "encoded readout {} shorter than image matrix {matrix}",
                self.readout
            )));
        }
        if self.coils.nx() != matrix || self.coils.ny() != matrix {
            return Err(Error::Dimension(format!(
                "coil map is {}x{}, image matrix is {matrix}",
                self.coils.nx(),
                self.coils.ny()
            )));
        }
        Ok(matrix)
    }

    fn fwd_typed<T: Sample>(&self, im: &Image<T>, output: &mut AcquisitionData) -> Result<()> {
        let matrix = self.check_geometry(im.cols(), im.rows())?;
        let ncoils = self.coils.ncoils();
        let pad = padding_offset(self.readout, matrix);
        let fft = CenteredFft2::new(self.readout, matrix);

        let mut grids: Vec<Array2<Complex32>> = Vec::with_capacity(ncoils);
        for c in 0..ncoils {
            let mut grid = Array2::zeros((self.readout, matrix));
            for y in 0..matrix {
                for x in 0..matrix {
                    let z = im.at(x, y).to_complex();
                    grid[(x + pad, y)] = z * self.coils.value(x, y, c);
                }
            }
            fft.forward(&mut grid)?;
            grids.push(grid);
        }

        for y in 0..matrix {
            let mut acq = self.template.clone();
            acq.zero_data();
            acq.clear_all_flags();
            if y == 0 {
                acq.set_flag(AcquisitionFlag::FirstInSlice);
            }
            if y == matrix - 1 {
                acq.set_flag(AcquisitionFlag::LastInSlice);
            }
            acq.idx_mut().kspace_encode_step = y as u16;
            acq.idx_mut().repetition = 0;
            for (c, grid) in grids.iter().enumerate() {
                for s in 0..self.readout {
                    acq.set_data(s, c, grid[(s, y)]);
                }
            }
            output.append_acquisition(acq);
        }

        output.set_parameters(self.parameters.clone());
        output.set_coils(self.coils.clone());
        output.write_data()
    }

    fn bwd_typed<T: Sample>(
        &self,
        im: &mut Image<T>,
        input: &AcquisitionData,
        image_index: usize,
    ) -> Result<()> {
        let matrix = self.check_geometry(im.cols(), im.rows())?;
        let ncoils = self.coils.ncoils();
        let pad = padding_offset(self.readout, matrix);
        let fft = CenteredFft2::new(self.readout, matrix);

        let mut grids: Vec<Array2<Complex32>> =
            (0..ncoils).map(|_| Array2::zeros((self.readout, matrix))).collect();
        for y in 0..matrix {
            let acq = input.acquisition(image_index * matrix + y)?;
            if acq.num_samples() as usize != self.readout
                || acq.active_channels() as usize != ncoils
            {
                return Err(Error::Dimension(format!(
                    "record {} is {}x{}, model expects {}x{ncoils}",
                    image_index * matrix + y,
                    acq.num_samples(),
                    acq.active_channels(),
                    self.readout
                )));
            }
            for (c, grid) in grids.iter_mut().enumerate() {
                for s in 0..self.readout {
                    grid[(s, y)] = acq.data(s, c);
                }
            }
        }

        im.zero_fill();
        for (c, grid) in grids.iter_mut().enumerate() {
            fft.inverse(grid)?;
            for y in 0..matrix {
                for x in 0..matrix {
                    let z = grid[(x + pad, y)];
                    let zc = self.coils.value(x, y, c);
                    im.add_at(x, y, T::from_complex(zc.conj() * z));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataType;

    fn reference(readout: usize, matrix: usize, ncoils: usize) -> AcquisitionData {
        let header = EncodingHeader {
            encoded_matrix: [readout as u16, matrix as u16, 1],
            recon_matrix: [matrix as u16, matrix as u16, 1],
            num_channels: ncoils as u16,
        };
        let mut data = AcquisitionData::new();
        data.set_parameters(header.to_blob().unwrap());
        data.set_coils(Arc::new(CoilSensitivities::uniform(matrix, matrix, ncoils)));
        data.append_acquisition(AcquisitionRecord::new(readout as u16, ncoils as u16));
        data
    }

    fn ramp_image(matrix: usize) -> ImageWrap {
        let data = (0..matrix * matrix)
            .map(|i| Complex32::new(i as f32 * 0.1 - 0.3, (i % 3) as f32))
            .collect();
        ImageWrap::ComplexFloat(Image::from_vec(matrix, matrix, data).unwrap())
    }

    #[test]
    fn padding_bias_lands_on_the_high_side() {
        assert_eq!(padding_offset(8, 4), 2);
        assert_eq!(padding_offset(9, 4), 2);
        assert_eq!(padding_offset(4, 4), 0);
    }

    #[test]
    fn fwd_appends_one_record_per_row() {
        let model = AcquisitionModel::new(&reference(8, 4, 2)).unwrap();
        let mut out = AcquisitionData::new();
        model.fwd(&ramp_image(4), &mut out).unwrap();

        assert_eq!(out.number(), 4);
        for acq in out.iter() {
            assert_eq!(acq.samples().len(), 2 * 8);
        }
        assert!(out.parameters().is_some());
        assert_eq!(out.coils().unwrap().ncoils(), 2);
    }

    #[test]
    fn fwd_marks_slice_boundaries_only() {
        let model = AcquisitionModel::new(&reference(8, 4, 1)).unwrap();
        let mut out = AcquisitionData::new();
        model.fwd(&ramp_image(4), &mut out).unwrap();

        let first = out.acquisition(0).unwrap();
        assert_eq!(first.flags(), AcquisitionFlag::FirstInSlice.mask());
        assert_eq!(first.idx().kspace_encode_step, 0);

        let last = out.acquisition(3).unwrap();
        assert_eq!(last.flags(), AcquisitionFlag::LastInSlice.mask());
        assert_eq!(last.idx().kspace_encode_step, 3);

        for middle in 1..3 {
            assert_eq!(out.acquisition(middle).unwrap().flags(), 0);
        }
    }

    #[test]
    fn adjoint_of_forward_is_identity_for_unit_coil() {
        let model = AcquisitionModel::new(&reference(8, 4, 1)).unwrap();
        let image = ramp_image(4);
        let mut encoded = AcquisitionData::new();
        model.fwd(&image, &mut encoded).unwrap();

        let mut recovered = ImageWrap::zeroed(DataType::ComplexFloat, 4, 4);
        model.bwd(&mut recovered, &encoded, 0).unwrap();

        let (ImageWrap::ComplexFloat(expect), ImageWrap::ComplexFloat(got)) =
            (&image, &recovered)
        else {
            panic!("sample type changed under round trip");
        };
        for (a, b) in expect.data().iter().zip(got.data()) {
            assert!((a - b).norm() < 1e-4, "expected {a}, recovered {b}");
        }
    }

    #[test]
    fn round_trip_survives_odd_padding() {
        let model = AcquisitionModel::new(&reference(9, 4, 1)).unwrap();
        let image = ramp_image(4);
        let mut encoded = AcquisitionData::new();
        model.fwd(&image, &mut encoded).unwrap();

        let mut recovered = ImageWrap::zeroed(DataType::ComplexFloat, 4, 4);
        model.bwd(&mut recovered, &encoded, 0).unwrap();
        assert!((image.norm() - recovered.norm()).abs() < 1e-3);
    }

    #[test]
    fn batch_adjoint_uses_the_element_position() {
        let model = AcquisitionModel::new(&reference(8, 4, 1)).unwrap();
        let mut images = ImageData::new();
        images.append_image(ramp_image(4));
        let flat = ImageWrap::ComplexFloat(
            Image::from_vec(4, 4, vec![Complex32::new(2.0, 0.0); 16]).unwrap(),
        );
        images.append_image(flat.clone());

        let mut encoded = AcquisitionData::new();
        model.fwd_all(&images, &mut encoded).unwrap();
        assert_eq!(encoded.number(), 8);

        let mut recovered = ImageData::new();
        recovered.append_image(ImageWrap::zeroed(DataType::ComplexFloat, 4, 4));
        recovered.append_image(ImageWrap::zeroed(DataType::ComplexFloat, 4, 4));
        model.bwd_all(&mut recovered, &encoded).unwrap();

        assert!((recovered.image(1).unwrap().norm() - flat.norm()).abs() < 1e-3);
    }

    #[test]
    fn real_valued_adjoint_keeps_the_real_part() {
        let model = AcquisitionModel::new(&reference(8, 4, 1)).unwrap();
        let source = ImageWrap::Float(
            Image::from_vec(4, 4, (0..16).map(|i| i as f32).collect()).unwrap(),
        );
        let mut encoded = AcquisitionData::new();
        model.fwd(&source, &mut encoded).unwrap();

        let mut recovered = ImageWrap::zeroed(DataType::Float, 4, 4);
        model.bwd(&mut recovered, &encoded, 0).unwrap();
        assert!((source.norm() - recovered.norm()).abs() < 1e-2);
    }

    #[test]
    fn coil_count_mismatch_fails_at_construction() {
        let mut data = reference(8, 4, 2);
        data.set_coils(Arc::new(CoilSensitivities::uniform(4, 4, 3)));
        assert!(matches!(
            AcquisitionModel::new(&data),
            Err(Error::Dimension(_))
        ));
    }

    #[test]
    fn short_readout_fails_before_encoding() {
        let model = AcquisitionModel::new(&reference(4, 4, 1)).unwrap();
        let mut out = AcquisitionData::new();
        let too_big = ImageWrap::zeroed(DataType::ComplexFloat, 8, 8);
        assert!(matches!(
            model.fwd(&too_big, &mut out),
            Err(Error::Dimension(_))
        ));
    }
}
