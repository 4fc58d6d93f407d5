use ndarray::Array2;
use num_complex::Complex32;
use reconcore::data::{AcquisitionRecord, EncodingHeader, Image, ImageWrap};
use reconcore::math::CenteredFft2;
use reconcore::model::padding_offset;
use reconcore::{Error, Result};

/// Zero-filled inverse-FFT reconstruction with root-sum-of-squares
/// coil combination: one float image per `matrix` consecutive records.
pub fn reconstruct(
    header: &EncodingHeader,
    records: &[AcquisitionRecord],
) -> Result<Vec<ImageWrap>> {
    let readout = header.readout();
    let matrix = header.recon_matrix[1] as usize;
    if matrix == 0 || readout < matrix {
        return Err(Error::Dimension(format!(
            "cannot reconstruct a {matrix} matrix from a {readout} readout"
        )));
    }
    if records.is_empty() || records.len() % matrix != 0 {
        return Err(Error::Dimension(format!(
            "{} records do not divide into {matrix}-line slices",
            records.len()
        )));
    }

    let ncoils = records[0].active_channels() as usize;
    let pad = padding_offset(readout, matrix);
    let fft = CenteredFft2::new(readout, matrix);

    let mut images = Vec::with_capacity(records.len() / matrix);
    for group in records.chunks(matrix) {
        let mut grids: Vec<Array2<Complex32>> =
            (0..ncoils).map(|_| Array2::zeros((readout, matrix))).collect();
        for (y, acq) in group.iter().enumerate() {
            if acq.num_samples() as usize != readout
                || acq.active_channels() as usize != ncoils
            {
                return Err(Error::Dimension(format!(
                    "record is {}x{}, slice expects {readout}x{ncoils}",
                    acq.num_samples(),
                    acq.active_channels()
                )));
            }
            for (c, grid) in grids.iter_mut().enumerate() {
                for s in 0..readout {
                    grid[(s, y)] = acq.data(s, c);
                }
            }
        }

        let mut power = Array2::<f32>::zeros((matrix, matrix));
        for grid in grids.iter_mut() {
            fft.inverse(grid)?;
            for y in 0..matrix {
                for x in 0..matrix {
                    power[(x, y)] += grid[(x + pad, y)].norm_sqr();
                }
            }
        }

        let mut data = Vec::with_capacity(matrix * matrix);
        for y in 0..matrix {
            for x in 0..matrix {
                data.push(power[(x, y)].sqrt());
            }
        }
        images.push(ImageWrap::Float(Image::from_vec(matrix, matrix, data)?));
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{build_scan, PhantomConfig};

    #[test]
    fn recovers_the_phantom_magnitude_for_a_single_coil() {
        let config = PhantomConfig {
            matrix_size: 16,
            readout: 24,
            coils: 1,
            ..Default::default()
        };
        let (scan, truth) = build_scan(&config).unwrap();
        let header =
            EncodingHeader::from_blob(scan.parameters().expect("scan carries parameters"))
                .unwrap();

        let records: Vec<_> = scan.iter().cloned().collect();
        let images = reconstruct(&header, &records).unwrap();
        assert_eq!(images.len(), 1);
        // Unit coil and full sampling: the RSS image is the phantom
        // magnitude, so norms agree.
        assert!((images[0].norm() - truth.norm()).abs() < 1e-2);
    }

    #[test]
    fn ragged_record_count_is_rejected() {
        let header = EncodingHeader {
            encoded_matrix: [8, 4, 1],
            recon_matrix: [4, 4, 1],
            num_channels: 1,
        };
        let records = vec![AcquisitionRecord::new(8, 1); 3];
        assert!(matches!(
            reconstruct(&header, &records),
            Err(Error::Dimension(_))
        ));
    }
}
