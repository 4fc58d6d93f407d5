use anyhow::Context;
use ndarray::Array3;
use num_complex::Complex32;
use rand::{rngs::StdRng, Rng, SeedableRng};
use reconcore::data::{
    AcquisitionData, AcquisitionRecord, CoilSensitivities, EncodingHeader, Image, ImageWrap,
};
use reconcore::model::AcquisitionModel;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for generating a synthetic scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhantomConfig {
    pub matrix_size: usize,
    pub readout: usize,
    pub coils: usize,
    pub noise: f32,
    pub seed: u64,
}

impl Default for PhantomConfig {
    fn default() -> Self {
        Self {
            matrix_size: 32,
            readout: 48,
            coils: 4,
            noise: 0.0,
            seed: 0,
        }
    }
}

impl PhantomConfig {
    fn normalized_matrix(&self) -> usize {
        self.matrix_size.max(2)
    }

    fn normalized_readout(&self) -> usize {
        self.readout.max(self.normalized_matrix())
    }

    fn normalized_coils(&self) -> usize {
        self.coils.max(1)
    }
}

/// A square phantom: a bright block with a dimmer inset, plus optional
/// seeded complex noise.
pub fn build_image(config: &PhantomConfig) -> ImageWrap {
    let matrix = config.normalized_matrix();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let outer = matrix / 4..matrix - matrix / 4;
    let inner = matrix * 3 / 8..matrix - matrix * 3 / 8;

    let mut data = Vec::with_capacity(matrix * matrix);
    for y in 0..matrix {
        for x in 0..matrix {
            let mut value = 0.0f32;
            if outer.contains(&x) && outer.contains(&y) {
                value = 1.0;
            }
            if inner.contains(&x) && inner.contains(&y) {
                value = 0.4;
            }
            let jitter = if config.noise > 0.0 {
                Complex32::new(
                    rng.gen_range(-config.noise..config.noise),
                    rng.gen_range(-config.noise..config.noise),
                )
            } else {
                Complex32::default()
            };
            data.push(Complex32::new(value, 0.0) + jitter);
        }
    }
    ImageWrap::ComplexFloat(
        Image::from_vec(matrix, matrix, data).expect("phantom buffer matches its matrix"),
    )
}

/// Per-coil gaussian sensitivity bumps spread around the field of
/// view; a single coil degenerates to the uniform map.
pub fn build_coil_maps(config: &PhantomConfig) -> CoilSensitivities {
    let matrix = config.normalized_matrix();
    let ncoils = config.normalized_coils();
    if ncoils == 1 {
        return CoilSensitivities::uniform(matrix, matrix, 1);
    }

    let mut data = Array3::zeros((matrix, matrix, ncoils));
    let sigma = matrix as f32 / 2.0;
    for c in 0..ncoils {
        let angle = c as f32 / ncoils as f32 * std::f32::consts::TAU;
        let cx = matrix as f32 / 2.0 * (1.0 + 0.6 * angle.cos());
        let cy = matrix as f32 / 2.0 * (1.0 + 0.6 * angle.sin());
        for y in 0..matrix {
            for x in 0..matrix {
                let d2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
                let weight = (-d2 / (2.0 * sigma * sigma)).exp();
                data[(x, y, c)] = Complex32::new(weight, 0.0);
            }
        }
    }
    CoilSensitivities::new(data)
}

/// A reference container carrying the header parameters, the coil
/// map, and one template record, enough to construct an encoding
/// model.
pub fn build_reference(config: &PhantomConfig) -> anyhow::Result<AcquisitionData> {
    let matrix = config.normalized_matrix();
    let readout = config.normalized_readout();
    let ncoils = config.normalized_coils();

    let header = EncodingHeader {
        encoded_matrix: [readout as u16, matrix as u16, 1],
        recon_matrix: [matrix as u16, matrix as u16, 1],
        num_channels: ncoils as u16,
    };
    let mut reference = AcquisitionData::new();
    reference.set_parameters(header.to_blob().context("serializing phantom header")?);
    reference.set_coils(Arc::new(build_coil_maps(config)));
    reference.append_acquisition(AcquisitionRecord::new(readout as u16, ncoils as u16));
    Ok(reference)
}

/// Forward-encodes the phantom into a ready-to-stream acquisition
/// container; also returns the ground-truth image.
pub fn build_scan(config: &PhantomConfig) -> anyhow::Result<(AcquisitionData, ImageWrap)> {
    let reference = build_reference(config)?;
    let model = AcquisitionModel::new(&reference).context("building encoding model")?;
    let truth = build_image(config);

    let mut acquisitions = AcquisitionData::new();
    model
        .fwd(&truth, &mut acquisitions)
        .context("encoding phantom into k-space")?;
    Ok((acquisitions, truth))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_holds_one_record_per_phase_encode() {
        let config = PhantomConfig {
            matrix_size: 16,
            readout: 24,
            coils: 2,
            ..Default::default()
        };
        let (scan, truth) = build_scan(&config).unwrap();
        assert_eq!(scan.number(), 16);
        assert!(truth.norm() > 0.0);
        assert_eq!(scan.coils().unwrap().ncoils(), 2);
    }

    #[test]
    fn readout_is_never_shorter_than_the_matrix() {
        let config = PhantomConfig {
            matrix_size: 16,
            readout: 8,
            ..Default::default()
        };
        let reference = build_reference(&config).unwrap();
        // Normalization widened the readout, so the model accepts it.
        assert!(AcquisitionModel::new(&reference).is_ok());
    }
}
