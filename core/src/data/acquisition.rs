use crate::{Error, Result};
use num_complex::Complex32;
use serde::{Deserialize, Serialize};

/// Boundary flags carried by each acquisition record, numbered as bit
/// positions (1-based) in the record's flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionFlag {
    FirstInEncodeStep = 1,
    LastInEncodeStep = 2,
    FirstInSlice = 7,
    LastInSlice = 8,
    FirstInRepetition = 13,
    LastInRepetition = 14,
}

impl AcquisitionFlag {
    pub fn mask(self) -> u64 {
        1u64 << (self as u64 - 1)
    }
}

/// Position of one readout line within the encoded volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingIndex {
    pub kspace_encode_step: u16,
    pub repetition: u16,
    pub slice: u16,
}

/// One frequency-domain readout line: a fixed-length complex sample
/// vector per receive coil plus indexing and flag metadata.
///
/// Samples are laid out coil-major: all of coil 0, then coil 1, and so
/// on. Records are built once and never mutated after they enter a
/// container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionRecord {
    flags: u64,
    idx: EncodingIndex,
    num_samples: u16,
    active_channels: u16,
    data: Vec<Complex32>,
}

impl AcquisitionRecord {
    pub fn new(num_samples: u16, active_channels: u16) -> Self {
        Self {
            flags: 0,
            idx: EncodingIndex::default(),
            num_samples,
            active_channels,
            data: vec![Complex32::default(); num_samples as usize * active_channels as usize],
        }
    }

    pub fn num_samples(&self) -> u16 {
        self.num_samples
    }

    pub fn active_channels(&self) -> u16 {
        self.active_channels
    }

    pub fn idx(&self) -> &EncodingIndex {
        &self.idx
    }

    pub fn idx_mut(&mut self) -> &mut EncodingIndex {
        &mut self.idx
    }

    /// Sample `s` of coil `c`.
    pub fn data(&self, s: usize, c: usize) -> Complex32 {
        self.data[c * self.num_samples as usize + s]
    }

    pub fn set_data(&mut self, s: usize, c: usize, value: Complex32) {
        self.data[c * self.num_samples as usize + s] = value;
    }

    pub fn samples(&self) -> &[Complex32] {
        &self.data
    }

    pub fn samples_mut(&mut self) -> &mut [Complex32] {
        &mut self.data
    }

    pub fn zero_data(&mut self) {
        self.data.fill(Complex32::default());
    }

    pub fn flags(&self) -> u64 {
        self.flags
    }

    pub fn set_raw_flags(&mut self, flags: u64) {
        self.flags = flags;
    }

    pub fn clear_all_flags(&mut self) {
        self.flags = 0;
    }

    pub fn set_flag(&mut self, flag: AcquisitionFlag) {
        self.flags |= flag.mask();
    }

    pub fn is_flag_set(&self, flag: AcquisitionFlag) -> bool {
        self.flags & flag.mask() != 0
    }
}

/// Shared acquisition-header parameters, exchanged once per session as
/// an opaque blob ahead of the per-record data messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingHeader {
    /// Encoded-space matrix size (readout, phase, slice).
    pub encoded_matrix: [u16; 3],
    /// Target reconstruction matrix size.
    pub recon_matrix: [u16; 3],
    pub num_channels: u16,
}

impl EncodingHeader {
    /// Encoded-space readout length, the padded k-space width.
    pub fn readout(&self) -> usize {
        self.encoded_matrix[0] as usize
    }

    pub fn to_blob(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::Protocol(format!("serializing encoding header: {e}")))
    }

    pub fn from_blob(blob: &str) -> Result<Self> {
        serde_json::from_str(blob)
            .map_err(|e| Error::Protocol(format!("parsing encoding header: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_set_and_clear_independently() {
        let mut acq = AcquisitionRecord::new(4, 2);
        acq.set_flag(AcquisitionFlag::FirstInSlice);
        assert!(acq.is_flag_set(AcquisitionFlag::FirstInSlice));
        assert!(!acq.is_flag_set(AcquisitionFlag::LastInSlice));

        acq.set_flag(AcquisitionFlag::LastInRepetition);
        acq.clear_all_flags();
        assert_eq!(acq.flags(), 0);
    }

    #[test]
    fn samples_are_coil_major() {
        let mut acq = AcquisitionRecord::new(3, 2);
        acq.set_data(1, 1, Complex32::new(5.0, -1.0));
        assert_eq!(acq.samples()[4], Complex32::new(5.0, -1.0));
        assert_eq!(acq.data(1, 1), Complex32::new(5.0, -1.0));
    }

    #[test]
    fn encoding_header_blob_round_trip() {
        let header = EncodingHeader {
            encoded_matrix: [256, 128, 1],
            recon_matrix: [128, 128, 1],
            num_channels: 8,
        };
        let blob = header.to_blob().unwrap();
        assert_eq!(EncodingHeader::from_blob(&blob).unwrap(), header);
    }

    #[test]
    fn malformed_blob_is_a_protocol_error() {
        let err = EncodingHeader::from_blob("not json").unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
