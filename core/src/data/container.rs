use crate::data::acquisition::AcquisitionRecord;
use crate::data::coils::CoilSensitivities;
use crate::data::image::ImageWrap;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Ordered, append-only collection of acquisition records plus the
/// shared header parameters and an optional coil-sensitivity map.
///
/// Item order is append order and index lookup stays stable across
/// appends; the streaming collectors rely on both.
#[derive(Debug, Default)]
pub struct AcquisitionData {
    records: Vec<AcquisitionRecord>,
    parameters: Option<String>,
    coils: Option<Arc<CoilSensitivities>>,
    backing: Option<PathBuf>,
}

#[derive(Serialize, Deserialize)]
struct PersistedAcquisitions {
    parameters: Option<String>,
    records: Vec<AcquisitionRecord>,
}

impl AcquisitionData {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty container that `write_data` will persist to `path`.
    pub fn with_backing<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            backing: Some(path.into()),
            ..Self::default()
        }
    }

    /// Loads records and parameters previously saved with `write_data`.
    /// The coil map is not persisted; it travels by reference only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let persisted: PersistedAcquisitions = serde_json::from_str(&contents)
            .map_err(|e| Error::Protocol(format!("parsing acquisition data file: {e}")))?;
        Ok(Self {
            records: persisted.records,
            parameters: persisted.parameters,
            coils: None,
            backing: Some(path.as_ref().to_path_buf()),
        })
    }

    pub fn number(&self) -> usize {
        self.records.len()
    }

    pub fn acquisition(&self, index: usize) -> Result<&AcquisitionRecord> {
        self.records.get(index).ok_or_else(|| {
            Error::Dimension(format!(
                "acquisition index {index} out of range ({} held)",
                self.records.len()
            ))
        })
    }

    pub fn append_acquisition(&mut self, record: AcquisitionRecord) {
        self.records.push(record);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AcquisitionRecord> {
        self.records.iter()
    }

    pub fn parameters(&self) -> Option<&str> {
        self.parameters.as_deref()
    }

    pub fn set_parameters(&mut self, blob: String) {
        self.parameters = Some(blob);
    }

    pub fn coils(&self) -> Option<&Arc<CoilSensitivities>> {
        self.coils.as_ref()
    }

    pub fn set_coils(&mut self, coils: Arc<CoilSensitivities>) {
        self.coils = Some(coils);
    }

    /// Propagates the shared header parameters and coil map from
    /// another container, leaving the records untouched.
    pub fn copy_data(&mut self, source: &AcquisitionData) {
        self.parameters = source.parameters.clone();
        self.coils = source.coils.clone();
    }

    /// Persists records and parameters to the backing path; a
    /// container without one keeps its data in memory only.
    pub fn write_data(&self) -> Result<()> {
        let Some(path) = &self.backing else {
            return Ok(());
        };
        let persisted = PersistedAcquisitions {
            parameters: self.parameters.clone(),
            records: self.records.clone(),
        };
        let contents = serde_json::to_string(&persisted)
            .map_err(|e| Error::Protocol(format!("serializing acquisition data: {e}")))?;
        fs::write(path, contents)?;
        Ok(())
    }
}

/// Ordered, append-only collection of type-erased images.
#[derive(Debug, Default)]
pub struct ImageData {
    images: Vec<ImageWrap>,
}

impl ImageData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn number(&self) -> usize {
        self.images.len()
    }

    pub fn image(&self, index: usize) -> Result<&ImageWrap> {
        self.images.get(index).ok_or_else(|| {
            Error::Dimension(format!(
                "image index {index} out of range ({} held)",
                self.images.len()
            ))
        })
    }

    pub fn image_mut(&mut self, index: usize) -> Result<&mut ImageWrap> {
        let held = self.images.len();
        self.images
            .get_mut(index)
            .ok_or_else(|| Error::Dimension(format!("image index {index} out of range ({held} held)")))
    }

    pub fn append_image(&mut self, image: ImageWrap) {
        self.images.push(image);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImageWrap> {
        self.images.iter()
    }
}
