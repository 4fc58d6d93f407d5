use crate::generator::PhantomConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Scenario description for one offline end-to-end run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub matrix_size: usize,
    pub readout: usize,
    pub coils: usize,
    pub noise: f32,
    pub seed: u64,
    /// Engine port; 0 picks an ephemeral one.
    pub port: u16,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            matrix_size: 32,
            readout: 48,
            coils: 4,
            noise: 0.0,
            seed: 0,
            port: 0,
        }
    }
}

impl ScenarioConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading scenario config {}", path_ref.display()))?;
        let config: ScenarioConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing scenario config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(matrix_size: usize, readout: usize, coils: usize, noise: f32) -> Self {
        Self {
            matrix_size,
            readout,
            coils,
            noise,
            ..Self::default()
        }
    }

    pub fn to_phantom_config(&self) -> PhantomConfig {
        PhantomConfig {
            matrix_size: self.matrix_size,
            readout: self.readout,
            coils: self.coils,
            noise: self.noise,
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_feeds_the_generator() {
        let cfg = ScenarioConfig::from_args(64, 96, 8, 0.01);
        let phantom = cfg.to_phantom_config();
        assert_eq!(phantom.matrix_size, 64);
        assert_eq!(phantom.coils, 8);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"matrix_size: 24\nreadout: 32\ncoils: 2\n")
            .unwrap();
        let path = temp.into_temp_path();
        let cfg = ScenarioConfig::load(&path).unwrap();
        assert_eq!(cfg.matrix_size, 24);
        assert_eq!(cfg.port, 0);
    }
}
