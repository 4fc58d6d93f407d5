use crate::engine::EngineServer;
use crate::generator::build_scan;
use crate::workflow::config::ScenarioConfig;
use anyhow::Context;
use reconcore::processors::ImageReconstructor;
use serde::Serialize;

/// Outcome of one offline end-to-end reconstruction.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub records_streamed: usize,
    pub images_collected: usize,
    pub image_norm: f32,
    pub truth_norm: f32,
}

#[derive(Clone)]
pub struct Runner {
    config: ScenarioConfig,
}

impl Runner {
    pub fn new(config: ScenarioConfig) -> Self {
        Self { config }
    }

    /// Spins the engine up in-process, encodes a phantom, streams it
    /// through the reconstruction chain, and summarizes the result.
    pub fn execute(&self) -> anyhow::Result<RunSummary> {
        let addr = EngineServer::bind("127.0.0.1", self.config.port)?
            .spawn()
            .context("starting in-process engine")?;

        let (scan, truth) = build_scan(&self.config.to_phantom_config())?;
        let records_streamed = scan.number();

        let mut recon = ImageReconstructor::new(addr.ip().to_string(), addr.port())
            .context("assembling reconstruction chain")?;
        recon
            .process(&scan)
            .context("streaming phantom through the engine")?;

        let output = recon.output();
        let output = output
            .lock()
            .map_err(|_| anyhow::anyhow!("result container lock poisoned"))?;
        let image_norm = if output.number() > 0 {
            output.image(0)?.norm()
        } else {
            0.0
        };

        Ok(RunSummary {
            records_streamed,
            images_collected: output.number(),
            image_norm,
            truth_norm: truth.norm(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_completes_a_scenario() {
        let cfg = ScenarioConfig::from_args(16, 24, 1, 0.0);
        let runner = Runner::new(cfg);
        let summary = runner.execute().unwrap();
        assert_eq!(summary.records_streamed, 16);
        assert_eq!(summary.images_collected, 1);
        assert!((summary.image_norm - summary.truth_norm).abs() < 1e-2);
    }
}
