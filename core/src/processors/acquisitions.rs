use crate::client::{protocol, AcquisitionCollector, Connector};
use crate::data::AcquisitionData;
use crate::pipeline::{acquisition_finish, PipelineChain, ReaderStage, WriterStage};
use crate::processors::lock_sink;
use crate::{Error, Result};
use log::info;
use std::sync::{Arc, Mutex};

/// Streams raw acquisitions through a remote re-filtering chain and
/// collects the filtered acquisitions.
pub struct AcquisitionsProcessor {
    chain: PipelineChain,
    host: String,
    port: u16,
    output: Arc<Mutex<AcquisitionData>>,
}

impl AcquisitionsProcessor {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let mut chain = PipelineChain::new();
        chain.add_reader("reader", Box::new(ReaderStage::acquisition()))?;
        chain.add_writer("writer", Box::new(WriterStage::acquisition()))?;
        chain.set_terminator(Box::new(acquisition_finish()));
        Ok(Self {
            chain,
            host: host.into(),
            port,
            output: Arc::new(Mutex::new(AcquisitionData::new())),
        })
    }

    /// Access for inserting intermediate gadgets before `process`.
    pub fn chain_mut(&mut self) -> &mut PipelineChain {
        &mut self.chain
    }

    pub fn process(&mut self, input: &AcquisitionData) -> Result<()> {
        let config = self.chain.serialize()?;
        let parameters = input
            .parameters()
            .ok_or_else(|| {
                Error::Configuration("input container carries no header parameters".into())
            })?
            .to_string();

        let mut conn = Connector::new(self.host.as_str(), self.port);
        conn.register_collector(
            protocol::MESSAGE_ACQUISITION,
            Box::new(AcquisitionCollector::new(self.output.clone())),
        )?;
        conn.connect()?;
        conn.send_configuration(&config)?;
        conn.send_parameters(&parameters)?;
        lock_sink(&self.output)?.copy_data(input);

        for acq in input.iter() {
            conn.send_acquisition(acq)?;
        }
        conn.close()?;
        conn.wait()?;

        info!(
            "acquisition chain done, {} records in, {} out",
            input.number(),
            lock_sink(&self.output)?.number()
        );
        Ok(())
    }

    /// The collected result container; populated only after a
    /// successful `process`.
    pub fn output(&self) -> Arc<Mutex<AcquisitionData>> {
        self.output.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AcquisitionRecord;
    use crate::processors::test_engine;

    fn input_with(n: usize) -> AcquisitionData {
        let mut data = AcquisitionData::new();
        data.set_parameters("{\"session\":1}".into());
        for step in 0..n {
            let mut acq = AcquisitionRecord::new(4, 1);
            acq.idx_mut().kspace_encode_step = step as u16;
            data.append_acquisition(acq);
        }
        data
    }

    #[test]
    fn passthrough_collects_one_result_per_input() {
        let addr = test_engine::spawn_passthrough();
        let mut processor =
            AcquisitionsProcessor::new(addr.ip().to_string(), addr.port()).unwrap();
        let input = input_with(5);
        processor.process(&input).unwrap();

        let output = processor.output();
        let output = output.lock().unwrap();
        assert_eq!(output.number(), 5);
        // Shared metadata propagated onto the result container.
        assert_eq!(output.parameters(), Some("{\"session\":1}"));
    }

    #[test]
    fn missing_parameters_abort_before_any_network_use() {
        let mut processor = AcquisitionsProcessor::new("127.0.0.1", 1).unwrap();
        let input = AcquisitionData::new();
        assert!(matches!(
            processor.process(&input),
            Err(Error::Configuration(_))
        ));
    }
}
