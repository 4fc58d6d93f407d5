use crate::client::{protocol, Connector, ImageCollector};
use crate::data::{AcquisitionData, ImageData};
use crate::pipeline::{image_finish, PipelineChain, ReaderStage, WriterStage};
use crate::processors::lock_sink;
use crate::{Error, Result};
use log::info;
use std::sync::{Arc, Mutex};

/// Streams raw acquisitions into a remote reconstruction chain and
/// collects the reconstructed images.
pub struct ImageReconstructor {
    chain: PipelineChain,
    host: String,
    port: u16,
    output: Arc<Mutex<ImageData>>,
}

impl ImageReconstructor {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let mut chain = PipelineChain::new();
        chain.add_reader("reader", Box::new(ReaderStage::acquisition()))?;
        chain.add_writer("writer", Box::new(WriterStage::image()))?;
        chain.set_terminator(Box::new(image_finish()));
        Ok(Self {
            chain,
            host: host.into(),
            port,
            output: Arc::new(Mutex::new(ImageData::new())),
        })
    }

    /// Access for inserting reconstruction gadgets before `process`.
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
            protocol::MESSAGE_IMAGE,
            Box::new(ImageCollector::new(self.output.clone())),
        )?;
        conn.connect()?;
        conn.send_configuration(&config)?;
        conn.send_parameters(&parameters)?;

        for acq in input.iter() {
            conn.send_acquisition(acq)?;
        }
        conn.close()?;
        conn.wait()?;

        info!(
            "reconstruction done, {} records in, {} images out",
            input.number(),
            lock_sink(&self.output)?.number()
        );
        Ok(())
    }

    /// The collected images; populated only after a successful
    /// `process`.
    pub fn output(&self) -> Arc<Mutex<ImageData>> {
        self.output.clone()
    }
}
