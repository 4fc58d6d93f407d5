use crate::client::{protocol, Connector, ImageCollector};
use crate::data::ImageData;
use crate::pipeline::{image_finish, PipelineChain, ReaderStage, WriterStage};
use crate::processors::lock_sink;
use crate::Result;
use log::info;
use std::sync::{Arc, Mutex};

/// Streams images through a remote image-to-image chain and collects
/// the processed images. No parameter blob is involved; the image
/// frames are self-describing.
pub struct ImagesProcessor {
    chain: PipelineChain,
    host: String,
    port: u16,
    output: Arc<Mutex<ImageData>>,
}

impl ImagesProcessor {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let mut chain = PipelineChain::new();
        chain.add_reader("reader", Box::new(ReaderStage::image()))?;
        chain.add_writer("writer", Box::new(WriterStage::image()))?;
        chain.set_terminator(Box::new(image_finish()));
        Ok(Self {
            chain,
            host: host.into(),
            port,
            output: Arc::new(Mutex::new(ImageData::new())),
        })
    }

    /// Access for inserting intermediate gadgets before `process`.
    pub fn chain_mut(&mut self) -> &mut PipelineChain {
        &mut self.chain
    }

    pub fn process(&mut self, input: &ImageData) -> Result<()> {
        let config = self.chain.serialize()?;

        let mut conn = Connector::new(self.host.as_str(), self.port);
        conn.register_collector(
            protocol::MESSAGE_IMAGE,
            Box::new(ImageCollector::new(self.output.clone())),
        )?;
        conn.connect()?;
        conn.send_configuration(&config)?;

        for image in input.iter() {
            conn.send_image(image)?;
        }
        conn.close()?;
        conn.wait()?;

        info!(
            "image chain done, {} images in, {} out",
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
