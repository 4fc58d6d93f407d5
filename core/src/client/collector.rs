use crate::client::protocol;
use crate::data::{AcquisitionData, ImageData};
use crate::{Error, Result};
use std::io::Read;
use std::sync::{Arc, Mutex};

/// Consumes one inbound message of a fixed type into its target
/// container.
///
/// Collectors run on the session's inbound reader thread, so the
/// target is shared behind a mutex; results may land while the caller
/// thread is still sending later input items.
pub trait MessageCollector: Send {
    fn collect(&mut self, reader: &mut dyn Read) -> Result<()>;
}

/// Appends inbound acquisition messages to a shared container.
pub struct AcquisitionCollector {
    target: Arc<Mutex<AcquisitionData>>,
}

impl AcquisitionCollector {
    pub fn new(target: Arc<Mutex<AcquisitionData>>) -> Self {
        Self { target }
    }
}

impl MessageCollector for AcquisitionCollector {
    fn collect(&mut self, reader: &mut dyn Read) -> Result<()> {
        let acq = protocol::read_acquisition(reader)?;
        self.target
            .lock()
            .map_err(|_| Error::Stream("acquisition sink lock poisoned".into()))?
            .append_acquisition(acq);
        Ok(())
    }
}

/// Appends inbound image messages to a shared container.
pub struct ImageCollector {
    target: Arc<Mutex<ImageData>>,
}

impl ImageCollector {
    pub fn new(target: Arc<Mutex<ImageData>>) -> Self {
        Self { target }
    }
}

impl MessageCollector for ImageCollector {
    fn collect(&mut self, reader: &mut dyn Read) -> Result<()> {
        let image = protocol::read_image(reader)?;
        self.target
            .lock()
            .map_err(|_| Error::Stream("image sink lock poisoned".into()))?
            .append_image(image);
        Ok(())
    }
}
