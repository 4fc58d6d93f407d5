pub use crate::client::{Connector, MessageCollector, SessionState};
pub use crate::data::{
    AcquisitionData, AcquisitionFlag, AcquisitionRecord, CoilSensitivities, DataType,
    EncodingHeader, Image, ImageData, ImageWrap,
};
pub use crate::model::AcquisitionModel;
pub use crate::pipeline::{Gadget, GadgetStage, PipelineChain};
pub use crate::processors::{AcquisitionsProcessor, ImageReconstructor, ImagesProcessor};
pub use crate::{Error, Result};
