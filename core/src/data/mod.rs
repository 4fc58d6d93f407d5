pub mod acquisition;
pub mod coils;
pub mod container;
pub mod image;

pub use acquisition::{AcquisitionFlag, AcquisitionRecord, EncodingHeader, EncodingIndex};
pub use coils::CoilSensitivities;
pub use container::{AcquisitionData, ImageData};
pub use image::{DataType, Image, ImageWrap, Sample};
