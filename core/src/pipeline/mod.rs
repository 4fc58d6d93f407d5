pub mod chain;
pub mod gadget;

pub use chain::PipelineChain;
pub use gadget::{acquisition_finish, image_finish, Gadget, GadgetStage, ReaderStage, WriterStage};
