pub mod phantom;

pub use phantom::{build_reference, build_scan, PhantomConfig};
