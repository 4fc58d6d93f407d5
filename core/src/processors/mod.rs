//! End-to-end orchestration wrappers, one per remote use case: raw
//! acquisition re-filtering, acquisition-to-image reconstruction, and
//! image-to-image processing.

pub mod acquisitions;
pub mod images;
pub mod reconstruct;

pub use acquisitions::AcquisitionsProcessor;
pub use images::ImagesProcessor;
pub use reconstruct::ImageReconstructor;

use crate::{Error, Result};
use std::sync::{Mutex, MutexGuard};

pub(crate) fn lock_sink<T>(sink: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    sink.lock()
        .map_err(|_| Error::Stream("result sink lock poisoned".into()))
}

/// Minimal in-process engines for driving the processors end to end.
#[cfg(test)]
pub(crate) mod test_engine {
    use crate::client::protocol;
    use crate::data::{DataType, ImageWrap};
    use std::net::{SocketAddr, TcpListener};

    /// Echoes every acquisition back, one result per input item.
    pub fn spawn_passthrough() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            loop {
                match protocol::read_id(&mut socket).unwrap() {
                    protocol::MESSAGE_CONFIG_SCRIPT | protocol::MESSAGE_PARAMETERS => {
                        protocol::read_text(&mut socket).unwrap();
                    }
                    protocol::MESSAGE_ACQUISITION => {
                        let acq = protocol::read_acquisition(&mut socket).unwrap();
                        protocol::write_acquisition(&mut socket, &acq).unwrap();
                    }
                    protocol::MESSAGE_CLOSE => {
                        protocol::write_close(&mut socket).unwrap();
                        break;
                    }
                    other => panic!("engine received unexpected tag {other}"),
                }
            }
        });
        addr
    }

    /// Consumes acquisitions and emits one image once the stream ends.
    pub fn spawn_reconstructor(matrix: usize) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            loop {
                match protocol::read_id(&mut socket).unwrap() {
                    protocol::MESSAGE_CONFIG_SCRIPT | protocol::MESSAGE_PARAMETERS => {
                        protocol::read_text(&mut socket).unwrap();
                    }
                    protocol::MESSAGE_ACQUISITION => {
                        protocol::read_acquisition(&mut socket).unwrap();
                    }
                    protocol::MESSAGE_CLOSE => {
                        let image =
                            ImageWrap::zeroed(DataType::ComplexFloat, matrix, matrix);
                        protocol::write_image(&mut socket, &image).unwrap();
                        protocol::write_close(&mut socket).unwrap();
                        break;
                    }
                    other => panic!("engine received unexpected tag {other}"),
                }
            }
        });
        addr
    }

    /// Echoes every image back, one result per input item.
    pub fn spawn_image_passthrough() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            loop {
                match protocol::read_id(&mut socket).unwrap() {
                    protocol::MESSAGE_CONFIG_SCRIPT => {
                        protocol::read_text(&mut socket).unwrap();
                    }
                    protocol::MESSAGE_IMAGE => {
                        let image = protocol::read_image(&mut socket).unwrap();
                        protocol::write_image(&mut socket, &image).unwrap();
                    }
                    protocol::MESSAGE_CLOSE => {
                        protocol::write_close(&mut socket).unwrap();
                        break;
                    }
                    other => panic!("engine received unexpected tag {other}"),
                }
            }
        });
        addr
    }
}
