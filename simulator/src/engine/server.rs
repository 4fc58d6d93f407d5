use crate::engine::recon;
use anyhow::Context;
use log::{debug, info, warn};
use reconcore::client::protocol;
use reconcore::data::{AcquisitionRecord, EncodingHeader};
use reconcore::{Error, Result};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;

/// Mock remote reconstruction engine.
///
/// Speaks the streaming wire protocol on plain TCP, one thread per
/// session. Chains terminated by the acquisition finish gadget are
/// echoed record by record; chains terminated by the image finish
/// gadget are reconstructed zero-filled once the stream closes. Image
/// input is always echoed.
pub struct EngineServer {
    listener: TcpListener,
}

impl EngineServer {
    pub fn bind(host: &str, port: u16) -> anyhow::Result<Self> {
        let listener = TcpListener::bind((host, port))
            .with_context(|| format!("binding engine listener on {host}:{port}"))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("resolving engine listener address")
    }

    /// Accepts sessions until the process exits.
    pub fn run(self) -> anyhow::Result<()> {
        info!("engine listening on {}", self.local_addr()?);
        for stream in self.listener.incoming() {
            match stream {
                Ok(socket) => {
                    thread::spawn(move || {
                        if let Err(e) = serve_session(socket) {
                            warn!("session ended with error: {e}");
                        }
                    });
                }
                Err(e) => warn!("accept failed: {e}"),
            }
        }
        Ok(())
    }

    /// Runs the accept loop on a background thread and returns the
    /// bound address; used by the offline workflow and tests.
    pub fn spawn(self) -> anyhow::Result<SocketAddr> {
        let addr = self.local_addr()?;
        thread::spawn(move || {
            if let Err(e) = self.run() {
                warn!("engine stopped: {e}");
            }
        });
        Ok(addr)
    }
}

fn is_acquisition_passthrough(config: Option<&str>) -> bool {
    config.map_or(false, |doc| doc.contains("AcquisitionFinishGadget"))
}

fn serve_session(mut socket: TcpStream) -> Result<()> {
    let mut config: Option<String> = None;
    let mut header: Option<EncodingHeader> = None;
    let mut pending: Vec<AcquisitionRecord> = Vec::new();

    loop {
        let tag = protocol::read_id(&mut socket)?;
        match tag {
            protocol::MESSAGE_CONFIG_SCRIPT => {
                let document = protocol::read_text(&mut socket)?;
                debug!("chain configuration received ({} bytes)", document.len());
                config = Some(document);
            }
            protocol::MESSAGE_PARAMETERS => {
                header = Some(EncodingHeader::from_blob(&protocol::read_text(&mut socket)?)?);
            }
            protocol::MESSAGE_ACQUISITION => {
                let acq = protocol::read_acquisition(&mut socket)?;
                if is_acquisition_passthrough(config.as_deref()) {
                    protocol::write_acquisition(&mut socket, &acq)?;
                } else {
                    pending.push(acq);
                }
            }
            protocol::MESSAGE_IMAGE => {
                let image = protocol::read_image(&mut socket)?;
                protocol::write_image(&mut socket, &image)?;
            }
            protocol::MESSAGE_CLOSE => {
                if !pending.is_empty() {
                    let header = header.as_ref().ok_or_else(|| {
                        Error::Protocol(
                            "acquisition stream arrived without a parameter message".into(),
                        )
                    })?;
                    for image in recon::reconstruct(header, &pending)? {
                        protocol::write_image(&mut socket, &image)?;
                    }
                }
                protocol::write_close(&mut socket)?;
                debug!("session finished, {} records consumed", pending.len());
                return Ok(());
            }
            other => {
                return Err(Error::Protocol(format!(
                    "engine received unknown message tag {other}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{build_scan, PhantomConfig};
    use reconcore::processors::{AcquisitionsProcessor, ImageReconstructor};

    #[test]
    fn reconstructs_a_streamed_phantom_end_to_end() {
        let addr = EngineServer::bind("127.0.0.1", 0).unwrap().spawn().unwrap();

        let config = PhantomConfig {
            matrix_size: 16,
            readout: 24,
            coils: 1,
            ..Default::default()
        };
        let (scan, truth) = build_scan(&config).unwrap();

        let mut recon = ImageReconstructor::new(addr.ip().to_string(), addr.port()).unwrap();
        recon.process(&scan).unwrap();

        let output = recon.output();
        let output = output.lock().unwrap();
        assert_eq!(output.number(), 1);
        assert!((output.image(0).unwrap().norm() - truth.norm()).abs() < 1e-2);
    }

    #[test]
    fn passthrough_chain_echoes_every_record() {
        let addr = EngineServer::bind("127.0.0.1", 0).unwrap().spawn().unwrap();

        let config = PhantomConfig {
            matrix_size: 8,
            readout: 8,
            coils: 2,
            ..Default::default()
        };
        let (scan, _) = build_scan(&config).unwrap();

        let mut processor =
            AcquisitionsProcessor::new(addr.ip().to_string(), addr.port()).unwrap();
        processor.process(&scan).unwrap();

        let output = processor.output();
        assert_eq!(output.lock().unwrap().number(), scan.number());
    }
}
