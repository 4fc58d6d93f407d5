use crate::client::collector::MessageCollector;
use crate::client::metrics::TransferMetrics;
use crate::client::protocol;
use crate::data::{AcquisitionRecord, ImageWrap};
use crate::{Error, Result};
use log::{debug, info};
use std::collections::HashMap;
use std::net::TcpStream;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Session lifecycle. Any I/O failure moves to `Failed`, from which
/// (as from `Completed`) only destruction is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Connected,
    ConfigSent,
    Streaming,
    Closing,
    Completed,
    Failed,
}

/// Owner of one streaming session with the remote pipeline engine.
///
/// Outbound traffic runs on the caller thread; inbound messages are
/// dispatched by tag to the registered collectors on a dedicated
/// reader thread, so results can arrive while the caller is still
/// sending. The remote address is explicit construction input; there
/// is no default host or port.
pub struct Connector {
    host: String,
    port: u16,
    state: SessionState,
    stream: Option<TcpStream>,
    collectors: HashMap<u16, Box<dyn MessageCollector>>,
    reader: Option<JoinHandle<Result<()>>>,
    metrics: Arc<TransferMetrics>,
}

impl Connector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            state: SessionState::Unconnected,
            stream: None,
            collectors: HashMap::new(),
            reader: None,
            metrics: Arc::new(TransferMetrics::new()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn metrics(&self) -> Arc<TransferMetrics> {
        self.metrics.clone()
    }

    /// Registers the collector for one inbound message tag. The
    /// registry must cover every tag the session will emit and is
    /// frozen once `connect` runs.
    pub fn register_collector(
        &mut self,
        tag: u16,
        collector: Box<dyn MessageCollector>,
    ) -> Result<()> {
        if self.state != SessionState::Unconnected {
            return Err(Error::Configuration(format!(
                "collector registered in state {:?}, registry is frozen at connect",
                self.state
            )));
        }
        if self.collectors.insert(tag, collector).is_some() {
            return Err(Error::Configuration(format!(
                "collector for message tag {tag} registered twice"
            )));
        }
        Ok(())
    }

    /// Opens the session and starts the inbound reader thread.
    pub fn connect(&mut self) -> Result<()> {
        self.expect_state(&[SessionState::Unconnected], "connect")?;

        let stream = TcpStream::connect((self.host.as_str(), self.port)).map_err(|e| {
            self.state = SessionState::Failed;
            Error::Connection(format!("{}:{}: {e}", self.host, self.port))
        })?;
        let inbound = stream.try_clone().map_err(|e| {
            self.state = SessionState::Failed;
            Error::Connection(format!("cloning session stream: {e}"))
        })?;

        let collectors = std::mem::take(&mut self.collectors);
        let metrics = self.metrics.clone();
        self.reader = Some(std::thread::spawn(move || {
            run_inbound(inbound, collectors, metrics)
        }));
        self.stream = Some(stream);
        self.state = SessionState::Connected;
        info!("connected to {}:{}", self.host, self.port);
        Ok(())
    }

    /// Transmits the serialized pipeline configuration document.
    pub fn send_configuration(&mut self, document: &str) -> Result<()> {
        self.expect_state(&[SessionState::Connected], "send_configuration")?;
        self.write(|stream| protocol::write_text(stream, protocol::MESSAGE_CONFIG_SCRIPT, document))?;
        self.state = SessionState::ConfigSent;
        debug!("configuration sent ({} bytes)", document.len());
        Ok(())
    }

    /// Transmits the shared header parameter blob, once, ahead of any
    /// data message.
    pub fn send_parameters(&mut self, blob: &str) -> Result<()> {
        self.expect_state(&[SessionState::ConfigSent], "send_parameters")?;
        self.write(|stream| protocol::write_text(stream, protocol::MESSAGE_PARAMETERS, blob))
    }

    pub fn send_acquisition(&mut self, acq: &AcquisitionRecord) -> Result<()> {
        self.expect_state(
            &[SessionState::ConfigSent, SessionState::Streaming],
            "send_acquisition",
        )?;
        self.write(|stream| protocol::write_acquisition(stream, acq))?;
        self.state = SessionState::Streaming;
        self.metrics.record_sent();
        Ok(())
    }

    pub fn send_image(&mut self, image: &ImageWrap) -> Result<()> {
        self.expect_state(
            &[SessionState::ConfigSent, SessionState::Streaming],
            "send_image",
        )?;
        self.write(|stream| protocol::write_image(stream, image))?;
        self.state = SessionState::Streaming;
        self.metrics.record_sent();
        Ok(())
    }

    /// Sends the end-of-stream marker. Exactly once, after all items.
    pub fn close(&mut self) -> Result<()> {
        self.expect_state(
            &[SessionState::ConfigSent, SessionState::Streaming],
            "close",
        )?;
        self.write(protocol::write_close)?;
        self.state = SessionState::Closing;
        debug!("end-of-stream sent");
        Ok(())
    }

    /// Blocks until the remote confirms completion and every result
    /// has been collected, or the session terminated abnormally.
    pub fn wait(&mut self) -> Result<()> {
        self.expect_state(&[SessionState::Closing], "wait")?;
        let handle = self.reader.take().ok_or_else(|| {
            Error::Stream("session has no inbound reader to wait for".into())
        })?;
        match handle.join() {
            Ok(Ok(())) => {
                self.state = SessionState::Completed;
                let (sent, received) = self.metrics.snapshot();
                info!("session completed, {sent} items sent, {received} results collected");
                Ok(())
            }
            Ok(Err(e)) => {
                self.state = SessionState::Failed;
                Err(e)
            }
            Err(_) => {
                self.state = SessionState::Failed;
                Err(Error::Stream("inbound reader thread panicked".into()))
            }
        }
    }

    fn expect_state(&self, allowed: &[SessionState], operation: &str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::Configuration(format!(
                "{operation} called in session state {:?}",
                self.state
            )))
        }
    }

    fn write<F>(&mut self, op: F) -> Result<()>
    where
        F: FnOnce(&mut TcpStream) -> Result<()>,
    {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::Stream("session stream is gone".into()))?;
        op(stream).map_err(|e| {
            self.state = SessionState::Failed;
            e
        })
    }
}

fn run_inbound(
    mut stream: TcpStream,
    mut collectors: HashMap<u16, Box<dyn MessageCollector>>,
    metrics: Arc<TransferMetrics>,
) -> Result<()> {
    loop {
        let tag = protocol::read_id(&mut stream)?;
        if tag == protocol::MESSAGE_CLOSE {
            debug!("remote finished its result stream");
            return Ok(());
        }
        let collector = collectors.get_mut(&tag).ok_or_else(|| {
            Error::Protocol(format!("no collector registered for inbound message tag {tag}"))
        })?;
        collector.collect(&mut stream)?;
        metrics.record_received();
    }
}
