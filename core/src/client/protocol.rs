//! Wire framing for the remote pipeline-engine session.
//!
//! Every message starts with a little-endian u16 identifier. The
//! identifiers and the role of each frame follow the Gadgetron stream
//! protocol: configuration script and parameter blob ahead of the data
//! messages, typed data frames, and an explicit close marker.

use crate::data::image::with_image;
use crate::data::{AcquisitionRecord, DataType, Image, ImageWrap, Sample};
use crate::{Error, Result};
use std::io::{Read, Write};

pub const MESSAGE_CONFIG_SCRIPT: u16 = 2;
pub const MESSAGE_PARAMETERS: u16 = 3;
pub const MESSAGE_CLOSE: u16 = 4;
pub const MESSAGE_ACQUISITION: u16 = 1008;
pub const MESSAGE_IMAGE: u16 = 1022;

/// Upper bound on text payloads; anything larger is a framing error.
const MAX_TEXT_LEN: u32 = 1 << 24;

fn stream_err(context: &str, e: std::io::Error) -> Error {
    Error::Stream(format!("{context}: {e}"))
}

/// Reads the next message identifier. A socket that drops before the
/// close frame surfaces here as a stream error.
pub fn read_id<R: Read>(reader: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader
        .read_exact(&mut buf)
        .map_err(|e| stream_err("reading message id", e))?;
    Ok(u16::from_le_bytes(buf))
}

fn write_id<W: Write>(writer: &mut W, id: u16) -> Result<()> {
    writer
        .write_all(&id.to_le_bytes())
        .map_err(|e| stream_err("writing message id", e))
}

/// Sends a length-prefixed text frame (configuration or parameters).
pub fn write_text<W: Write>(writer: &mut W, id: u16, text: &str) -> Result<()> {
    write_id(writer, id)?;
    let len = text.len() as u32;
    writer
        .write_all(&len.to_le_bytes())
        .map_err(|e| stream_err("writing text length", e))?;
    writer
        .write_all(text.as_bytes())
        .map_err(|e| stream_err("writing text payload", e))
}

/// Reads the payload of a text frame, the identifier already consumed.
pub fn read_text<R: Read>(reader: &mut R) -> Result<String> {
    let mut buf = [0u8; 4];
    reader
        .read_exact(&mut buf)
        .map_err(|e| stream_err("reading text length", e))?;
    let len = u32::from_le_bytes(buf);
    if len > MAX_TEXT_LEN {
        return Err(Error::Protocol(format!(
            "text payload of {len} bytes exceeds the frame limit"
        )));
    }
    let mut bytes = vec![0u8; len as usize];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| stream_err("reading text payload", e))?;
    String::from_utf8(bytes).map_err(|e| Error::Protocol(format!("text payload not UTF-8: {e}")))
}

pub fn write_close<W: Write>(writer: &mut W) -> Result<()> {
    write_id(writer, MESSAGE_CLOSE)
}

/// Sends one acquisition record: fixed header fields, then the
/// coil-major complex sample block.
pub fn write_acquisition<W: Write>(writer: &mut W, acq: &AcquisitionRecord) -> Result<()> {
    write_id(writer, MESSAGE_ACQUISITION)?;

    let mut frame = Vec::with_capacity(16 + acq.samples().len() * 8);
    frame.extend_from_slice(&acq.flags().to_le_bytes());
    frame.extend_from_slice(&acq.idx().kspace_encode_step.to_le_bytes());
    frame.extend_from_slice(&acq.idx().repetition.to_le_bytes());
    frame.extend_from_slice(&acq.idx().slice.to_le_bytes());
    frame.extend_from_slice(&acq.num_samples().to_le_bytes());
    frame.extend_from_slice(&acq.active_channels().to_le_bytes());
    for z in acq.samples() {
        frame.extend_from_slice(&z.re.to_le_bytes());
        frame.extend_from_slice(&z.im.to_le_bytes());
    }
    writer
        .write_all(&frame)
        .map_err(|e| stream_err("writing acquisition frame", e))
}

/// Reads one acquisition record, the identifier already consumed.
pub fn read_acquisition<R: Read + ?Sized>(reader: &mut R) -> Result<AcquisitionRecord> {
    let mut header = [0u8; 18];
    reader
        .read_exact(&mut header)
        .map_err(|e| stream_err("reading acquisition header", e))?;

    let flags = u64::from_le_bytes(header[0..8].try_into().unwrap());
    let kspace_encode_step = u16::from_le_bytes(header[8..10].try_into().unwrap());
    let repetition = u16::from_le_bytes(header[10..12].try_into().unwrap());
    let slice = u16::from_le_bytes(header[12..14].try_into().unwrap());
    let num_samples = u16::from_le_bytes(header[14..16].try_into().unwrap());
    let active_channels = u16::from_le_bytes(header[16..18].try_into().unwrap());

    let mut acq = AcquisitionRecord::new(num_samples, active_channels);
    acq.set_raw_flags(flags);
    acq.idx_mut().kspace_encode_step = kspace_encode_step;
    acq.idx_mut().repetition = repetition;
    acq.idx_mut().slice = slice;

    let mut bytes = vec![0u8; acq.samples().len() * 8];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| stream_err("reading acquisition samples", e))?;
    for (z, chunk) in acq.samples_mut().iter_mut().zip(bytes.chunks_exact(8)) {
        z.re = f32::from_le_bytes(chunk[0..4].try_into().unwrap());
        z.im = f32::from_le_bytes(chunk[4..8].try_into().unwrap());
    }
    Ok(acq)
}

/// Sends one type-erased image: sample-type tag, dimensions, then the
/// raw sample block in the tag's wire encoding.
pub fn write_image<W: Write>(writer: &mut W, image: &ImageWrap) -> Result<()> {
    write_id(writer, MESSAGE_IMAGE)?;

    let mut frame = Vec::new();
    frame.extend_from_slice(&image.data_type().tag().to_le_bytes());
    frame.extend_from_slice(&(image.cols() as u16).to_le_bytes());
    frame.extend_from_slice(&(image.rows() as u16).to_le_bytes());
    with_image!(image, im => encode_samples(im, &mut frame));
    writer
        .write_all(&frame)
        .map_err(|e| stream_err("writing image frame", e))
}

fn encode_samples<T: Sample>(im: &Image<T>, frame: &mut Vec<u8>) {
    for &sample in im.data() {
        sample.write_le(frame);
    }
}

/// Reads one type-erased image, the identifier already consumed.
pub fn read_image<R: Read + ?Sized>(reader: &mut R) -> Result<ImageWrap> {
    let mut header = [0u8; 6];
    reader
        .read_exact(&mut header)
        .map_err(|e| stream_err("reading image header", e))?;
    let data_type = DataType::from_tag(u16::from_le_bytes(header[0..2].try_into().unwrap()))?;
    let cols = u16::from_le_bytes(header[2..4].try_into().unwrap()) as usize;
    let rows = u16::from_le_bytes(header[4..6].try_into().unwrap()) as usize;

    let mut image = ImageWrap::zeroed(data_type, cols, rows);
    with_image!(&mut image, im => decode_samples(im, reader))?;
    Ok(image)
}

fn decode_samples<T: Sample, R: Read + ?Sized>(im: &mut Image<T>, reader: &mut R) -> Result<()> {
    let mut bytes = vec![0u8; im.data().len() * T::WIRE_SIZE];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| stream_err("reading image samples", e))?;
    for (sample, chunk) in im.data_mut().iter_mut().zip(bytes.chunks_exact(T::WIRE_SIZE)) {
        *sample = T::read_le(chunk);
    }
    Ok(())
}
