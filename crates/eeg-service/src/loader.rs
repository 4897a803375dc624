//! Recording decode seam
//!
//! Turning clinical container formats (EDF/BDF, CNT, BrainVision, EEGLAB,
//! FIF) into a channel matrix is an external capability. The service
//! dispatches on the declared format tag; one native raw-matrix codec ships
//! in-tree so the pipeline has a complete end-to-end path, and anything
//! without a registered decoder is a decode error naming the format.

use eeg_core::{ChannelInfo, EegError, EegResult, EegSignal};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Decoder for one or more recording formats
pub trait SignalLoader: Send + Sync {
    /// Whether this loader accepts the given lowercase format tag
    fn supports(&self, format: &str) -> bool;

    fn load(&self, path: &Path) -> EegResult<EegSignal>;
}

/// Ordered set of registered decoders; first match wins
pub struct LoaderRegistry {
    loaders: Vec<Box<dyn SignalLoader>>,
}

impl LoaderRegistry {
    /// Registry with the native codec only
    pub fn with_native() -> Self {
        LoaderRegistry {
            loaders: vec![Box::new(RawRecordingLoader)],
        }
    }

    pub fn register(&mut self, loader: Box<dyn SignalLoader>) {
        self.loaders.push(loader);
    }

    pub fn load(&self, path: &Path, format: &str) -> EegResult<EegSignal> {
        let tag = format.trim().trim_start_matches('.').to_lowercase();
        for loader in &self.loaders {
            if loader.supports(&tag) {
                return loader.load(path);
            }
        }
        Err(EegError::decode(format!(
            "unsupported recording format: {}",
            tag
        )))
    }
}

/// Header line of the native raw-matrix container
#[derive(Debug, Serialize, Deserialize)]
struct RawHeader {
    sampling_rate: f32,
    channels: Vec<ChannelInfo>,
}

/// Native container: one JSON header line, then little-endian f32 samples
/// in channel-major order.
pub struct RawRecordingLoader;

impl SignalLoader for RawRecordingLoader {
    fn supports(&self, format: &str) -> bool {
        format == "raw"
    }

    fn load(&self, path: &Path) -> EegResult<EegSignal> {
        let bytes = std::fs::read(path)
            .map_err(|e| EegError::decode(format!("cannot read {}: {}", path.display(), e)))?;
        decode_raw_recording(&bytes)
    }
}

/// Decode the native container from bytes
pub fn decode_raw_recording(bytes: &[u8]) -> EegResult<EegSignal> {
    let newline = bytes
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| EegError::decode("raw recording is missing its header line"))?;

    let header: RawHeader = serde_json::from_slice(&bytes[..newline])
        .map_err(|e| EegError::decode(format!("bad raw recording header: {}", e)))?;

    let payload = &bytes[newline + 1..];
    if payload.len() % 4 != 0 {
        return Err(EegError::decode(format!(
            "raw payload length {} is not a whole number of samples",
            payload.len()
        )));
    }

    let data: Vec<f32> = payload
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if header.channels.is_empty() || data.len() % header.channels.len() != 0 {
        return Err(EegError::decode(format!(
            "raw payload of {} samples does not tile {} channels",
            data.len(),
            header.channels.len()
        )));
    }

    EegSignal::new(data, header.channels, header.sampling_rate)
        .map_err(|e| EegError::decode(e.to_string()))
}

/// Encode a signal into the native container (the producer side; used by
/// upload tooling and tests)
pub fn encode_raw_recording(signal: &EegSignal) -> EegResult<Vec<u8>> {
    let header = RawHeader {
        sampling_rate: signal.sampling_rate(),
        channels: signal.channels().to_vec(),
    };
    let mut bytes = serde_json::to_vec(&header)
        .map_err(|e| EegError::decode(format!("cannot encode header: {}", e)))?;
    bytes.push(b'\n');

    for ch in 0..signal.channel_count() {
        for sample in signal.channel_data(ch)? {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
    }

    Ok(bytes)
}
