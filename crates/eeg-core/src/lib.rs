//! EEG-Core: foundation types for the EEG analysis service
//!
//! Signal container, montage heuristics, the analysis-request data model,
//! and the shared error type.

pub mod cancel;
pub mod error;
pub mod montage;
pub mod request;
pub mod signal;

pub use cancel::CancelToken;
pub use error::{EegError, EegResult};
pub use montage::{is_frontal, is_left, is_right, Region};
pub use request::{
    AnalysisDetails, AnalysisRequest, AnalysisStatus, KeyFeatures, Label, Lifecycle, Prediction,
    PredictionSource,
};
pub use signal::{ChannelInfo, ChannelKind, ChannelStats, EegSignal};
