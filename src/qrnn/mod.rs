//! Quasi-recurrent layers: causal convolution gates + pooling recurrence.

pub mod attention;
pub mod config;
pub mod gates;
pub mod layer;
pub mod pooling;
pub mod zoneout;

pub use config::{LayerKind, Pooling, QrnnConfig};
pub use layer::{EncoderMemory, Mode, Qrnn, QrnnInput, QrnnOutput, QrnnState, QrnnStep};
pub use zoneout::ZoneoutSampler;
