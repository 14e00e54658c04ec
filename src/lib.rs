//! QRNN: quasi-recurrent neural network layers and models on burn

pub mod backend;
pub mod error;
pub mod helpers;
pub mod model;
pub mod qrnn;
pub mod utils;

// Main re-exports
pub use error::{QrnnError, Result};
pub use model::{
    EvalMetrics, Evaluator, LanguageModelConfig, QrnnLanguageModel, QrnnSeq2Seq, Seq2SeqConfig,
    TokenModel,
};
pub use qrnn::{
    EncoderMemory, LayerKind, Mode, Pooling, Qrnn, QrnnConfig, QrnnInput, QrnnOutput, QrnnState,
    QrnnStep, ZoneoutSampler,
};

/// Name of the active backend
pub fn backend_name() -> &'static str {
    "CPU (NdArray)"
}
