//! Common test utilities and helpers
//!
//! Shared helpers for integration tests.
#![allow(dead_code)]

use burn::backend::ndarray::{NdArray, NdArrayDevice};
use burn::backend::Autodiff;
use burn::tensor::{backend::Backend, Distribution, Int, Tensor};

use qrnn::{LayerKind, Pooling, QrnnConfig};

pub type TestBackend = NdArray;
pub type TestAutodiffBackend = Autodiff<NdArray>;

pub fn test_device() -> NdArrayDevice {
    NdArrayDevice::Cpu
}

/// Small layer config with non-trivial weights
pub fn test_layer_config(kind: LayerKind, pooling: Pooling, kernel_size: usize) -> QrnnConfig {
    QrnnConfig::new(3, 4)
        .with_kind(kind)
        .with_pooling(pooling)
        .with_kernel_size(kernel_size)
        .with_wstd(0.5)
}

/// Minimal language model config for fast tests
pub fn test_lm_config() -> qrnn::LanguageModelConfig {
    qrnn::LanguageModelConfig::new(32)
        .with_embedding_dim(8)
        .with_hidden_dim(8)
        .with_num_layers(2)
        .with_kernel_size(2)
        .with_wstd(0.3)
}

pub fn test_seq2seq_config(attention: bool) -> qrnn::Seq2SeqConfig {
    qrnn::Seq2SeqConfig::new(20, 24)
        .with_embedding_dim(8)
        .with_hidden_dim(8)
        .with_num_layers(2)
        .with_attention(attention)
        .with_wstd(0.3)
}

pub fn random_input<B: Backend>(shape: [usize; 3], device: &B::Device) -> Tensor<B, 3> {
    Tensor::random(shape, Distribution::Normal(0.0, 1.0), device)
}

/// Random token ids in `[4, vocab)` (0..=3 are reserved)
pub fn random_tokens(batch: usize, seq_len: usize, vocab: usize) -> Vec<Vec<usize>> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..batch)
        .map(|_| (0..seq_len).map(|_| rng.gen_range(4..vocab)).collect())
        .collect()
}

pub fn tokens<B: Backend>(rows: &[Vec<usize>], device: &B::Device) -> Tensor<B, 2, Int> {
    qrnn::helpers::create_batch_tensor(rows, device).unwrap()
}

pub fn values<B: Backend, const D: usize>(t: Tensor<B, D>) -> Vec<f32> {
    t.into_data().convert::<f32>().to_vec::<f32>().unwrap()
}

pub fn assert_close(got: &[f32], want: &[f32], tol: f32) {
    assert_eq!(got.len(), want.len(), "length mismatch");
    for (i, (g, w)) in got.iter().zip(want.iter()).enumerate() {
        assert!((g - w).abs() <= tol, "index {}: got {}, want {}", i, g, w);
    }
}
