//! Common Helper Functions
//!
//! Preset lookup for the CLI and host <-> tensor conversions shared by the
//! models and metrics.

use burn::tensor::{backend::Backend, Int, Tensor, TensorData};

use crate::error::{QrnnError, Result};
use crate::model::{LanguageModelConfig, Seq2SeqConfig, UNK_ID};

/// Returns the language model preset for a size string.
pub fn get_model_config(preset: &str, vocab_size: usize) -> LanguageModelConfig {
    match preset {
        "small" | "s" => LanguageModelConfig::small(vocab_size),
        "medium" | "m" => LanguageModelConfig::medium(vocab_size),
        _ => {
            tracing::warn!(preset, "unknown preset, falling back to small");
            LanguageModelConfig::small(vocab_size)
        }
    }
}

/// Returns the translation preset for a size string.
pub fn get_seq2seq_config(preset: &str, vocab_size: usize) -> Seq2SeqConfig {
    match preset {
        "small" | "s" => Seq2SeqConfig::small(vocab_size, vocab_size),
        "medium" | "m" => Seq2SeqConfig::medium(vocab_size, vocab_size),
        _ => {
            tracing::warn!(preset, "unknown preset, falling back to small");
            Seq2SeqConfig::small(vocab_size, vocab_size)
        }
    }
}

/// Creates a `[batch, time]` id tensor from equal-length rows.
pub fn create_batch_tensor<B: Backend>(data: &[Vec<usize>], device: &B::Device) -> Result<Tensor<B, 2, Int>> {
    let batch_size = data.len();
    let seq_len = data.first().map(Vec::len).unwrap_or(0);

    if batch_size == 0 || seq_len == 0 {
        return Err(QrnnError::shape("token batch", "[>=1, >=1]", format!("[{}, {}]", batch_size, seq_len)));
    }
    if let Some(row) = data.iter().find(|row| row.len() != seq_len) {
        return Err(QrnnError::shape("token row", seq_len, row.len()));
    }

    let flat: Vec<i64> = data.iter().flatten().map(|&x| x as i64).collect();
    let tensor: Tensor<B, 1, Int> = Tensor::from_data(TensorData::new(flat, [batch_size * seq_len]), device);

    Ok(tensor.reshape([batch_size, seq_len]))
}

/// Replaces ids outside `0..vocab_size` with `UNK_ID`.
pub fn map_unknown(ids: &[usize], vocab_size: usize) -> Vec<usize> {
    ids.iter()
        .map(|&id| if id < vocab_size { id } else { UNK_ID })
        .collect()
}

/// Creates a `[batch]` id tensor.
pub fn create_token_tensor<B: Backend>(ids: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let flat: Vec<i64> = ids.iter().map(|&x| x as i64).collect();
    let len = flat.len();
    Tensor::from_data(TensorData::new(flat, [len]), device)
}

pub fn tensor_to_vec<B: Backend, const D: usize>(t: Tensor<B, D>) -> Result<Vec<f32>> {
    t.into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| QrnnError::TensorData(format!("{:?}", e)))
}

pub fn ids_to_vec<B: Backend, const D: usize>(t: Tensor<B, D, Int>) -> Result<Vec<i64>> {
    t.into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| QrnnError::TensorData(format!("{:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    #[test]
    fn test_create_batch_tensor() {
        let device = NdArrayDevice::Cpu;
        let batch = create_batch_tensor::<NdArray>(&[vec![4, 5, 0], vec![6, 7, 8]], &device).unwrap();
        assert_eq!(batch.dims(), [2, 3]);
        assert_eq!(ids_to_vec(batch).unwrap(), vec![4, 5, 0, 6, 7, 8]);
    }

    #[test]
    fn test_create_batch_tensor_rejects_ragged_rows() {
        let device = NdArrayDevice::Cpu;
        assert!(create_batch_tensor::<NdArray>(&[vec![4, 5], vec![6]], &device).is_err());
        assert!(create_batch_tensor::<NdArray>(&[], &device).is_err());
    }

    #[test]
    fn test_map_unknown() {
        assert_eq!(map_unknown(&[0, 4, 9, 12], 10), vec![0, 4, 9, UNK_ID]);
        assert_eq!(map_unknown(&[4, 5], 4), vec![UNK_ID, UNK_ID]);
    }

    #[test]
    fn test_unknown_preset_falls_back() {
        assert_eq!(get_model_config("huge", 50).hidden_dim, LanguageModelConfig::small(50).hidden_dim);
        assert_eq!(get_model_config("medium", 50).hidden_dim, 640);
    }
}
