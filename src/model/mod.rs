mod config;
mod evaluator;
mod language_model;
mod metrics;
mod seq2seq;
mod traits;

pub use config::{layer_parameters, LanguageModelConfig, Seq2SeqConfig};
pub use evaluator::{EvalMetrics, Evaluator};
pub use language_model::QrnnLanguageModel;
pub use metrics::{
    accuracy, masked_cross_entropy, mean_word_error_rate, perplexity, word_error_rate,
};
pub use seq2seq::{Encoded, QrnnSeq2Seq};
pub use traits::TokenModel;

use burn::nn::Embedding;
use burn::tensor::{backend::Backend, Int, Tensor};

// Reserved token ids shared by every vocabulary.
pub const PAD_ID: usize = 0;
pub const UNK_ID: usize = 1;
/// Also the decoder's start symbol.
pub const BOS_ID: usize = 2;
pub const EOS_ID: usize = 3;

/// `[batch, time]` float mask: 1 for real tokens, 0 for `PAD_ID`.
pub fn pad_mask<B: Backend>(tokens: &Tensor<B, 2, Int>) -> Tensor<B, 2> {
    tokens.clone().equal_elem(PAD_ID as i64).bool_not().float()
}

/// Embeds `tokens`, zeroes pad positions and lays the result out channels-first
/// (`[batch, embedding_dim, time]`).
pub(crate) fn embed_tokens<B: Backend>(
    embedding: &Embedding<B>,
    tokens: Tensor<B, 2, Int>,
    mask: &Tensor<B, 2>,
) -> Tensor<B, 3> {
    let x = embedding.forward(tokens) * mask.clone().unsqueeze_dim::<3>(2);
    x.swap_dims(1, 2)
}
