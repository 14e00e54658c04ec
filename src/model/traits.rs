//! TokenModel trait: shared interface for models that map token ids to
//! next-token logits.
//!
//! Lets the `Evaluator` work with any such model without knowing its layers.

use burn::{
    module::Module,
    tensor::{backend::Backend, Int, Tensor},
};

use crate::error::Result;
use crate::qrnn::Mode;

/// Bounds: `Module<B>` (for `valid()`, records, optimizers), `Clone`, `Send`, `Sized`.
pub trait TokenModel<B: Backend>: Module<B> + Clone + Send + Sized + 'static {
    /// Input: `[batch_size, seq_len]` token ids.
    /// Output: `[batch_size, seq_len, vocab_size]` logits.
    fn forward_logits(&self, input_ids: Tensor<B, 2, Int>, mode: &mut Mode) -> Result<Tensor<B, 3>>;

    /// Number of trainable parameters in the model.
    fn num_parameters(&self) -> usize;

    /// Vocabulary size (output dimension).
    fn vocab_size(&self) -> usize;

    /// Width of the recurrent layers.
    fn hidden_dim(&self) -> usize;
}
