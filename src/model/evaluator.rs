//! Evaluator: held-out metrics for language models and translators

use burn::tensor::{backend::Backend, ElementConversion, Int, Tensor};

use super::metrics::{accuracy, masked_cross_entropy, mean_word_error_rate, perplexity};
use super::seq2seq::QrnnSeq2Seq;
use super::traits::TokenModel;
use super::PAD_ID;
use crate::error::{QrnnError, Result};
use crate::helpers::ids_to_vec;
use crate::qrnn::Mode;

/// Evaluation metrics
#[derive(Debug, Clone, Default)]
pub struct EvalMetrics {
    pub loss: f32,
    pub perplexity: f32,
    pub accuracy: f32,
    pub tokens_evaluated: usize,
}

impl std::fmt::Display for EvalMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Loss: {:.4} | PPL: {:.2} | Acc: {:.2}% | Tokens: {}",
            self.loss,
            self.perplexity,
            self.accuracy * 100.0,
            self.tokens_evaluated
        )
    }
}

/// Runs models in inference mode over a bounded number of batches.
pub struct Evaluator {
    max_batches: usize,
}

impl Evaluator {
    pub fn new(max_batches: usize) -> Self {
        Self { max_batches }
    }

    /// `batches` are `(input, target)` pairs of `[batch, time]` ids.
    ///
    /// Loss and accuracy are token-weighted; perplexity is the mean of the
    /// per-batch perplexities.
    pub fn evaluate<B: Backend, M: TokenModel<B>>(
        &self,
        model: &M,
        batches: &[(Tensor<B, 2, Int>, Tensor<B, 2, Int>)],
    ) -> Result<EvalMetrics> {
        let mut total_loss = 0.0f64;
        let mut total_hits = 0.0f64;
        let mut total_tokens = 0usize;
        let mut ppl_sum = 0.0f64;
        let mut num_batches = 0usize;

        for (input, target) in batches.iter().take(self.max_batches) {
            let logits = model.forward_logits(input.clone(), &mut Mode::Inference)?;

            let tokens = ids_to_vec(target.clone())?
                .iter()
                .filter(|&&id| id != PAD_ID as i64)
                .count();

            let loss: f32 = masked_cross_entropy(logits.clone(), target.clone())?
                .into_scalar()
                .elem();
            let acc = accuracy(logits.clone(), target.clone())?;
            let ppl = perplexity(logits, target.clone())?;

            total_loss += loss as f64 * tokens as f64;
            total_hits += acc as f64 * tokens as f64;
            total_tokens += tokens;
            ppl_sum += ppl as f64;
            num_batches += 1;
        }

        if total_tokens == 0 {
            return Err(QrnnError::Numerical("no tokens to evaluate".into()));
        }

        let metrics = EvalMetrics {
            loss: (total_loss / total_tokens as f64) as f32,
            perplexity: (ppl_sum / num_batches as f64) as f32,
            accuracy: (total_hits / total_tokens as f64) as f32,
            tokens_evaluated: total_tokens,
        };

        tracing::info!(batches = num_batches, %metrics, "evaluation done");
        Ok(metrics)
    }

    /// Mean word error rate of greedy translations against references.
    ///
    /// Each entry pairs a `[batch, T_src]` source tensor with one reference
    /// sentence (without BOS/EOS) per row.
    pub fn evaluate_translation<B: Backend>(
        &self,
        model: &QrnnSeq2Seq<B>,
        batches: &[(Tensor<B, 2, Int>, Vec<Vec<usize>>)],
        max_len: usize,
    ) -> Result<f32> {
        let mut pairs = Vec::new();

        for (source, references) in batches.iter().take(self.max_batches) {
            let [batch, _] = source.dims();
            if references.len() != batch {
                return Err(QrnnError::shape("references", batch, references.len()));
            }
            let hypotheses = model.translate_greedy(source.clone(), max_len)?;
            pairs.extend(hypotheses.into_iter().zip(references.iter().cloned()));
        }

        let wer = mean_word_error_rate(&pairs)?;
        tracing::info!(sentences = pairs.len(), wer, "translation evaluation done");
        Ok(wer)
    }
}
