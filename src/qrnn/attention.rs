// src/qrnn/attention.rs
//! Causal global attention for the attentive decoder.
//!
//! Decoder step at absolute position `p` attends over encoder positions
//! `0 ..= min(p, T_enc - 1)`. Positions outside the window are sliced away
//! before the softmax, so their weight is exactly zero. Padded positions inside
//! the window also get zero weight; a window holding only padding yields
//! all-zero weights and a zero readout. The window grows with `p`; the whole
//! pass is O(T^2) and is recomputed on every call.

use burn::tensor::{activation, backend::Backend, Tensor};

/// Score given to padded encoder positions before the softmax.
const MASKED_SCORE: f32 = -1e9;

/// Floor for the renormalising denominator of a fully padded window.
const MIN_MASS: f32 = 1e-12;

/// Attention readout for a sequence of decoder contexts.
#[derive(Debug, Clone)]
pub struct Attended<B: Backend> {
    /// Weighted encoder summaries `k_t`, one `[batch, channels]` per step.
    pub readouts: Vec<Tensor<B, 2>>,
    /// `[batch, steps, T_enc]`, zero beyond each step's window.
    pub weights: Tensor<B, 3>,
}

/// `contexts`: `[batch, channels, steps]` ungated contexts `c_t`.
/// `encoder_states`: `[batch, channels, T_enc]`.
/// `encoder_mask`: optional `[batch, T_enc]`, 1 for real tokens, 0 for pad.
/// `offset`: absolute position of the first step in `contexts`.
pub fn attend<B: Backend>(
    contexts: &Tensor<B, 3>,
    encoder_states: &Tensor<B, 3>,
    encoder_mask: Option<&Tensor<B, 2>>,
    offset: usize,
) -> Attended<B> {
    let [batch, channels, steps] = contexts.dims();
    let [_, _, enc_len] = encoder_states.dims();
    let device = contexts.device();

    let mut readouts = Vec::with_capacity(steps);
    let mut weights = Vec::with_capacity(steps);

    for t in 0..steps {
        let window = (offset + t + 1).min(enc_len);

        let c_t = contexts.clone().narrow(2, t, 1).reshape([batch, 1, channels]);
        let h = encoder_states.clone().narrow(2, 0, window);

        // [batch, 1, channels] @ [batch, channels, window]
        let scores = c_t.matmul(h.clone());
        let alpha = match encoder_mask {
            Some(mask) => {
                let keep = mask.clone().narrow(1, 0, window).reshape([batch, 1, window]);
                let scores = scores.mask_fill(keep.clone().equal_elem(0.0), MASKED_SCORE);
                let alpha = activation::softmax(scores, 2) * keep;
                let mass = alpha.clone().sum_dim(2).clamp_min(MIN_MASS);
                alpha / mass
            }
            None => activation::softmax(scores, 2),
        };

        // [batch, channels, window] @ [batch, window, 1]
        let k_t = h.matmul(alpha.clone().swap_dims(1, 2)).reshape([batch, channels]);
        readouts.push(k_t);

        let row = if window < enc_len {
            Tensor::cat(
                vec![alpha, Tensor::zeros([batch, 1, enc_len - window], &device)],
                2,
            )
        } else {
            alpha
        };
        weights.push(row);
    }

    Attended {
        readouts,
        weights: Tensor::cat(weights, 1),
    }
}
