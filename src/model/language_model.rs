// src/model/language_model.rs
//! Stacked QRNN language model: embedding → QRNN layers → vocabulary head.

use burn::{
    module::{Ignored, Module},
    nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig, Linear, LinearConfig},
    tensor::{backend::Backend, Int, Tensor},
};

use super::config::LanguageModelConfig;
use super::traits::TokenModel;
use super::{embed_tokens, pad_mask};
use crate::error::{QrnnError, Result};
use crate::qrnn::{Mode, Qrnn, QrnnInput, QrnnState};

#[derive(Clone, Debug)]
pub struct LmSettings {
    pub vocab_size: usize,
    pub hidden_dim: usize,
    pub densely_connected: bool,
}

#[derive(Module, Debug)]
pub struct QrnnLanguageModel<B: Backend> {
    embedding: Embedding<B>,
    layers: Vec<Qrnn<B>>,
    dropout: Dropout,
    output: Linear<B>,
    settings: Ignored<LmSettings>,
}

impl<B: Backend> QrnnLanguageModel<B> {
    pub fn new(config: &LanguageModelConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;

        let layers = config
            .layer_configs()
            .iter()
            .map(|layer| layer.init(device))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            vocab_size = config.vocab_size,
            num_layers = config.num_layers,
            pooling = %config.pooling,
            "initialized QRNN language model"
        );

        Ok(Self {
            embedding: EmbeddingConfig::new(config.vocab_size, config.embedding_dim).init(device),
            layers,
            dropout: DropoutConfig::new(config.dropout).init(),
            output: LinearConfig::new(config.hidden_dim, config.vocab_size).init(device),
            settings: Ignored(LmSettings {
                vocab_size: config.vocab_size,
                hidden_dim: config.hidden_dim,
                densely_connected: config.densely_connected,
            }),
        })
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// One empty state per layer.
    pub fn empty_states(&self) -> Vec<QrnnState<B>> {
        self.layers.iter().map(|_| QrnnState::empty()).collect()
    }

    /// `[batch, time]` token ids → `[batch, time, vocab]` logits, from fresh
    /// states.
    pub fn forward(&self, tokens: Tensor<B, 2, Int>, mode: &mut Mode) -> Result<Tensor<B, 3>> {
        let states = self.empty_states();
        let (logits, _) = self.forward_with_state(tokens, &states, mode)?;
        Ok(logits)
    }

    /// Same as [`forward`](Self::forward) but continues from `states` and
    /// returns their successors.
    pub fn forward_with_state(
        &self,
        tokens: Tensor<B, 2, Int>,
        states: &[QrnnState<B>],
        mode: &mut Mode,
    ) -> Result<(Tensor<B, 3>, Vec<QrnnState<B>>)> {
        if states.len() != self.layers.len() {
            return Err(QrnnError::shape("layer states", self.layers.len(), states.len()));
        }

        let mask = pad_mask(&tokens);
        let input = QrnnInput::new().with_skip_mask(mask.clone());
        let mut x = embed_tokens(&self.embedding, tokens, &mask);
        let mut next = Vec::with_capacity(self.layers.len());

        for (layer, state) in self.layers.iter().zip(states) {
            let layer_input = if mode.is_train() {
                self.dropout.forward(x.clone())
            } else {
                x.clone()
            };

            let out = layer.forward(layer_input, &input, state, mode)?;

            x = if self.settings.densely_connected && layer.in_channels() == layer.out_channels() {
                out.hiddens + x
            } else {
                out.hiddens
            };
            next.push(out.state);
        }

        // [batch, C, T] -> [batch, T, vocab]
        let logits = self.output.forward(x.swap_dims(1, 2));
        Ok((logits, next))
    }

    /// Streaming form: one token per row (`[batch]`) → `[batch, vocab]`.
    pub fn step(
        &self,
        tokens: Tensor<B, 1, Int>,
        states: &[QrnnState<B>],
        mode: &mut Mode,
    ) -> Result<(Tensor<B, 2>, Vec<QrnnState<B>>)> {
        let [batch] = tokens.dims();
        let (logits, next) = self.forward_with_state(tokens.reshape([batch, 1]), states, mode)?;
        Ok((logits.reshape([batch, self.settings.vocab_size]), next))
    }
}

impl<B: Backend> TokenModel<B> for QrnnLanguageModel<B> {
    fn forward_logits(&self, input_ids: Tensor<B, 2, Int>, mode: &mut Mode) -> Result<Tensor<B, 3>> {
        self.forward(input_ids, mode)
    }

    fn num_parameters(&self) -> usize {
        self.num_params()
    }

    fn vocab_size(&self) -> usize {
        self.settings.vocab_size
    }

    fn hidden_dim(&self) -> usize {
        self.settings.hidden_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LanguageModelConfig;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    type TestBackend = NdArray;

    fn tiny() -> LanguageModelConfig {
        LanguageModelConfig::new(11)
            .with_embedding_dim(4)
            .with_hidden_dim(6)
            .with_num_layers(2)
            .with_kernel_size(2)
    }

    #[test]
    fn test_num_parameters_matches_config() {
        let device = NdArrayDevice::Cpu;
        let config = tiny();
        let model = QrnnLanguageModel::<TestBackend>::new(&config, &device).unwrap();
        assert_eq!(model.num_parameters(), config.num_parameters());
    }

    #[test]
    fn test_wrong_state_count_is_rejected() {
        let device = NdArrayDevice::Cpu;
        let model = QrnnLanguageModel::<TestBackend>::new(&tiny(), &device).unwrap();
        let tokens = Tensor::<TestBackend, 2, Int>::from_ints([[4, 5, 6]], &device);

        let result = model.forward_with_state(tokens, &[QrnnState::empty()], &mut Mode::Inference);
        assert!(matches!(result, Err(QrnnError::ShapeMismatch { .. })));
    }
}
