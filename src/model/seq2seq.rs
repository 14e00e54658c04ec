// src/model/seq2seq.rs
//! QRNN encoder-decoder for translation.
//!
//! Decoder layer `l` is conditioned on the last hidden state of encoder layer
//! `l`. With attention enabled the top decoder layer also attends over every
//! hidden state of the top encoder layer.

use burn::{
    module::{Ignored, Module},
    nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig, Linear, LinearConfig},
    tensor::{backend::Backend, Int, Tensor},
};

use super::config::Seq2SeqConfig;
use super::{embed_tokens, pad_mask, BOS_ID, EOS_ID};
use crate::error::{QrnnError, Result};
use crate::helpers::{create_token_tensor, ids_to_vec};
use crate::qrnn::{EncoderMemory, Mode, Qrnn, QrnnInput, QrnnState};

/// Encoder output consumed by every decoder call.
#[derive(Clone, Debug)]
pub struct Encoded<B: Backend> {
    /// Last hidden state of each encoder layer, `[batch, C]`, bottom first.
    pub summaries: Vec<Tensor<B, 2>>,
    /// Hidden states of the top encoder layer, `[batch, C, T_src]`.
    pub states: Tensor<B, 3>,
    /// `[batch, T_src]`, 0 at source padding.
    pub mask: Tensor<B, 2>,
}

#[derive(Clone, Debug)]
pub struct Seq2SeqSettings {
    pub source_vocab_size: usize,
    pub target_vocab_size: usize,
    pub densely_connected: bool,
    pub attention: bool,
}

#[derive(Module, Debug)]
pub struct QrnnSeq2Seq<B: Backend> {
    source_embedding: Embedding<B>,
    target_embedding: Embedding<B>,
    encoder: Vec<Qrnn<B>>,
    decoder: Vec<Qrnn<B>>,
    dropout: Dropout,
    output: Linear<B>,
    settings: Ignored<Seq2SeqSettings>,
}

impl<B: Backend> QrnnSeq2Seq<B> {
    pub fn new(config: &Seq2SeqConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;

        let encoder = config
            .encoder_configs()
            .iter()
            .map(|layer| layer.init(device))
            .collect::<Result<Vec<_>>>()?;
        let decoder = config
            .decoder_configs()
            .iter()
            .map(|layer| layer.init(device))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            num_layers = config.num_layers,
            attention = config.attention,
            pooling = %config.pooling,
            "initialized QRNN seq2seq"
        );

        Ok(Self {
            source_embedding: EmbeddingConfig::new(config.source_vocab_size, config.embedding_dim).init(device),
            target_embedding: EmbeddingConfig::new(config.target_vocab_size, config.embedding_dim).init(device),
            encoder,
            decoder,
            dropout: DropoutConfig::new(config.dropout).init(),
            output: LinearConfig::new(config.hidden_dim, config.target_vocab_size).init(device),
            settings: Ignored(Seq2SeqSettings {
                source_vocab_size: config.source_vocab_size,
                target_vocab_size: config.target_vocab_size,
                densely_connected: config.densely_connected,
                attention: config.attention,
            }),
        })
    }

    pub fn target_vocab_size(&self) -> usize {
        self.settings.target_vocab_size
    }

    pub fn source_vocab_size(&self) -> usize {
        self.settings.source_vocab_size
    }

    pub fn has_attention(&self) -> bool {
        self.settings.attention
    }

    pub fn num_parameters(&self) -> usize {
        self.num_params()
    }

    pub fn empty_decoder_states(&self) -> Vec<QrnnState<B>> {
        self.decoder.iter().map(|_| QrnnState::empty()).collect()
    }

    fn layer_input(&self, x: &Tensor<B, 3>, mode: &Mode) -> Tensor<B, 3> {
        if mode.is_train() {
            self.dropout.forward(x.clone())
        } else {
            x.clone()
        }
    }

    fn connect(&self, layer: &Qrnn<B>, hiddens: Tensor<B, 3>, x: Tensor<B, 3>) -> Tensor<B, 3> {
        if self.settings.densely_connected && layer.in_channels() == layer.out_channels() {
            hiddens + x
        } else {
            hiddens
        }
    }

    /// Runs the encoder over `[batch, T_src]` source ids.
    pub fn encode(&self, source: Tensor<B, 2, Int>, mode: &mut Mode) -> Result<Encoded<B>> {
        let mask = pad_mask(&source);
        let input = QrnnInput::new().with_skip_mask(mask.clone());
        let mut x = embed_tokens(&self.source_embedding, source, &mask);

        let mut summaries = Vec::with_capacity(self.encoder.len());
        let mut top = None;

        for layer in &self.encoder {
            let out = layer.forward(self.layer_input(&x, mode), &input, &QrnnState::empty(), mode)?;
            let summary = out
                .state
                .last_hidden()
                .cloned()
                .ok_or_else(|| QrnnError::Numerical("encoder produced no hidden state".into()))?;
            summaries.push(summary);
            top = Some(out.hiddens.clone());
            x = self.connect(layer, out.hiddens, x);
        }

        let states = top.ok_or_else(|| QrnnError::Config("encoder has no layers".into()))?;
        Ok(Encoded { summaries, states, mask })
    }

    /// Decodes `[batch, T_tgt]` ground-truth target inputs from fresh
    /// states. Returns `[batch, T_tgt, target_vocab]` logits.
    pub fn decode(&self, target_input: Tensor<B, 2, Int>, encoded: &Encoded<B>, mode: &mut Mode) -> Result<Tensor<B, 3>> {
        let states = self.empty_decoder_states();
        let (logits, _, _) = self.decode_with_state(target_input, encoded, &states, mode)?;
        Ok(logits)
    }

    /// Decoding that continues from `states`. Also returns the top layer's
    /// attention weights `[batch, T_tgt, T_src]` when attention is enabled.
    pub fn decode_with_state(
        &self,
        target_input: Tensor<B, 2, Int>,
        encoded: &Encoded<B>,
        states: &[QrnnState<B>],
        mode: &mut Mode,
    ) -> Result<(Tensor<B, 3>, Vec<QrnnState<B>>, Option<Tensor<B, 3>>)> {
        if states.len() != self.decoder.len() {
            return Err(QrnnError::shape("decoder states", self.decoder.len(), states.len()));
        }
        if encoded.summaries.len() != self.decoder.len() {
            return Err(QrnnError::shape("encoder summaries", self.decoder.len(), encoded.summaries.len()));
        }

        let mask = pad_mask(&target_input);
        let mut x = embed_tokens(&self.target_embedding, target_input, &mask);
        let mut next = Vec::with_capacity(self.decoder.len());
        let mut attention = None;

        for ((layer, state), summary) in self.decoder.iter().zip(states).zip(&encoded.summaries) {
            let mut memory = EncoderMemory::new(summary.clone());
            if layer.kind().is_attentive() {
                memory = memory
                    .with_states(encoded.states.clone())
                    .with_mask(encoded.mask.clone());
            }
            let input = QrnnInput::new()
                .with_skip_mask(mask.clone())
                .with_memory(memory);

            let out = layer.forward(self.layer_input(&x, mode), &input, state, mode)?;
            if out.attention.is_some() {
                attention = out.attention;
            }
            x = self.connect(layer, out.hiddens, x);
            next.push(out.state);
        }

        let logits = self.output.forward(x.swap_dims(1, 2));
        Ok((logits, next, attention))
    }

    /// One decoder step for `[batch]` previous tokens → `[batch, target_vocab]`.
    pub fn decoder_step(
        &self,
        tokens: Tensor<B, 1, Int>,
        encoded: &Encoded<B>,
        states: &[QrnnState<B>],
        mode: &mut Mode,
    ) -> Result<(Tensor<B, 2>, Vec<QrnnState<B>>)> {
        let [batch] = tokens.dims();
        let (logits, next, _) = self.decode_with_state(tokens.reshape([batch, 1]), encoded, states, mode)?;
        Ok((logits.reshape([batch, self.settings.target_vocab_size]), next))
    }

    /// Greedy argmax translation, starting from `BOS_ID`.
    ///
    /// Each row stops at its first `EOS_ID` (not included) or after
    /// `max_len` tokens.
    pub fn translate_greedy(&self, source: Tensor<B, 2, Int>, max_len: usize) -> Result<Vec<Vec<usize>>> {
        let [batch, _] = source.dims();
        let device = source.device();
        let mut mode = Mode::Inference;

        let encoded = self.encode(source, &mut mode)?;
        let mut states = self.empty_decoder_states();
        let mut previous = vec![BOS_ID; batch];
        let mut outputs = vec![Vec::new(); batch];
        let mut finished = vec![false; batch];

        for _ in 0..max_len {
            let tokens = create_token_tensor::<B>(&previous, &device);
            let (logits, next) = self.decoder_step(tokens, &encoded, &states, &mut mode)?;
            states = next;

            let ids = ids_to_vec(logits.argmax(1).reshape([batch]))?;
            for (row, &id) in ids.iter().enumerate() {
                let id = id as usize;
                if !finished[row] {
                    if id == EOS_ID {
                        finished[row] = true;
                    } else {
                        outputs[row].push(id);
                    }
                }
                previous[row] = id;
            }

            if finished.iter().all(|&done| done) {
                break;
            }
        }

        tracing::debug!(batch, max_len, "greedy translation done");
        Ok(outputs)
    }
}
