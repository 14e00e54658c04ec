// src/qrnn/layer.rs
//! QRNN layer: gate projection + pooling, tagged by [`LayerKind`].
//!
//! The layer itself is stateless. Every call borrows a [`QrnnState`] and
//! returns the successor state, so one layer can serve any number of
//! independent sequences and a failed call never touches the caller's state.

use burn::{
    module::{Ignored, Module},
    nn::Linear,
    tensor::{backend::Backend, Tensor},
};

use super::attention::attend;
use super::config::{LayerKind, Pooling};
use super::gates::{activate, GateProjection, Gates};
use super::pooling::pool;
use super::zoneout::ZoneoutSampler;
use crate::error::{QrnnError, Result};

// ============================================================
// EXECUTION MODE
// ============================================================

/// Train mode samples zoneout masks and keeps the gradient chain along time;
/// inference disables zoneout and detaches every step.
#[derive(Debug)]
pub enum Mode<'a> {
    Train(&'a mut ZoneoutSampler),
    Inference,
}

impl Mode<'_> {
    pub fn is_train(&self) -> bool {
        matches!(self, Mode::Train(_))
    }
}

// ============================================================
// STATE
// ============================================================

/// Recurrent state of one layer for one in-flight batch of sequences.
#[derive(Clone, Debug)]
pub struct QrnnState<B: Backend> {
    /// Last cell state `[batch, C]` (fo / ifo / attentive).
    pub(crate) cell: Option<Tensor<B, 2>>,
    /// Last hidden state `[batch, C]`.
    pub(crate) hidden: Option<Tensor<B, 2>>,
    /// All hidden states so far `[batch, C, steps]`.
    pub(crate) hiddens: Option<Tensor<B, 3>>,
    /// Last `kernel_size - 1` layer inputs `[batch, C_in, k - 1]`.
    pub(crate) window: Option<Tensor<B, 3>>,
    pub(crate) steps: usize,
}

impl<B: Backend> QrnnState<B> {
    pub fn empty() -> Self {
        Self {
            cell: None,
            hidden: None,
            hiddens: None,
            window: None,
            steps: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::empty();
    }

    pub fn is_empty(&self) -> bool {
        self.steps == 0
    }

    pub fn last_hidden(&self) -> Option<&Tensor<B, 2>> {
        self.hidden.as_ref()
    }

    pub fn last_cell(&self) -> Option<&Tensor<B, 2>> {
        self.cell.as_ref()
    }

    pub fn all_hiddens(&self) -> Option<&Tensor<B, 3>> {
        self.hiddens.as_ref()
    }

    /// Number of time steps consumed since the last reset.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Cuts the gradient chain, e.g. at a bucket boundary.
    pub fn detach(self) -> Self {
        Self {
            cell: self.cell.map(|t| t.detach()),
            hidden: self.hidden.map(|t| t.detach()),
            hiddens: self.hiddens.map(|t| t.detach()),
            window: self.window.map(|t| t.detach()),
            steps: self.steps,
        }
    }

    fn batch_size(&self) -> Option<usize> {
        self.hidden.as_ref().map(|h| h.dims()[0])
    }
}

impl<B: Backend> Default for QrnnState<B> {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================
// CALL INPUTS / OUTPUTS
// ============================================================

/// What the encoder hands to a decoder layer.
#[derive(Clone, Debug)]
pub struct EncoderMemory<B: Backend> {
    /// Last encoder hidden state `[batch, C]`.
    pub summary: Tensor<B, 2>,
    /// Encoder hidden states `[batch, C, T_enc]` (attentive decoder).
    pub states: Option<Tensor<B, 3>>,
    /// `[batch, T_enc]`, 1 for real tokens, 0 for padding.
    pub mask: Option<Tensor<B, 2>>,
}

impl<B: Backend> EncoderMemory<B> {
    pub fn new(summary: Tensor<B, 2>) -> Self {
        Self {
            summary,
            states: None,
            mask: None,
        }
    }

    pub fn with_states(mut self, states: Tensor<B, 3>) -> Self {
        self.states = Some(states);
        self
    }

    pub fn with_mask(mut self, mask: Tensor<B, 2>) -> Self {
        self.mask = Some(mask);
        self
    }
}

/// Optional per-call inputs besides the sequence itself.
#[derive(Clone, Debug)]
pub struct QrnnInput<B: Backend> {
    /// `[batch, T]`, 1 for real steps, 0 for padding.
    pub skip_mask: Option<Tensor<B, 2>>,
    pub memory: Option<EncoderMemory<B>>,
}

impl<B: Backend> QrnnInput<B> {
    pub fn new() -> Self {
        Self {
            skip_mask: None,
            memory: None,
        }
    }

    pub fn with_skip_mask(mut self, mask: Tensor<B, 2>) -> Self {
        self.skip_mask = Some(mask);
        self
    }

    pub fn with_memory(mut self, memory: EncoderMemory<B>) -> Self {
        self.memory = Some(memory);
        self
    }
}

impl<B: Backend> Default for QrnnInput<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct QrnnOutput<B: Backend> {
    /// Hidden states produced by this call `[batch, C, T]`.
    pub hiddens: Tensor<B, 3>,
    pub state: QrnnState<B>,
    /// Attention weights `[batch, T, T_enc]` (attentive decoder only).
    pub attention: Option<Tensor<B, 3>>,
}

#[derive(Clone, Debug)]
pub struct QrnnStep<B: Backend> {
    /// `[batch, C]`
    pub hidden: Tensor<B, 2>,
    pub state: QrnnState<B>,
    /// `[batch, T_enc]` (attentive decoder only).
    pub attention: Option<Tensor<B, 2>>,
}

// ============================================================
// LAYER
// ============================================================

#[derive(Clone, Debug)]
pub struct QrnnSettings {
    pub kind: LayerKind,
    pub pooling: Pooling,
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    /// `Some(ratio)` when zoneout is enabled.
    pub zoneout_ratio: Option<f64>,
}

#[derive(Module, Debug)]
pub struct Qrnn<B: Backend> {
    pub(crate) gates: GateProjection<B>,
    /// `Linear(2C, C)` over `[k_t ; c_t]` (attentive decoder only).
    pub(crate) readout: Option<Linear<B>>,
    pub(crate) settings: Ignored<QrnnSettings>,
}

impl<B: Backend> Qrnn<B> {
    pub fn kind(&self) -> LayerKind {
        self.settings.kind
    }

    pub fn pooling(&self) -> Pooling {
        self.settings.pooling
    }

    pub fn in_channels(&self) -> usize {
        self.settings.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.settings.out_channels
    }

    pub fn kernel_size(&self) -> usize {
        self.settings.kernel_size
    }

    pub fn zoneout_ratio(&self) -> Option<f64> {
        self.settings.zoneout_ratio
    }

    /// Full-sequence forward pass.
    ///
    /// `x` is `[batch, C_in, T]`. The sequence is left-padded with the state's
    /// input window (zeros for an empty state), so chunked calls compose into
    /// the same result as one call over the concatenated sequence.
    pub fn forward(
        &self,
        x: Tensor<B, 3>,
        input: &QrnnInput<B>,
        state: &QrnnState<B>,
        mode: &mut Mode,
    ) -> Result<QrnnOutput<B>> {
        let [batch, channels, steps] = x.dims();
        self.check_sequence(batch, channels, steps)?;
        self.check_state(state, batch)?;
        self.check_skip_mask(input.skip_mask.as_ref(), batch, steps)?;
        self.check_memory(input.memory.as_ref(), batch)?;

        let x = match &input.skip_mask {
            Some(mask) => x * mask.clone().unsqueeze_dim::<3>(1),
            None => x,
        };

        let padded = self.left_pad(x, state);
        let window = self.next_window(&padded);

        self.run(padded, window, input, state, mode)
    }

    /// Single-step form: consumes `x_t` (`[batch, C_in]`) plus the last
    /// `kernel_size - 1` inputs carried in the state.
    pub fn forward_one_step(
        &self,
        x_t: Tensor<B, 2>,
        input: &QrnnInput<B>,
        state: &QrnnState<B>,
        mode: &mut Mode,
    ) -> Result<QrnnStep<B>> {
        let [batch, _] = x_t.dims();
        let out = self.forward(x_t.unsqueeze_dim::<3>(2), input, state, mode)?;

        let hidden = out.hiddens.reshape([batch, self.settings.out_channels]);
        let attention = out.attention.map(|weights| {
            let [b, _, enc_len] = weights.dims();
            weights.reshape([b, enc_len])
        });

        Ok(QrnnStep {
            hidden,
            state: out.state,
            attention,
        })
    }

    fn run(
        &self,
        padded: Tensor<B, 3>,
        window: Option<Tensor<B, 3>>,
        input: &QrnnInput<B>,
        state: &QrnnState<B>,
        mode: &mut Mode,
    ) -> Result<QrnnOutput<B>> {
        let settings = &*self.settings;
        let train = mode.is_train();
        let summary = input.memory.as_ref().map(|m| m.summary.clone());

        let preact = self.gates.forward(padded, summary);
        let [batch, stacked, steps] = preact.dims();
        let channels = stacked / settings.pooling.num_split();

        let zoneout_mask = match (mode, settings.zoneout_ratio) {
            (Mode::Train(sampler), Some(ratio)) => {
                Some(sampler.sample_mask::<B, 3>([batch, channels, steps], ratio, &preact.device())?)
            }
            _ => None,
        };

        let mut gates = activate(preact, settings.pooling, zoneout_mask);
        if !train {
            gates = gates.detach();
        }
        let skip_mask = input.skip_mask.as_ref();

        let (hiddens, hidden, cell, attention) = match settings.kind {
            LayerKind::Encoder | LayerKind::Decoder => {
                let carry = match settings.pooling {
                    Pooling::F => state.hidden.clone(),
                    Pooling::Fo | Pooling::Ifo => state.cell.clone(),
                };
                let pooled = pool(&gates, skip_mask, carry, !train);
                let cell = (settings.pooling != Pooling::F).then_some(pooled.carry);
                (pooled.hiddens, pooled.hidden, cell, None)
            }
            LayerKind::AttentiveDecoder => {
                let (hiddens, hidden, cell, weights) =
                    self.attentive_pass(gates, skip_mask, input, state, !train)?;
                (hiddens, hidden, cell, Some(weights))
            }
        };

        let (hiddens, hidden) = if train {
            (hiddens, hidden)
        } else {
            (hiddens.detach(), hidden.detach())
        };
        let window = if train { window } else { window.map(|w| w.detach()) };

        let all = match &state.hiddens {
            Some(previous) => Tensor::cat(vec![previous.clone(), hiddens.clone()], 2),
            None => hiddens.clone(),
        };

        Ok(QrnnOutput {
            hiddens,
            state: QrnnState {
                cell,
                hidden: Some(hidden),
                hiddens: Some(all),
                window,
                steps: state.steps + steps,
            },
            attention,
        })
    }

    /// Ungated fo contexts, then `h_t = o_t * Linear([k_t ; c_t])`.
    #[allow(clippy::type_complexity)]
    fn attentive_pass(
        &self,
        gates: Gates<B>,
        skip_mask: Option<&Tensor<B, 2>>,
        input: &QrnnInput<B>,
        state: &QrnnState<B>,
        truncate: bool,
    ) -> Result<(Tensor<B, 3>, Tensor<B, 2>, Option<Tensor<B, 2>>, Tensor<B, 3>)> {
        let readout = self
            .readout
            .as_ref()
            .ok_or_else(|| QrnnError::Config("attentive decoder without readout projection".into()))?;
        let memory = input
            .memory
            .as_ref()
            .ok_or_else(|| QrnnError::shape("encoder memory", "summary and states", "none"))?;
        let encoder_states = memory
            .states
            .as_ref()
            .ok_or_else(|| QrnnError::shape("encoder states", "[batch, C, T_enc]", "none"))?;

        let Gates { z, f, o, .. } = gates;
        let o = o.ok_or_else(|| QrnnError::Config("attentive decoder requires an output gate".into()))?;
        let ungated = Gates { z, f, o: None, i: None };
        let contexts = pool(&ungated, skip_mask, state.cell.clone(), truncate);

        let attended = attend(&contexts.hiddens, encoder_states, memory.mask.as_ref(), state.steps);

        let [batch, channels, steps] = contexts.hiddens.dims();
        let mut hiddens = Vec::with_capacity(steps);
        for (t, k_t) in attended.readouts.into_iter().enumerate() {
            let c_t = contexts.hiddens.clone().narrow(2, t, 1).reshape([batch, channels]);
            let o_t = o.clone().narrow(2, t, 1).reshape([batch, channels]);
            let h_t = o_t * readout.forward(Tensor::cat(vec![k_t, c_t], 1));
            hiddens.push(h_t.unsqueeze_dim::<3>(2));
        }

        let hiddens = Tensor::cat(hiddens, 2);
        let hidden = hiddens.clone().narrow(2, steps - 1, 1).reshape([batch, channels]);

        Ok((hiddens, hidden, Some(contexts.carry), attended.weights))
    }

    fn left_pad(&self, x: Tensor<B, 3>, state: &QrnnState<B>) -> Tensor<B, 3> {
        let pad = self.settings.kernel_size - 1;
        if pad == 0 {
            return x;
        }
        let [batch, channels, _] = x.dims();
        let prefix = state
            .window
            .clone()
            .unwrap_or_else(|| Tensor::zeros([batch, channels, pad], &x.device()));
        Tensor::cat(vec![prefix, x], 2)
    }

    fn next_window(&self, padded: &Tensor<B, 3>) -> Option<Tensor<B, 3>> {
        let pad = self.settings.kernel_size - 1;
        if pad == 0 {
            return None;
        }
        let [_, _, len] = padded.dims();
        Some(padded.clone().narrow(2, len - pad, pad))
    }

    // ============================================================
    // VALIDATION (before any computation)
    // ============================================================

    fn check_sequence(&self, batch: usize, channels: usize, steps: usize) -> Result<()> {
        if channels != self.settings.in_channels {
            return Err(QrnnError::shape(
                "input channels",
                self.settings.in_channels,
                channels,
            ));
        }
        if batch == 0 {
            return Err(QrnnError::shape("batch", ">= 1", batch));
        }
        if steps == 0 {
            return Err(QrnnError::Numerical("sequence has no time steps".into()));
        }
        Ok(())
    }

    fn check_state(&self, state: &QrnnState<B>, batch: usize) -> Result<()> {
        match state.batch_size() {
            Some(b) if b != batch => Err(QrnnError::shape("state batch", b, batch)),
            _ => Ok(()),
        }
    }

    fn check_skip_mask(&self, mask: Option<&Tensor<B, 2>>, batch: usize, steps: usize) -> Result<()> {
        if let Some(mask) = mask {
            let dims = mask.dims();
            if dims != [batch, steps] {
                return Err(QrnnError::shape(
                    "skip mask",
                    format!("{:?}", [batch, steps]),
                    format!("{:?}", dims),
                ));
            }
        }
        Ok(())
    }

    fn check_memory(&self, memory: Option<&EncoderMemory<B>>, batch: usize) -> Result<()> {
        let kind = self.settings.kind;
        if !kind.takes_summary() {
            return Ok(());
        }
        let c = self.settings.out_channels;

        let memory = memory.ok_or_else(|| QrnnError::shape("encoder summary", format!("[{}, {}]", batch, c), "none"))?;

        let dims = memory.summary.dims();
        if dims != [batch, c] {
            return Err(QrnnError::shape(
                "encoder summary",
                format!("{:?}", [batch, c]),
                format!("{:?}", dims),
            ));
        }

        if kind.is_attentive() {
            let states = memory
                .states
                .as_ref()
                .ok_or_else(|| QrnnError::shape("encoder states", format!("[{}, {}, T_enc]", batch, c), "none"))?;
            let [sb, sc, enc_len] = states.dims();
            if sb != batch || sc != c || enc_len == 0 {
                return Err(QrnnError::shape(
                    "encoder states",
                    format!("[{}, {}, >=1]", batch, c),
                    format!("{:?}", [sb, sc, enc_len]),
                ));
            }
            if let Some(mask) = &memory.mask {
                let dims = mask.dims();
                if dims != [batch, enc_len] {
                    return Err(QrnnError::shape(
                        "encoder mask",
                        format!("{:?}", [batch, enc_len]),
                        format!("{:?}", dims),
                    ));
                }
            }
        }
        Ok(())
    }
}
