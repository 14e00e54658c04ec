// src/qrnn/gates.rs
//! Causal convolution gate projection.
//!
//! The input is left-padded with `kernel_size - 1` steps and convolved with a
//! valid (unpadded) 1-D convolution, so output step `t` only sees inputs
//! `t-k+1 ..= t`. The stacked output is split along channels in the fixed
//! order Z, F, [O], [I].

use burn::{
    module::Module,
    nn::{conv::Conv1d, Linear},
    tensor::{activation, backend::Backend, Tensor},
};

use super::config::Pooling;
use super::zoneout::forget_gate;

#[derive(Module, Debug)]
pub struct GateProjection<B: Backend> {
    conv: Conv1d<B>,
    /// Projection of the encoder summary (decoders only).
    context: Option<Linear<B>>,
    num_split: usize,
    out_channels: usize,
}

/// Activated gate tensors, each `[batch, out_channels, time]`.
#[derive(Debug, Clone)]
pub struct Gates<B: Backend> {
    pub z: Tensor<B, 3>,
    pub f: Tensor<B, 3>,
    pub o: Option<Tensor<B, 3>>,
    pub i: Option<Tensor<B, 3>>,
}

impl<B: Backend> Gates<B> {
    pub fn detach(self) -> Self {
        Self {
            z: self.z.detach(),
            f: self.f.detach(),
            o: self.o.map(|o| o.detach()),
            i: self.i.map(|i| i.detach()),
        }
    }
}

impl<B: Backend> GateProjection<B> {
    pub fn new(conv: Conv1d<B>, context: Option<Linear<B>>, num_split: usize, out_channels: usize) -> Self {
        Self {
            conv,
            context,
            num_split,
            out_channels,
        }
    }

    /// Pre-activations `[batch, num_split * out_channels, time]`.
    ///
    /// `padded` must already carry the `kernel_size - 1` leading steps.
    /// `summary` (`[batch, out_channels]`) is projected and broadcast over
    /// every time step when the projection has a context map.
    pub fn forward(&self, padded: Tensor<B, 3>, summary: Option<Tensor<B, 2>>) -> Tensor<B, 3> {
        let wx = self.conv.forward(padded);

        match (&self.context, summary) {
            (Some(context), Some(summary)) => {
                let [batch, _] = summary.dims();
                let vh = context
                    .forward(summary)
                    .reshape([batch, self.num_split * self.out_channels, 1]);
                wx + vh
            }
            _ => wx,
        }
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }
}

/// Splits pre-activations into gates and applies their nonlinearities.
///
/// `zoneout_mask` is the keep-mask for the forget gate; `None` means plain
/// `sigmoid(F)`.
pub fn activate<B: Backend>(
    preact: Tensor<B, 3>,
    pooling: Pooling,
    zoneout_mask: Option<Tensor<B, 3>>,
) -> Gates<B> {
    let [_, stacked, _] = preact.dims();
    let channels = stacked / pooling.num_split();
    let gate = |index: usize| preact.clone().narrow(1, index * channels, channels);

    let z = gate(0);
    let f = gate(1);
    let o = pooling.has_output_gate().then(|| activation::sigmoid(gate(2)));
    let i = pooling.has_input_gate().then(|| activation::sigmoid(gate(3)));

    Gates {
        z: z.tanh(),
        f: forget_gate(f, zoneout_mask),
        o,
        i,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    type TestBackend = NdArray;

    #[test]
    fn test_activate_splits_in_order() {
        let device = NdArrayDevice::Cpu;
        // channels: Z=0.0, F=0.0, O=100.0, I=-100.0 (one channel each)
        let preact = Tensor::<TestBackend, 3>::from_floats([[[0.0], [0.0], [100.0], [-100.0]]], &device);

        let gates = activate(preact, Pooling::Ifo, None);

        let z: f32 = gates.z.into_scalar();
        let f: f32 = gates.f.into_scalar();
        let o: f32 = gates.o.unwrap().into_scalar();
        let i: f32 = gates.i.unwrap().into_scalar();

        assert_eq!(z, 0.0);
        assert!((f - 0.5).abs() < 1e-6);
        assert!((o - 1.0).abs() < 1e-6);
        assert!(i.abs() < 1e-6);
    }

    #[test]
    fn test_activate_f_pooling_has_no_extra_gates() {
        let device = NdArrayDevice::Cpu;
        let preact = Tensor::<TestBackend, 3>::zeros([2, 6, 4], &device);

        let gates = activate(preact, Pooling::F, None);
        assert_eq!(gates.z.dims(), [2, 3, 4]);
        assert_eq!(gates.f.dims(), [2, 3, 4]);
        assert!(gates.o.is_none());
        assert!(gates.i.is_none());
    }
}
