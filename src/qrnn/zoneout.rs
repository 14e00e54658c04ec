// src/qrnn/zoneout.rs
//! Zoneout on the forget gate.
//!
//! A Bernoulli keep-mask is drawn once per call over the whole forget tensor
//! `[batch, channels, time]`. Where the mask is 0 the forget gate is forced to
//! 1, so the cell keeps its previous value at that (batch, channel, time)
//! position. The mask is a constant of the graph: the gradient of
//! `zoneout(u, m) = u * m` with respect to `u` is `m`.

use burn::tensor::{activation, backend::Backend, Tensor, TensorData};
use rand::distributions::{Bernoulli, Distribution};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{QrnnError, Result};

/// Seedable source of zoneout masks.
///
/// Cloning a sampler clones its stream position, so two clones produce the
/// same sequence of masks.
#[derive(Debug, Clone)]
pub struct ZoneoutSampler {
    rng: ChaCha8Rng,
}

impl ZoneoutSampler {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Draws a keep-mask of the given shape: 1.0 with probability `1 - ratio`,
    /// 0.0 otherwise, independently per element.
    pub fn sample_mask<B: Backend, const D: usize>(
        &mut self,
        shape: [usize; D],
        ratio: f64,
        device: &B::Device,
    ) -> Result<Tensor<B, D>> {
        let keep = Bernoulli::new(1.0 - ratio).map_err(|e| {
            QrnnError::Config(format!("invalid zoneout ratio {}: {}", ratio, e))
        })?;

        let numel: usize = shape.iter().product();
        let values: Vec<f32> = (0..numel)
            .map(|_| if keep.sample(&mut self.rng) { 1.0 } else { 0.0 })
            .collect();

        Ok(Tensor::from_data(TensorData::new(values, shape), device))
    }
}

/// `u * mask`. The mask carries no gradient, so `d(out)/d(u) = mask`.
pub fn zoneout<B: Backend, const D: usize>(u: Tensor<B, D>, mask: Tensor<B, D>) -> Tensor<B, D> {
    u * mask
}

/// Builds the forget gate from its pre-activation.
///
/// With a mask: `F = 1 - zoneout(sigmoid(-U), mask)`; without: `F = sigmoid(U)`.
pub fn forget_gate<B: Backend>(u: Tensor<B, 3>, mask: Option<Tensor<B, 3>>) -> Tensor<B, 3> {
    match mask {
        Some(mask) => zoneout(activation::sigmoid(u.neg()), mask)
            .neg()
            .add_scalar(1.0),
        None => activation::sigmoid(u),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    type TestBackend = NdArray;

    fn values(t: Tensor<TestBackend, 3>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_mask_is_binary_and_reproducible() {
        let device = NdArrayDevice::Cpu;
        let mut a = ZoneoutSampler::seeded(7);
        let mut b = a.clone();

        let ma = values(a.sample_mask::<TestBackend, 3>([2, 3, 5], 0.3, &device).unwrap());
        let mb = values(b.sample_mask::<TestBackend, 3>([2, 3, 5], 0.3, &device).unwrap());

        assert_eq!(ma, mb);
        assert!(ma.iter().all(|&v| v == 0.0 || v == 1.0));
    }

    #[test]
    fn test_ratio_extremes() {
        let device = NdArrayDevice::Cpu;
        let mut sampler = ZoneoutSampler::seeded(1);

        let all_dropped = values(sampler.sample_mask::<TestBackend, 3>([2, 4, 8], 1.0, &device).unwrap());
        assert!(all_dropped.iter().all(|&v| v == 0.0));

        let all_kept = values(sampler.sample_mask::<TestBackend, 3>([2, 4, 8], 0.0, &device).unwrap());
        assert!(all_kept.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_masks_differ_between_calls() {
        let device = NdArrayDevice::Cpu;
        let mut sampler = ZoneoutSampler::seeded(3);
        let first = values(sampler.sample_mask::<TestBackend, 3>([4, 8, 16], 0.5, &device).unwrap());
        let second = values(sampler.sample_mask::<TestBackend, 3>([4, 8, 16], 0.5, &device).unwrap());
        assert_ne!(first, second);
    }

    #[test]
    fn test_forget_gate_full_zoneout_is_one() {
        let device = NdArrayDevice::Cpu;
        let u = Tensor::<TestBackend, 3>::from_floats([[[-2.0, 0.0, 3.0]]], &device);
        let mask = Tensor::<TestBackend, 3>::zeros([1, 1, 3], &device);

        let f = values(forget_gate(u, Some(mask)));
        assert!(f.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_forget_gate_kept_positions_match_sigmoid() {
        let device = NdArrayDevice::Cpu;
        let u = Tensor::<TestBackend, 3>::from_floats([[[-2.0, 0.0, 3.0]]], &device);
        let mask = Tensor::<TestBackend, 3>::ones([1, 1, 3], &device);

        let zoned = values(forget_gate(u.clone(), Some(mask)));
        let plain = values(forget_gate(u, None));
        for (a, b) in zoned.iter().zip(plain.iter()) {
            assert!((a - b).abs() < 1e-6, "{} vs {}", a, b);
        }
    }
}
