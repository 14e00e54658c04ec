// src/qrnn/pooling.rs
//! Sequential pooling recurrence.
//!
//! ```text
//! f   : h_t = f_t * h_{t-1} + (1 - f_t) * z_t
//! fo  : c_t = f_t * c_{t-1} + (1 - f_t) * z_t ;  h_t = o_t * c_t
//! ifo : c_t = f_t * c_{t-1} +      i_t  * z_t ;  h_t = o_t * c_t
//! ```
//!
//! The carried value starts at zero for an empty state. The optional skip
//! mask multiplies only the injected term, so a masked step is pure decay.

use burn::tensor::{backend::Backend, Tensor};

use super::gates::Gates;

/// Result of one pooling pass.
#[derive(Debug, Clone)]
pub struct Pooled<B: Backend> {
    /// `[batch, channels, time]`
    pub hiddens: Tensor<B, 3>,
    /// Carried accumulator after the last step (`c` for fo/ifo, `h` for f).
    pub carry: Tensor<B, 2>,
    /// Last hidden state `[batch, channels]`.
    pub hidden: Tensor<B, 2>,
}

fn step_of<B: Backend>(x: &Tensor<B, 3>, t: usize) -> Tensor<B, 2> {
    let [batch, channels, _] = x.dims();
    x.clone().narrow(2, t, 1).reshape([batch, channels])
}

/// Runs the recurrence over every time step of `gates`.
///
/// `skip_mask` is `[batch, time]` with 1 for real steps and 0 for padding.
/// With `truncate` set the carry is detached after every step, which drops
/// the gradient chain along time (inference only).
pub fn pool<B: Backend>(
    gates: &Gates<B>,
    skip_mask: Option<&Tensor<B, 2>>,
    carry: Option<Tensor<B, 2>>,
    truncate: bool,
) -> Pooled<B> {
    let [batch, channels, steps] = gates.z.dims();
    let device = gates.z.device();

    let mut carry = carry.unwrap_or_else(|| Tensor::zeros([batch, channels], &device));
    let mut hidden = carry.clone();
    let mut hiddens = Vec::with_capacity(steps);

    for t in 0..steps {
        let z = step_of(&gates.z, t);
        let f = step_of(&gates.f, t);

        let input = match &gates.i {
            Some(i) => step_of(i, t),
            None => f.clone().neg().add_scalar(1.0),
        };

        let mut injected = input * z;
        if let Some(mask) = skip_mask {
            // [batch, 1] broadcasts over channels
            injected = injected * mask.clone().narrow(1, t, 1);
        }

        carry = f * carry + injected;
        if truncate {
            carry = carry.detach();
        }

        hidden = match &gates.o {
            Some(o) => step_of(o, t) * carry.clone(),
            None => carry.clone(),
        };

        hiddens.push(hidden.clone().unsqueeze_dim::<3>(2));
    }

    Pooled {
        hiddens: Tensor::cat(hiddens, 2),
        carry,
        hidden,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    type TestBackend = NdArray;

    fn seq(values: &[f32]) -> Tensor<TestBackend, 3> {
        Tensor::<TestBackend, 1>::from_floats(values, &NdArrayDevice::Cpu).reshape([1, 1, values.len()])
    }

    fn read(t: Tensor<TestBackend, 3>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    fn assert_close(got: &[f32], want: &[f32]) {
        assert_eq!(got.len(), want.len());
        for (g, w) in got.iter().zip(want.iter()) {
            assert!((g - w).abs() < 1e-6, "got {:?}, want {:?}", got, want);
        }
    }

    #[test]
    fn test_f_pooling_reference_values() {
        let gates = Gates {
            z: seq(&[0.2, 0.5]),
            f: seq(&[0.3, 0.7]),
            o: None,
            i: None,
        };

        let pooled = pool(&gates, None, None, false);
        assert_close(&read(pooled.hiddens), &[0.14, 0.248]);
    }

    #[test]
    fn test_fo_pooling_reference_values() {
        let gates = Gates {
            z: seq(&[0.2, 0.5]),
            f: seq(&[0.3, 0.7]),
            o: Some(seq(&[1.0, 0.5])),
            i: None,
        };

        let pooled = pool(&gates, None, None, false);
        assert_close(&read(pooled.hiddens), &[0.14, 0.124]);

        let carry: f32 = pooled.carry.into_scalar();
        assert!((carry - 0.248).abs() < 1e-6);
    }

    #[test]
    fn test_ifo_with_coupled_input_matches_fo() {
        // i = 1 - f makes ifo identical to fo
        let gates_fo = Gates {
            z: seq(&[0.2, 0.5, -0.4]),
            f: seq(&[0.3, 0.7, 0.1]),
            o: Some(seq(&[1.0, 0.5, 0.9])),
            i: None,
        };
        let gates_ifo = Gates {
            i: Some(seq(&[0.7, 0.3, 0.9])),
            ..gates_fo.clone()
        };

        let fo = read(pool(&gates_fo, None, None, false).hiddens);
        let ifo = read(pool(&gates_ifo, None, None, false).hiddens);
        assert_close(&ifo, &fo);
    }

    #[test]
    fn test_ifo_uses_input_gate() {
        let gates = Gates {
            z: seq(&[1.0, 1.0]),
            f: seq(&[0.5, 0.5]),
            o: Some(seq(&[1.0, 1.0])),
            i: Some(seq(&[0.2, 1.0])),
        };

        // c0 = 0.2 ; c1 = 0.5 * 0.2 + 1.0 = 1.1
        assert_close(&read(pool(&gates, None, None, false).hiddens), &[0.2, 1.1]);
    }

    #[test]
    fn test_skip_mask_leaves_pure_decay() {
        let gates = Gates {
            z: seq(&[0.2, 0.5, 0.9]),
            f: seq(&[0.3, 0.7, 0.4]),
            o: None,
            i: None,
        };
        let mask = Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0, 1.0]], &NdArrayDevice::Cpu);

        let h = read(pool(&gates, Some(&mask), None, false).hiddens);

        let h0 = 0.7 * 0.2;
        let h1 = 0.7 * h0;
        let h2 = 0.4 * h1 + 0.6 * 0.9;
        assert_close(&h, &[h0, h1, h2]);
    }

    #[test]
    fn test_carry_continues_from_previous_state() {
        let gates = Gates {
            z: seq(&[0.5]),
            f: seq(&[0.7]),
            o: None,
            i: None,
        };
        let carry = Tensor::<TestBackend, 2>::from_floats([[0.14]], &NdArrayDevice::Cpu);

        let h = read(pool(&gates, None, Some(carry), false).hiddens);
        assert_close(&h, &[0.248]);
    }
}
