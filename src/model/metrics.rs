// src/model/metrics.rs
//! Pad-aware loss and evaluation metrics.
//!
//! Every metric ignores target positions equal to [`PAD_ID`].

use burn::tensor::{activation, backend::Backend, ElementConversion, Int, Tensor};
use rayon::prelude::*;

use super::PAD_ID;
use crate::error::{QrnnError, Result};
use crate::helpers::{ids_to_vec, tensor_to_vec};

fn check_targets<B: Backend>(logits: &Tensor<B, 3>, targets: &Tensor<B, 2, Int>) -> Result<()> {
    let [batch, steps, _] = logits.dims();
    let dims = targets.dims();
    if dims != [batch, steps] {
        return Err(QrnnError::shape(
            "targets",
            format!("{:?}", [batch, steps]),
            format!("{:?}", dims),
        ));
    }
    Ok(())
}

/// Log-probability of each target token, `[batch, time]`.
fn target_log_probs<B: Backend>(logits: Tensor<B, 3>, targets: Tensor<B, 2, Int>) -> Tensor<B, 2> {
    let [batch, steps, _] = logits.dims();
    activation::log_softmax(logits, 2)
        .gather(2, targets.unsqueeze_dim::<3>(2))
        .reshape([batch, steps])
}

/// Mean negative log-likelihood over non-pad targets. Differentiable.
pub fn masked_cross_entropy<B: Backend>(
    logits: Tensor<B, 3>,
    targets: Tensor<B, 2, Int>,
) -> Result<Tensor<B, 1>> {
    check_targets(&logits, &targets)?;

    let mask = targets.clone().equal_elem(PAD_ID as i64).bool_not().float();
    let count: f32 = mask.clone().sum().into_scalar().elem();
    if count == 0.0 {
        return Err(QrnnError::Numerical("no non-pad targets in batch".into()));
    }

    let nll = target_log_probs(logits, targets).neg() * mask;
    Ok(nll.sum().div_scalar(count))
}

/// Fraction of non-pad targets whose argmax prediction is correct.
pub fn accuracy<B: Backend>(logits: Tensor<B, 3>, targets: Tensor<B, 2, Int>) -> Result<f32> {
    check_targets(&logits, &targets)?;
    let [batch, steps, _] = logits.dims();

    let mask = targets.clone().equal_elem(PAD_ID as i64).bool_not().float();
    let count: f32 = mask.clone().sum().into_scalar().elem();
    if count == 0.0 {
        return Err(QrnnError::Numerical("no non-pad targets in batch".into()));
    }

    let predicted = logits.argmax(2).reshape([batch, steps]);
    let hits = predicted.equal(targets).float() * mask;
    let hits: f32 = hits.sum().into_scalar().elem();

    Ok(hits / count)
}

/// Per-sequence perplexity averaged in log space.
///
/// Each row contributes the mean log-likelihood of its targets up to (not
/// including) its first pad; the result is `exp(-mean over rows)`.
pub fn perplexity<B: Backend>(logits: Tensor<B, 3>, targets: Tensor<B, 2, Int>) -> Result<f32> {
    check_targets(&logits, &targets)?;
    let [batch, steps, _] = logits.dims();

    let log_probs = tensor_to_vec(target_log_probs(logits, targets.clone()))?;
    let ids = ids_to_vec(targets)?;

    let mut total = 0.0f64;
    for row in 0..batch {
        let range = row * steps..(row + 1) * steps;
        let tokens = ids[range.clone()]
            .iter()
            .take_while(|&&id| id != PAD_ID as i64)
            .count();
        if tokens == 0 {
            return Err(QrnnError::Numerical(format!("sequence {} has no tokens", row)));
        }
        let sum: f64 = log_probs[range].iter().take(tokens).map(|&lp| lp as f64).sum();
        total += sum / tokens as f64;
    }

    Ok((-total / batch as f64).exp() as f32)
}

/// Word-level Levenshtein distance divided by the reference length.
pub fn word_error_rate<T: PartialEq>(hypothesis: &[T], reference: &[T]) -> Result<f32> {
    if reference.is_empty() {
        return Err(QrnnError::Numerical("empty reference".into()));
    }

    // single-row dynamic programming
    let mut row: Vec<usize> = (0..=hypothesis.len()).collect();
    for (i, r) in reference.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, h) in hypothesis.iter().enumerate() {
            let substitution = diagonal + usize::from(r != h);
            diagonal = row[j + 1];
            row[j + 1] = substitution.min(row[j] + 1).min(diagonal + 1);
        }
    }

    Ok(row[hypothesis.len()] as f32 / reference.len() as f32)
}

/// Mean WER over `(hypothesis, reference)` pairs.
pub fn mean_word_error_rate<T: PartialEq + Sync>(pairs: &[(Vec<T>, Vec<T>)]) -> Result<f32> {
    if pairs.is_empty() {
        return Err(QrnnError::Numerical("no sentence pairs".into()));
    }

    let rates = pairs
        .par_iter()
        .map(|(hyp, reference)| word_error_rate(hyp, reference))
        .collect::<Result<Vec<_>>>()?;

    Ok(rates.iter().sum::<f32>() / rates.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wer_identical_is_zero() {
        assert_eq!(word_error_rate(&[4, 5, 6], &[4, 5, 6]).unwrap(), 0.0);
    }

    #[test]
    fn test_wer_counts_edits() {
        // one substitution + one deletion over 4 reference words
        let wer = word_error_rate(&["a", "x", "c"], &["a", "b", "c", "d"]).unwrap();
        assert!((wer - 0.5).abs() < 1e-6);

        // insertions can push WER above 1
        let wer = word_error_rate(&[1, 2, 3], &[1]).unwrap();
        assert!((wer - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_wer_empty_hypothesis() {
        assert_eq!(word_error_rate::<u32>(&[], &[7, 8]).unwrap(), 1.0);
    }

    #[test]
    fn test_wer_empty_reference_is_error() {
        assert!(matches!(
            word_error_rate(&[1], &[]),
            Err(QrnnError::Numerical(_))
        ));
    }

    #[test]
    fn test_mean_wer() {
        let pairs = vec![(vec![1, 2], vec![1, 2]), (vec![9, 9], vec![1, 2])];
        assert!((mean_word_error_rate(&pairs).unwrap() - 0.5).abs() < 1e-6);
        assert!(mean_word_error_rate::<u8>(&[]).is_err());
    }
}
