//! Benchmark Command
//!
//! Times full-sequence forward, step-wise decoding and a training step
//! (forward with zoneout plus backward) of the language model.

use std::time::Instant;

use rand::Rng;

use qrnn::backend::{get_device, MyBackend, TrainBackend};
use qrnn::helpers::{create_batch_tensor, create_token_tensor, get_model_config, map_unknown};
use qrnn::model::{masked_cross_entropy, QrnnLanguageModel, TokenModel, EOS_ID};
use qrnn::utils::{format_latency, format_params, format_throughput};
use qrnn::{Mode, Result, ZoneoutSampler};

fn mean(times: &[f64]) -> f64 {
    times.iter().sum::<f64>() / times.len().max(1) as f64
}

pub fn execute(preset: &str, vocab_size: usize, seq_len: usize, num_iterations: usize) -> Result<()> {
    println!("═══════════════════════════════════════════════════════════");
    println!("  ⚡ QRNN benchmark");
    println!("═══════════════════════════════════════════════════════════");

    let device = get_device();
    let config = get_model_config(preset, vocab_size);
    let model: QrnnLanguageModel<MyBackend> = QrnnLanguageModel::new(&config, &device)?;

    println!("  Preset: {} ({} params)", preset, format_params(model.num_parameters()));
    println!("  Seq len: {}", seq_len);
    println!("  Iterations: {}", num_iterations);
    println!();

    let mut rng = rand::thread_rng();
    let sampled: Vec<usize> = (0..seq_len)
        .map(|_| rng.gen_range(EOS_ID + 1..vocab_size.max(EOS_ID + 2)))
        .collect();
    let tokens = map_unknown(&sampled, vocab_size);
    let batch = create_batch_tensor::<MyBackend>(&[tokens.clone()], &device)?;

    // Warmup
    println!("  Warmup...");
    for _ in 0..2 {
        model.forward(batch.clone(), &mut Mode::Inference)?;
    }

    println!("  Benchmarking forward...");
    let mut forward_times = Vec::with_capacity(num_iterations);
    for _ in 0..num_iterations {
        let start = Instant::now();
        model.forward(batch.clone(), &mut Mode::Inference)?;
        forward_times.push(start.elapsed().as_secs_f64());
    }

    println!("  Benchmarking step-wise decoding...");
    let mut step_times = Vec::with_capacity(num_iterations);
    for _ in 0..num_iterations {
        let mut states = model.empty_states();
        let start = Instant::now();
        for &token in &tokens {
            let (_, next) = model.step(create_token_tensor(&[token], &device), &states, &mut Mode::Inference)?;
            states = next;
        }
        step_times.push(start.elapsed().as_secs_f64());
    }

    println!("  Benchmarking training step...");
    let train_model: QrnnLanguageModel<TrainBackend> = QrnnLanguageModel::new(&config, &device)?;
    let train_batch = create_batch_tensor::<TrainBackend>(&[tokens.clone()], &device)?;
    let mut sampler = ZoneoutSampler::from_entropy();
    let mut train_times = Vec::with_capacity(num_iterations);
    for _ in 0..num_iterations {
        let start = Instant::now();
        let logits = train_model.forward(train_batch.clone(), &mut Mode::Train(&mut sampler))?;
        let loss = masked_cross_entropy(logits, train_batch.clone())?;
        let _grads = loss.backward();
        train_times.push(start.elapsed().as_secs_f64());
    }

    let avg_forward = mean(&forward_times);
    let avg_steps = mean(&step_times);
    let avg_train = mean(&train_times);

    println!();
    println!("═══════════════════════════════════════════════════════════");
    println!("  📊 Results:");
    println!("  Forward (seq={}): {} avg", seq_len, format_latency(avg_forward));
    println!("  Step-wise (seq={}): {} avg", seq_len, format_latency(avg_steps));
    println!("  Train step (seq={}): {} avg", seq_len, format_latency(avg_train));
    println!("  Throughput (forward): {}", format_throughput(seq_len as f64 / avg_forward));
    println!("  Throughput (step): {}", format_throughput(seq_len as f64 / avg_steps));
    println!("═══════════════════════════════════════════════════════════");

    Ok(())
}
