//! Info Command
//!
//! Shows the layer stack and parameter counts of a preset.

use qrnn::helpers::{get_model_config, get_seq2seq_config};
use qrnn::model::layer_parameters;
use qrnn::utils::format_params;
use qrnn::QrnnConfig;

fn print_layers(layers: &[QrnnConfig]) {
    for (i, layer) in layers.iter().enumerate() {
        println!(
            "    [{}] {:?} {} -> {} | k={} | pooling={} | zoneout={} | {} params",
            i,
            layer.kind,
            layer.in_channels,
            layer.out_channels,
            layer.kernel_size,
            layer.pooling,
            if layer.zoneout { format!("{:.2}", layer.zoneout_ratio) } else { "off".to_string() },
            format_params(layer_parameters(layer)),
        );
    }
}

pub fn execute(preset: &str, vocab_size: usize) {
    let lm = get_model_config(preset, vocab_size);
    let s2s = get_seq2seq_config(preset, vocab_size);

    println!("═══════════════════════════════════════════════════════════");
    println!("  📊 QRNN preset: {} (backend: {})", preset, qrnn::backend_name());
    println!("═══════════════════════════════════════════════════════════");
    println!("  Language model: {} params", format_params(lm.num_parameters()));
    println!("  vocab_size: {}", lm.vocab_size);
    println!("  embedding_dim: {}", lm.embedding_dim);
    println!("  hidden_dim: {}", lm.hidden_dim);
    println!("  dropout: {}", lm.dropout);
    println!("  densely_connected: {}", lm.densely_connected);
    print_layers(&lm.layer_configs());
    println!();

    println!("  Seq2seq: {} params", format_params(s2s.num_parameters()));
    println!("  attention: {}", s2s.attention);
    println!("  Encoder:");
    print_layers(&s2s.encoder_configs());
    println!("  Decoder:");
    print_layers(&s2s.decoder_configs());
    println!("═══════════════════════════════════════════════════════════");
}
