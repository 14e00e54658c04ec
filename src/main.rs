mod commands;

use clap::{Parser, Subcommand};

// ============ CLI ============
#[derive(Parser)]
#[command(name = "qrnn")]
#[command(version)]
#[command(about = "Quasi-recurrent neural network layers and models")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shows the layer stack and parameter counts of a preset
    Info {
        #[arg(long, default_value = "small")]
        preset: String,
        #[arg(long, default_value = "10000")]
        vocab_size: usize,
    },

    /// Times forward and step-wise decoding
    Benchmark {
        #[arg(long, default_value = "small")]
        preset: String,
        #[arg(long, default_value = "10000")]
        vocab_size: usize,
        #[arg(long, default_value = "64")]
        seq_len: usize,
        #[arg(long, default_value = "5")]
        iterations: usize,
    },
}

fn main() {
    // Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Info { preset, vocab_size } => {
            commands::info::execute(&preset, vocab_size);
            Ok(())
        }
        Commands::Benchmark { preset, vocab_size, seq_len, iterations } => {
            commands::benchmark::execute(&preset, vocab_size, seq_len, iterations)
        }
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
