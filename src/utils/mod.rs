pub mod format;

pub use format::{format_latency, format_params, format_throughput};
