// src/utils/format.rs
//! Display helpers for the CLI

/// Parameter count with a K/M/B suffix.
pub fn format_params(n: usize) -> String {
    if n >= 1_000_000_000 {
        format!("{:.2}B", n as f64 / 1e9)
    } else if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1e6)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1e3)
    } else {
        n.to_string()
    }
}

/// Seconds as `ms` below one second, otherwise as `s`.
pub fn format_latency(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.2}ms", secs * 1000.0)
    } else {
        format!("{:.2}s", secs)
    }
}

/// Tokens per second.
pub fn format_throughput(tokens_per_sec: f64) -> String {
    if tokens_per_sec >= 1_000_000.0 {
        format!("{:.2}M tok/s", tokens_per_sec / 1e6)
    } else if tokens_per_sec >= 1_000.0 {
        format!("{:.1}K tok/s", tokens_per_sec / 1e3)
    } else {
        format!("{:.1} tok/s", tokens_per_sec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_params() {
        assert_eq!(format_params(1_240_000), "1.2M");
        assert_eq!(format_params(1_500_000_000), "1.50B");
        assert_eq!(format_params(2_500), "2.5K");
        assert_eq!(format_params(768), "768");
    }

    #[test]
    fn test_format_latency() {
        assert_eq!(format_latency(0.0125), "12.50ms");
        assert_eq!(format_latency(2.5), "2.50s");
    }

    #[test]
    fn test_format_throughput() {
        assert_eq!(format_throughput(512.0), "512.0 tok/s");
        assert_eq!(format_throughput(12_500.0), "12.5K tok/s");
        assert_eq!(format_throughput(2_000_000.0), "2.00M tok/s");
    }
}
