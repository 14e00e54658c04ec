// src/model/config.rs
//! Configurations for the stacked QRNN models.

use burn::config::Config;

use crate::error::QrnnError;
use crate::qrnn::{LayerKind, Pooling, QrnnConfig};

#[derive(Config, Debug)]
pub struct LanguageModelConfig {
    pub vocab_size: usize,

    #[config(default = "320")]
    pub embedding_dim: usize,

    #[config(default = "640")]
    pub hidden_dim: usize,

    #[config(default = "2")]
    pub num_layers: usize,

    #[config(default = "4")]
    pub kernel_size: usize,

    #[config(default = "Pooling::Fo")]
    pub pooling: Pooling,

    #[config(default = "false")]
    pub zoneout: bool,

    #[config(default = "0.1")]
    pub zoneout_ratio: f64,

    /// Dropout before every layer (train mode only).
    #[config(default = "0.0")]
    pub dropout: f64,

    /// Residual connection around every layer whose in/out widths agree.
    #[config(default = "false")]
    pub densely_connected: bool,

    #[config(default = "0.01")]
    pub wstd: f64,
}

impl LanguageModelConfig {
    /// ~3.7M params at vocab 8k: quick experiments and tests
    pub fn small(vocab_size: usize) -> Self {
        Self::new(vocab_size)
            .with_embedding_dim(128)
            .with_hidden_dim(256)
            .with_num_layers(2)
            .with_kernel_size(2)
    }

    /// Word-level PTB setup
    pub fn medium(vocab_size: usize) -> Self {
        Self::new(vocab_size)
            .with_embedding_dim(320)
            .with_hidden_dim(640)
            .with_num_layers(2)
            .with_kernel_size(4)
            .with_zoneout(true)
            .with_dropout(0.2)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.vocab_size == 0 {
            return Err(QrnnError::Config("vocab_size must be positive".into()));
        }
        if self.num_layers == 0 {
            return Err(QrnnError::Config("num_layers must be >= 1".into()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(QrnnError::Config(format!(
                "dropout must lie in [0, 1), got {}",
                self.dropout
            )));
        }
        for layer in self.layer_configs() {
            layer.validate()?;
        }
        Ok(())
    }

    /// Per-layer configs, bottom first.
    pub fn layer_configs(&self) -> Vec<QrnnConfig> {
        (0..self.num_layers)
            .map(|l| {
                let in_channels = if l == 0 { self.embedding_dim } else { self.hidden_dim };
                QrnnConfig::new(in_channels, self.hidden_dim)
                    .with_kernel_size(self.kernel_size)
                    .with_pooling(self.pooling)
                    .with_kind(LayerKind::Encoder)
                    .with_zoneout(self.zoneout)
                    .with_zoneout_ratio(self.zoneout_ratio)
                    .with_wstd(self.wstd)
            })
            .collect()
    }

    pub fn num_parameters(&self) -> usize {
        let embed = self.vocab_size * self.embedding_dim;
        let layers: usize = self.layer_configs().iter().map(layer_parameters).sum();
        let head = self.hidden_dim * self.vocab_size + self.vocab_size;
        embed + layers + head
    }
}

#[derive(Config, Debug)]
pub struct Seq2SeqConfig {
    pub source_vocab_size: usize,
    pub target_vocab_size: usize,

    #[config(default = "320")]
    pub embedding_dim: usize,

    #[config(default = "320")]
    pub hidden_dim: usize,

    #[config(default = "4")]
    pub num_layers: usize,

    #[config(default = "2")]
    pub kernel_size: usize,

    #[config(default = "Pooling::Fo")]
    pub pooling: Pooling,

    #[config(default = "false")]
    pub zoneout: bool,

    #[config(default = "0.1")]
    pub zoneout_ratio: f64,

    #[config(default = "0.0")]
    pub dropout: f64,

    #[config(default = "false")]
    pub densely_connected: bool,

    /// Makes the top decoder layer attend over the top encoder layer.
    #[config(default = "false")]
    pub attention: bool,

    #[config(default = "0.01")]
    pub wstd: f64,
}

impl Seq2SeqConfig {
    pub fn small(source_vocab_size: usize, target_vocab_size: usize) -> Self {
        Self::new(source_vocab_size, target_vocab_size)
            .with_embedding_dim(128)
            .with_hidden_dim(128)
            .with_num_layers(2)
    }

    pub fn medium(source_vocab_size: usize, target_vocab_size: usize) -> Self {
        Self::new(source_vocab_size, target_vocab_size)
            .with_zoneout(true)
            .with_attention(true)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.source_vocab_size == 0 || self.target_vocab_size == 0 {
            return Err(QrnnError::Config("vocabulary sizes must be positive".into()));
        }
        if self.num_layers == 0 {
            return Err(QrnnError::Config("num_layers must be >= 1".into()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(QrnnError::Config(format!(
                "dropout must lie in [0, 1), got {}",
                self.dropout
            )));
        }
        if self.attention && self.pooling != Pooling::Fo {
            return Err(QrnnError::Config(format!(
                "attention requires fo pooling, got {}",
                self.pooling
            )));
        }
        for layer in self.encoder_configs().iter().chain(self.decoder_configs().iter()) {
            layer.validate()?;
        }
        Ok(())
    }

    fn layer_config(&self, layer: usize, kind: LayerKind) -> QrnnConfig {
        let in_channels = if layer == 0 { self.embedding_dim } else { self.hidden_dim };
        QrnnConfig::new(in_channels, self.hidden_dim)
            .with_kernel_size(self.kernel_size)
            .with_pooling(self.pooling)
            .with_kind(kind)
            .with_zoneout(self.zoneout)
            .with_zoneout_ratio(self.zoneout_ratio)
            .with_wstd(self.wstd)
    }

    pub fn encoder_configs(&self) -> Vec<QrnnConfig> {
        (0..self.num_layers)
            .map(|l| self.layer_config(l, LayerKind::Encoder))
            .collect()
    }

    pub fn decoder_configs(&self) -> Vec<QrnnConfig> {
        (0..self.num_layers)
            .map(|l| {
                let kind = if self.attention && l + 1 == self.num_layers {
                    LayerKind::AttentiveDecoder
                } else {
                    LayerKind::Decoder
                };
                self.layer_config(l, kind)
            })
            .collect()
    }

    pub fn num_parameters(&self) -> usize {
        let embed = (self.source_vocab_size + self.target_vocab_size) * self.embedding_dim;
        let layers: usize = self
            .encoder_configs()
            .iter()
            .chain(self.decoder_configs().iter())
            .map(layer_parameters)
            .sum();
        let head = self.hidden_dim * self.target_vocab_size + self.target_vocab_size;
        embed + layers + head
    }
}

/// Weights + biases of one layer as built by [`QrnnConfig::init`].
pub fn layer_parameters(config: &QrnnConfig) -> usize {
    let n = config.pooling.num_split() * config.out_channels;
    let conv = config.in_channels * n * config.kernel_size + n;
    let context = if config.kind.takes_summary() {
        config.out_channels * n + n
    } else {
        0
    };
    let readout = if config.kind.is_attentive() {
        2 * config.out_channels * config.out_channels + config.out_channels
    } else {
        0
    };
    conv + context + readout
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lm_layer_widths() {
        let config = LanguageModelConfig::new(100)
            .with_embedding_dim(8)
            .with_hidden_dim(16)
            .with_num_layers(3);
        let layers = config.layer_configs();
        assert_eq!(layers.len(), 3);
        assert_eq!((layers[0].in_channels, layers[0].out_channels), (8, 16));
        assert_eq!((layers[2].in_channels, layers[2].out_channels), (16, 16));
    }

    #[test]
    fn test_seq2seq_attention_only_on_top_layer() {
        let config = Seq2SeqConfig::new(10, 12).with_num_layers(3).with_attention(true);
        let kinds: Vec<_> = config.decoder_configs().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![LayerKind::Decoder, LayerKind::Decoder, LayerKind::AttentiveDecoder]
        );
    }

    #[test]
    fn test_validate() {
        assert!(LanguageModelConfig::new(0).validate().is_err());
        assert!(LanguageModelConfig::new(10).with_num_layers(0).validate().is_err());
        assert!(LanguageModelConfig::new(10).with_dropout(1.0).validate().is_err());
        assert!(LanguageModelConfig::new(10).with_kernel_size(0).validate().is_err());
        assert!(LanguageModelConfig::small(10).validate().is_ok());

        assert!(Seq2SeqConfig::new(10, 10)
            .with_attention(true)
            .with_pooling(Pooling::Ifo)
            .validate()
            .is_err());
        assert!(Seq2SeqConfig::medium(10, 10).validate().is_ok());
    }

    #[test]
    fn test_layer_parameters() {
        // conv: 4 * 9 * 2 + 9 = 81
        let enc = QrnnConfig::new(4, 3).with_pooling(Pooling::Fo);
        assert_eq!(layer_parameters(&enc), 81);

        // + context 3 * 9 + 9 = 36, + readout 2 * 3 * 3 + 3 = 21
        let att = enc.with_kind(LayerKind::AttentiveDecoder);
        assert_eq!(layer_parameters(&att), 81 + 36 + 21);
    }

    #[test]
    fn test_small_preset_size() {
        // embed 8000 * 128, layers 197_376 + 393_984, head 256 * 8000 + 8000
        let config = LanguageModelConfig::small(8000);
        assert_eq!(config.num_parameters(), 3_671_360);
    }
}
