// src/qrnn/config.rs
//! Layer configuration: pooling mode, layer kind and hyper-parameters.

use std::fmt;
use std::str::FromStr;

use burn::{
    config::Config,
    module::Ignored,
    nn::{conv::Conv1dConfig, Initializer, LinearConfig, PaddingConfig1d},
    tensor::backend::Backend,
};
use serde::{Deserialize, Serialize};

use super::gates::GateProjection;
use super::layer::{Qrnn, QrnnSettings};
use crate::error::QrnnError;

/// Which gates parameterize the recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    F,
    Fo,
    Ifo,
}

impl Pooling {
    /// Number of gate tensors stacked by the convolution (Z plus the named gates).
    pub fn num_split(self) -> usize {
        match self {
            Pooling::F => 2,
            Pooling::Fo => 3,
            Pooling::Ifo => 4,
        }
    }

    pub fn has_output_gate(self) -> bool {
        !matches!(self, Pooling::F)
    }

    pub fn has_input_gate(self) -> bool {
        matches!(self, Pooling::Ifo)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Pooling::F => "f",
            Pooling::Fo => "fo",
            Pooling::Ifo => "ifo",
        }
    }
}

impl FromStr for Pooling {
    type Err = QrnnError;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s {
            "f" => Ok(Pooling::F),
            "fo" => Ok(Pooling::Fo),
            "ifo" => Ok(Pooling::Ifo),
            other => Err(QrnnError::Config(format!(
                "unknown pooling '{}', expected one of f, fo, ifo",
                other
            ))),
        }
    }
}

impl fmt::Display for Pooling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layer variant. Decoders take an encoder summary; the attentive decoder
/// additionally reads all encoder hidden states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Encoder,
    Decoder,
    AttentiveDecoder,
}

impl LayerKind {
    pub fn takes_summary(self) -> bool {
        !matches!(self, LayerKind::Encoder)
    }

    pub fn is_attentive(self) -> bool {
        matches!(self, LayerKind::AttentiveDecoder)
    }
}

#[derive(Config, Debug)]
pub struct QrnnConfig {
    pub in_channels: usize,
    pub out_channels: usize,

    #[config(default = "2")]
    pub kernel_size: usize,

    #[config(default = "Pooling::F")]
    pub pooling: Pooling,

    #[config(default = "LayerKind::Encoder")]
    pub kind: LayerKind,

    #[config(default = "false")]
    pub zoneout: bool,

    /// Probability that a forget gate position is frozen to 1.
    #[config(default = "0.1")]
    pub zoneout_ratio: f64,

    /// Std of the normal initializer for all weights.
    #[config(default = "1.0")]
    pub wstd: f64,
}

impl QrnnConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.kernel_size == 0 {
            return Err(QrnnError::Config("kernel_size must be >= 1".into()));
        }
        if self.in_channels == 0 || self.out_channels == 0 {
            return Err(QrnnError::Config(format!(
                "channel counts must be positive (in={}, out={})",
                self.in_channels, self.out_channels
            )));
        }
        if !(0.0..=1.0).contains(&self.zoneout_ratio) {
            return Err(QrnnError::Config(format!(
                "zoneout_ratio must lie in [0, 1], got {}",
                self.zoneout_ratio
            )));
        }
        if !(self.wstd.is_finite() && self.wstd > 0.0) {
            return Err(QrnnError::Config(format!("wstd must be positive, got {}", self.wstd)));
        }
        if self.kind.is_attentive() && self.pooling != Pooling::Fo {
            return Err(QrnnError::Config(format!(
                "attentive decoder requires fo pooling, got {}",
                self.pooling
            )));
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> crate::error::Result<Qrnn<B>> {
        self.validate()?;

        let num_split = self.pooling.num_split();
        let initializer = Initializer::Normal {
            mean: 0.0,
            std: self.wstd,
        };

        // left padding is done by the layer (zeros or the carried window)
        let conv = Conv1dConfig::new(
            self.in_channels,
            num_split * self.out_channels,
            self.kernel_size,
        )
        .with_padding(PaddingConfig1d::Valid)
        .with_initializer(initializer.clone())
        .init(device);

        let context = self.kind.takes_summary().then(|| {
            LinearConfig::new(self.out_channels, num_split * self.out_channels)
                .with_initializer(initializer.clone())
                .init(device)
        });

        let readout = self.kind.is_attentive().then(|| {
            LinearConfig::new(2 * self.out_channels, self.out_channels)
                .with_initializer(initializer.clone())
                .init(device)
        });

        tracing::debug!(
            kind = ?self.kind,
            pooling = %self.pooling,
            in_channels = self.in_channels,
            out_channels = self.out_channels,
            kernel_size = self.kernel_size,
            zoneout = self.zoneout,
            "initialized QRNN layer"
        );

        Ok(Qrnn {
            gates: GateProjection::new(conv, context, num_split, self.out_channels),
            readout,
            settings: Ignored(QrnnSettings {
                kind: self.kind,
                pooling: self.pooling,
                in_channels: self.in_channels,
                out_channels: self.out_channels,
                kernel_size: self.kernel_size,
                zoneout_ratio: self.zoneout.then_some(self.zoneout_ratio),
            }),
        })
    }
}
