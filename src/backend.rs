//! Backend Selector
//!
//! The crate ships the CPU (NdArray) backend; training code wraps it in
//! `Autodiff`.

use burn::backend::Autodiff;
use burn::backend::ndarray::{NdArray, NdArrayDevice};

pub type MyBackend = NdArray;

/// Backend with autodiff for training
pub type TrainBackend = Autodiff<MyBackend>;

pub fn get_device() -> NdArrayDevice {
    NdArrayDevice::Cpu
}
