//! JSON configuration for backends, optimizers and layers.
//!
//! Every block is a plain `serde` struct; missing fields fall back to their
//! defaults. A whole network description looks like:
//!
//! ```json
//! {
//!   "backend": { "device": "cpu", "gemm_kernel": "asm", "seed": 7 },
//!   "optimizer": { "learning_rate": 0.1, "momentum_coef": 0.9 },
//!   "loss": "cross_entropy_multi",
//!   "layers": [
//!     { "nout": 32, "activation": { "type": "rectlin" } },
//!     { "nout": 10, "activation": { "type": "softmax", "short_cut": true } }
//!   ]
//! }
//! ```
//!
//! The device named in configuration can be overridden with the
//! `BRINY_KERNELS_BACKEND` environment variable (`cpu` or `wgpu`).

use crate::activation::ActivationKind;
use crate::backend::{Device, GemmKernel, set_default_device};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::filler::FillerKind;
use crate::layers::Affine;
use crate::loss::LossKind;
use crate::ops::dispatch::DispatchBackend;
use crate::optim::GradientDescent;
use crate::random::RngState;
use serde::Deserialize;
use std::env::{self, VarError};

/// Environment variable naming the default device.
pub const BACKEND_ENV: &str = "BRINY_KERNELS_BACKEND";

/// Reads [`BACKEND_ENV`]; `Ok(None)` when it is unset.
///
/// # Errors
/// `Error::UnknownDevice` if the variable is set to something unrecognised.
pub fn device_from_env() -> Result<Option<Device>> {
    match env::var(BACKEND_ENV) {
        Ok(name) => name.parse().map(Some),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(raw)) => Err(Error::UnknownDevice(raw.to_string_lossy().into_owned())),
    }
}

/// Device, GEMM path and seed for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// Requested device.
    pub device: Device,
    /// GEMM path used by layers built from this configuration.
    pub gemm_kernel: GemmKernel,
    /// Base seed for reproducible runs; entropy when absent.
    pub seed: Option<u64>,
}

impl BackendConfig {
    /// Parses a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Replaces the device with [`BACKEND_ENV`] when it is set.
    pub fn with_env_override(mut self) -> Result<Self> {
        if let Some(device) = device_from_env()? {
            tracing::debug!(?device, "device overridden from {BACKEND_ENV}");
            self.device = device;
        }
        Ok(self)
    }

    /// Makes the configured device the process-wide default.
    pub fn install(&self) {
        set_default_device(self.device);
    }

    /// A backend for the configured device, downgraded to the host when the
    /// device is unavailable.
    pub fn build(&self) -> DispatchBackend {
        DispatchBackend::new(self.device)
    }

    /// Random state for parameter fills and masks.
    pub fn rng(&self) -> RngState {
        self.seed.map_or_else(RngState::from_entropy, RngState::seeded)
    }
}

/// Gradient descent parameters as they appear in configuration.
pub type GradientDescentConfig = GradientDescent;

/// One [`Affine`](crate::layers::Affine) layer.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AffineConfig {
    /// Outputs per sample.
    pub nout: usize,
    /// Activation applied after the bias.
    #[serde(default)]
    pub activation: ActivationKind,
    /// Weight initialisation.
    #[serde(default)]
    pub filler: FillerKind,
    /// GEMM path; inherits [`BackendConfig::gemm_kernel`] when built through
    /// [`NetworkConfig`].
    #[serde(default)]
    pub kernel: Option<GemmKernel>,
}

impl AffineConfig {
    /// A layer with default activation and filler.
    pub fn new(nout: usize) -> Self {
        Self {
            nout,
            activation: ActivationKind::default(),
            filler: FillerKind::default(),
            kernel: None,
        }
    }

    /// The GEMM path, falling back to `default`.
    pub fn kernel_or(&self, default: GemmKernel) -> GemmKernel {
        self.kernel.unwrap_or(default)
    }
}

/// A feed-forward stack of affine layers and how to train it.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Device and reproducibility settings.
    pub backend: BackendConfig,
    /// Update rule for every layer.
    pub optimizer: GradientDescentConfig,
    /// Training objective.
    pub loss: LossKind,
    /// Layers from input to output.
    pub layers: Vec<AffineConfig>,
}

impl NetworkConfig {
    /// Parses a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Uninitialized layers sharing one backend for the configured device.
    pub fn build_layers<T: Element>(&self) -> Vec<Affine<T, DispatchBackend>> {
        let backend = self.backend.build();
        self.layers
            .iter()
            .map(|layer| Affine::from_config(backend, layer, self.backend.gemm_kernel))
            .collect()
    }
}
