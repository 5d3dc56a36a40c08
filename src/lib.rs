//! Real-time black hole with a volumetric accretion disk: a full-screen
//! fragment program bends rays around a Schwarzschild mass and composites
//! disk, jet and photon-ring emission front to back. Quality adapts to the
//! device; the render loop paces, resizes and survives context loss.

pub mod camera;
pub mod controls;
pub mod error;
pub mod gl;
pub mod look;
pub mod physics;
pub mod quality;
pub mod raymarch;
pub mod scheduler;
pub mod shader;
pub mod volume;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use controls::{ControlState, FrameUniforms};
pub use error::{FailureSurface, RenderError};
pub use look::LookControls;
pub use quality::{classify, DeviceSignals, QualitySettings, QualityTier};
pub use scheduler::{FrameOutcome, GraphicsDevice, LoopState, RenderLoop};
pub use shader::{assemble, ShaderMode, ShaderSources};

#[cfg(target_arch = "wasm32")]
pub use web::AccretionDiskView;
