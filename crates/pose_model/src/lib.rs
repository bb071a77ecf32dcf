//! Recurrent pose-prediction model.
//!
//! This crate uses the Burn deep learning framework to define and run the
//! forward pass of a quaternion pose forecaster: a stack of GRU layers over
//! per-frame feature vectors, an output projection back to rotation space,
//! an optional velocity-residual composition, and unit renormalization of
//! every predicted joint rotation.
//!
//! Training (optimizer steps, schedules, checkpoint I/O) is owned by the
//! surrounding tooling; this crate only defines the network topology and
//! its deterministic forward evaluation.

pub mod gru;
pub mod model;

pub use gru::{GruCell, GruStack};
pub use model::{PoseModel, PoseModelConfig, Prediction};
