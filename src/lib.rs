//! Position-comparison win predictor for Murus Gallicus.
//!
//! Recorded game outcomes are turned into a two-stage model: an unsupervised
//! stack of RBMs compresses one-hot board features into embeddings, and a
//! feed-forward classifier compares two embedded positions and predicts which
//! side the winning position belongs to.

pub mod board;
pub mod dataset;
pub mod error;
pub mod model;
pub mod pipeline;
