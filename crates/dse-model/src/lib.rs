//! Analytic latency and resource models for the accelerator's tiled
//! dataflow: nine pure cost kernels, their composition into one layer's
//! end-to-end latency, and the DSP/BRAM18K resource estimator.

pub mod cost_kernels;
pub mod latency_model;
pub mod resource_model;

pub use latency_model::layer_latency;
pub use resource_model::{bram_sdp_predict_hls, res_est};
