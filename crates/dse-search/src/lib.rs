//! The two-level design-space search: a greedy per-layer tile-size
//! optimizer driven by `dse-model`'s latency model, and an enumerative
//! hardware-parameter search that partitions candidates across rayon
//! workers and reduces to the lexicographic `(latency, DSP, BRAM18K)`
//! optimum.

pub mod global_search;
pub mod per_layer_optimizer;

pub use global_search::search;
pub use per_layer_optimizer::optimize as optimize_layers;
