//! Core types for the FPGA CNN accelerator design-space explorer.
//!
//! This crate provides the foundational data model shared by the cost
//! kernels, the layer expander and the two-level search: the hardware
//! parameter record (`HWParams`), the expanded per-layer description
//! (`LayerSpec`), the per-layer tile choice (`PerLayerChoice`), and the
//! input descriptors read from the four CLI-provided files.
//!
//! # Design
//!
//! Hardware parameters and per-layer choices are immutable records, not a
//! mutated shared dictionary: generators yield fresh `HWParams`, and the
//! per-layer optimizer builds up a `PerLayerChoice` vector as output rather
//! than threading one config object through the whole search.

pub mod error;

pub use error::DseError;

use serde::{Deserialize, Serialize};

// ============================================================================
// Hardware parameters
// ============================================================================

/// Element type of the systolic array's datapath, controlling DSPs per MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "ap_fixed<16>")]
    ApFixed16,
}

impl DataType {
    /// DSPs consumed per multiply-accumulate for this element type.
    pub fn dsp_per_mac(self) -> f64 {
        match self {
            DataType::Float => 5.0,
            DataType::ApFixed16 => 1.0,
        }
    }
}

/// One candidate hardware design point.
///
/// `IN_NUM_T` and `OUT_NUM_T` are always set equal at the outer level
/// (per spec); they are kept as distinct fields because per-layer tile
/// refinement pins each independently to outer bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HWParams {
    pub in_h_t: u32,
    pub in_w_t: u32,
    pub in_num_t: u32,
    pub out_num_t: u32,
    pub simd_lane: u32,
    pub sa_rows: u32,
    pub sa_cols: u32,
    pub sa_simd_lane: u32,
    pub k_t: u32,
    pub data_w0: u32,
    pub data_w1: u32,
    pub data_w2: u32,
    pub bus_w: u32,
    pub data_t0: DataType,
    pub fre: u32,
}

impl HWParams {
    /// Construct a design point with the fixed defaults from spec.md §3
    /// (`K_T = 3`, 32-bit datapaths, 512-bit bus, float datapath) and the
    /// tile/SIMD fields supplied by the generator.
    pub fn with_defaults(
        in_h_t: u32,
        in_w_t: u32,
        in_num_t: u32,
        simd_lane: u32,
        sa_rows: u32,
        sa_cols: u32,
        sa_simd_lane: u32,
    ) -> Self {
        Self {
            in_h_t,
            in_w_t,
            in_num_t,
            out_num_t: in_num_t,
            simd_lane,
            sa_rows,
            sa_cols,
            sa_simd_lane,
            k_t: 3,
            data_w0: 32,
            data_w1: 32,
            data_w2: 32,
            bus_w: 512,
            data_t0: DataType::Float,
            fre: 250,
        }
    }
}

// ============================================================================
// Expanded layer description
// ============================================================================

/// One expanded layer instance, after `LayerExpander` has resolved
/// skip/concat inputs and stage repetition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    /// Layer name as it appeared in the model file (diagnostic only).
    pub name: String,
    pub layer_in_num: u32,
    pub layer_out_num: u32,
    pub layer_in_h: u32,
    pub layer_in_w: u32,
    pub layer_filter_s1: u32,
    pub layer_filter_s2: u32,
    pub layer_stride: u32,
    pub depth_conv_en: bool,
    pub point_conv_en: bool,
    pub bias_en: bool,
    pub max_pool_en: bool,
}

/// The per-layer tile choice made by `PerLayerOptimizer` for one layer.
///
/// `LAYER_OUT_H_T`/`LAYER_OUT_W_T` are not stored: they are always equal to
/// `layer_in_h_t`/`layer_in_w_t` (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerLayerChoice {
    pub layer_in_num_t: u32,
    pub layer_out_num_t: u32,
    pub layer_in_h_t: u32,
    pub layer_in_w_t: u32,
}

impl PerLayerChoice {
    pub fn layer_out_h_t(&self) -> u32 {
        self.layer_in_h_t
    }

    pub fn layer_out_w_t(&self) -> u32 {
        self.layer_in_w_t
    }
}

// ============================================================================
// Topology descriptor
// ============================================================================

/// Groups the network's layers into a feature-extractor stage ("VGG") and
/// two multi-branch refinement stages with repeat counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyDescriptor {
    pub vgg_layers: usize,
    pub stage1_layers: usize,
    pub stage1_iter: usize,
    pub stage2_layers: usize,
    pub stage2_iter: usize,
}

impl TopologyDescriptor {
    /// `VGG_LAYERS + 2*STAGE1_LAYERS*STAGE1_ITER + 2*STAGE2_LAYERS*STAGE2_ITER`.
    pub fn expanded_layer_count(&self) -> usize {
        self.vgg_layers
            + 2 * self.stage1_layers * self.stage1_iter
            + 2 * self.stage2_layers * self.stage2_iter
    }
}

// ============================================================================
// Input descriptors (read by dse-cli, shared shape lives here)
// ============================================================================

/// `model_config` keyed record (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(rename = "VGG_LAYERS")]
    pub vgg_layers: usize,
    #[serde(rename = "STAGE1_LAYERS")]
    pub stage1_layers: usize,
    #[serde(rename = "STAGE1_ITER")]
    pub stage1_iter: usize,
    #[serde(rename = "STAGE2_LAYERS")]
    pub stage2_layers: usize,
    #[serde(rename = "STAGE2_ITER")]
    pub stage2_iter: usize,
}

impl From<ModelConfig> for TopologyDescriptor {
    fn from(m: ModelConfig) -> Self {
        TopologyDescriptor {
            vgg_layers: m.vgg_layers,
            stage1_layers: m.stage1_layers,
            stage1_iter: m.stage1_iter,
            stage2_layers: m.stage2_layers,
            stage2_iter: m.stage2_iter,
        }
    }
}

/// `input_config` keyed record (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(rename = "IN_NUM")]
    pub in_num: u32,
    #[serde(rename = "IN_H")]
    pub in_h: u32,
    #[serde(rename = "IN_W")]
    pub in_w: u32,
}

/// `board` keyed record (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(rename = "DSP")]
    pub dsp: f64,
    #[serde(rename = "BRAM18K")]
    pub bram18k: f64,
    #[serde(rename = "DSP_THRES")]
    pub dsp_thres: f64,
    #[serde(rename = "BRAM18K_THRES")]
    pub bram18k_thres: f64,
}

// ============================================================================
// Persisted optimum record
// ============================================================================

/// The persisted-record schema from spec.md §6: every field in `HWParams`
/// relevant to reproduction, plus the four per-layer lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptParams {
    #[serde(rename = "LAYER_IN_H_T")]
    pub layer_in_h_t: u32,
    #[serde(rename = "LAYER_IN_W_T")]
    pub layer_in_w_t: u32,
    #[serde(rename = "LAYER_OUT_H_T")]
    pub layer_out_h_t: u32,
    #[serde(rename = "LAYER_OUT_W_T")]
    pub layer_out_w_t: u32,
    #[serde(rename = "LAYER_IN_NUM_T")]
    pub layer_in_num_t: u32,
    #[serde(rename = "LAYER_OUT_NUM_T")]
    pub layer_out_num_t: u32,
    #[serde(rename = "SIMD_LANE")]
    pub simd_lane: u32,
    #[serde(rename = "SA_ROWS")]
    pub sa_rows: u32,
    #[serde(rename = "SA_COLS")]
    pub sa_cols: u32,
    #[serde(rename = "SA_SIMD_LANE")]
    pub sa_simd_lane: u32,
    #[serde(rename = "FRE")]
    pub fre: u32,
    #[serde(rename = "LAYER_IN_NUM_T_LIST")]
    pub layer_in_num_t_list: Vec<u32>,
    #[serde(rename = "LAYER_OUT_NUM_T_LIST")]
    pub layer_out_num_t_list: Vec<u32>,
    #[serde(rename = "LAYER_IN_H_T_LIST")]
    pub layer_in_h_t_list: Vec<u32>,
    #[serde(rename = "LAYER_IN_W_T_LIST")]
    pub layer_in_w_t_list: Vec<u32>,
}

impl OptParams {
    pub fn from_hw_and_choices(hw: &HWParams, choices: &[PerLayerChoice]) -> Self {
        Self {
            layer_in_h_t: hw.in_h_t,
            layer_in_w_t: hw.in_w_t,
            layer_out_h_t: hw.in_h_t,
            layer_out_w_t: hw.in_w_t,
            layer_in_num_t: hw.in_num_t,
            layer_out_num_t: hw.out_num_t,
            simd_lane: hw.simd_lane,
            sa_rows: hw.sa_rows,
            sa_cols: hw.sa_cols,
            sa_simd_lane: hw.sa_simd_lane,
            fre: hw.fre,
            layer_in_num_t_list: choices.iter().map(|c| c.layer_in_num_t).collect(),
            layer_out_num_t_list: choices.iter().map(|c| c.layer_out_num_t).collect(),
            layer_in_h_t_list: choices.iter().map(|c| c.layer_in_h_t).collect(),
            layer_in_w_t_list: choices.iter().map(|c| c.layer_in_w_t).collect(),
        }
    }
}

/// The outcome of the full two-level search: the lexicographic optimum
/// `(latency, DSP, BRAM18K)` and the hardware/per-layer choices that
/// produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub opt_latency: f64,
    pub opt_dsp: f64,
    pub opt_bram18k: f64,
    pub opt_params: OptParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expanded_layer_count_matches_formula() {
        let topo = TopologyDescriptor {
            vgg_layers: 13,
            stage1_layers: 5,
            stage1_iter: 2,
            stage2_layers: 7,
            stage2_iter: 4,
        };
        assert_eq!(topo.expanded_layer_count(), 13 + 2 * 5 * 2 + 2 * 7 * 4);
    }

    #[test]
    fn data_type_dsp_per_mac() {
        assert_eq!(DataType::Float.dsp_per_mac(), 5.0);
        assert_eq!(DataType::ApFixed16.dsp_per_mac(), 1.0);
    }

    #[test]
    fn hw_params_defaults_set_out_num_t_equal_in_num_t() {
        let hw = HWParams::with_defaults(2, 2, 16, 2, 1, 1, 1);
        assert_eq!(hw.out_num_t, hw.in_num_t);
        assert_eq!(hw.k_t, 3);
        assert_eq!(hw.bus_w, 512);
    }

    #[test]
    fn model_config_converts_to_topology_descriptor() {
        let mc = ModelConfig {
            vgg_layers: 13,
            stage1_layers: 5,
            stage1_iter: 2,
            stage2_layers: 7,
            stage2_iter: 4,
        };
        let topo: TopologyDescriptor = mc.into();
        assert_eq!(topo.vgg_layers, 13);
    }
}
