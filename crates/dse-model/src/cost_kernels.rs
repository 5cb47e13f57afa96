//! Nine pure analytic cost kernels returning cycle counts for each pipeline
//! stage of one layer's dataflow, plus the effective-DRAM-bandwidth helper
//! they all share.
//!
//! All arithmetic is real-valued (`f64`); the only places that round up are
//! the explicit `.ceil()` calls below. Implementers must not algebraically
//! simplify these formulas — the associativity is part of the contract
//! against which bit-exact reproduction is checked.

const DRAM_LATENCY_CYCLES: f64 = 120.0;

/// Effective DRAM bandwidth and effective port width for a burst of
/// `burst_len` beats over a `port_width`-bit port at `fre` MHz.
///
/// Only `eff_port_width` is consumed downstream; `eff_bw` is returned for
/// completeness / debuggability, matching the reference's two-value return.
pub fn effective_dram_est(port_width: f64, burst_len: f64, fre: f64) -> (f64, f64) {
    let eff_bw = port_width * burst_len / 8.0 / ((DRAM_LATENCY_CYCLES + burst_len) / (fre * 1e6)) / 1e9;
    let eff_port_width = eff_bw * 1e9 * 8.0 / (fre * 1e6);
    (eff_bw, eff_port_width)
}

/// Feature-map tile load: bursts sized by `(in_w_t + fw - 1) * in_num_t`.
pub fn cin_load_est(
    in_num_t: f64,
    in_h_t: f64,
    in_w_t: f64,
    fh: f64,
    fw: f64,
    lane: f64,
    dw: f64,
    port_width: f64,
    fre: f64,
) -> f64 {
    let burst_len = (in_w_t + fw - 1.0) * in_num_t / (port_width / dw);
    let (_, eff_port_width) = effective_dram_est(port_width, burst_len, fre);
    let load_phase = in_num_t * (fh - 1.0 + in_h_t) * (fw - 1.0 + in_w_t) / (eff_port_width / dw);
    let write_phase = in_num_t * (fh - 1.0 + in_h_t) * (fw - 1.0 + in_w_t) / lane;
    load_phase.max(write_phase)
}

/// Three-way weight/bias load. The load phase sums the enabled terms
/// (DRAM is serial); the write phase takes the max of the enabled terms
/// (on-chip writes are parallel). The kernel returns their sum.
#[allow(clippy::too_many_arguments)]
pub fn weight_load_est(
    in_num_t: f64,
    out_num_t: f64,
    fh1: f64,
    fw1: f64,
    fh2: f64,
    fw2: f64,
    lane: f64,
    dw1: f64,
    dw2: f64,
    dw3: f64,
    port_width: f64,
    depth_en: bool,
    point_en: bool,
    bias_en: bool,
    fre: f64,
) -> f64 {
    let burst_len1 = in_num_t * fh1 * fw1 / (port_width / dw1);
    let (_, eff_port_width1) = effective_dram_est(port_width, burst_len1, fre);
    let burst_len2 = in_num_t * out_num_t * fh2 * fw2 / (port_width / dw2);
    let (_, eff_port_width2) = effective_dram_est(port_width, burst_len2, fre);
    let burst_len3 = out_num_t / (port_width / dw3);
    let (_, eff_port_width3) = effective_dram_est(port_width, burst_len3, fre);

    let mut load_phase = 0.0;
    let mut write_phase = 0.0f64;

    if depth_en {
        load_phase += in_num_t * fh1 * fw1 / (eff_port_width1 / dw1);
    }
    if point_en {
        load_phase += in_num_t * out_num_t * fh2 * fw2 / (eff_port_width2 / dw2);
    }
    if bias_en {
        load_phase += out_num_t / (eff_port_width3 / dw3);
    }

    if depth_en {
        write_phase = write_phase.max(in_num_t * fh1 * fw1 / lane);
    }
    if point_en {
        write_phase = write_phase.max(in_num_t * out_num_t * fh2 * fw2 / lane);
    }
    if bias_en {
        write_phase = write_phase.max(out_num_t / lane);
    }

    load_phase + write_phase
}

/// Halo-aware intermediate-tile load volume divided by lane width.
pub fn inter_load_est(in_num_t: f64, in_h_t: f64, in_w_t: f64, fh: f64, fw: f64, lane: f64) -> f64 {
    in_num_t * (fh - 1.0 + in_h_t) * (fw - 1.0 + in_w_t) / lane
}

/// Depthwise-convolution tile volume divided by lane width.
pub fn depth_conv_est(in_num_t: f64, in_h_t: f64, in_w_t: f64, fh: f64, fw: f64, lane: f64) -> f64 {
    in_num_t * (fh - 1.0 + in_h_t) * (fw - 1.0 + in_w_t) / lane
}

/// Pointwise convolution on the systolic array: load/compute/drain/write phases.
#[allow(clippy::too_many_arguments)]
pub fn point_conv_est(
    in_num: f64,
    in_num_t: f64,
    out_num_t: f64,
    out_h_t: f64,
    out_w_t: f64,
    fh1: f64,
    fw1: f64,
    fh2: f64,
    fw2: f64,
    lane: f64,
    sa_rows: f64,
    sa_cols: f64,
    sa_lane: f64,
) -> f64 {
    let cin_load = in_num_t * (fh1 - 1.0 + out_h_t) * (fw1 - 1.0 + out_w_t) / lane;
    let weight_load = in_num_t * out_num_t * fh2 * fw2 / lane;
    let load_phase = cin_load.max(weight_load);
    let compute_phase = in_num_t * out_num_t * out_h_t * out_w_t * fh2 * fw2 / sa_rows / sa_cols / sa_lane;
    let drain_phase = out_num_t * out_w_t / sa_cols * out_h_t / (in_num / in_num_t).ceil();
    let cout_write = out_num_t * out_h_t * out_w_t / (in_num / in_num_t).ceil() / lane;
    let write_phase = cout_write;
    load_phase.max(compute_phase).max(drain_phase).max(write_phase)
}

/// ReLU activation: output volume over lane over the channel-tile iteration count.
///
/// Invoked unconditionally by `LatencyModel` regardless of the per-line
/// `relu_en` flag — a preserved behavior of the reference source, not a bug
/// to be fixed here.
pub fn relu_est(in_num: f64, in_num_t: f64, out_num_t: f64, out_h_t: f64, out_w_t: f64, lane: f64) -> f64 {
    out_num_t * out_h_t * out_w_t / lane / (in_num / in_num_t).ceil()
}

/// Max-pooling: same shape as `relu_est`.
pub fn pool_est(in_num: f64, in_num_t: f64, out_num_t: f64, out_h_t: f64, out_w_t: f64, lane: f64) -> f64 {
    out_num_t * out_h_t * out_w_t / lane / (in_num / in_num_t).ceil()
}

/// Intermediate-tile write-back: same shape as `relu_est`.
pub fn inter_write_est(in_num: f64, in_num_t: f64, out_num_t: f64, out_h_t: f64, out_w_t: f64, lane: f64) -> f64 {
    out_num_t * out_h_t * out_w_t / lane / (in_num / in_num_t).ceil()
}

/// Output-tile write to DRAM, stride-aware. Returns max(load-phase volume,
/// DRAM-bound write-phase volume).
#[allow(clippy::too_many_arguments)]
pub fn cout_write_est(
    in_num: f64,
    in_num_t: f64,
    out_num_t: f64,
    out_h_t: f64,
    out_w_t: f64,
    stride: f64,
    lane: f64,
    dw: f64,
    port_width: f64,
    fre: f64,
) -> f64 {
    let load_phase = out_num_t * out_h_t * out_w_t / lane / (in_num / in_num_t).ceil();
    let burst_len = out_w_t / stride * out_num_t / (port_width / dw);
    let (_, eff_port_width) = effective_dram_est(port_width, burst_len, fre);
    let write_phase =
        out_num_t * out_h_t / stride * out_w_t / stride / (in_num / in_num_t).ceil() / (eff_port_width / dw);
    load_phase.max(write_phase)
}
