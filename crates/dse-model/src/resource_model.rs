//! Resource estimation: DSP count from SIMD/systolic-array geometry, and
//! BRAM18K count from a synchronous-dual-port BRAM capacity predictor
//! summed across the four on-chip buffer groups.

use dse_core::{DataType, HWParams};

/// Predicts the number of 18Kb BRAM primitives an HLS-synthesized
/// synchronous dual-port memory of `s` total bits at datapath width `dw`
/// would require.
///
/// Two regimes: above 18 bits wide, BRAMs are cascaded in 36-bit-wide,
/// 512-deep blocks; at or below 18 bits wide, in 18-bit-wide, 1024-deep
/// blocks.
pub fn bram_sdp_predict_hls(dw: f64, s: f64) -> f64 {
    if dw > 18.0 {
        let alpha = (dw / 36.0).ceil();
        alpha * (s / dw / 512.0).ceil()
    } else {
        let alpha = (dw / 18.0).ceil();
        alpha * (s / dw / 1024.0).ceil()
    }
}

/// Estimates `(DSP, BRAM18K)` for one hardware design point, given the
/// per-layer tile choice currently being evaluated (`LAYER_IN_NUM_T` etc.
/// on `hw`; `LAYER_OUT_H_T`/`LAYER_OUT_W_T` equal `in_h_t`/`in_w_t`).
pub fn res_est(hw: &HWParams) -> (f64, f64) {
    let simd_lane = hw.simd_lane as f64;
    let sa_rows = hw.sa_rows as f64;
    let sa_cols = hw.sa_cols as f64;
    let sa_simd_lane = hw.sa_simd_lane as f64;
    let in_num_t = hw.in_num_t as f64;
    let out_num_t = hw.out_num_t as f64;
    let in_h_t = hw.in_h_t as f64;
    let in_w_t = hw.in_w_t as f64;
    let out_h_t = hw.in_h_t as f64;
    let out_w_t = hw.in_w_t as f64;
    let k_t = hw.k_t as f64;
    let bus_w = hw.bus_w as f64;
    let dw0 = hw.data_w0 as f64;
    let dw1 = hw.data_w1 as f64;
    let dw2 = hw.data_w2 as f64;

    let dsp_per_mac = hw.data_t0.dsp_per_mac();

    let depth_conv_dsp = (3.0 * 3.0 * simd_lane + 1.0 * 1.0 * simd_lane) * dsp_per_mac;
    let point_conv_dsp = sa_rows * sa_cols * sa_simd_lane * dsp_per_mac;
    let dsp = depth_conv_dsp + point_conv_dsp;

    let cin_load_bram =
        bram_sdp_predict_hls(bus_w, dw0 * in_num_t * (in_h_t + k_t - 1.0) * (in_w_t + k_t - 1.0)) * 2.0;

    let weight_load_bram = bram_sdp_predict_hls(bus_w, dw1 * in_num_t * k_t * k_t)
        + bram_sdp_predict_hls(bus_w, dw1 * in_num_t * out_num_t * k_t * k_t)
        + bram_sdp_predict_hls(bus_w, dw2 * out_num_t);

    let row_il_factor = out_num_t / sa_rows;
    let col_il_factor = out_w_t / sa_cols;
    let local_reg_num = out_h_t * row_il_factor * col_il_factor;

    let point_conv_bram = bram_sdp_predict_hls(
        dw0 * simd_lane,
        in_num_t * (in_h_t + k_t - 1.0) * (in_w_t + k_t - 1.0) * dw0,
    ) + bram_sdp_predict_hls(
        dw0 * simd_lane,
        in_num_t * (in_h_t + k_t - 1.0) * (col_il_factor + k_t - 1.0) * dw0,
    ) * 2.0
        * sa_cols
        + bram_sdp_predict_hls(dw1 * simd_lane, in_num_t * row_il_factor * k_t * k_t * dw1) * 2.0 * sa_rows
        + bram_sdp_predict_hls(dw0, out_num_t * out_h_t * col_il_factor * dw0 / simd_lane)
            * simd_lane
            * 2.0
            * sa_cols
        + bram_sdp_predict_hls(dw0, local_reg_num * dw0) * 3.0 * sa_rows * sa_cols;

    let cout_write_bram = bram_sdp_predict_hls(bus_w, dw0 * out_h_t * out_w_t * out_num_t) * 2.0;

    let bram18k = cin_load_bram + weight_load_bram + point_conv_bram + cout_write_bram;

    (dsp, bram18k)
}
