//! Composes the nine cost kernels into one layer's end-to-end latency.

use crate::cost_kernels::{
    cin_load_est, cout_write_est, depth_conv_est, inter_load_est, inter_write_est, pool_est,
    point_conv_est, relu_est, weight_load_est,
};
use dse_core::{DseError, HWParams, LayerSpec, PerLayerChoice};

/// Computes one layer's modelled latency under a hardware design point and
/// a chosen per-layer tiling.
///
/// Returns `Err(DseError::DomainError)` if a tile dimension or lane width
/// reaching the kernels is non-positive — this should never happen given
/// the generator constraints (spec.md §3 invariant 1), so its occurrence
/// signals a bug in the caller, not a user-facing condition.
pub fn layer_latency(
    hw: &HWParams,
    layer: &LayerSpec,
    choice: &PerLayerChoice,
) -> Result<f64, DseError> {
    for (name, v) in [
        ("LAYER_IN_NUM_T", choice.layer_in_num_t),
        ("LAYER_OUT_NUM_T", choice.layer_out_num_t),
        ("LAYER_IN_H_T", choice.layer_in_h_t),
        ("LAYER_IN_W_T", choice.layer_in_w_t),
        ("SIMD_LANE", hw.simd_lane),
        ("SA_ROWS", hw.sa_rows),
        ("SA_COLS", hw.sa_cols),
        ("SA_SIMD_LANE", hw.sa_simd_lane),
    ] {
        if v == 0 {
            return Err(DseError::DomainError(format!("{name} must be strictly positive, got 0")));
        }
    }

    let in_num = layer.layer_in_num as f64;
    let out_num = layer.layer_out_num as f64;
    let in_h = layer.layer_in_h as f64;
    let in_w = layer.layer_in_w as f64;

    let in_num_t = choice.layer_in_num_t as f64;
    let out_num_t = choice.layer_out_num_t as f64;
    let in_h_t = choice.layer_in_h_t as f64;
    let in_w_t = choice.layer_in_w_t as f64;
    let out_h_t = choice.layer_out_h_t() as f64;
    let out_w_t = choice.layer_out_w_t() as f64;

    let filter_s1 = layer.layer_filter_s1 as f64;
    let filter_s2 = layer.layer_filter_s2 as f64;
    let stride = layer.layer_stride as f64;

    let lane = hw.simd_lane as f64;
    let dw0 = hw.data_w0 as f64;
    let dw1 = hw.data_w1 as f64;
    let dw2 = hw.data_w2 as f64;
    let port_width = hw.bus_w as f64;
    let fre = hw.fre as f64;
    let sa_rows = hw.sa_rows as f64;
    let sa_cols = hw.sa_cols as f64;
    let sa_lane = hw.sa_simd_lane as f64;

    let fh = filter_s1.max(filter_s2);
    let fw = fh;

    let cin_load = cin_load_est(in_num_t, in_h_t, in_w_t, fh, fw, lane, dw0, port_width, fre);
    let weight_load = weight_load_est(
        in_num_t,
        out_num_t,
        filter_s1,
        filter_s1,
        filter_s2,
        filter_s2,
        lane,
        dw0,
        dw1,
        dw2,
        port_width,
        layer.depth_conv_en,
        layer.point_conv_en,
        layer.bias_en,
        fre,
    );
    let inter_load = inter_load_est(in_num_t, in_h_t, in_w_t, fh, fw, lane);

    let depth_conv = if layer.depth_conv_en {
        depth_conv_est(in_num_t, in_h_t, in_w_t, filter_s1, filter_s1, lane)
    } else {
        0.0
    };

    let point_conv = if layer.point_conv_en {
        point_conv_est(
            in_num, in_num_t, out_num_t, out_h_t, out_w_t, filter_s1, filter_s1, filter_s2, filter_s2, lane,
            sa_rows, sa_cols, sa_lane,
        )
    } else {
        0.0
    };

    // relu_est fires unconditionally, per the reference (relu_en is parsed
    // but never gates the cost model).
    let relu = relu_est(in_num, in_num_t, out_num_t, out_h_t, out_w_t, lane);

    let pool = if layer.max_pool_en {
        pool_est(in_num, in_num_t, out_num_t, out_h_t, out_w_t, lane)
    } else {
        0.0
    };

    let inter_write = inter_write_est(in_num, in_num_t, out_num_t, out_h_t, out_w_t, lane);
    let cout_write = cout_write_est(
        in_num, in_num_t, out_num_t, out_h_t, out_w_t, stride, lane, dw0, port_width, fre,
    );

    let stage_latency = [
        cin_load,
        weight_load,
        inter_load,
        depth_conv,
        point_conv,
        relu,
        pool,
        inter_write,
        cout_write,
    ]
    .into_iter()
    .fold(0.0f64, f64::max);

    let total_iter = (in_num / in_num_t).ceil()
        * (out_num / out_num_t).ceil()
        * (in_h / in_h_t).ceil()
        * (in_w / in_w_t).ceil();

    let extra_latency = cin_load.max(weight_load) + cout_write;

    Ok(extra_latency + stage_latency * total_iter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dse_core::DataType;

    fn hw() -> HWParams {
        HWParams {
            in_h_t: 2,
            in_w_t: 2,
            in_num_t: 16,
            out_num_t: 16,
            simd_lane: 2,
            sa_rows: 1,
            sa_cols: 1,
            sa_simd_lane: 1,
            k_t: 3,
            data_w0: 32,
            data_w1: 32,
            data_w2: 32,
            bus_w: 512,
            data_t0: DataType::Float,
            fre: 250,
        }
    }

    fn layer() -> LayerSpec {
        LayerSpec {
            name: "test".into(),
            layer_in_num: 16,
            layer_out_num: 16,
            layer_in_h: 32,
            layer_in_w: 32,
            layer_filter_s1: 3,
            layer_filter_s2: 1,
            layer_stride: 1,
            depth_conv_en: true,
            point_conv_en: true,
            bias_en: true,
            max_pool_en: false,
        }
    }

    fn choice() -> PerLayerChoice {
        PerLayerChoice {
            layer_in_num_t: 16,
            layer_out_num_t: 16,
            layer_in_h_t: 2,
            layer_in_w_t: 2,
        }
    }

    #[test]
    fn latency_is_positive_and_finite() {
        let l = layer_latency(&hw(), &layer(), &choice()).unwrap();
        assert!(l.is_finite());
        assert!(l > 0.0);
    }

    #[test]
    fn domain_error_on_zero_tile() {
        let mut bad = choice();
        bad.layer_in_h_t = 0;
        let err = layer_latency(&hw(), &layer(), &bad).unwrap_err();
        assert!(matches!(err, DseError::DomainError(_)));
    }

    #[test]
    fn disabling_stages_never_increases_latency() {
        let mut no_pool = layer();
        no_pool.max_pool_en = false;
        let mut with_pool = layer();
        with_pool.max_pool_en = true;

        let a = layer_latency(&hw(), &no_pool, &choice()).unwrap();
        let b = layer_latency(&hw(), &with_pool, &choice()).unwrap();
        assert!(b >= a);
    }
}
