//! Greedy per-layer tile-size refinement under a dynamic-tiling-level
//! policy: the VGG feature extractor's layer 0, 7, 11 and 12 and each
//! stage branch's first/last layers pin their channel tiles to the
//! network's concat sites; every other layer sweeps.

use dse_core::{DseError, HWParams, LayerSpec, PerLayerChoice, TopologyDescriptor};
use dse_model::layer_latency;

fn multiples_of(step: u32, upper: u32) -> Vec<u32> {
    (1..=upper).filter(|x| x % step == 0).collect()
}

fn evens_up_to(upper: u32) -> Vec<u32> {
    (1..=upper).filter(|x| x % 2 == 0).collect()
}

enum Phase {
    Vgg { vgg_idx: usize },
    Stage1 { local: usize, last: usize },
    Stage2 { local: usize, last: usize },
}

fn phase_of(global_idx: usize, topo: &TopologyDescriptor) -> Phase {
    if global_idx < topo.vgg_layers {
        Phase::Vgg { vgg_idx: global_idx }
    } else {
        let stage1_total = topo.stage1_layers * 2 * topo.stage1_iter;
        let s1_offset = global_idx - topo.vgg_layers;
        if s1_offset < stage1_total {
            Phase::Stage1 {
                local: s1_offset % topo.stage1_layers,
                last: topo.stage1_layers - 1,
            }
        } else {
            let s2_offset = s1_offset - stage1_total;
            Phase::Stage2 {
                local: s2_offset % topo.stage2_layers,
                last: topo.stage2_layers - 1,
            }
        }
    }
}

/// Walks the expanded layer list in order, choosing the tile tuple that
/// minimizes each layer's modelled latency under the tiling policy, and
/// returns the network's total latency plus the chosen tuple per layer.
pub fn optimize(
    hw: &HWParams,
    layers: &[LayerSpec],
    topo: &TopologyDescriptor,
    dynamic_tiling_level: u8,
) -> Result<(f64, Vec<PerLayerChoice>), DseError> {
    let mut total_latency = 0.0f64;
    let mut choices = Vec::with_capacity(layers.len());
    let mut prev_out_num_t = hw.out_num_t;
    let mut concat_num_t = hw.out_num_t;

    for (idx, layer) in layers.iter().enumerate() {
        let phase = phase_of(idx, topo);

        let (in_num_t_candidates, out_num_t_candidates): (Vec<u32>, Vec<u32>) = if dynamic_tiling_level == 0 {
            (vec![hw.in_num_t], vec![hw.out_num_t])
        } else {
            match phase {
                Phase::Vgg { vgg_idx: 0 } => (multiples_of(8, hw.in_num_t), multiples_of(8, hw.out_num_t)),
                Phase::Vgg { vgg_idx: 12 } => (vec![concat_num_t], vec![concat_num_t]),
                Phase::Vgg { vgg_idx: 11 } => (vec![prev_out_num_t], vec![concat_num_t]),
                Phase::Vgg { .. } => (vec![prev_out_num_t], multiples_of(8, hw.out_num_t)),
                Phase::Stage1 { local: 0, last } if last == 0 => (vec![concat_num_t], vec![concat_num_t]),
                Phase::Stage1 { local: 0, .. } => (vec![concat_num_t], multiples_of(8, hw.out_num_t)),
                Phase::Stage1 { local, last } if local == last => (vec![prev_out_num_t], vec![concat_num_t]),
                Phase::Stage1 { .. } => (vec![prev_out_num_t], multiples_of(8, hw.out_num_t)),
                Phase::Stage2 { local: 0, last } if last == 0 => (vec![concat_num_t], vec![concat_num_t]),
                Phase::Stage2 { local: 0, .. } => (vec![concat_num_t], multiples_of(8, hw.out_num_t)),
                Phase::Stage2 { local, last } if local == last => (vec![prev_out_num_t], vec![concat_num_t]),
                Phase::Stage2 { .. } => (vec![prev_out_num_t], multiples_of(8, hw.out_num_t)),
            }
        };

        let (in_h_t_candidates, in_w_t_candidates): (Vec<u32>, Vec<u32>) = if dynamic_tiling_level <= 1 {
            (vec![hw.in_h_t], vec![hw.in_w_t])
        } else {
            (evens_up_to(hw.in_h_t), multiples_of(hw.sa_cols, hw.in_w_t))
        };

        let mut best_latency = f64::INFINITY;
        let mut best_choice = None;

        for &in_num_t in &in_num_t_candidates {
            for &out_num_t in &out_num_t_candidates {
                for &in_h_t in &in_h_t_candidates {
                    for &in_w_t in &in_w_t_candidates {
                        let choice = PerLayerChoice {
                            layer_in_num_t: in_num_t,
                            layer_out_num_t: out_num_t,
                            layer_in_h_t: in_h_t,
                            layer_in_w_t: in_w_t,
                        };
                        let candidate_latency = layer_latency(hw, layer, &choice)?;
                        if candidate_latency < best_latency {
                            best_latency = candidate_latency;
                            best_choice = Some(choice);
                        }
                    }
                }
            }
        }

        let chosen = best_choice.ok_or_else(|| {
            DseError::DomainError(format!("layer {idx} ({}) had no feasible tile candidate", layer.name))
        })?;

        total_latency += best_latency;
        prev_out_num_t = chosen.layer_out_num_t;
        if matches!(phase, Phase::Vgg { vgg_idx: 7 }) {
            concat_num_t = chosen.layer_out_num_t;
        }
        choices.push(chosen);
    }

    Ok((total_latency, choices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dse_core::DataType;

    fn hw() -> HWParams {
        HWParams {
            in_h_t: 4,
            in_w_t: 4,
            in_num_t: 32,
            out_num_t: 32,
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

    fn layer(name: &str, in_num: u32, out_num: u32) -> LayerSpec {
        LayerSpec {
            name: name.into(),
            layer_in_num: in_num,
            layer_out_num: out_num,
            layer_in_h: 16,
            layer_in_w: 16,
            layer_filter_s1: 3,
            layer_filter_s2: 1,
            layer_stride: 1,
            depth_conv_en: true,
            point_conv_en: true,
            bias_en: true,
            max_pool_en: false,
        }
    }

    fn tiny_topo() -> TopologyDescriptor {
        TopologyDescriptor {
            vgg_layers: 2,
            stage1_layers: 0,
            stage1_iter: 0,
            stage2_layers: 0,
            stage2_iter: 0,
        }
    }

    #[test]
    fn level0_pins_every_layer_to_outer_tiles() {
        let layers = vec![layer("L0", 16, 32), layer("L1", 32, 32)];
        let topo = tiny_topo();
        let (_, choices) = optimize(&hw(), &layers, &topo, 0).unwrap();
        for c in &choices {
            assert_eq!(c.layer_in_h_t, hw().in_h_t);
            assert_eq!(c.layer_in_w_t, hw().in_w_t);
        }
    }

    #[test]
    fn higher_dynamic_tiling_never_increases_latency() {
        let layers = vec![layer("L0", 16, 32), layer("L1", 32, 32)];
        let topo = tiny_topo();
        let (lat0, _) = optimize(&hw(), &layers, &topo, 0).unwrap();
        let (lat2, _) = optimize(&hw(), &layers, &topo, 2).unwrap();
        assert!(lat2 <= lat0 + 1e-6);
    }

    #[test]
    fn chosen_tiles_are_always_multiples_of_eight_or_pinned() {
        let layers = vec![layer("L0", 16, 32), layer("L1", 32, 32)];
        let topo = tiny_topo();
        let (_, choices) = optimize(&hw(), &layers, &topo, 1).unwrap();
        for c in &choices {
            assert!(c.layer_in_num_t % 8 == 0 || c.layer_in_num_t == hw().out_num_t);
            assert!(c.layer_out_num_t % 8 == 0 || c.layer_out_num_t == hw().out_num_t);
        }
    }
}
