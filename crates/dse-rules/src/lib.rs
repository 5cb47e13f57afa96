//! Expands a textual layer list into a fully enumerated per-layer-instance
//! list, resolving the skip/concat inputs that the two-branch refinement
//! stages require.
//!
//! The canonical layer list is expected to carry exactly one physical copy
//! of each stage's branch-pair text: `VGG_LAYERS` lines, then
//! `STAGE1_LAYERS * 2` lines, then `STAGE2_LAYERS * 2` lines. Stage repeat
//! counts are realized here by replication, not by re-reading text, since a
//! stage's first-layer concat sites always reference handles captured
//! upstream of the stage, never a previous repeat's own output — so every
//! repeat computes an identical branch pair.

use std::collections::HashMap;

use dse_core::{DseError, InputConfig, LayerSpec, TopologyDescriptor};

/// The three layer kinds the model format distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    SeparableConv,
    Convb,
    MaxPool,
}

/// One parsed (but not yet expanded) line of the model file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLayerLine {
    pub name: String,
    pub layer_type: LayerKind,
    pub out_num: u32,
    pub filter_s: u32,
    pub stride: u32,
    pub bias_en: bool,
}

/// Captured `(out_num, out_h, out_w)` of a named layer output, resolved by
/// later concat-input sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Handle {
    out_num: u32,
    out_h: u32,
    out_w: u32,
}

type SkipTable = HashMap<String, Handle>;

fn ceil_half(v: u32) -> u32 {
    (v + 1) / 2
}

fn layer_spec_from_line(name: &str, line: &RawLayerLine, in_num: u32, in_h: u32, in_w: u32) -> LayerSpec {
    let (filter_s1, filter_s2) = match line.layer_type {
        LayerKind::SeparableConv => (line.filter_s, 1),
        LayerKind::Convb => (1, line.filter_s),
        LayerKind::MaxPool => (1, 1),
    };
    let (depth_conv_en, point_conv_en) = match line.layer_type {
        LayerKind::SeparableConv => (true, true),
        LayerKind::Convb => (false, true),
        LayerKind::MaxPool => (false, false),
    };
    LayerSpec {
        name: name.to_string(),
        layer_in_num: in_num,
        layer_out_num: line.out_num,
        layer_in_h: in_h,
        layer_in_w: in_w,
        layer_filter_s1: filter_s1,
        layer_filter_s2: filter_s2,
        layer_stride: line.stride,
        depth_conv_en,
        point_conv_en,
        bias_en: line.bias_en,
        max_pool_en: line.layer_type == LayerKind::MaxPool,
    }
}

/// Expands a raw layer list under a topology descriptor and input shape
/// into the fully enumerated per-layer-instance list plus the network's
/// maximum channel count (used to bound `IN_NUM_T`).
pub struct LayerExpander;

impl LayerExpander {
    pub fn expand(
        lines: &[RawLayerLine],
        topo: &TopologyDescriptor,
        input: &InputConfig,
    ) -> Result<(Vec<LayerSpec>, u32), DseError> {
        let expected = topo.vgg_layers + topo.stage1_layers * 2 + topo.stage2_layers * 2;
        if lines.len() != expected {
            return Err(DseError::TopologyMismatch {
                expected,
                got: lines.len(),
            });
        }

        let mut network_channel_max = input.in_num;
        let mut skips: SkipTable = HashMap::new();
        let mut expanded = Vec::with_capacity(topo.expanded_layer_count());

        // ---- VGG phase ----
        let mut in_num = input.in_num;
        let mut out_num = input.in_num;
        let mut in_h = input.in_h;
        let mut in_w = input.in_w;
        let mut out_h = input.in_h;
        let mut out_w = input.in_w;

        for line in &lines[0..topo.vgg_layers] {
            network_channel_max = network_channel_max.max(line.out_num);

            in_num = out_num;
            in_h = out_h;
            in_w = out_w;
            out_num = line.out_num;

            if line.name == "Conv2d_3_pool" {
                let h = skips
                    .get("Conv2d_3")
                    .expect("Conv2d_3 must be captured before Conv2d_3_pool");
                in_num = h.out_num;
                in_h = h.out_h;
                in_w = h.out_w;
            }

            if line.stride == 2 {
                out_h = ceil_half(in_h);
                out_w = ceil_half(in_w);
            } else {
                out_h = in_h;
                out_w = in_w;
            }

            for name in ["Conv2d_3", "Conv2d_7", "Conv2d_11", "Conv2d_3_pool"] {
                if line.name == name {
                    skips.insert(
                        name.to_string(),
                        Handle {
                            out_num,
                            out_h,
                            out_w,
                        },
                    );
                }
            }

            expanded.push(layer_spec_from_line(&line.name, line, in_num, in_h, in_w));
        }

        // ---- Stage1 branch pair, computed once ----
        let stage1_lines = &lines[topo.vgg_layers..topo.vgg_layers + topo.stage1_layers * 2];
        let conv2d_3_pool = *skips.get("Conv2d_3_pool").expect("Conv2d_3_pool must be captured in VGG phase");
        let conv2d_7 = *skips.get("Conv2d_7").expect("Conv2d_7 must be captured in VGG phase");
        let conv2d_11 = *skips.get("Conv2d_11").expect("Conv2d_11 must be captured in VGG phase");

        let mut stage1_branch_pair = Vec::with_capacity(topo.stage1_layers * 2);
        for branch in 0..2 {
            let branch_lines = &stage1_lines[branch * topo.stage1_layers..(branch + 1) * topo.stage1_layers];
            let mut cur_num = 0u32;
            let mut cur_h = 0u32;
            let mut cur_w = 0u32;
            for (layer_idx, line) in branch_lines.iter().enumerate() {
                network_channel_max = network_channel_max.max(line.out_num);

                let (ln, lh, lw) = if layer_idx == 0 {
                    (
                        conv2d_3_pool.out_num + conv2d_7.out_num + conv2d_11.out_num,
                        conv2d_3_pool.out_h,
                        conv2d_3_pool.out_w,
                    )
                } else {
                    (cur_num, cur_h, cur_w)
                };

                let (lo_h, lo_w) = if line.stride == 2 {
                    (ceil_half(lh), ceil_half(lw))
                } else {
                    (lh, lw)
                };

                if line.name == "MConv_Stage1_L1_5" {
                    skips.insert(
                        "MConv_Stage1_L1_5".to_string(),
                        Handle {
                            out_num: line.out_num,
                            out_h: lo_h,
                            out_w: lo_w,
                        },
                    );
                }
                if line.name == "MConv_Stage1_L2_5" {
                    skips.insert(
                        "MConv_Stage1_L2_5".to_string(),
                        Handle {
                            out_num: line.out_num,
                            out_h: lo_h,
                            out_w: lo_w,
                        },
                    );
                }

                stage1_branch_pair.push(layer_spec_from_line(&line.name, line, ln, lh, lw));

                cur_num = line.out_num;
                cur_h = lo_h;
                cur_w = lo_w;
            }
        }
        for _ in 0..topo.stage1_iter {
            expanded.extend(stage1_branch_pair.iter().cloned());
        }

        // ---- Stage2 branch pair, computed once ----
        let stage2_lines = &lines[topo.vgg_layers + topo.stage1_layers * 2..];
        let mconv_s1_l1 = *skips
            .get("MConv_Stage1_L1_5")
            .expect("MConv_Stage1_L1_5 must be captured in Stage1 phase");
        let mconv_s1_l2 = *skips
            .get("MConv_Stage1_L2_5")
            .expect("MConv_Stage1_L2_5 must be captured in Stage1 phase");

        let mut stage2_branch_pair = Vec::with_capacity(topo.stage2_layers * 2);
        for branch in 0..2 {
            let branch_lines = &stage2_lines[branch * topo.stage2_layers..(branch + 1) * topo.stage2_layers];
            let mut cur_num = 0u32;
            let mut cur_h = 0u32;
            let mut cur_w = 0u32;
            for (layer_idx, line) in branch_lines.iter().enumerate() {
                network_channel_max = network_channel_max.max(line.out_num);

                let (ln, lh, lw) = if layer_idx == 0 {
                    (
                        mconv_s1_l1.out_num + mconv_s1_l2.out_num + conv2d_3_pool.out_num + conv2d_7.out_num
                            + conv2d_11.out_num,
                        conv2d_3_pool.out_h,
                        conv2d_3_pool.out_w,
                    )
                } else {
                    (cur_num, cur_h, cur_w)
                };

                let (lo_h, lo_w) = if line.stride == 2 {
                    (ceil_half(lh), ceil_half(lw))
                } else {
                    (lh, lw)
                };

                stage2_branch_pair.push(layer_spec_from_line(&line.name, line, ln, lh, lw));

                cur_num = line.out_num;
                cur_h = lo_h;
                cur_w = lo_w;
            }
        }
        for _ in 0..topo.stage2_iter {
            expanded.extend(stage2_branch_pair.iter().cloned());
        }

        Ok((expanded, network_channel_max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, kind: LayerKind, out_num: u32, filter_s: u32, stride: u32) -> RawLayerLine {
        RawLayerLine {
            name: name.to_string(),
            layer_type: kind,
            out_num,
            filter_s,
            stride,
            bias_en: true,
        }
    }

    fn tiny_topology() -> (Vec<RawLayerLine>, TopologyDescriptor, InputConfig) {
        let lines = vec![
            // VGG: 5 layers, capturing Conv2d_3, Conv2d_7, Conv2d_11, Conv2d_3_pool.
            line("L0", LayerKind::SeparableConv, 8, 3, 1),
            line("Conv2d_3", LayerKind::SeparableConv, 16, 3, 1),
            line("L2", LayerKind::SeparableConv, 16, 3, 1),
            line("Conv2d_7", LayerKind::SeparableConv, 32, 3, 1),
            line("Conv2d_11", LayerKind::SeparableConv, 32, 3, 1),
            // Conv2d_3_pool takes Conv2d_3's shape as input, not the previous layer's.
            line("Conv2d_3_pool", LayerKind::MaxPool, 16, 1, 2),
            // Stage1: 2 layers per branch, 2 branches.
            line("S1B1_0", LayerKind::SeparableConv, 32, 3, 1),
            line("MConv_Stage1_L1_5", LayerKind::SeparableConv, 16, 3, 1),
            line("S1B2_0", LayerKind::SeparableConv, 32, 3, 1),
            line("MConv_Stage1_L2_5", LayerKind::SeparableConv, 16, 3, 1),
            // Stage2: 2 layers per branch, 2 branches.
            line("S2B1_0", LayerKind::Convb, 64, 1, 1),
            line("S2B1_1", LayerKind::Convb, 19, 1, 1),
            line("S2B2_0", LayerKind::Convb, 64, 1, 1),
            line("S2B2_1", LayerKind::Convb, 38, 1, 1),
        ];
        let topo = TopologyDescriptor {
            vgg_layers: 6,
            stage1_layers: 2,
            stage1_iter: 2,
            stage2_layers: 2,
            stage2_iter: 3,
        };
        let input = InputConfig {
            in_num: 3,
            in_h: 32,
            in_w: 32,
        };
        (lines, topo, input)
    }

    #[test]
    fn expanded_count_matches_topology_formula() {
        let (lines, topo, input) = tiny_topology();
        let (expanded, _) = LayerExpander::expand(&lines, &topo, &input).unwrap();
        assert_eq!(expanded.len(), topo.expanded_layer_count());
    }

    #[test]
    fn conv2d_3_pool_takes_input_from_conv2d_3_not_previous_layer() {
        let (lines, topo, input) = tiny_topology();
        let (expanded, _) = LayerExpander::expand(&lines, &topo, &input).unwrap();
        let pool = expanded.iter().find(|l| l.name == "Conv2d_3_pool").unwrap();
        // Conv2d_3 output channel count is 16, distinct from the immediately
        // preceding layer (Conv2d_11, 32 channels).
        assert_eq!(pool.layer_in_num, 16);
    }

    #[test]
    fn stage2_first_layer_input_channels_equal_sum_of_five_handles() {
        let (lines, topo, input) = tiny_topology();
        let (expanded, _) = LayerExpander::expand(&lines, &topo, &input).unwrap();
        let s2_first = &expanded[topo.vgg_layers + topo.stage1_layers * 2 * topo.stage1_iter];
        // MConv_Stage1_L1_5 (16) + MConv_Stage1_L2_5 (16) + Conv2d_3_pool (16)
        // + Conv2d_7 (32) + Conv2d_11 (32) = 112.
        assert_eq!(s2_first.layer_in_num, 16 + 16 + 16 + 32 + 32);
    }

    #[test]
    fn stage_repeats_are_identical_copies() {
        let (lines, topo, input) = tiny_topology();
        let (expanded, _) = LayerExpander::expand(&lines, &topo, &input).unwrap();
        let stage1_start = topo.vgg_layers;
        let branch_pair_len = topo.stage1_layers * 2;
        let first = &expanded[stage1_start..stage1_start + branch_pair_len];
        let second = &expanded[stage1_start + branch_pair_len..stage1_start + 2 * branch_pair_len];
        assert_eq!(first, second);
    }

    #[test]
    fn mismatched_line_count_is_topology_mismatch() {
        let (mut lines, topo, input) = tiny_topology();
        lines.pop();
        let err = LayerExpander::expand(&lines, &topo, &input).unwrap_err();
        assert!(matches!(err, DseError::TopologyMismatch { .. }));
    }

    #[test]
    fn network_channel_max_tracks_largest_out_num() {
        let (lines, topo, input) = tiny_topology();
        let (_, max_channels) = LayerExpander::expand(&lines, &topo, &input).unwrap();
        assert_eq!(max_channels, 64);
    }
}
