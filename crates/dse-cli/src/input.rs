//! Loaders for the four files the CLI takes: the plain-text layer list and
//! the three JSON keyed records.
//!
//! The layer-list parser is deliberately thin: split on commas, dispatch on
//! the `type` column, reject short lines. No schema inference, no layer
//! reordering — the model file is expected to already carry the layers in
//! VGG, then Stage1 (both branches), then Stage2 (both branches) order.

use std::fs;
use std::path::Path;

use dse_core::{BoardConfig, DseError, InputConfig, ModelConfig};
use dse_rules::{LayerKind, RawLayerLine};

/// Reads and parses the plain-text model file into its raw layer lines.
///
/// Expected format: a header line (discarded), then one layer per line as
/// `name,type,out_num,filter_s,stride,relu_en,bias_en`. `relu_en` is parsed
/// to catch malformed lines early but not retained — the cost model invokes
/// `relu_est` unconditionally regardless of its value.
pub fn read_model_file(path: &Path) -> Result<Vec<RawLayerLine>, DseError> {
    let text = fs::read_to_string(path).map_err(|e| DseError::MalformedInput {
        file: path.display().to_string(),
        line: 0,
        reason: e.to_string(),
    })?;

    let mut lines = Vec::new();
    for (idx, raw_line) in text.lines().enumerate().skip(1) {
        let raw_line = raw_line.trim();
        if raw_line.is_empty() {
            continue;
        }
        lines.push(parse_layer_line(path, idx + 1, raw_line)?);
    }
    Ok(lines)
}

fn parse_layer_line(path: &Path, line_no: usize, raw_line: &str) -> Result<RawLayerLine, DseError> {
    let fields: Vec<&str> = raw_line.split(',').map(str::trim).collect();
    if fields.len() != 7 {
        return Err(DseError::MalformedInput {
            file: path.display().to_string(),
            line: line_no,
            reason: format!("expected 7 comma-separated fields, got {}", fields.len()),
        });
    }

    let malformed = |reason: String| DseError::MalformedInput {
        file: path.display().to_string(),
        line: line_no,
        reason,
    };

    let name = fields[0].to_string();
    let layer_type = match fields[1] {
        "separable_conv" => LayerKind::SeparableConv,
        "convb" => LayerKind::Convb,
        "max_pool" => LayerKind::MaxPool,
        other => return Err(malformed(format!("unknown layer type '{other}'"))),
    };
    let out_num: u32 = fields[2]
        .parse()
        .map_err(|_| malformed(format!("out_num '{}' is not an integer", fields[2])))?;
    let filter_s: u32 = fields[3]
        .parse()
        .map_err(|_| malformed(format!("filter_s '{}' is not an integer", fields[3])))?;
    let stride: u32 = fields[4]
        .parse()
        .map_err(|_| malformed(format!("stride '{}' is not an integer", fields[4])))?;
    let _relu_en: bool = fields[5]
        .parse()
        .map_err(|_| malformed(format!("relu_en '{}' is not a bool", fields[5])))?;
    let bias_en: bool = fields[6]
        .parse()
        .map_err(|_| malformed(format!("bias_en '{}' is not a bool", fields[6])))?;

    Ok(RawLayerLine {
        name,
        layer_type,
        out_num,
        filter_s,
        stride,
        bias_en,
    })
}

/// Reads a JSON keyed record from disk, wrapping parse failures as a
/// `MalformedInput` so `dse-cli` reports every bad input file uniformly.
fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, DseError> {
    let text = fs::read_to_string(path).map_err(|e| DseError::MalformedInput {
        file: path.display().to_string(),
        line: 0,
        reason: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| DseError::MalformedInput {
        file: path.display().to_string(),
        line: e.line(),
        reason: e.to_string(),
    })
}

pub fn read_model_config(path: &Path) -> Result<ModelConfig, DseError> {
    read_json(path)
}

pub fn read_input_config(path: &Path) -> Result<InputConfig, DseError> {
    read_json(path)
}

pub fn read_board_config(path: &Path) -> Result<BoardConfig, DseError> {
    read_json(path)
}
