//! Text frame
//!
//! JSON-like structure with bare keys, one field per line:
//!
//! ```text
//! {
//!   SPU_CHA: {
//!     READ: 1,
//!     N_DATA_FP: 12.500000,
//!     ...
//!     STALE: 0
//!   },
//!   ...
//! }
//! ```
//!
//! Floats carry six decimals, flags are 0/1. `STALE` is 1 for a stale or an
//! unavailable block; an unavailable block renders default values.

use std::fmt::Write;

use contracts::{AggregateSnapshot, Freshness, PlcSnapshot, SourceId, SpuSnapshot};

use crate::error::FrameError;

/// Typical frame is a little over 2 KiB
const TEXT_CAPACITY: usize = 2560;

enum Value {
    Int(i32),
    Float(f32),
    Flag(bool),
}

/// Encode an aggregate
pub fn render_text(aggregate: &AggregateSnapshot) -> String {
    let mut out = String::with_capacity(TEXT_CAPACITY);
    out.push_str("{\n");

    for id in SourceId::ALL {
        let stale = aggregate.freshness(id) != Freshness::Fresh;
        let fields = match id {
            SourceId::SpuChA | SourceId::SpuChB => {
                spu_fields(&aggregate.spu(id).map(|r| r.data).unwrap_or_default())
            }
            SourceId::Plc => plc_fields(&aggregate.plc.map(|r| r.data).unwrap_or_default()),
        };
        let last = id == SourceId::Plc;
        write_block(&mut out, id.wire_key(), &fields, stale, last);
    }

    out.push_str("}\n");
    out
}

fn spu_fields(spu: &SpuSnapshot) -> Vec<(&'static str, Value)> {
    let mut fields = Vec::with_capacity(1 + SpuSnapshot::MEASUREMENT_NAMES.len() + SpuSnapshot::FLAG_NAMES.len());
    fields.push((SpuSnapshot::STATE_NAME, Value::Int(spu.read)));
    fields.extend(
        SpuSnapshot::MEASUREMENT_NAMES
            .into_iter()
            .zip(spu.measurements().map(Value::Float)),
    );
    fields.extend(
        SpuSnapshot::FLAG_NAMES
            .into_iter()
            .zip(spu.flags().map(Value::Flag)),
    );
    fields
}

fn plc_fields(plc: &PlcSnapshot) -> Vec<(&'static str, Value)> {
    let mut fields = Vec::with_capacity(1 + PlcSnapshot::VARIABLE_NAMES.len());
    fields.push((PlcSnapshot::STATE_NAME, Value::Int(plc.state)));
    fields.extend(
        PlcSnapshot::VARIABLE_NAMES
            .into_iter()
            .zip(plc.variables().map(Value::Float)),
    );
    fields
}

fn write_block(out: &mut String, key: &str, fields: &[(&str, Value)], stale: bool, last: bool) {
    // writing into a String cannot fail
    let _ = writeln!(out, "  {key}: {{");
    for (name, value) in fields {
        let _ = match value {
            Value::Int(v) => writeln!(out, "    {name}: {v},"),
            Value::Float(v) => writeln!(out, "    {name}: {v:.6},"),
            Value::Flag(v) => writeln!(out, "    {name}: {},", u8::from(*v)),
        };
    }
    let _ = writeln!(out, "    STALE: {}", u8::from(stale));
    out.push_str(if last { "  }\n" } else { "  },\n" });
}

/// One `KEY: { ... }` block of a parsed text frame
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub key: String,
    pub fields: Vec<(String, f64)>,
}

/// Parsed text frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextFrame {
    pub blocks: Vec<TextBlock>,
}

impl TextFrame {
    /// Numeric value of `field` in block `block`
    pub fn get(&self, block: &str, field: &str) -> Option<f64> {
        self.blocks
            .iter()
            .find(|b| b.key == block)?
            .fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, v)| *v)
    }
}

/// Parse one text frame
///
/// Accepts exactly the shape `render_text` produces, trailing commas
/// optional.
pub fn parse_text(frame: &str) -> Result<TextFrame, FrameError> {
    let err = |line: usize, message: &str| FrameError::Text {
        line: line + 1,
        message: message.to_string(),
    };

    let mut lines = frame.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
    match lines.next() {
        Some((_, l)) if l.trim() == "{" => {}
        Some((n, _)) => return Err(err(n, "expected '{'")),
        None => return Err(err(0, "empty frame")),
    }

    let mut parsed = TextFrame::default();
    let mut current: Option<TextBlock> = None;
    for (n, raw) in lines {
        let line = raw.trim().trim_end_matches(',');
        if line == "}" {
            match current.take() {
                Some(block) => parsed.blocks.push(block),
                None => return Ok(parsed),
            }
            continue;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| err(n, "expected 'KEY: value'"))?;
        let (key, value) = (key.trim(), value.trim());
        match current.as_mut() {
            Some(block) => {
                let v: f64 = value.parse().map_err(|_| err(n, "value is not a number"))?;
                block.fields.push((key.to_string(), v));
            }
            None if value == "{" => {
                current = Some(TextBlock {
                    key: key.to_string(),
                    fields: Vec::new(),
                });
            }
            None => return Err(err(n, "field outside a block")),
        }
    }
    Err(err(frame.lines().count(), "unterminated frame"))
}
