//! Fixed-layout binary frame
//!
//! Little-endian, [`FRAME_LEN`] bytes:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 4 | magic `TRGA` |
//! | 4 | 1 | version |
//! | 5 | 1 | availability bits (bit n = `SourceId::index() == n`) |
//! | 6 | 1 | stale bits, same layout |
//! | 7 | 1 | reserved |
//! | 8 | 80 | SPU_CHA: i32 state, 9 f32, 10 i32 flags |
//! | 88 | 80 | SPU_CHB |
//! | 168 | 120 | PLC: i32 state, 29 f32 |
//!
//! An unavailable block is written as zeros with its availability bit cleared.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use contracts::{
    AggregateSnapshot, Freshness, PlcSnapshot, SourceId, SpuSnapshot, PLC_VARIABLE_COUNT,
    SPU_FLAG_COUNT, SPU_MEASUREMENT_COUNT,
};

use crate::error::FrameError;

pub const FRAME_MAGIC: [u8; 4] = *b"TRGA";
pub const FRAME_VERSION: u8 = 1;

const HEADER_LEN: usize = 8;
const SPU_BLOCK_LEN: usize = 4 + 4 * SPU_MEASUREMENT_COUNT + 4 * SPU_FLAG_COUNT;
const PLC_BLOCK_LEN: usize = 4 + 4 * PLC_VARIABLE_COUNT;

/// Total frame size
pub const FRAME_LEN: usize = HEADER_LEN + 2 * SPU_BLOCK_LEN + PLC_BLOCK_LEN;

fn source_bit(source: SourceId) -> u8 {
    1 << source.index()
}

/// Encode an aggregate
pub fn render_binary(aggregate: &AggregateSnapshot) -> Bytes {
    let mut available = 0u8;
    let mut stale = 0u8;
    for id in SourceId::ALL {
        match aggregate.freshness(id) {
            Freshness::Fresh => available |= source_bit(id),
            Freshness::Stale => {
                available |= source_bit(id);
                stale |= source_bit(id);
            }
            Freshness::Unavailable => {}
        }
    }

    let mut buf = BytesMut::with_capacity(FRAME_LEN);
    buf.put_slice(&FRAME_MAGIC);
    buf.put_u8(FRAME_VERSION);
    buf.put_u8(available);
    buf.put_u8(stale);
    buf.put_u8(0);

    for id in [SourceId::SpuChA, SourceId::SpuChB] {
        let spu = aggregate.spu(id).map(|r| r.data).unwrap_or_default();
        put_spu(&mut buf, &spu);
    }
    let plc = aggregate.plc.map(|r| r.data).unwrap_or_default();
    put_plc(&mut buf, &plc);

    debug_assert_eq!(buf.len(), FRAME_LEN);
    buf.freeze()
}

fn put_spu(buf: &mut BytesMut, spu: &SpuSnapshot) {
    buf.put_i32_le(spu.read);
    for value in spu.measurements() {
        buf.put_f32_le(value);
    }
    for flag in spu.flags() {
        buf.put_i32_le(i32::from(flag));
    }
}

fn put_plc(buf: &mut BytesMut, plc: &PlcSnapshot) {
    buf.put_i32_le(plc.state);
    for value in plc.variables() {
        buf.put_f32_le(value);
    }
}

/// Decoded binary frame
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryFrame {
    pub version: u8,
    pub available: u8,
    pub stale: u8,
    pub spu_ch_a: SpuSnapshot,
    pub spu_ch_b: SpuSnapshot,
    pub plc: PlcSnapshot,
}

impl BinaryFrame {
    /// The block for `source` carries real data
    pub fn is_available(&self, source: SourceId) -> bool {
        self.available & source_bit(source) != 0
    }

    /// The block for `source` is older than the staleness bound
    pub fn is_stale(&self, source: SourceId) -> bool {
        self.stale & source_bit(source) != 0
    }

    /// SPU block of an SPU source
    pub fn spu(&self, source: SourceId) -> Option<&SpuSnapshot> {
        match source {
            SourceId::SpuChA => Some(&self.spu_ch_a),
            SourceId::SpuChB => Some(&self.spu_ch_b),
            SourceId::Plc => None,
        }
    }
}

/// Decode one frame from the front of `frame`
pub fn decode_binary(mut frame: &[u8]) -> Result<BinaryFrame, FrameError> {
    if frame.len() < FRAME_LEN {
        return Err(FrameError::TooShort {
            len: frame.len(),
            expected: FRAME_LEN,
        });
    }

    let mut magic = [0u8; 4];
    frame.copy_to_slice(&mut magic);
    if magic != FRAME_MAGIC {
        return Err(FrameError::BadMagic { found: magic });
    }
    let version = frame.get_u8();
    if version != FRAME_VERSION {
        return Err(FrameError::UnsupportedVersion(version));
    }
    let available = frame.get_u8();
    let stale = frame.get_u8();
    frame.advance(1);

    let spu_ch_a = get_spu(&mut frame);
    let spu_ch_b = get_spu(&mut frame);
    let plc = get_plc(&mut frame);

    Ok(BinaryFrame {
        version,
        available,
        stale,
        spu_ch_a,
        spu_ch_b,
        plc,
    })
}

fn get_spu(buf: &mut &[u8]) -> SpuSnapshot {
    let read = buf.get_i32_le();
    let measurements: [f32; SPU_MEASUREMENT_COUNT] = std::array::from_fn(|_| buf.get_f32_le());
    let flags: [bool; SPU_FLAG_COUNT] = std::array::from_fn(|_| buf.get_i32_le() != 0);
    SpuSnapshot::from_parts(read, measurements, flags)
}

fn get_plc(buf: &mut &[u8]) -> PlcSnapshot {
    let state = buf.get_i32_le();
    let variables: [f32; PLC_VARIABLE_COUNT] = std::array::from_fn(|_| buf.get_f32_le());
    PlcSnapshot::from_variables(state, variables)
}
