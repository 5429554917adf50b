//! Snapshot data model
//!
//! `SourceSnapshot` is what a driver returns, `PublishedSnapshot` is what the
//! snapshot store hands out, `AggregateSnapshot` is what a session renders.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::SourceId;

/// Number of `f32` values in an SPU snapshot
pub const SPU_MEASUREMENT_COUNT: usize = 9;

/// Number of flags in an SPU snapshot
pub const SPU_FLAG_COUNT: usize = 10;

/// Number of `f32` process variables in a PLC snapshot
pub const PLC_VARIABLE_COUNT: usize = 29;

/// SPU channel reading
///
/// Shared by both SPU channels. Field order below is the wire order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpuSnapshot {
    /// Read/state code reported by the channel
    pub read: i32,

    /// Neutron rate
    pub n_data: f32,
    /// Temperature
    pub t_data: f32,
    /// Auxiliary channel 1
    pub f1_data: f32,
    /// Auxiliary channel 2
    pub f2_data: f32,
    /// Auxiliary channel 3
    pub f3_data: f32,

    pub emr_n_threshold: f32,
    pub wrn_n_threshold: f32,
    pub emr_t_threshold: f32,
    pub wrn_t_threshold: f32,

    /// Neutron emergency alarm
    pub emr_n: bool,
    /// Neutron warning alarm
    pub wrn_n: bool,
    /// Temperature emergency alarm
    pub emr_t: bool,
    /// Temperature warning alarm
    pub wrn_t: bool,
    pub r1: bool,
    pub r2: bool,
    pub r3: bool,
    /// Channel ready
    pub rdy: bool,
    /// Test mode
    pub test: bool,
    pub xxxx: bool,
}

impl SpuSnapshot {
    /// Wire name of the state code
    pub const STATE_NAME: &'static str = "READ";

    /// Wire names of `measurements()`, in order
    pub const MEASUREMENT_NAMES: [&'static str; SPU_MEASUREMENT_COUNT] = [
        "N_DATA_FP",
        "T_DATA_FP",
        "F1_DATA_FP",
        "F2_DATA_FP",
        "F3_DATA_FP",
        "EMR_N_THRESHOLD",
        "WRN_N_THRESHOLD",
        "EMR_T_THRESHOLD",
        "WRN_T_THRESHOLD",
    ];

    /// Wire names of `flags()`, in order
    pub const FLAG_NAMES: [&'static str; SPU_FLAG_COUNT] = [
        "EMR_N", "WRN_N", "EMR_T", "WRN_T", "R1", "R2", "R3", "RDY", "TEST", "XXXX",
    ];

    /// Measurements followed by thresholds, in wire order
    pub fn measurements(&self) -> [f32; SPU_MEASUREMENT_COUNT] {
        [
            self.n_data,
            self.t_data,
            self.f1_data,
            self.f2_data,
            self.f3_data,
            self.emr_n_threshold,
            self.wrn_n_threshold,
            self.emr_t_threshold,
            self.wrn_t_threshold,
        ]
    }

    /// Alarm and status flags, in wire order
    pub fn flags(&self) -> [bool; SPU_FLAG_COUNT] {
        [
            self.emr_n, self.wrn_n, self.emr_t, self.wrn_t, self.r1, self.r2, self.r3, self.rdy,
            self.test, self.xxxx,
        ]
    }

    /// Rebuild from wire-ordered parts
    pub fn from_parts(
        read: i32,
        measurements: [f32; SPU_MEASUREMENT_COUNT],
        flags: [bool; SPU_FLAG_COUNT],
    ) -> Self {
        let [n_data, t_data, f1_data, f2_data, f3_data, emr_n_threshold, wrn_n_threshold, emr_t_threshold, wrn_t_threshold] =
            measurements;
        let [emr_n, wrn_n, emr_t, wrn_t, r1, r2, r3, rdy, test, xxxx] = flags;
        Self {
            read,
            n_data,
            t_data,
            f1_data,
            f2_data,
            f3_data,
            emr_n_threshold,
            wrn_n_threshold,
            emr_t_threshold,
            wrn_t_threshold,
            emr_n,
            wrn_n,
            emr_t,
            wrn_t,
            r1,
            r2,
            r3,
            rdy,
            test,
            xxxx,
        }
    }
}

/// Declares `PlcSnapshot` with its wire-name table and ordered accessors.
macro_rules! plc_snapshot {
    ($( $(#[$meta:meta])* $field:ident => $wire:literal ),+ $(,)?) => {
        /// Reactor PLC reading
        ///
        /// Field order below is the wire order.
        #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
        pub struct PlcSnapshot {
            /// PLC state code
            pub state: i32,
            $( $(#[$meta])* pub $field: f32, )+
        }

        impl PlcSnapshot {
            /// Wire name of the state code
            pub const STATE_NAME: &'static str = "STATE";

            /// Wire names of `variables()`, in order
            pub const VARIABLE_NAMES: [&'static str; PLC_VARIABLE_COUNT] = [$($wire),+];

            /// Process variables, in wire order
            pub fn variables(&self) -> [f32; PLC_VARIABLE_COUNT] {
                [$(self.$field),+]
            }

            /// Rebuild from wire-ordered parts
            pub fn from_variables(state: i32, variables: [f32; PLC_VARIABLE_COUNT]) -> Self {
                let [$($field),+] = variables;
                Self { state, $($field),+ }
            }
        }
    };
}

plc_snapshot! {
    /// Regulating rod position
    barra_reg => "BarraReg",
    /// Shim rod position
    barra_con => "BarraCon",
    /// Safety rod position
    barra_seg => "BarraSeg",
    c_log_a_log => "CLogALog",
    c_log_a_lin => "CLogALin",
    c_log_a_per => "CLogAPer",
    c_par_a_lin => "CParALin",
    c_par_a_log => "CParALog",
    c_par_a_per => "CParAPer",
    c_log_a_rea => "CLogARea",
    c_lin => "CLin",
    c_per => "CPer",
    /// Area radiation monitors
    s_rad_are => "SRadAre",
    s_rad_ent_pri => "SRadEntPri",
    s_rad_poc => "SRadPoc",
    s_rad_res => "SRadRes",
    s_rad_sai_sec => "SRadSaiSec",
    s_rad_aer => "SRadAer",
    /// Primary loop flow
    vas_pri => "VasPri",
    /// Pt100 temperature probes
    s_pt100_poco => "SPt100Poco",
    s_pt100_ent_pri => "SPt100EntPri",
    s_pt100_sai_pri => "SPt100SaiPri",
    s_pt100_ent_sec => "SPt100EntSec",
    s_pt100_sai_sec => "SPt100SaiSec",
    s_tp_poc1 => "STpPoc1",
    s_tp_poc2 => "STpPoc2",
    s_tp_len => "STpLen",
    /// Pool water conductivity
    s_con_poc => "SConPoc",
    s_con_sai_pri => "SConSaiPri",
}

/// Fully decoded reading of one source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSnapshot {
    Spu(SpuSnapshot),
    Plc(PlcSnapshot),
}

impl SourceSnapshot {
    /// Shape name (for diagnostics)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spu(_) => "spu",
            Self::Plc(_) => "plc",
        }
    }

    pub fn as_spu(&self) -> Option<&SpuSnapshot> {
        match self {
            Self::Spu(spu) => Some(spu),
            Self::Plc(_) => None,
        }
    }

    pub fn as_plc(&self) -> Option<&PlcSnapshot> {
        match self {
            Self::Plc(plc) => Some(plc),
            Self::Spu(_) => None,
        }
    }
}

/// Freshness of a source's latest reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Nothing was ever published for the source
    Unavailable,
    /// Last good reading is older than the staleness bound
    Stale,
    /// Last good reading is within the staleness bound
    Fresh,
}

/// Snapshot as stored by the snapshot store
///
/// Immutable once built; shared with readers behind an `Arc`.
#[derive(Debug, Clone)]
pub struct PublishedSnapshot {
    /// Source that produced it
    pub source: SourceId,

    /// Per-source publish sequence, starting at 1
    pub sequence: u64,

    /// When it was published
    pub published_at: Instant,

    /// The reading itself
    pub snapshot: SourceSnapshot,
}

impl PublishedSnapshot {
    /// Age relative to `now` (zero if `now` is earlier)
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.published_at)
    }

    /// Fresh while `age <= stale_after`
    pub fn freshness(&self, now: Instant, stale_after: Duration) -> Freshness {
        if self.age(now) > stale_after {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }
}

/// One source's contribution to an aggregate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceReading<T> {
    /// Publish sequence of the snapshot this was copied from
    pub sequence: u64,

    /// `Fresh` or `Stale`, never `Unavailable`
    pub freshness: Freshness,

    /// Age at aggregation time
    pub age: Duration,

    /// Reading
    pub data: T,
}

/// Latest reading of every source, assembled on demand
///
/// Each component is internally consistent (one driver read); components may
/// come from different instants. `None` marks a source that never published.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AggregateSnapshot {
    pub spu_ch_a: Option<SourceReading<SpuSnapshot>>,
    pub spu_ch_b: Option<SourceReading<SpuSnapshot>>,
    pub plc: Option<SourceReading<PlcSnapshot>>,
}

impl AggregateSnapshot {
    /// SPU reading for an SPU source (`None` for the PLC or if unavailable)
    pub fn spu(&self, source: SourceId) -> Option<&SourceReading<SpuSnapshot>> {
        match source {
            SourceId::SpuChA => self.spu_ch_a.as_ref(),
            SourceId::SpuChB => self.spu_ch_b.as_ref(),
            SourceId::Plc => None,
        }
    }

    /// Tri-state freshness of one source
    pub fn freshness(&self, source: SourceId) -> Freshness {
        let reading = match source {
            SourceId::SpuChA | SourceId::SpuChB => self.spu(source).map(|r| r.freshness),
            SourceId::Plc => self.plc.as_ref().map(|r| r.freshness),
        };
        reading.unwrap_or(Freshness::Unavailable)
    }

    /// Sources that never published
    pub fn missing(&self) -> Vec<SourceId> {
        SourceId::ALL
            .into_iter()
            .filter(|id| self.freshness(*id) == Freshness::Unavailable)
            .collect()
    }

    /// Every source has published at least once
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// At least one source is stale
    pub fn has_stale(&self) -> bool {
        SourceId::ALL
            .into_iter()
            .any(|id| self.freshness(id) == Freshness::Stale)
    }
}
