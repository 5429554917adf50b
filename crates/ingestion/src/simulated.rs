//! Simulated instrument drivers
//!
//! Stand-ins for the field-bus decoders. Readings are deterministic functions
//! of a per-driver read counter, so two runs with the same config produce the
//! same stream.

use std::thread;
use std::time::Duration;

use contracts::{
    DriverKind, PlcSnapshot, SourceConfig, SourceDriver, SourceId, SourceSnapshot, SpuSnapshot,
    DriverError, PLC_VARIABLE_COUNT,
};
use tracing::debug;

/// Build the driver configured for `source`
pub fn open_driver(source: SourceId, config: &SourceConfig) -> Box<dyn SourceDriver> {
    let latency = Duration::from_millis(config.read_latency_ms);
    debug!(source = %source, endpoint = %config.endpoint, driver = ?config.driver, "opening driver");
    match config.driver {
        DriverKind::Simulated if source.is_spu() => {
            Box::new(SimulatedSpuDriver::new(source, latency))
        }
        DriverKind::Simulated => Box::new(SimulatedPlcDriver::new(latency)),
    }
}

/// Slowly varying wave in `[base - amplitude, base + amplitude]`
fn wave(tick: u64, period: u64, base: f32, amplitude: f32) -> f32 {
    let phase = (tick % period) as f32 / period as f32;
    base + amplitude * (phase * std::f32::consts::TAU).sin()
}

/// Simulated SPU sensor channel
#[derive(Debug)]
pub struct SimulatedSpuDriver {
    source: SourceId,
    latency: Duration,
    tick: u64,
}

impl SimulatedSpuDriver {
    /// `source` must be one of the SPU channels
    pub fn new(source: SourceId, latency: Duration) -> Self {
        Self {
            source,
            latency,
            tick: 0,
        }
    }

    fn sample(&self) -> SpuSnapshot {
        let t = self.tick;
        // channel B runs slightly offset so the two blocks are distinguishable
        let offset = if self.source == SourceId::SpuChB { 0.5 } else { 0.0 };
        let n_data = wave(t, 600, 12.5 + offset, 0.25);
        let t_data = wave(t, 900, 300.0 + offset, 1.5);
        let emr_n_threshold = 20.0;
        let wrn_n_threshold = 15.0;
        let emr_t_threshold = 350.0;
        let wrn_t_threshold = 320.0;

        SpuSnapshot {
            read: (t % i32::MAX as u64) as i32,
            n_data,
            t_data,
            f1_data: wave(t, 120, 1.0, 0.1),
            f2_data: wave(t, 240, 2.0, 0.1),
            f3_data: wave(t, 360, 3.0, 0.1),
            emr_n_threshold,
            wrn_n_threshold,
            emr_t_threshold,
            wrn_t_threshold,
            emr_n: n_data >= emr_n_threshold,
            wrn_n: n_data >= wrn_n_threshold,
            emr_t: t_data >= emr_t_threshold,
            wrn_t: t_data >= wrn_t_threshold,
            r1: t % 2 == 0,
            r2: t % 3 == 0,
            r3: t % 5 == 0,
            rdy: true,
            test: false,
            xxxx: false,
        }
    }
}

impl SourceDriver for SimulatedSpuDriver {
    fn identity(&self) -> SourceId {
        self.source
    }

    fn read_all(&mut self) -> Result<SourceSnapshot, DriverError> {
        if !self.source.is_spu() {
            return Err(DriverError::ShapeMismatch {
                source_id: self.source,
                actual: "spu",
            });
        }
        thread::sleep(self.latency);
        let snapshot = self.sample();
        self.tick = self.tick.wrapping_add(1);
        Ok(SourceSnapshot::Spu(snapshot))
    }
}

/// Simulated PLC
#[derive(Debug)]
pub struct SimulatedPlcDriver {
    latency: Duration,
    tick: u64,
}

impl SimulatedPlcDriver {
    pub fn new(latency: Duration) -> Self {
        Self { latency, tick: 0 }
    }

    fn sample(&self) -> PlcSnapshot {
        let mut variables = [0.0f32; PLC_VARIABLE_COUNT];
        for (i, v) in variables.iter_mut().enumerate() {
            let i = i as u64;
            *v = wave(self.tick + i * 7, 300 + i * 20, 10.0 * (i + 1) as f32, 0.5);
        }
        // operating state cycles slowly through 0..=3
        let state = ((self.tick / 100) % 4) as i32;
        PlcSnapshot::from_variables(state, variables)
    }
}

impl SourceDriver for SimulatedPlcDriver {
    fn identity(&self) -> SourceId {
        SourceId::Plc
    }

    fn read_all(&mut self) -> Result<SourceSnapshot, DriverError> {
        thread::sleep(self.latency);
        let snapshot = self.sample();
        self.tick = self.tick.wrapping_add(1);
        Ok(SourceSnapshot::Plc(snapshot))
    }
}
