//! SourceDriver trait - instrument source abstraction
//!
//! Field-bus decoding (Modbus RTU for the SPU channels, OPC UA for the PLC)
//! lives behind this trait. The hub only sees fully decoded snapshots.

use crate::{DriverError, SourceId, SourceSnapshot};

/// Blocking instrument source
///
/// One driver exists per source. The ingestion loop owns it exclusively and
/// moves it onto the blocking thread pool for every read, so implementations
/// may block for as long as the device needs.
///
/// # Example
///
/// ```ignore
/// let mut driver: Box<dyn SourceDriver> = open_driver(&config);
/// loop {
///     let snapshot = driver.read_all()?;
///     store.publish(driver.identity(), snapshot);
/// }
/// ```
pub trait SourceDriver: Send {
    /// Stable identity, selects the snapshot store slot
    fn identity(&self) -> SourceId;

    /// Read the full snapshot from the device
    ///
    /// # Errors
    /// Any transport or decode failure. The returned snapshot must match the
    /// shape of `identity()` (SPU snapshot for SPU channels, PLC for the PLC).
    fn read_all(&mut self) -> Result<SourceSnapshot, DriverError>;
}

impl<D: SourceDriver + ?Sized> SourceDriver for Box<D> {
    fn identity(&self) -> SourceId {
        (**self).identity()
    }

    fn read_all(&mut self) -> Result<SourceSnapshot, DriverError> {
        (**self).read_all()
    }
}
