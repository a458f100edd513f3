//! Byte-stream transports for the sensor's control and data channels.

use crate::prelude::SensorResult;

mod mock;
mod serial;

pub use mock::MockTransport;
pub use serial::SerialTransport;

/// One byte-oriented channel to the sensor.
pub trait Transport: Send {
    /// Reads whatever is available into `buffer`. A timeout with no data
    /// returns `Ok(0)`.
    fn read(&mut self, buffer: &mut [u8]) -> SensorResult<usize>;

    fn write(&mut self, data: &[u8]) -> SensorResult<usize>;

    fn flush(&mut self) -> SensorResult<()>;

    /// Discards pending input and output.
    fn clear(&mut self) -> SensorResult<()>;

    /// Number of bytes waiting to be read, if the transport can tell.
    fn available(&mut self) -> SensorResult<usize> {
        Ok(0)
    }

    /// Drains the pending input as lossy UTF-8, for CLI responses.
    fn read_text(&mut self) -> SensorResult<String> {
        let pending = self.available()?;
        if pending == 0 {
            return Ok(String::new());
        }
        let mut bytes = vec![0u8; pending];
        let read = self.read(&mut bytes)?;
        bytes.truncate(read);
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
