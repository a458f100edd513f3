use super::Transport;
use crate::prelude::{SensorError, SensorResult};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// UART channel to the sensor.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Opens `path` at `baud_rate`, 8N1 without flow control. The short
    /// timeout keeps an empty read from stalling the tick loop.
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> SensorResult<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|err| SensorError::PortsNotSetUp(format!("{}: {}", path, err)))?;

        log::info!("Opened serial port: {} at {} baud", path, baud_rate);
        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buffer: &mut [u8]) -> SensorResult<usize> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> SensorResult<usize> {
        Ok(self.port.write(data)?)
    }

    fn flush(&mut self) -> SensorResult<()> {
        self.port.flush()?;
        Ok(())
    }

    fn clear(&mut self) -> SensorResult<()> {
        self.port
            .clear(ClearBuffer::All)
            .map_err(|err| SensorError::Io(err.into()))
    }

    fn available(&mut self) -> SensorResult<usize> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(|err| SensorError::Io(err.into()))
    }
}
