use super::Transport;
use crate::prelude::{SensorError, SensorResult};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory transport. Clones share state, so a test (or a replay driver)
/// can keep one handle while the sensor interface owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    closed: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> SensorResult<MutexGuard<'_, MockTransportInner>> {
        self.inner
            .lock()
            .map_err(|_| SensorError::Io(io::Error::other("mock transport lock poisoned")))
    }

    /// Queues bytes to be returned by later reads.
    pub fn inject_read(&self, data: &[u8]) {
        if let Ok(mut inner) = self.lock() {
            inner.read_buffer.extend(data);
        }
    }

    pub fn pending(&self) -> usize {
        self.lock().map(|inner| inner.read_buffer.len()).unwrap_or(0)
    }

    pub fn written(&self) -> Vec<u8> {
        self.lock()
            .map(|inner| inner.write_buffer.clone())
            .unwrap_or_default()
    }

    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.written()).into_owned()
    }

    /// Makes every further operation fail as if the device vanished.
    pub fn disconnect(&self) {
        if let Ok(mut inner) = self.lock() {
            inner.closed = true;
        }
    }

    fn check_open(inner: &MockTransportInner) -> SensorResult<()> {
        if inner.closed {
            Err(SensorError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock transport disconnected",
            )))
        } else {
            Ok(())
        }
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> SensorResult<usize> {
        let mut inner = self.lock()?;
        Self::check_open(&inner)?;
        let count = inner.read_buffer.len().min(buffer.len());
        for (slot, byte) in buffer.iter_mut().zip(inner.read_buffer.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn write(&mut self, data: &[u8]) -> SensorResult<usize> {
        let mut inner = self.lock()?;
        Self::check_open(&inner)?;
        inner.write_buffer.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> SensorResult<()> {
        let inner = self.lock()?;
        Self::check_open(&inner)
    }

    fn clear(&mut self) -> SensorResult<()> {
        let mut inner = self.lock()?;
        Self::check_open(&inner)?;
        inner.read_buffer.clear();
        Ok(())
    }

    fn available(&mut self) -> SensorResult<usize> {
        let inner = self.lock()?;
        Self::check_open(&inner)?;
        Ok(inner.read_buffer.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_bounded_by_buffer_len() {
        let mock = MockTransport::new();
        mock.inject_read(&[1, 2, 3, 4, 5]);
        let mut handle = mock.clone();
        let mut buf = [0u8; 3];
        assert_eq!(handle.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(mock.pending(), 2);
    }

    #[test]
    fn empty_read_is_not_an_error() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 8];
        assert_eq!(mock.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn read_text_drains_pending_input() {
        let mock = MockTransport::new();
        mock.inject_read(b"Done\n");
        let mut handle = mock.clone();
        assert_eq!(handle.read_text().unwrap(), "Done\n");
        assert_eq!(mock.pending(), 0);
    }

    #[test]
    fn poisoned_lock_surfaces_as_io_error() {
        let mock = MockTransport::new();
        let shared = mock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = shared.inner.lock().unwrap();
            panic!("holder died");
        })
        .join();

        let mut handle = mock.clone();
        let mut buf = [0u8; 4];
        assert!(matches!(handle.read(&mut buf), Err(SensorError::Io(_))));
    }

    #[test]
    fn disconnected_mock_fails_io() {
        let mock = MockTransport::new();
        mock.disconnect();
        let mut handle = mock.clone();
        assert!(handle.write(b"sensorStop\n").is_err());
    }
}
