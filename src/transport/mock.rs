//! Mock transport for testing

use super::Transport;
use crate::error::Result;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// In-memory transport for unit tests.
///
/// Clones share the same buffers, so a test can keep a handle while the
/// driver owns another. An empty read buffer reads as `Ok(0)`, mimicking a
/// serial timeout.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the driver to read.
    pub fn inject_read(&self, data: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.read_buffer.extend(data);
    }

    /// Everything written so far.
    pub fn written(&self) -> Vec<u8> {
        self.inner.lock().unwrap().write_buffer.clone()
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        let n = inner.read_buffer.len().min(buffer.len());
        for slot in buffer.iter_mut().take(n) {
            *slot = inner.read_buffer.pop_front().unwrap();
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.inner.lock().unwrap().write_buffer.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_buffers() {
        let mock = MockTransport::new();
        let mut driver_side: Box<dyn Transport> = Box::new(mock.clone());

        mock.inject_read(&[1, 2, 3]);
        let mut buf = [0u8; 8];
        assert_eq!(driver_side.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);

        driver_side.write_all(&[9, 8]).unwrap();
        assert_eq!(mock.written(), vec![9, 8]);
    }

    #[test]
    fn test_empty_read_is_timeout() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 4];
        assert_eq!(mock.read(&mut buf).unwrap(), 0);
    }
}
