/// Growable window over the raw bytes read from the data channel.
///
/// The buffer itself never refuses bytes; the owner compares `len()` with
/// its configured ceiling after each append.
#[derive(Debug, Default, Clone)]
pub struct ByteStreamBuffer {
    data: Vec<u8>,
}

impl ByteStreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
    }

    /// Keeps only the bytes from `offset` onwards; they become the start of
    /// the next packet.
    pub fn consume_from(&mut self, offset: usize) {
        let offset = offset.min(self.data.len());
        self.data.drain(..offset);
    }

    pub fn exceeds(&self, limit: usize) -> bool {
        self.data.len() > limit
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}
