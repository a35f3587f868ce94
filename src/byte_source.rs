/// A non-blocking supplier of incoming bus bytes.
///
/// The decoder core never waits for I/O: a `tick()` consumes at most the
/// bytes that are available right now. Implementations must never block in
/// either method; a serial adapter that has nothing buffered simply reports
/// zero availability.
pub trait ByteSource {
    /// Returns the number of bytes that can be read without blocking.
    fn available(&self) -> usize;

    /// Reads the next byte, or `None` when the source is currently drained.
    fn read(&mut self) -> Option<u8>;
}

/// A size-adapting buffer that implements [`ByteSource`]. The buffer grows
/// when data is fed into it and drops already-consumed data before new data
/// are appended.
///
/// Hosts that pump bytes out of their own serial I/O loop feed them in here
/// and hand the buffer to the decoder.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    buf: Vec<u8>,
    start: usize,
    offset: usize,
}

impl StreamBuffer {
    /// Constructs an empty `StreamBuffer`.
    pub fn new() -> StreamBuffer {
        StreamBuffer {
            buf: Vec::new(),
            start: 0,
            offset: 0,
        }
    }

    /// Appends incoming data to the internal buffer.
    pub fn feed(&mut self, data: &[u8]) {
        if self.start > 0 {
            drop(self.buf.drain(0..self.start));
            self.start = 0;
        }

        self.buf.extend_from_slice(data);
    }

    /// Returns the unconsumed byte length of the internal buffer.
    pub fn len(&self) -> usize {
        self.buf.len() - self.start
    }

    /// Returns `true` when no unconsumed bytes are left.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the total amount of already consumed bytes.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl ByteSource for StreamBuffer {
    fn available(&self) -> usize {
        self.len()
    }

    fn read(&mut self) -> Option<u8> {
        if self.start < self.buf.len() {
            let byte = self.buf [self.start];
            self.start += 1;
            self.offset += 1;
            Some(byte)
        } else {
            None
        }
    }
}
