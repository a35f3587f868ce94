use std::{
    fmt,
    ops::{Deref, DerefMut},
};

/// The fixed staging area a decoder assembles one frame into.
///
/// All four protocols fit comfortably within 255 bytes; a frame that would
/// not is treated as corrupt by the framing layer. The contents are not
/// zeroed between frames: the device field maps may read past the received
/// length of a short frame, which matches the behaviour of the controllers'
/// reference decoder.
pub(crate) struct FrameBuffer {
    buf: [u8; FrameBuffer::CAPACITY],
    write_idx: usize,
}

impl FrameBuffer {
    /// The fixed capacity of the staging area.
    pub(crate) const CAPACITY: usize = 255;

    pub(crate) fn new() -> FrameBuffer {
        FrameBuffer {
            buf: [0; FrameBuffer::CAPACITY],
            write_idx: 0,
        }
    }

    /// Appends one received byte. Returns `false` when the buffer is full.
    pub(crate) fn push(&mut self, byte: u8) -> bool {
        if self.write_idx >= FrameBuffer::CAPACITY {
            false
        } else {
            self.buf [self.write_idx] = byte;
            self.write_idx += 1;
            true
        }
    }

    /// Number of bytes received for the frame under assembly.
    pub(crate) fn len(&self) -> usize {
        self.write_idx
    }

    /// Rewinds the write index without touching the stored bytes.
    pub(crate) fn clear(&mut self) {
        self.write_idx = 0;
    }
}

impl Deref for FrameBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for FrameBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("FrameBuffer {{ write_idx: {}, buf: ... }}", self.write_idx))
    }
}
