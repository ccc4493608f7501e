use std::num::NonZeroUsize;

use crate::models::error::CaptureError;

/// Reshapes arbitrarily sized PCM deliveries into fixed-size encoder frames.
///
/// Holds at most one frame's worth of leftover bytes between calls. Bytes leave
/// in exactly the order they arrived; none are duplicated or dropped across
/// chunk boundaries. Not thread-safe: owned by a single encode session.
#[derive(Debug)]
pub struct FrameAccumulator {
    frame_len: usize,
    leftover: Vec<u8>,
    // Reused between pushes to avoid per-chunk allocation.
    scratch: Vec<u8>,
}

impl FrameAccumulator {
    pub fn new(frame_len: NonZeroUsize) -> Self {
        let frame_len = frame_len.get();
        Self {
            frame_len,
            leftover: Vec::with_capacity(frame_len),
            scratch: Vec::new(),
        }
    }

    /// Length `F` of every emitted frame.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Bytes waiting for the next frame (`L`), always `< F`.
    pub fn leftover_len(&self) -> usize {
        self.leftover.len()
    }

    pub fn leftover(&self) -> &[u8] {
        &self.leftover
    }

    /// Number of frames the next `push` of `incoming` bytes would emit.
    pub fn frames_for(&self, incoming: usize) -> usize {
        (self.leftover.len() + incoming) / self.frame_len
    }

    /// Append `bytes` and hand every completed frame to `on_frame`, in order.
    ///
    /// Returns the number of frames emitted. If the scratch span cannot be
    /// allocated the chunk is dropped, the leftover is left untouched and an
    /// [`CaptureError::Allocation`] is returned.
    pub fn push<F>(&mut self, bytes: &[u8], mut on_frame: F) -> Result<usize, CaptureError>
    where
        F: FnMut(&[u8]),
    {
        let total = self.leftover.len() + bytes.len();
        if total < self.frame_len {
            self.leftover.extend_from_slice(bytes);
            return Ok(0);
        }

        self.scratch.clear();
        self.scratch.try_reserve(total).map_err(|e| {
            CaptureError::Allocation(format!("{} byte scratch span: {}", total, e))
        })?;
        self.scratch.extend_from_slice(&self.leftover);
        self.scratch.extend_from_slice(bytes);

        let mut frames = self.scratch.chunks_exact(self.frame_len);
        let mut emitted = 0;
        for frame in frames.by_ref() {
            on_frame(frame);
            emitted += 1;
        }

        self.leftover.clear();
        self.leftover.extend_from_slice(frames.remainder());
        self.scratch.clear();
        Ok(emitted)
    }

    /// Discard leftover bytes, e.g. when the session stops.
    pub fn reset(&mut self) {
        self.leftover.clear();
        self.scratch = Vec::new();
    }
}
