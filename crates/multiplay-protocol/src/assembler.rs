//! Reassembly of a byte stream into complete frames.
//!
//! TCP hands us bytes in whatever chunks the network produced. One read may
//! end in the middle of a header, another may carry three frames at once.
//! [`FrameAssembler`] owns the buffer that bridges those reads.
//!
//! # Buffer invariant
//!
//! Between calls the buffer holds exactly the stream bytes that have been
//! received but not yet emitted as part of a frame: nothing is dropped,
//! nothing is emitted twice. Bytes enter at the tail and leave from the head.
//! The one exception is a header violation, after which the buffer is
//! discarded (see [`FrameAssembler::next_frame`]).

use bytes::{Buf, BytesMut};

use crate::wire::{Frame, WireFormat, decode_header};
use crate::ProtocolError;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Turns arbitrary byte chunks into complete [`Frame`]s.
#[derive(Debug)]
pub struct FrameAssembler {
    buf: BytesMut,
    format: WireFormat,
}

impl FrameAssembler {
    /// Creates an empty assembler for the given wire format.
    pub fn new(format: WireFormat) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            format,
        }
    }

    /// Appends `chunk` and returns an iterator over every frame that is now
    /// complete.
    ///
    /// The iterator yields zero, one, or many frames. If it yields an error,
    /// that is the last item. Frames not pulled from the iterator stay
    /// buffered and come out of the next call.
    ///
    /// ```rust
    /// use multiplay_protocol::{FrameAssembler, HandlerId, WireFormat};
    ///
    /// let mut assembler = FrameAssembler::new(WireFormat::default());
    ///
    /// assert_eq!(assembler.feed(&[0, 0]).count(), 0);
    /// assert_eq!(assembler.feed(&[0, 9, 1, 0xAA]).count(), 0);
    ///
    /// let frames: Vec<_> = assembler
    ///     .feed(&[0xBB, 0xCC, 0xDD])
    ///     .collect::<Result<_, _>>()
    ///     .unwrap();
    /// assert_eq!(frames.len(), 1);
    /// assert_eq!(frames[0].handler_id, HandlerId(1));
    /// assert_eq!(frames[0].body.as_ref(), &[0xAA, 0xBB, 0xCC, 0xDD]);
    /// ```
    pub fn feed(&mut self, chunk: &[u8]) -> Frames<'_> {
        self.buf.extend_from_slice(chunk);
        Frames {
            assembler: self,
            failed: false,
        }
    }

    /// Extracts the next complete frame from the buffer, if there is one.
    ///
    /// Returns `Ok(None)` when more bytes are needed. On a header violation
    /// the whole buffer is discarded: once a length field is garbage there
    /// is no way to find where the next frame starts.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        let header = match decode_header(&self.buf, &self.format) {
            Ok(Some(header)) => header,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!(
                    discarded = self.buf.len(),
                    error = %e,
                    "bad frame header, dropping buffered bytes"
                );
                self.buf.clear();
                return Err(e);
            }
        };

        let total = header.total_len as usize;
        if self.buf.len() < total {
            return Ok(None);
        }

        self.buf.advance(self.format.header_size());
        let body = self.buf.split_to(header.body_len(&self.format)).freeze();

        Ok(Some(Frame {
            handler_id: header.handler_id,
            body,
        }))
    }

    /// Number of bytes received but not yet emitted.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// The wire format this assembler decodes.
    pub fn format(&self) -> &WireFormat {
        &self.format
    }
}

/// Iterator returned by [`FrameAssembler::feed`].
#[derive(Debug)]
pub struct Frames<'a> {
    assembler: &'a mut FrameAssembler,
    failed: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<Frame, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.assembler.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
