//! Frame transport.
//!
//! Frames travel without a header: their size is fixed for the session by
//! the link mode, `frame_len * 2` bytes of little-endian PCM or a packed
//! parameter frame. A short read ends a stream.

use crate::audio::playback::PlaybackError;
use crate::codec::CodecError;
use crate::config::ConfigError;

/// Link errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("transport refused a frame")]
    SendFailed,
    #[error("frame of {len} bytes does not fit a {capacity} byte buffer")]
    FrameTooLarge { len: usize, capacity: usize },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Outgoing frame channel (websocket client, UART, file).
pub trait FrameSink {
    /// Send one whole frame.
    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError>;
}

/// Incoming frame channel.
pub trait FrameSource {
    /// Fill `buf` with the next frame. Returns the bytes read; anything
    /// shorter than `buf.len()` means the stream has ended.
    fn read_frame(&mut self, buf: &mut [u8]) -> usize;
}

impl<T: FrameSink + ?Sized> FrameSink for &mut T {
    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        (**self).send(frame)
    }
}

impl<T: FrameSource + ?Sized> FrameSource for &mut T {
    fn read_frame(&mut self, buf: &mut [u8]) -> usize {
        (**self).read_frame(buf)
    }
}

/// Cursor over a byte slice, e.g. a parameter file baked into flash.
#[derive(Clone, Debug)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl FrameSource for SliceSource<'_> {
    fn read_frame(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        n
    }
}

/// Frames appended to a byte slice.
#[derive(Debug)]
pub struct SliceSink<'a> {
    buf: &'a mut [u8],
    len: usize,
    frames: usize,
}

impl<'a> SliceSink<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            len: 0,
            frames: 0,
        }
    }

    /// Bytes written so far.
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl FrameSink for SliceSink<'_> {
    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        let end = self.len + frame.len();
        if end > self.buf.len() {
            return Err(LinkError::FrameTooLarge {
                len: frame.len(),
                capacity: self.buf.len() - self.len,
            });
        }
        self.buf[self.len..end].copy_from_slice(frame);
        self.len = end;
        self.frames += 1;
        Ok(())
    }
}

/// Serialize PCM as little-endian bytes. Returns the bytes written.
pub fn pcm_to_le(samples: &[i16], out: &mut [u8]) -> usize {
    let mut n = 0;
    for (chunk, s) in out.chunks_exact_mut(2).zip(samples) {
        chunk.copy_from_slice(&s.to_le_bytes());
        n += 2;
    }
    n
}

/// Parse little-endian PCM bytes. A trailing odd byte is ignored.
/// Returns the samples written.
pub fn le_to_pcm(bytes: &[u8], out: &mut [i16]) -> usize {
    let mut n = 0;
    for (s, chunk) in out.iter_mut().zip(bytes.chunks_exact(2)) {
        *s = i16::from_le_bytes([chunk[0], chunk[1]]);
        n += 1;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_source_short_read() {
        let data = [1u8, 2, 3, 4, 5];
        let mut src = SliceSource::new(&data);
        let mut buf = [0u8; 2];
        assert_eq!(src.read_frame(&mut buf), 2);
        assert_eq!(src.read_frame(&mut buf), 2);
        assert_eq!(buf, [3, 4]);
        assert_eq!(src.read_frame(&mut buf), 1);
        assert_eq!(src.read_frame(&mut buf), 0);
    }

    #[test]
    fn test_slice_sink_overflow() {
        let mut buf = [0u8; 10];
        let mut sink = SliceSink::new(&mut buf);
        sink.send(&[1; 7]).unwrap();
        assert_eq!(
            sink.send(&[2; 7]),
            Err(LinkError::FrameTooLarge { len: 7, capacity: 3 })
        );
        assert_eq!(sink.frames(), 1);
        assert_eq!(sink.written(), &[1; 7]);
    }

    #[test]
    fn test_pcm_le_layout() {
        let mut bytes = [0u8; 6];
        assert_eq!(pcm_to_le(&[1, -2, 0x1234], &mut bytes), 6);
        assert_eq!(bytes, [0x01, 0x00, 0xfe, 0xff, 0x34, 0x12]);

        let mut pcm = [0i16; 4];
        assert_eq!(le_to_pcm(&bytes[..5], &mut pcm), 2);
        assert_eq!(&pcm[..2], &[1, -2]);
    }

    #[test]
    fn test_errors_convert() {
        let e: LinkError = CodecError::InvalidFrameLength(3).into();
        assert_eq!(e, LinkError::Codec(CodecError::InvalidFrameLength(3)));
        assert_eq!(
            format!("{}", LinkError::SendFailed),
            "transport refused a frame"
        );
    }
}
