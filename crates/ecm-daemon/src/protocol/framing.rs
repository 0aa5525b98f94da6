//! Length-prefixed frame codec.
//!
//! ```text
//! +----------------------------+------------------+
//! | Length (4 bytes, BE)       | Payload          |
//! +----------------------------+------------------+
//! ```
//!
//! The length is validated before the payload is buffered.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use super::error::{MAX_FRAME_SIZE, ProtocolError};

const LENGTH_PREFIX_SIZE: usize = 4;

/// Frame codec for the ECM socket.
#[derive(Debug)]
pub struct FrameCodec {
    inner: LengthDelimitedCodec,
    max_frame_size: usize,
}

impl FrameCodec {
    /// Codec with the default [`MAX_FRAME_SIZE`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    /// Codec with a custom frame size limit.
    #[must_use]
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        let inner = LengthDelimitedCodec::builder()
            .big_endian()
            .length_field_length(LENGTH_PREFIX_SIZE)
            .max_frame_length(max_frame_size)
            .new_codec();
        Self {
            inner,
            max_frame_size,
        }
    }

    /// The frame size limit.
    #[must_use]
    pub const fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(prefix) = src.get(..LENGTH_PREFIX_SIZE) {
            let mut len = [0u8; LENGTH_PREFIX_SIZE];
            len.copy_from_slice(prefix);
            let size = u32::from_be_bytes(len) as usize;
            if size > self.max_frame_size {
                return Err(ProtocolError::frame_too_large(size, self.max_frame_size));
            }
        }
        Ok(self.inner.decode(src)?)
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_size {
            return Err(ProtocolError::frame_too_large(
                item.len(),
                self.max_frame_size,
            ));
        }
        Ok(self.inner.encode(item, dst)?)
    }
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;

    use super::*;

    #[test]
    fn encodes_big_endian_prefix() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Bytes::from_static(b"{}"), &mut buf).unwrap();
        assert_eq!(&buf[..], &[0, 0, 0, 2, b'{', b'}']);
    }

    #[test]
    fn waits_for_complete_frames() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.put_u32(5);
        buf.put_slice(b"ab");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.put_slice(b"cde");
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"abcde");
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_oversized_prefix_before_payload() {
        let mut codec = FrameCodec::with_max_frame_size(16);
        let mut buf = BytesMut::new();
        buf.put_u32(17);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::FrameTooLarge { size: 17, max: 16 }
        ));
    }

    #[test]
    fn rejects_oversized_payload_on_encode() {
        let mut codec = FrameCodec::with_max_frame_size(4);
        let mut buf = BytesMut::new();
        assert!(
            codec
                .encode(Bytes::from_static(b"12345"), &mut buf)
                .is_err()
        );
        assert!(buf.is_empty());
    }

    proptest::proptest! {
        #[test]
        fn frames_survive_arbitrary_chunking(
            payloads in proptest::collection::vec(
                proptest::collection::vec(proptest::prelude::any::<u8>(), 0..=512),
                1..8,
            ),
            chunk in 1usize..64,
        ) {
            let mut codec = FrameCodec::with_max_frame_size(512);
            let mut wire = BytesMut::new();
            for payload in &payloads {
                codec.encode(Bytes::copy_from_slice(payload), &mut wire).unwrap();
            }

            let mut buf = BytesMut::new();
            let mut decoded = Vec::new();
            for piece in wire.chunks(chunk) {
                buf.put_slice(piece);
                while let Some(frame) = codec.decode(&mut buf).unwrap() {
                    decoded.push(frame.to_vec());
                }
            }
            proptest::prop_assert_eq!(decoded, payloads);
            proptest::prop_assert!(buf.is_empty());
        }

        #[test]
        fn declared_lengths_over_the_limit_are_rejected(excess in 1u32..=u32::MAX - 512) {
            let mut codec = FrameCodec::with_max_frame_size(512);
            let mut buf = BytesMut::new();
            buf.put_u32(512 + excess);
            proptest::prop_assert!(matches!(
                codec.decode(&mut buf),
                Err(ProtocolError::FrameTooLarge { max: 512, .. })
            ), "expected FrameTooLarge with max 512");
        }
    }

    #[test]
    fn accepts_frames_at_the_default_limit() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let payload = vec![0x5a; MAX_FRAME_SIZE];
        codec.encode(Bytes::from(payload.clone()), &mut buf).unwrap();
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().to_vec(), payload);
        assert!(buf.is_empty());
    }
}
