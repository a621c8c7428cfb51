// src/core/protocol/frame.rs

//! Length-prefixed bincode framing.
//!
//! Each frame is a 4-byte big-endian payload length followed by the payload,
//! encoded with `bincode::config::standard()`.

use crate::core::errors::AccountError;
use bincode::{Decode, Encode};
use bytes::{Buf, BufMut, BytesMut};
use std::marker::PhantomData;
use tokio_util::codec::{Decoder, Encoder};

const LENGTH_PREFIX: usize = 4;

/// Frames larger than this are rejected as a protocol error.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// A `tokio_util::codec` that writes `Out` messages and reads `In` messages.
///
/// The service uses `AccountFrameCodec<ClientRequest, ServerResponse>` and the
/// client the reverse.
#[derive(Debug)]
pub struct AccountFrameCodec<In, Out> {
    _marker: PhantomData<fn(Out) -> In>,
}

impl<In, Out> AccountFrameCodec<In, Out> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<In, Out> Default for AccountFrameCodec<In, Out> {
    fn default() -> Self {
        Self::new()
    }
}

impl<In, Out: Encode> Encoder<Out> for AccountFrameCodec<In, Out> {
    type Error = AccountError;

    fn encode(&mut self, item: Out, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = bincode::encode_to_vec(item, bincode::config::standard())?;
        if payload.len() > MAX_FRAME_LEN {
            return Err(AccountError::Protocol(format!(
                "frame of {} bytes exceeds the {} byte limit",
                payload.len(),
                MAX_FRAME_LEN
            )));
        }
        dst.reserve(LENGTH_PREFIX + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

impl<In: Decode<()>, Out> Decoder for AccountFrameCodec<In, Out> {
    type Item = In;
    type Error = AccountError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX];
        prefix.copy_from_slice(&src[..LENGTH_PREFIX]);
        let len = u32::from_be_bytes(prefix) as usize;
        if len > MAX_FRAME_LEN {
            return Err(AccountError::Protocol(format!(
                "frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit"
            )));
        }

        if src.len() < LENGTH_PREFIX + len {
            src.reserve(LENGTH_PREFIX + len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX);
        let payload = src.split_to(len);
        let (item, read) = bincode::decode_from_slice(&payload, bincode::config::standard())?;
        if read != len {
            return Err(AccountError::Protocol(format!(
                "frame has {} trailing bytes",
                len - read
            )));
        }
        Ok(Some(item))
    }
}
