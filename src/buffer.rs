//! Conversion between portable byte sequences and the platform's native buffer.
//!
//! The platform hands out fixed-size buffers that are never resized once
//! allocated. Both directions copy every byte, keep order, and never truncate
//! or pad.

use crate::error::{BindingError, BindingResult};
use std::fmt;

/// A fixed-size binary buffer owned by the platform side.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct NativeBuffer {
    bytes: Box<[u8]>,
}

impl NativeBuffer {
    /// Number of bytes in the buffer.
    pub fn byte_length(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<Vec<u8>> for NativeBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }
}

impl fmt::Debug for NativeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBuffer")
            .field("byte_length", &self.byte_length())
            .finish()
    }
}

/// Copy a portable byte sequence into a freshly allocated native buffer.
pub fn to_native(input: &[u8]) -> BindingResult<NativeBuffer> {
    let mut bytes = allocate(input.len())?;
    bytes.extend_from_slice(input);
    Ok(NativeBuffer::from(bytes))
}

/// Copy a native buffer into a portable byte sequence of the same length.
pub fn from_native(input: &NativeBuffer) -> BindingResult<Vec<u8>> {
    let mut bytes = allocate(input.byte_length())?;
    bytes.extend_from_slice(input.as_slice());
    Ok(bytes)
}

fn allocate(len: usize) -> BindingResult<Vec<u8>> {
    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(len)
        .map_err(|_| BindingError::Allocation(len))?;
    Ok(bytes)
}
