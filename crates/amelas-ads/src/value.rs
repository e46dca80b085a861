// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Fixed-size PLC value encoding.
//!
//! ADS transfers values as their raw memory image in little-endian byte
//! order. [`PlcValue`] describes a Rust type with a known byte size and a
//! checked conversion to and from that image.
//!
//! | Rust type   | PLC type              | Size |
//! |-------------|-----------------------|------|
//! | `bool`      | `BOOL`                | 1    |
//! | `u8` / `i8` | `BYTE`/`USINT`/`SINT` | 1    |
//! | `u16`/`i16` | `WORD`/`UINT`/`INT`   | 2    |
//! | `u32`/`i32` | `DWORD`/`UDINT`/`DINT`| 4    |
//! | `u64`/`i64` | `LWORD`/`ULINT`/`LINT`| 8    |
//! | `f32`       | `REAL`                | 4    |
//! | `f64`       | `LREAL`               | 8    |
//! | `[u8; N]`   | any `N`-byte block    | N    |
//!
//! The size must match the symbol's declared size on the PLC. The device
//! accepts some mismatches silently; checking this is the caller's job.

use crate::error::ConversionError;

/// A value with a fixed PLC byte representation.
pub trait PlcValue: Sized + Send + 'static {
    /// Size of the encoded value in bytes.
    const SIZE: usize;

    /// Type name used in diagnostics.
    const TYPE_NAME: &'static str;

    /// Encodes the value as exactly [`Self::SIZE`] bytes.
    fn encode(&self) -> Vec<u8>;

    /// Decodes a value from exactly [`Self::SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::SizeMismatch`] if `bytes` has another length.
    fn decode(bytes: &[u8]) -> Result<Self, ConversionError>;
}

fn check_size<V: PlcValue>(bytes: &[u8]) -> Result<(), ConversionError> {
    if bytes.len() == V::SIZE {
        Ok(())
    } else {
        Err(ConversionError::size_mismatch(V::TYPE_NAME, V::SIZE, bytes.len()))
    }
}

impl PlcValue for bool {
    const SIZE: usize = 1;
    const TYPE_NAME: &'static str = "bool";

    fn encode(&self) -> Vec<u8> {
        vec![u8::from(*self)]
    }

    fn decode(bytes: &[u8]) -> Result<Self, ConversionError> {
        check_size::<Self>(bytes)?;
        Ok(bytes[0] != 0)
    }
}

macro_rules! impl_plc_value_le {
    ($($ty:ty),* $(,)?) => {
        $(
            impl PlcValue for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();
                const TYPE_NAME: &'static str = stringify!($ty);

                fn encode(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }

                fn decode(bytes: &[u8]) -> Result<Self, ConversionError> {
                    let raw = bytes.try_into().map_err(|_| {
                        ConversionError::size_mismatch(Self::TYPE_NAME, Self::SIZE, bytes.len())
                    })?;
                    Ok(<$ty>::from_le_bytes(raw))
                }
            }
        )*
    };
}

impl_plc_value_le!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl<const N: usize> PlcValue for [u8; N] {
    const SIZE: usize = N;
    const TYPE_NAME: &'static str = "byte array";

    fn encode(&self) -> Vec<u8> {
        self.to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Self, ConversionError> {
        bytes
            .try_into()
            .map_err(|_| ConversionError::size_mismatch(Self::TYPE_NAME, N, bytes.len()))
    }
}

// =============================================================================
// Tests
// =============================================================================
