//! Packing of `(mask, arg)` into the carrier's time-of-day field.
//!
//! The client only accepts a time of day inside one day cycle, so the mask
//! and the quantized parameter share `[0, DAY_TICKS)`:
//!
//! ```text
//! payload = mask * MASK_BASE + arg        arg  in 0..=ARG_MAX
//!                                         mask in 0..=MAX_MASK
//! ```

/// Length of one day cycle on the client. Payloads must stay below it.
pub const DAY_TICKS: i64 = 24_000;

/// Step between two consecutive masks; the parameter lives in the low byte.
pub const MASK_BASE: i64 = 256;

/// Largest quantized parameter (93 steps, 0..=92).
pub const ARG_MAX: u8 = 92;

/// Largest mask that keeps every payload inside one day.
pub const MAX_MASK: u8 = ((DAY_TICKS - 1 - ARG_MAX as i64) / MASK_BASE) as u8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("mask out of range (0..={max}): {0}", max = MAX_MASK)]
    MaskOutOfRange(u8),
    #[error("arg out of range (0..={max}): {0}", max = ARG_MAX)]
    ArgOutOfRange(u8),
    #[error("mask must be 0..=255: {0}")]
    RawMaskOutOfRange(i32),
    #[error("effect bit must be 0..=6: {0}")]
    BitOutOfRange(u8),
    #[error("payload overflow (must be < {max}): {0}", max = DAY_TICKS)]
    PayloadOverflow(i64),
}

/// Packs `(mask, arg)` into a time-of-day payload.
pub fn pack(mask: u8, arg: u8) -> Result<i64, CodecError> {
    if mask > MAX_MASK {
        return Err(CodecError::MaskOutOfRange(mask));
    }
    if arg > ARG_MAX {
        return Err(CodecError::ArgOutOfRange(arg));
    }

    let payload = mask as i64 * MASK_BASE + arg as i64;
    debug_assert!(payload < DAY_TICKS, "payload overflow: {}", payload);
    if payload >= DAY_TICKS {
        return Err(CodecError::PayloadOverflow(payload));
    }
    Ok(payload)
}

/// Splits a payload back into `(mask, arg)`. This is what the client does.
pub fn unpack(payload: i64) -> Result<(u8, u8), CodecError> {
    if !(0..DAY_TICKS).contains(&payload) {
        return Err(CodecError::PayloadOverflow(payload));
    }
    let mask = (payload / MASK_BASE) as u8;
    let arg = (payload % MASK_BASE) as u8;
    if arg > ARG_MAX {
        return Err(CodecError::ArgOutOfRange(arg));
    }
    Ok((mask, arg))
}

/// Normalized `0..1` to `0..=ARG_MAX`.
pub fn quantize01(value: f32) -> u8 {
    (clamp01(value) * ARG_MAX as f32).round() as u8
}

/// Signed `-1..1` to `0..=ARG_MAX`.
pub fn quantize_signed(value: f32) -> u8 {
    quantize01(signed_to_01(value))
}

/// Inverse of [`quantize01`], as seen by the client.
pub fn dequantize(arg: u8) -> f32 {
    arg.min(ARG_MAX) as f32 / ARG_MAX as f32
}

pub(crate) fn signed_to_01(value: f32) -> f32 {
    clamp(value, -1.0, 1.0) * 0.5 + 0.5
}

pub fn clamp01(value: f32) -> f32 {
    clamp(value, 0.0, 1.0)
}

/// Total clamp; NaN maps to `lo`.
pub fn clamp(value: f32, lo: f32, hi: f32) -> f32 {
    if value.is_nan() || value < lo {
        lo
    } else if value > hi {
        hi
    } else {
        value
    }
}

#[cfg(test)]
#[path = "codec_test.rs"]
mod codec_test;
