use std::{borrow::Cow, fmt};

use crate::codec::CodecError;

/// Highest usable bit. Bit 7 would push the mask past `MAX_MASK`.
pub const MAX_BIT: u8 = 6;

/// A named effect bound to one bit of the connection mask.
///
/// The mask is still capped by [`crate::codec::MAX_MASK`], so enabling many
/// high bits at once can produce a mask the codec refuses.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Effect {
    name: Cow<'static, str>,
    bit: u8,
}

impl Effect {
    pub const ROLL: Effect = Effect::builtin_const("ROLL", 0);
    pub const SHAKE: Effect = Effect::builtin_const("SHAKE", 1);
    pub const HEAT_DISTORTION: Effect = Effect::builtin_const("HEAT_DISTORTION", 2);

    pub const BUILTIN: [Effect; 3] = [Self::ROLL, Self::SHAKE, Self::HEAT_DISTORTION];

    const fn builtin_const(name: &'static str, bit: u8) -> Self {
        Self {
            name: Cow::Borrowed(name),
            bit,
        }
    }

    /// Effect bound to a caller chosen bit (0..=6).
    pub fn custom(name: impl Into<String>, bit: u8) -> Result<Self, CodecError> {
        if bit > MAX_BIT {
            return Err(CodecError::BitOutOfRange(bit));
        }
        Ok(Self {
            name: Cow::Owned(name.into()),
            bit,
        })
    }

    /// Looks up a built-in effect by name, ignoring case.
    pub fn builtin(name: &str) -> Option<Self> {
        Self::BUILTIN
            .into_iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bit(&self) -> u8 {
        self.bit
    }

    pub fn mask(&self) -> u8 {
        1 << self.bit
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Effect{{{}:bit={}}}", self.name, self.bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_bits() {
        assert_eq!(Effect::ROLL.mask(), 0b001);
        assert_eq!(Effect::SHAKE.mask(), 0b010);
        assert_eq!(Effect::HEAT_DISTORTION.mask(), 0b100);
    }

    #[test]
    fn test_custom_bit_range() {
        let glow = Effect::custom("GLOW", 6).unwrap();
        assert_eq!(glow.mask(), 64);
        assert_eq!(glow.name(), "GLOW");
        assert_eq!(Effect::custom("BAD", 7), Err(CodecError::BitOutOfRange(7)));
    }

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(Effect::builtin("shake"), Some(Effect::SHAKE));
        assert_eq!(Effect::builtin("Heat_Distortion"), Some(Effect::HEAT_DISTORTION));
        assert_eq!(Effect::builtin("wobble"), None);
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(format!("{:?}", Effect::ROLL), "Effect{ROLL:bit=0}");
    }
}
