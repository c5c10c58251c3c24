use crate::{
    codec::{self, CodecError},
    effect::Effect,
    state::ConnectionState,
};

/// Pending edits for one connection, applied in one step by [`StagedChange::apply_to`].
#[derive(Debug, Clone, PartialEq)]
pub struct StagedChange {
    mask_or: u8,
    mask_and: u8,
    param: Option<f32>,
    transition_ticks: Option<u32>,
}

impl Default for StagedChange {
    fn default() -> Self {
        Self {
            mask_or: 0,
            mask_and: 0xFF,
            param: None,
            transition_ticks: None,
        }
    }
}

impl StagedChange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&mut self, effect: &Effect) -> &mut Self {
        self.mask_or |= effect.mask();
        self
    }

    pub fn disable(&mut self, effect: &Effect) -> &mut Self {
        self.mask_and &= !effect.mask();
        self
    }

    /// Replaces the whole mask. Prefer [`enable`](Self::enable) and
    /// [`disable`](Self::disable).
    pub fn set_mask(&mut self, mask: i32) -> Result<&mut Self, CodecError> {
        let mask = u8::try_from(mask).map_err(|_| CodecError::RawMaskOutOfRange(mask))?;
        self.mask_and = 0;
        self.mask_or = mask;
        Ok(self)
    }

    /// Parameter as normalized `0..1`.
    pub fn set_param01(&mut self, value: f32) -> &mut Self {
        self.param = Some(codec::clamp01(value));
        self
    }

    /// Parameter as signed `-1..1`.
    pub fn set_param_signed(&mut self, value: f32) -> &mut Self {
        self.param = Some(codec::signed_to_01(value));
        self
    }

    /// Transition length for the staged parameter; 0 applies it at once.
    pub fn set_transition_ticks(&mut self, ticks: i32) -> &mut Self {
        self.transition_ticks = Some(ticks.max(0) as u32);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the mask edit then the parameter edit at tick `now`.
    pub fn apply_to(&self, state: &mut ConnectionState, now: u64) {
        state.apply_mask(self.mask_and, self.mask_or);
        if let Some(param) = self.param {
            state.set_param(param, self.transition_ticks.unwrap_or(0), now);
        }
    }

    /// Returns the staged edits and leaves `self` at defaults.
    pub fn take(&mut self) -> StagedChange {
        std::mem::take(self)
    }
}
