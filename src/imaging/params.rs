//! Encoding parameters.
//!
//! - [`Quality`]: JPEG quality (1–100, default 90). Clamped on construction.
//! - [`Quality::retry_ladder`]: the descending qualities tried when a
//!   re-encode comes out larger than the original page.

/// Lowest quality the adaptive retry will go down to.
pub const QUALITY_FLOOR: u32 = 60;

/// Quality decrement between retry attempts.
pub const QUALITY_STEP: u32 = 5;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Qualities to retry after `self`: `self - 5`, `self - 10`, … while at or
    /// above [`QUALITY_FLOOR`]. Empty when `self` is already within one step
    /// of the floor.
    pub fn retry_ladder(self) -> impl Iterator<Item = Quality> {
        (1..)
            .map(move |n| self.0.checked_sub(n * QUALITY_STEP))
            .take_while(|q| q.is_some_and(|q| q >= QUALITY_FLOOR))
            .flatten()
            .map(Quality)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}
