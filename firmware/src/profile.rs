//! Preset selected at build time through cargo features.

use drumflash_core::timing::FlashProfile;

#[cfg(not(feature = "preset-short"))]
pub const PROFILE: FlashProfile = FlashProfile::STANDARD;

#[cfg(feature = "preset-short")]
pub const PROFILE: FlashProfile = FlashProfile::SHORT;

const _: () = assert!(
    PROFILE.validate().is_ok(),
    "selected preset does not fit the interval timer"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selected_preset_is_a_shipped_one() {
        assert_eq!(FlashProfile::by_name(PROFILE.name), Some(PROFILE));
    }
}
