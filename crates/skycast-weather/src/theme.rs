//! Condition code to card colors.

use std::ops::RangeInclusive;

use serde::Serialize;

/// ARGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Color(pub u32);

impl Color {
    pub const WHITE: Color = Color(0xFFFF_FFFF);
    pub const BLACK: Color = Color(0xFF00_0000);
    pub const AMBER: Color = Color(0xFFFF_C107);
    pub const SKY_BLUE: Color = Color(0xFF4F_C3F7);
    pub const NAVY: Color = Color(0xFF1A_237E);
    pub const INDIGO: Color = Color(0xFF39_49AB);
    pub const SLATE: Color = Color(0xFF54_6E7A);
    pub const LIGHT_GRAY: Color = Color(0xFFCF_D8DC);
    pub const GRAY: Color = Color(0xFF90_A4AE);
    pub const STEEL_BLUE: Color = Color(0xFF46_82B4);
    pub const ICE_BLUE: Color = Color(0xFFB3_E5FC);
    pub const CHARCOAL: Color = Color(0xFF26_3238);
    pub const PURPLE: Color = Color(0xFF6A_1B9A);
    /// Neutral card background
    pub const SURFACE: Color = Color(0xFFFF_FBFE);
    /// Text color that reads on any stock platform surface
    pub const ON_SURFACE: Color = Color(0xFF1C_1B1F);
}

pub type Gradient = [Color; 2];

/// Card background and foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub gradient: Gradient,
    pub text_color: Color,
}

struct ConditionTheme {
    codes: RangeInclusive<i32>,
    day: Gradient,
    night: Gradient,
}

const CLEAR_DAY: Gradient = [Color::SKY_BLUE, Color::AMBER];
const CLEAR_NIGHT: Gradient = [Color::NAVY, Color::INDIGO];
const CLOUDY_DAY: Gradient = [Color::WHITE, Color::AMBER];
const CLOUDY_NIGHT: Gradient = [Color::SLATE, Color::NAVY];
const FOG: Gradient = [Color::LIGHT_GRAY, Color::GRAY];
const RAIN_DAY: Gradient = [Color::STEEL_BLUE, Color::SLATE];
const RAIN_NIGHT: Gradient = [Color::SLATE, Color::CHARCOAL];
const SNOW_DAY: Gradient = [Color::WHITE, Color::ICE_BLUE];
const SNOW_NIGHT: Gradient = [Color::ICE_BLUE, Color::SLATE];
const STORM: Gradient = [Color::CHARCOAL, Color::PURPLE];
const FALLBACK: Gradient = [Color::SKY_BLUE, Color::SLATE];
const NEUTRAL: Gradient = [Color::SURFACE, Color::SURFACE];

const fn band(first: i32, last: i32, day: Gradient, night: Gradient) -> ConditionTheme {
    ConditionTheme {
        codes: first..=last,
        day,
        night,
    }
}

/// Checked in order; first matching range wins.
const CONDITION_THEMES: &[ConditionTheme] = &[
    band(1000, 1000, CLEAR_DAY, CLEAR_NIGHT),
    band(1003, 1009, CLOUDY_DAY, CLOUDY_NIGHT),
    band(1030, 1030, FOG, FOG),
    band(1063, 1063, RAIN_DAY, RAIN_NIGHT),
    band(1066, 1072, SNOW_DAY, SNOW_NIGHT),
    band(1087, 1087, STORM, STORM),
    band(1114, 1117, SNOW_DAY, SNOW_NIGHT),
    band(1135, 1147, FOG, FOG),
    band(1150, 1201, RAIN_DAY, RAIN_NIGHT),
    band(1204, 1237, SNOW_DAY, SNOW_NIGHT),
    band(1240, 1246, RAIN_DAY, RAIN_NIGHT),
    band(1249, 1264, SNOW_DAY, SNOW_NIGHT),
    band(1273, 1282, STORM, STORM),
];

/// Light gradients that need dark text.
const BLACK_TEXT_GRADIENTS: &[Gradient] = &[CLEAR_DAY, CLOUDY_DAY, FOG, SNOW_DAY];

const DEFAULT_TEXT: Color = Color::WHITE;

pub fn gradient_for(code: i32, is_day: bool) -> Gradient {
    CONDITION_THEMES
        .iter()
        .find(|t| t.codes.contains(&code))
        .map(|t| if is_day { t.day } else { t.night })
        .unwrap_or(FALLBACK)
}

/// Resolve the card theme.
///
/// `dynamic_colors` is the user preference; `platform_dynamic` says whether the
/// host can theme text dynamically at all.
pub fn theme_for(code: i32, is_day: bool, dynamic_colors: bool, platform_dynamic: bool) -> Theme {
    if !dynamic_colors {
        return Theme {
            gradient: NEUTRAL,
            text_color: Color::ON_SURFACE,
        };
    }

    let gradient = gradient_for(code, is_day);
    let text_color = if !platform_dynamic {
        Color::ON_SURFACE
    } else if BLACK_TEXT_GRADIENTS.contains(&gradient) {
        Color::BLACK
    } else {
        DEFAULT_TEXT
    };

    Theme {
        gradient,
        text_color,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_partly_cloudy_day_uses_black_text() {
        let theme = theme_for(1003, true, true, true);
        assert_eq!(theme.gradient, [Color::WHITE, Color::AMBER]);
        assert_eq!(theme.text_color, Color::BLACK);
    }

    #[test]
    fn test_cloudy_night_keeps_default_text() {
        let theme = theme_for(1006, false, true, true);
        assert_eq!(theme.gradient, CLOUDY_NIGHT);
        assert_eq!(theme.text_color, Color::WHITE);
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        assert_eq!(gradient_for(1150, true), RAIN_DAY);
        assert_eq!(gradient_for(1201, true), RAIN_DAY);
        assert_eq!(gradient_for(1204, true), SNOW_DAY);
        assert_eq!(gradient_for(1282, false), STORM);
    }

    #[test]
    fn test_unknown_code_falls_back() {
        assert_eq!(gradient_for(0, true), FALLBACK);
        assert_eq!(gradient_for(9999, false), FALLBACK);
    }

    #[test]
    fn test_platform_without_dynamic_theme() {
        let theme = theme_for(1195, true, true, false);
        assert_eq!(theme.gradient, RAIN_DAY);
        assert_eq!(theme.text_color, Color::ON_SURFACE);
    }

    #[test]
    fn test_dynamic_colors_disabled() {
        let theme = theme_for(1087, true, false, true);
        assert_eq!(theme.gradient, NEUTRAL);
        assert_eq!(theme.text_color, Color::ON_SURFACE);
    }
}
