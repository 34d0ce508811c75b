// =============================================================================
// Shared types used across the chart service
// =============================================================================

use std::str::FromStr;

use serde::Serialize;

/// Sampling interval of every table the service builds. Only daily candles
/// are requested, which is what makes the date index unique.
pub const DAILY_INTERVAL: &str = "1d";

/// Length of the history window ending now, in days.
pub const LOOKBACK_DAYS: i64 = 1000;

/// Maximum number of klines per request.
pub const KLINE_LIMIT: u32 = 1000;

/// Window of the Bollinger middle band and its standard deviation.
pub const BOLLINGER_WINDOW: usize = 20;

/// Number of standard deviations between the middle band and each outer band.
pub const BOLLINGER_WIDTH: f64 = 2.0;

/// An overlay the presentation layer can toggle on top of the candles.
///
/// This is a closed set: each variant knows its window and the table columns
/// it draws from, so adding an overlay is a compile-checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Overlay {
    #[serde(rename = "21MA")]
    Ma21,
    #[serde(rename = "50MA")]
    Ma50,
    #[serde(rename = "100MA")]
    Ma100,
    #[serde(rename = "200MA")]
    Ma200,
    #[serde(rename = "Bollinger Bands")]
    BollingerBands,
}

impl Overlay {
    /// Every overlay, in the order they are offered to the user.
    pub const ALL: [Overlay; 5] = [
        Self::Ma21,
        Self::Ma50,
        Self::Ma100,
        Self::Ma200,
        Self::BollingerBands,
    ];

    /// Moving-average overlays only.
    pub const MOVING_AVERAGES: [Overlay; 4] = [Self::Ma21, Self::Ma50, Self::Ma100, Self::Ma200];

    /// Rolling window length in rows.
    pub fn window(self) -> usize {
        match self {
            Self::Ma21 => 21,
            Self::Ma50 => 50,
            Self::Ma100 => 100,
            Self::Ma200 => 200,
            Self::BollingerBands => BOLLINGER_WINDOW,
        }
    }

    /// Display name, also the name accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            Self::Ma21 => "21MA",
            Self::Ma50 => "50MA",
            Self::Ma100 => "100MA",
            Self::Ma200 => "200MA",
            Self::BollingerBands => "Bollinger Bands",
        }
    }

    /// Names of the table columns the overlay renders.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Ma21 => &["21MA"],
            Self::Ma50 => &["50MA"],
            Self::Ma100 => &["100MA"],
            Self::Ma200 => &["200MA"],
            Self::BollingerBands => &["BOLU", "BOLD"],
        }
    }
}

impl std::fmt::Display for Overlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a string names no known overlay.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown indicator '{0}'")]
pub struct UnknownOverlay(pub String);

impl FromStr for Overlay {
    type Err = UnknownOverlay;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|o| o.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownOverlay(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for overlay in Overlay::ALL {
            assert_eq!(overlay.name().parse::<Overlay>(), Ok(overlay));
        }
    }

    #[test]
    fn from_str_ignores_case_and_padding() {
        assert_eq!(" bollinger bands ".parse::<Overlay>(), Ok(Overlay::BollingerBands));
        assert_eq!("21ma".parse::<Overlay>(), Ok(Overlay::Ma21));
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "RSI".parse::<Overlay>().unwrap_err();
        assert_eq!(err, UnknownOverlay("RSI".into()));
    }

    #[test]
    fn bollinger_maps_to_both_bands() {
        assert_eq!(Overlay::BollingerBands.columns(), &["BOLU", "BOLD"]);
        assert_eq!(Overlay::BollingerBands.window(), 20);
    }

    #[test]
    fn serde_uses_display_names() {
        let json = serde_json::to_string(&Overlay::ALL).unwrap();
        assert_eq!(json, r#"["21MA","50MA","100MA","200MA","Bollinger Bands"]"#);
    }
}
