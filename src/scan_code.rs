//! # Scan Codes
//!
//! Scan code image URL construction and the color palette users can pick
//! from. Username codes are plain image URLs and need no network call;
//! data codes first register their payload through the API and resolve to
//! a remote image URL keyed by the returned id.

use serde::Deserialize;

/// Image service serving rendered scan codes.
pub const SCAN_CODE_BASE_URL: &str = "https://scancode.kik.com/api/v1/images";

/// Fallback edge length when neither width/height nor size is given.
pub const DEFAULT_SCAN_CODE_SIZE: u32 = 1200;

/// The colors a scan code can be rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KikCodeColor {
    KikBlue = 0,
    Turquoise = 1,
    Mint = 2,
    Forest = 3,
    KikGreen = 4,
    Sunshine = 5,
    OrangeCreamsicle = 6,
    BloodOrange = 7,
    CandyAppleRed = 8,
    Salmon = 9,
    Coral = 10,
    Cranberry = 11,
    Lavender = 12,
    RoyalPurple = 13,
    Marine = 14,
    Steel = 15,
}

impl From<KikCodeColor> for u8 {
    fn from(color: KikCodeColor) -> u8 {
        color as u8
    }
}

/// Options for a scan code image.
///
/// `size` fills in whichever of `width`/`height` is unset; with nothing
/// set the image falls back to [`DEFAULT_SCAN_CODE_SIZE`]. Deserializes
/// straight from the scan-code route's query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanCodeOptions {
    /// Payload handed back to the bot in a scan-data message.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub color: Option<u8>,
}

impl ScanCodeOptions {
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_color(mut self, color: KikCodeColor) -> Self {
        self.color = Some(color.into());
        self
    }

    fn dimensions(&self) -> (u32, u32) {
        let width = self
            .width
            .or(self.size)
            .unwrap_or(DEFAULT_SCAN_CODE_SIZE);
        let height = self
            .height
            .or(self.size)
            .unwrap_or(DEFAULT_SCAN_CODE_SIZE);
        (width, height)
    }

    fn color_query(&self) -> String {
        match self.color {
            Some(color) => format!("?c={color}"),
            None => String::new(),
        }
    }
}

/// Image URL for a bot's username scan code.
pub fn username_code_url(username: &str, options: &ScanCodeOptions) -> String {
    let (width, height) = options.dimensions();
    format!(
        "{SCAN_CODE_BASE_URL}/username/{username}/{width}x{height}.png{}",
        options.color_query()
    )
}

/// Image URL for a registered remote (data) scan code.
pub fn remote_code_url(id: &str, options: &ScanCodeOptions) -> String {
    let (width, height) = options.dimensions();
    format!(
        "{SCAN_CODE_BASE_URL}/remote/{id}/{width}x{height}.png{}",
        options.color_query()
    )
}
