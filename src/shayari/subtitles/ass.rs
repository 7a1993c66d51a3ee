//! ASS (Advanced SubStation Alpha) file generation.
//!
//! Captions are burned into the final video by ffmpeg's `ass` filter.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::shayari::model::SubtitleSegment;

/// Output resolution of a 9:16 vertical clip.
pub const PLAY_RES: (u32, u32) = (1080, 1920);

/// Lines longer than this many characters get a proportionally smaller font.
const COMFORTABLE_LINE_CHARS: usize = 24;

/// A named caption colour, written as `#RRGGBB`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteColor {
    pub name: String,
    pub hex: String,
}

impl PaletteColor {
    pub fn new(name: &str, hex: &str) -> Self {
        Self {
            name: name.to_string(),
            hex: hex.to_string(),
        }
    }

    /// ASS colours are `&HAABBGGRR`.
    pub fn to_ass(&self) -> Option<String> {
        let hex = self.hex.trim().trim_start_matches('#').trim_start_matches("0x");
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let (r, g, b) = (&hex[0..2], &hex[2..4], &hex[4..6]);
        Some(format!("&H00{}{}{}", b, g, r).to_uppercase())
    }
}

pub fn default_palette() -> Vec<PaletteColor> {
    vec![
        PaletteColor::new("Gold", "#FFD700"),
        PaletteColor::new("White", "#FFFFFF"),
        PaletteColor::new("Cyan", "#00FFFF"),
        PaletteColor::new("Pink", "#FF69B4"),
        PaletteColor::new("Pale Green", "#98FB98"),
        PaletteColor::new("Orange", "#FFA500"),
        PaletteColor::new("Lavender", "#E6E6FA"),
        PaletteColor::new("Khaki", "#F0E68C"),
        PaletteColor::new("Sky Blue", "#87CEEB"),
        PaletteColor::new("Light Pink", "#FFB6C1"),
    ]
}

/// Style configuration for ASS subtitles.
#[derive(Debug, Clone, PartialEq)]
pub struct AssStyle {
    /// Style name
    pub name: String,
    /// Font name; must cover Devanagari
    pub font_name: String,
    /// Font size in pixels for a comfortably short line
    pub font_size: u32,
    /// Smallest size long lines may shrink to
    pub min_font_size: u32,
    /// Primary color in ABGR format (e.g., &H00FFFFFF for white)
    pub primary_color: String,
    /// Human name of the primary color, for metadata
    pub color_name: String,
    /// Outline color in ABGR format
    pub outline_color: String,
    /// Background/shadow color in ABGR format
    pub back_color: String,
    pub bold: bool,
    /// Outline width in pixels
    pub outline: u32,
    /// Shadow depth in pixels
    pub shadow: u32,
    /// Alignment (numpad layout: 1-3=bottom, 4-6=mid, 7-9=top)
    pub alignment: u8,
    pub margin_l: u32,
    pub margin_r: u32,
    pub margin_v: u32,
}

impl Default for AssStyle {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            font_name: "Noto Sans Devanagari".to_string(),
            font_size: 60,
            min_font_size: 36,
            primary_color: "&H0000D7FF".to_string(),
            color_name: "Gold".to_string(),
            outline_color: "&H00000000".to_string(),
            back_color: "&H80000000".to_string(),
            bold: true,
            outline: 3,
            shadow: 1,
            // Middle-center: horizontally centered captions over the clip
            alignment: 5,
            margin_l: 60,
            margin_r: 60,
            margin_v: 0,
        }
    }
}

impl AssStyle {
    pub fn with_color(mut self, color: &PaletteColor) -> Self {
        if let Some(ass) = color.to_ass() {
            self.primary_color = ass;
            self.color_name = color.name.clone();
        }
        self
    }

    /// Shrink the font for long lines so they stay inside the frame.
    pub fn font_size_for(&self, text: &str) -> u32 {
        let longest = text
            .split('\n')
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(0);
        if longest <= COMFORTABLE_LINE_CHARS {
            return self.font_size;
        }
        let scaled = self.font_size as usize * COMFORTABLE_LINE_CHARS / longest;
        (scaled as u32).clamp(self.min_font_size.min(self.font_size), self.font_size)
    }

    /// Format the style line for the ASS file.
    fn to_style_line(&self) -> String {
        let bold_val = if self.bold { -1 } else { 0 };
        format!(
            "Style: {name},{font},{size},{primary},{primary},{outline},{back},{bold},0,0,0,100,100,0,0,1,{outline_w},{shadow},{align},{ml},{mr},{mv},1",
            name = self.name,
            font = self.font_name,
            size = self.font_size,
            primary = self.primary_color,
            outline = self.outline_color,
            back = self.back_color,
            bold = bold_val,
            outline_w = self.outline,
            shadow = self.shadow,
            align = self.alignment,
            ml = self.margin_l,
            mr = self.margin_r,
            mv = self.margin_v,
        )
    }
}

/// Generate the complete ASS document for a list of caption segments.
pub fn generate_ass_file(
    segments: &[SubtitleSegment],
    style: &AssStyle,
    play_res: (u32, u32),
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "[Script Info]");
    let _ = writeln!(output, "ScriptType: v4.00+");
    let _ = writeln!(output, "PlayResX: {}", play_res.0);
    let _ = writeln!(output, "PlayResY: {}", play_res.1);
    let _ = writeln!(output, "WrapStyle: 0");
    let _ = writeln!(output, "ScaledBorderAndShadow: yes");
    let _ = writeln!(output);

    let _ = writeln!(output, "[V4+ Styles]");
    let _ = writeln!(
        output,
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding"
    );
    let _ = writeln!(output, "{}", style.to_style_line());
    let _ = writeln!(output);

    let _ = writeln!(output, "[Events]");
    let _ = writeln!(
        output,
        "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text"
    );

    for segment in segments {
        let size = style.font_size_for(&segment.text);
        let size_override = if size != style.font_size {
            format!("{{\\fs{}}}", size)
        } else {
            String::new()
        };
        let _ = writeln!(
            output,
            "Dialogue: 0,{start},{end},{style},,0,0,0,,{size_override}{text}",
            start = format_ass_timestamp(segment.start_seconds),
            end = format_ass_timestamp(segment.end_seconds),
            style = style.name,
            text = escape_ass_text(&segment.text)
        );
    }

    output
}

/// Format seconds as an ASS timestamp (H:MM:SS.cc).
fn format_ass_timestamp(seconds: f64) -> String {
    let total_cs = (seconds.max(0.0) * 100.0).round() as u64;
    let cs = total_cs % 100;
    let total_secs = total_cs / 100;
    format!(
        "{}:{:02}:{:02}.{:02}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60,
        cs
    )
}

/// Escape special characters in ASS text.
fn escape_ass_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace('\n', "\\N")
}
