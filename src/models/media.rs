use serde::{Deserialize, Serialize};

/// Stream facts reported by the media probe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub video_codec: Option<String>,
    pub video_bit_depth: Option<i64>,
    /// `HDR10`, `HLG`, `DV` or `None` for SDR.
    pub dynamic_range: Option<String>,
    pub audio_codec: Option<String>,
    pub audio_channels: Option<i64>,
    pub audio_languages: Vec<String>,
    pub subtitle_languages: Vec<String>,
    pub duration_secs: Option<f64>,
}

impl MediaInfo {
    /// Vertical resolution bucket, derived from the larger of the two
    /// dimensions so letterboxed encodes are not under-rated.
    #[must_use]
    pub fn resolution(&self) -> Option<u16> {
        let height = self.height?;
        let width = self.width.unwrap_or(0);

        let bucket = if width >= 3200 || height >= 2000 {
            2160
        } else if width >= 1800 || height >= 1000 {
            1080
        } else if width >= 1200 || height >= 700 {
            720
        } else if height >= 540 {
            576
        } else if height > 0 {
            480
        } else {
            return None;
        };
        Some(bucket)
    }

    #[must_use]
    pub fn video_codec_label(&self) -> String {
        let Some(codec) = self.video_codec.as_deref() else {
            return String::new();
        };
        match codec.to_lowercase().as_str() {
            "h264" | "avc" | "avc1" => "x264".to_string(),
            "hevc" | "h265" => "x265".to_string(),
            "av1" => "AV1".to_string(),
            "vp9" => "VP9".to_string(),
            "mpeg2video" => "MPEG2".to_string(),
            "mpeg4" => "XviD".to_string(),
            other => other.to_uppercase(),
        }
    }

    #[must_use]
    pub fn audio_codec_label(&self) -> String {
        let Some(codec) = self.audio_codec.as_deref() else {
            return String::new();
        };
        match codec.to_lowercase().as_str() {
            "aac" => "AAC".to_string(),
            "ac3" => "AC3".to_string(),
            "eac3" => "EAC3".to_string(),
            "dts" => "DTS".to_string(),
            "truehd" => "TrueHD".to_string(),
            "flac" => "FLAC".to_string(),
            "opus" => "Opus".to_string(),
            "mp3" => "MP3".to_string(),
            "vorbis" => "Vorbis".to_string(),
            other => other.to_uppercase(),
        }
    }

    #[must_use]
    pub fn audio_channels_label(&self) -> String {
        match self.audio_channels {
            Some(1) => "1.0".to_string(),
            Some(2) => "2.0".to_string(),
            Some(6) => "5.1".to_string(),
            Some(8) => "7.1".to_string(),
            Some(n) if n > 0 => format!("{n}.0"),
            _ => String::new(),
        }
    }

    #[must_use]
    pub fn dynamic_range_label(&self) -> String {
        if self.dynamic_range.is_some() {
            "HDR".to_string()
        } else {
            String::new()
        }
    }

    #[must_use]
    pub fn dynamic_range_type(&self) -> String {
        self.dynamic_range.clone().unwrap_or_default()
    }

    /// `[EN+DE]` style list, empty when there is nothing to show.
    #[must_use]
    pub fn language_label(languages: &[String]) -> String {
        if languages.is_empty() {
            return String::new();
        }
        let joined = languages
            .iter()
            .map(|l| l.to_uppercase())
            .collect::<Vec<_>>()
            .join("+");
        format!("[{joined}]")
    }
}
