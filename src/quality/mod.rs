pub mod definition;
pub mod profile;

pub use definition::{QualityDefinition, QualityLadder, default_definitions};
pub use profile::{
    ProfileItem, QualityProfile, RejectReason, RevisionFacts, UpgradeDecision, UpgradeReason,
};

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::constants::VIDEO_EXTENSIONS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualitySource {
    Workprint,
    Cam,
    Telesync,
    Telecine,
    Screener,
    Regional,
    Remux,
    BluRay,
    WebDl,
    WebRip,
    Hdtv,
    Dvd,
    Sdtv,
}

impl QualitySource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Workprint => "WORKPRINT",
            Self::Cam => "CAM",
            Self::Telesync => "TELESYNC",
            Self::Telecine => "TELECINE",
            Self::Screener => "DVDSCR",
            Self::Regional => "REGIONAL",
            Self::Remux => "Remux",
            Self::BluRay => "Bluray",
            Self::WebDl => "WEBDL",
            Self::WebRip => "WEBRip",
            Self::Hdtv => "HDTV",
            Self::Dvd => "DVD",
            Self::Sdtv => "SDTV",
        }
    }

    /// Pre-release sources whose resolution says nothing about picture quality.
    #[must_use]
    pub const fn is_low_quality(&self) -> bool {
        matches!(
            self,
            Self::Workprint
                | Self::Cam
                | Self::Telesync
                | Self::Telecine
                | Self::Screener
                | Self::Regional
        )
    }
}

impl fmt::Display for QualitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality facts read from a release or file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuality {
    pub source: Option<QualitySource>,

    pub resolution: Option<u16>,

    pub proper: bool,
}

impl ParsedQuality {
    #[must_use]
    pub const fn is_low_quality(&self) -> bool {
        match self.source {
            Some(source) => source.is_low_quality(),
            None => false,
        }
    }

    /// Canonical quality name, e.g. `WEBDL-1080p`, `CAM`, `720p` or `Unknown`.
    #[must_use]
    pub fn name(&self) -> String {
        match (self.source, self.resolution) {
            (Some(source), _) if source.is_low_quality() => source.to_string(),
            (Some(source), Some(resolution)) => format!("{source}-{resolution}p"),
            (Some(source), None) => source.to_string(),
            (None, Some(resolution)) => format!("{resolution}p"),
            (None, None) => "Unknown".to_string(),
        }
    }

    /// Replaces the resolution with a probed one unless the source is a
    /// pre-release marker, which always wins over the probe.
    #[must_use]
    pub fn with_probed_resolution(mut self, resolution: Option<u16>) -> Self {
        if !self.is_low_quality() && resolution.is_some() {
            self.resolution = resolution;
        }
        self
    }
}

impl fmt::Display for ParsedQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

fn strip_video_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()) => stem,
        _ => name,
    }
}

fn parse_low_quality_source(name: &str) -> Option<QualitySource> {
    static WORKPRINT: OnceLock<Regex> = OnceLock::new();
    static CAM: OnceLock<Regex> = OnceLock::new();
    static TELESYNC: OnceLock<Regex> = OnceLock::new();
    static TELECINE: OnceLock<Regex> = OnceLock::new();
    static SCREENER: OnceLock<Regex> = OnceLock::new();
    static REGIONAL: OnceLock<Regex> = OnceLock::new();

    let checks: [(&'static OnceLock<Regex>, &str, QualitySource); 6] = [
        (&WORKPRINT, r"(?i)\b(workprint|wp)\b", QualitySource::Workprint),
        (&CAM, r"(?i)\b(cam|camrip|hdcam|cam-?rip)\b", QualitySource::Cam),
        (
            &TELESYNC,
            r"(?i)\b(ts|hdts|hd-ts|telesync|pdvd|tsrip)\b",
            QualitySource::Telesync,
        ),
        (&TELECINE, r"(?i)\b(tc|hdtc|telecine)\b", QualitySource::Telecine),
        (
            &SCREENER,
            r"(?i)\b(dvdscr|dvd-?screener|screener|scr|bdscr)\b",
            QualitySource::Screener,
        ),
        (&REGIONAL, r"(?i)\b(r5|r6)\b", QualitySource::Regional),
    ];

    checks
        .into_iter()
        .find(|(re, pattern, _)| get_regex(*re, pattern).is_match(name))
        .map(|(_, _, source)| source)
}

/// Finds a resolution token in a free-form string.
#[must_use]
pub fn extract_resolution(name: &str) -> Option<u16> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(
        &RE,
        r"(?i)(?:^|[^a-z0-9])(2160p|4k|uhd|1080[pi]|720p|576[pi]|480[pi])(?:$|[^a-z0-9])",
    );

    let token = re.captures(name)?.get(1)?.as_str().to_lowercase();
    match token.as_str() {
        "2160p" | "4k" | "uhd" => Some(2160),
        "1080p" | "1080i" => Some(1080),
        "720p" => Some(720),
        "576p" | "576i" => Some(576),
        "480p" | "480i" => Some(480),
        _ => None,
    }
}

fn parse_source(name: &str) -> Option<QualitySource> {
    static REMUX: OnceLock<Regex> = OnceLock::new();
    static BLURAY: OnceLock<Regex> = OnceLock::new();
    static WEBRIP: OnceLock<Regex> = OnceLock::new();
    static WEBDL: OnceLock<Regex> = OnceLock::new();
    static HDTV: OnceLock<Regex> = OnceLock::new();
    static DVD: OnceLock<Regex> = OnceLock::new();
    static SDTV: OnceLock<Regex> = OnceLock::new();

    let checks: [(&'static OnceLock<Regex>, &str, QualitySource); 7] = [
        (&REMUX, r"(?i)\b(remux|bdremux)\b", QualitySource::Remux),
        (
            &BLURAY,
            r"(?i)\b(blu-?ray|bluray|bdrip|brrip|bd)\b",
            QualitySource::BluRay,
        ),
        (&WEBRIP, r"(?i)\b(web-?rip|webrip)\b", QualitySource::WebRip),
        (
            &WEBDL,
            r"(?i)\b(web-?dl|webdl|web|amzn|nf|dsnp|hmax|atvp|hulu|pcok|pmtp|itunes|cr)\b",
            QualitySource::WebDl,
        ),
        (&HDTV, r"(?i)\b(hdtv|pdtv|dsr|hdtvrip)\b", QualitySource::Hdtv),
        (&DVD, r"(?i)\b(dvd|dvdrip|dvd-?r|ntsc|pal)\b", QualitySource::Dvd),
        (&SDTV, r"(?i)\b(sdtv|tvrip)\b", QualitySource::Sdtv),
    ];

    checks
        .into_iter()
        .find(|(re, pattern, _)| get_regex(*re, pattern).is_match(name))
        .map(|(_, _, source)| source)
}

/// True for proper, repack and rerip releases.
#[must_use]
pub fn is_proper_or_repack(name: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r"(?i)\b(proper|repack|rerip)\b").is_match(name)
}

/// Reads quality facts from a release title or file name.
///
/// Pre-release markers stand alone; otherwise the resolution and source tokens
/// are combined.
#[must_use]
pub fn parse_quality(name: &str) -> ParsedQuality {
    let name = strip_video_extension(name);
    let proper = is_proper_or_repack(name);

    if let Some(source) = parse_low_quality_source(name) {
        return ParsedQuality {
            source: Some(source),
            resolution: None,
            proper,
        };
    }

    ParsedQuality {
        source: parse_source(name),
        resolution: extract_resolution(name),
        proper,
    }
}

#[must_use]
pub fn parse_quality_from_filename(filename: &str) -> String {
    parse_quality(filename).name()
}

/// Collapses sub-variants onto their parent group, e.g. `WEBRip-720p` and
/// `WEBDL-720p` both become `WEB-720p`. Names without a resolution, or outside
/// any known group, come back unchanged.
#[must_use]
pub fn normalize_quality_name(name: &str) -> String {
    let trimmed = name.trim();
    let lower = trimmed.to_lowercase();

    if lower.starts_with("dvd-") && !lower.starts_with("dvdscr") {
        return "DVD".to_string();
    }
    if lower.starts_with("sdtv") {
        return "SDTV".to_string();
    }

    let Some(resolution) = extract_resolution(trimmed) else {
        return trimmed.to_string();
    };

    let group = match parse_source(&lower.replace(['-', '_', '.'], " ").replace("web dl", "webdl")) {
        Some(QualitySource::WebDl | QualitySource::WebRip) => "WEB",
        Some(QualitySource::Remux) => "Remux",
        Some(QualitySource::BluRay) => "Bluray",
        Some(QualitySource::Hdtv) => "HDTV",
        _ if lower.starts_with("web") => "WEB",
        _ => return trimmed.to_string(),
    };

    format!("{group}-{resolution}p")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quality_web_dl() {
        let q = parse_quality("The.Great.Movie.2020.1080p.WEB-DL.DDP5.1.H.264-GROUP.mkv");
        assert_eq!(q.source, Some(QualitySource::WebDl));
        assert_eq!(q.resolution, Some(1080));
        assert_eq!(q.name(), "WEBDL-1080p");
    }

    #[test]
    fn test_parse_quality_webrip_before_web() {
        assert_eq!(
            parse_quality_from_filename("Show.S01E01.720p.WEBRip.x264-GRP"),
            "WEBRip-720p"
        );
    }

    #[test]
    fn test_parse_quality_streaming_service() {
        assert_eq!(
            parse_quality_from_filename("Show.S02E03.2160p.AMZN.DDP5.1.HDR.HEVC-GRP"),
            "WEBDL-2160p"
        );
    }

    #[test]
    fn test_parse_quality_remux_and_bluray() {
        assert_eq!(
            parse_quality_from_filename("Movie.2019.1080p.BluRay.REMUX.AVC-GRP"),
            "Remux-1080p"
        );
        assert_eq!(
            parse_quality_from_filename("Movie.2019.720p.BluRay.x264-GRP"),
            "Bluray-720p"
        );
    }

    #[test]
    fn test_low_quality_markers_stand_alone() {
        let q = parse_quality("New.Movie.2024.1080p.HDCAM.x264-GRP");
        assert_eq!(q.name(), "CAM");
        assert!(q.is_low_quality());

        assert_eq!(
            parse_quality_from_filename("New.Movie.2024.TELESYNC.720p"),
            "TELESYNC"
        );
    }

    #[test]
    fn test_ts_extension_is_not_telesync() {
        assert_eq!(parse_quality_from_filename("Show.S01E01.HDTV.720p.ts"), "HDTV-720p");
    }

    #[test]
    fn test_resolution_or_source_alone() {
        assert_eq!(parse_quality_from_filename("movie 1080p"), "1080p");
        assert_eq!(parse_quality_from_filename("Movie.HDTV.x264"), "HDTV");
        assert_eq!(parse_quality_from_filename("home_video"), "Unknown");
    }

    #[test]
    fn test_probe_resolution_never_overrides_marker() {
        let cam = parse_quality("Film.2024.CAM").with_probed_resolution(Some(1080));
        assert_eq!(cam.name(), "CAM");

        let web = parse_quality("Film.2024.WEB-DL").with_probed_resolution(Some(2160));
        assert_eq!(web.name(), "WEBDL-2160p");
    }

    #[test]
    fn test_proper_detection() {
        assert!(parse_quality("Show.S01E01.PROPER.720p.HDTV").proper);
        assert!(parse_quality("Show.S01E01.REPACK.1080p.WEB").proper);
        assert!(!parse_quality("Show.S01E01.1080p.WEB").proper);
    }

    #[test]
    fn test_normalize_quality_name() {
        assert_eq!(normalize_quality_name("WEBDL-720p"), "WEB-720p");
        assert_eq!(normalize_quality_name("WEBRip-720p"), "WEB-720p");
        assert_eq!(normalize_quality_name("Bluray-1080p"), "Bluray-1080p");
        assert_eq!(normalize_quality_name("DVD-576p"), "DVD");
        assert_eq!(normalize_quality_name("CAM"), "CAM");
    }
}
