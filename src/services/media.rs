use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::media::MediaInfo;

/// Extracts stream facts from a media file. Failures mean "no extra facts";
/// callers must not treat them as fatal.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaInfo>;
}

/// Probe backed by the `ffprobe` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfprobeProbe;

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let owned: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || get_media_info(&owned))
            .await
            .context("Media probe task panicked")?
    }
}

/// Stream side data names the HDR format; a BT.2020 colour space without it
/// is still wide-gamut HDR content.
fn dynamic_range_from_stream(color_space: Option<&str>, side_data: &[&str]) -> Option<String> {
    let has = |needle: &str| {
        side_data
            .iter()
            .any(|kind| kind.to_ascii_lowercase().contains(needle))
    };

    if has("dovi") {
        Some("DV".to_string())
    } else if has("hdr10+") || has("smpte2094") {
        Some("HDR10Plus".to_string())
    } else if has("mastering display") || has("content light level") {
        Some("HDR10".to_string())
    } else if matches!(color_space, Some("bt2020nc" | "bt2020c")) {
        Some("HDR".to_string())
    } else {
        None
    }
}

fn bit_depth_from_pix_fmt(pix_fmt: Option<&str>) -> Option<i64> {
    let pix_fmt = pix_fmt?;
    if pix_fmt.contains("12le") || pix_fmt.contains("12be") {
        Some(12)
    } else if pix_fmt.contains("10le") || pix_fmt.contains("10be") {
        Some(10)
    } else {
        Some(8)
    }
}

fn get_media_info(path: &Path) -> Result<MediaInfo> {
    let output = ffprobe::ffprobe(path)
        .with_context(|| format!("Failed to run ffprobe on {}", path.display()))?;

    let video_stream = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .context("No video stream found")?;

    let audio_streams: Vec<_> = output
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("audio"))
        .collect();

    let stream_languages = |kind: &str| -> Vec<String> {
        let mut languages: Vec<String> = output
            .streams
            .iter()
            .filter(|s| s.codec_type.as_deref() == Some(kind))
            .filter_map(|s| s.tags.as_ref().and_then(|t| t.language.clone()))
            .filter(|l| !l.is_empty() && l != "und")
            .collect();
        languages.dedup();
        languages
    };

    let duration_secs = output
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            video_stream
                .duration
                .as_deref()
                .and_then(|d| d.parse::<f64>().ok())
        });

    let info = MediaInfo {
        width: video_stream.width,
        height: video_stream.height,
        video_codec: video_stream.codec_name.clone(),
        video_bit_depth: bit_depth_from_pix_fmt(video_stream.pix_fmt.as_deref()),
        dynamic_range: dynamic_range_from_stream(
            video_stream.color_space.as_deref(),
            &video_stream
                .side_data_list
                .iter()
                .map(|d| d.side_data_type.as_str())
                .collect::<Vec<_>>(),
        ),
        audio_codec: audio_streams.first().and_then(|s| s.codec_name.clone()),
        audio_channels: audio_streams.first().and_then(|s| s.channels),
        audio_languages: stream_languages("audio"),
        subtitle_languages: stream_languages("subtitle"),
        duration_secs,
    };

    debug!(
        path = %path.display(),
        width = ?info.width,
        height = ?info.height,
        codec = ?info.video_codec,
        "Analyzed media"
    );

    Ok(info)
}
