use regex::{Captures, Regex};
use std::sync::OnceLock;

use super::sanitize::{clean_search_title, clean_title, title_the};
use super::{MultiEpisodeStyle, NamingConfig};
use crate::models::media::MediaInfo;

/// Facts about the concrete file being named.
#[derive(Debug, Clone, Default)]
pub struct FileFacts {
    pub quality: String,
    pub proper: bool,
    pub release_group: Option<String>,
    pub media_info: Option<MediaInfo>,
    pub original_filename: Option<String>,
    pub release_title: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MovieNamingInfo {
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i32>,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<i32>,
    pub file: FileFacts,
}

#[derive(Debug, Clone, Default)]
pub struct EpisodeNamingInfo {
    pub series_title: String,
    pub series_year: Option<i32>,
    pub tvdb_id: Option<i32>,
    pub tmdb_id: Option<i32>,
    pub imdb_id: Option<String>,
    pub season_number: i32,
    /// Sorted ascending; more than one entry for multi-episode files.
    pub episode_numbers: Vec<i32>,
    pub absolute_numbers: Vec<i32>,
    pub episode_titles: Vec<String>,
    pub air_date: Option<String>,
    pub file: FileFacts,
}

/// Literal token -> value pairs, applied in order.
pub(super) struct TokenSet {
    pairs: Vec<(&'static str, String)>,
}

impl TokenSet {
    fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    fn push(&mut self, token: &'static str, value: impl Into<String>) {
        self.pairs.push((token, value.into()));
    }

    pub(super) fn apply(&self, format: &str) -> String {
        self.pairs
            .iter()
            .fold(format.to_string(), |acc, (token, value)| {
                acc.replace(token, value)
            })
    }
}

fn quality_full(file: &FileFacts) -> String {
    if file.proper {
        format!("{} Proper", file.quality)
    } else {
        file.quality.clone()
    }
}

fn push_file_tokens(tokens: &mut TokenSet, file: &FileFacts, config: &NamingConfig) {
    tokens.push("{Quality Full}", quality_full(file));
    tokens.push("{Quality Title}", file.quality.clone());
    tokens.push("{Quality Proper}", if file.proper { "Proper" } else { "" });

    let group = file
        .release_group
        .as_deref()
        .map(|g| clean_title(g, config))
        .unwrap_or_default();
    let dashed = if group.is_empty() {
        String::new()
    } else {
        format!("-{group}")
    };
    tokens.push("{-Release Group}", dashed);
    tokens.push("{Release Group}", group);

    let info = file.media_info.clone().unwrap_or_default();
    let video = info.video_codec_label();
    let audio = info.audio_codec_label();
    let audio_languages = MediaInfo::language_label(&info.audio_languages);
    let subtitle_languages = MediaInfo::language_label(&info.subtitle_languages);

    let simple = [video.as_str(), audio.as_str()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let full = [simple.as_str(), audio_languages.as_str()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    tokens.push("{MediaInfo Simple}", simple);
    tokens.push("{MediaInfo Full}", full);
    tokens.push("{MediaInfo VideoCodec}", video);
    tokens.push(
        "{MediaInfo VideoBitDepth}",
        info.video_bit_depth.map(|b| b.to_string()).unwrap_or_default(),
    );
    tokens.push("{MediaInfo VideoDynamicRangeType}", info.dynamic_range_type());
    tokens.push("{MediaInfo VideoDynamicRange}", info.dynamic_range_label());
    tokens.push("{MediaInfo AudioCodec}", audio);
    tokens.push("{MediaInfo AudioChannels}", info.audio_channels_label());
    tokens.push("{MediaInfo AudioLanguages}", audio_languages);
    tokens.push("{MediaInfo SubtitleLanguages}", subtitle_languages);

    tokens.push(
        "{Original Title}",
        file.release_title
            .as_deref()
            .map(|t| clean_title(t, config))
            .unwrap_or_default(),
    );
    tokens.push(
        "{Original Filename}",
        file.original_filename
            .as_deref()
            .map(|t| clean_title(t, config))
            .unwrap_or_default(),
    );
}

fn year_string(year: Option<i32>) -> String {
    year.map(|y| y.to_string()).unwrap_or_default()
}

fn title_with_year(title: &str, year: Option<i32>) -> String {
    match year {
        Some(year) if !title.ends_with(&format!("({year})")) => format!("{title} ({year})"),
        _ => title.to_string(),
    }
}

pub(super) fn movie_tokens(info: &MovieNamingInfo, config: &NamingConfig) -> TokenSet {
    let mut tokens = TokenSet::new();
    let title = clean_title(&info.title, config);

    tokens.push("{Movie TitleThe}", title_the(&title));
    tokens.push("{Movie CleanTitle}", clean_search_title(&info.title));
    tokens.push("{Movie TitleYear}", title_with_year(&title, info.year));
    tokens.push(
        "{Movie OriginalTitle}",
        info.original_title
            .as_deref()
            .map(|t| clean_title(t, config))
            .unwrap_or_default(),
    );
    tokens.push("{Movie Title}", title);
    tokens.push("{Release Year}", year_string(info.year));
    tokens.push("{ImdbId}", info.imdb_id.clone().unwrap_or_default());
    tokens.push(
        "{TmdbId}",
        info.tmdb_id.map(|id| id.to_string()).unwrap_or_default(),
    );
    push_file_tokens(&mut tokens, &info.file, config);
    tokens
}

pub(super) fn series_tokens(info: &EpisodeNamingInfo, config: &NamingConfig) -> TokenSet {
    let mut tokens = TokenSet::new();
    let title = clean_title(&info.series_title, config);

    tokens.push("{Series TitleThe}", title_the(&title));
    tokens.push("{Series CleanTitle}", clean_search_title(&info.series_title));
    tokens.push("{Series TitleYear}", title_with_year(&title, info.series_year));
    tokens.push("{Series Title}", title);
    tokens.push("{Series Year}", year_string(info.series_year));
    tokens.push(
        "{TvdbId}",
        info.tvdb_id.map(|id| id.to_string()).unwrap_or_default(),
    );
    tokens.push(
        "{TmdbId}",
        info.tmdb_id.map(|id| id.to_string()).unwrap_or_default(),
    );
    tokens.push("{ImdbId}", info.imdb_id.clone().unwrap_or_default());
    tokens
}

pub(super) fn episode_tokens(info: &EpisodeNamingInfo, config: &NamingConfig) -> TokenSet {
    let mut tokens = series_tokens(info, config);

    let episode_title = info
        .episode_titles
        .iter()
        .map(|t| clean_title(t, config))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" + ");
    tokens.push("{Episode CleanTitle}", clean_search_title(&episode_title));
    tokens.push("{Episode Title}", episode_title);

    let air_date = info.air_date.clone().unwrap_or_default();
    tokens.push("{Air Date}", air_date.replace('-', " "));
    tokens.push("{Air-Date}", air_date);

    push_file_tokens(&mut tokens, &info.file, config);
    tokens
}

fn number_token(name: &str) -> &'static Regex {
    static SEASON: OnceLock<Regex> = OnceLock::new();
    static EPISODE: OnceLock<Regex> = OnceLock::new();
    static ABSOLUTE: OnceLock<Regex> = OnceLock::new();

    let (cell, pattern) = match name {
        "season" => (&SEASON, r"\{season:(0+)\}"),
        "episode" => (&EPISODE, r"\{episode:(0+)\}"),
        _ => (&ABSOLUTE, r"\{absolute:(0+)\}"),
    };
    cell.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

fn season_episode_chunk() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\w*\{season:0+\}\w*\{episode:0+\}")
            .expect("Invalid regex pattern defined in code")
    })
}

fn pad(value: i32, width: usize) -> String {
    format!("{value:0width$}")
}

fn width_of(caps: &Captures<'_>) -> usize {
    caps.get(1).map_or(1, |m| m.as_str().len())
}

/// Renders the episode list for one `{episode:0..}` occurrence.
fn render_episode_numbers(style: MultiEpisodeStyle, episodes: &[i32], width: usize) -> String {
    let Some((first, rest)) = episodes.split_first() else {
        return String::new();
    };
    let first_str = pad(*first, width);
    if rest.is_empty() {
        return first_str;
    }
    let last = pad(*episodes.last().unwrap_or(first), width);

    match style {
        MultiEpisodeStyle::Extend | MultiEpisodeStyle::Duplicate => std::iter::once(first_str)
            .chain(rest.iter().map(|e| pad(*e, width)))
            .collect::<Vec<_>>()
            .join("-"),
        MultiEpisodeStyle::Repeat => std::iter::once(first_str)
            .chain(rest.iter().map(|e| format!("E{}", pad(*e, width))))
            .collect::<Vec<_>>()
            .join(""),
        MultiEpisodeStyle::Scene => std::iter::once(first_str)
            .chain(rest.iter().map(|e| format!("E{}", pad(*e, width))))
            .collect::<Vec<_>>()
            .join("-"),
        MultiEpisodeStyle::Range => format!("{first_str}-{last}"),
        MultiEpisodeStyle::PrefixedRange => format!("{first_str}-E{last}"),
    }
}

fn render_numbers(format: &str, season: i32, episodes: &[i32], style: MultiEpisodeStyle) -> String {
    let with_season = number_token("season")
        .replace_all(format, |caps: &Captures<'_>| pad(season, width_of(caps)));

    number_token("episode")
        .replace_all(&with_season, |caps: &Captures<'_>| {
            render_episode_numbers(style, episodes, width_of(caps))
        })
        .into_owned()
}

/// Substitutes the season, episode and absolute number tokens, honoring the
/// multi-episode style.
pub(super) fn apply_numbering(
    format: &str,
    info: &EpisodeNamingInfo,
    style: MultiEpisodeStyle,
) -> String {
    let with_absolute = number_token("absolute").replace_all(format, |caps: &Captures<'_>| {
        let width = width_of(caps);
        match info.absolute_numbers.as_slice() {
            [] => String::new(),
            [only] => pad(*only, width),
            [first, .., last] => format!("{}-{}", pad(*first, width), pad(*last, width)),
        }
    });

    if style == MultiEpisodeStyle::Duplicate && info.episode_numbers.len() > 1 {
        let duplicated = season_episode_chunk().replace_all(&with_absolute, |caps: &Captures<'_>| {
            let chunk = caps.get(0).map_or("", |m| m.as_str());
            info.episode_numbers
                .iter()
                .map(|e| render_numbers(chunk, info.season_number, &[*e], style))
                .collect::<Vec<_>>()
                .join(" - ")
        });
        return render_numbers(
            &duplicated,
            info.season_number,
            &info.episode_numbers,
            style,
        );
    }

    render_numbers(
        &with_absolute,
        info.season_number,
        &info.episode_numbers,
        style,
    )
}
