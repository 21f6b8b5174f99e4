use regex::Regex;
use std::sync::OnceLock;

use crate::constants::VIDEO_EXTENSIONS;

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

/// Season and episode numbers read from a file or release name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeNumbers {
    pub season: i32,
    /// Sorted, deduplicated.
    pub episodes: Vec<i32>,
}

impl EpisodeNumbers {
    #[must_use]
    pub fn contains(&self, season: i32, episode: i32) -> bool {
        self.season == season && self.episodes.contains(&episode)
    }
}

/// Drops a known video extension, leaving other dotted suffixes alone.
#[must_use]
pub fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()) => stem,
        _ => name,
    }
}

/// Parses `S01E02`, `S01E02E03`, `S01E02-E04` and `1x02` style numbering.
#[must_use]
pub fn parse_episode_numbers(name: &str) -> Option<EpisodeNumbers> {
    static SXXEXX: OnceLock<Regex> = OnceLock::new();
    static NXNN: OnceLock<Regex> = OnceLock::new();
    static TAIL: OnceLock<Regex> = OnceLock::new();

    let sxxexx = get_regex(
        &SXXEXX,
        r"(?i)S(?P<season>\d{1,2})E(?P<episode>\d{1,3})(?P<rest>(?:[-_ ]?E\d{1,3}|-\d{1,3}(?:[^\dp]|$))*)",
    );

    if let Some(caps) = sxxexx.captures(name) {
        let season = caps.name("season")?.as_str().parse().ok()?;
        let first: i32 = caps.name("episode")?.as_str().parse().ok()?;
        let mut episodes = vec![first];

        let tail = get_regex(&TAIL, r"(?i)(?P<sep>-)?E?(?P<num>\d{1,3})");
        let rest = caps.name("rest").map_or("", |m| m.as_str());
        for extra in tail.captures_iter(rest) {
            let Some(number) = extra.name("num").and_then(|m| m.as_str().parse::<i32>().ok())
            else {
                continue;
            };
            let previous = episodes.last().copied().unwrap_or(first);
            if extra.name("sep").is_some() && number > previous + 1 {
                episodes.extend(previous + 1..=number);
            } else {
                episodes.push(number);
            }
        }

        episodes.sort_unstable();
        episodes.dedup();
        return Some(EpisodeNumbers { season, episodes });
    }

    let nxnn = get_regex(&NXNN, r"(?i)(?:^|[^\dA-Za-z])(?P<season>\d{1,2})x(?P<episode>\d{1,3})(?:[^\d]|$)");
    let caps = nxnn.captures(name)?;
    Some(EpisodeNumbers {
        season: caps.name("season")?.as_str().parse().ok()?,
        episodes: vec![caps.name("episode")?.as_str().parse().ok()?],
    })
}

/// The `-GROUP` suffix of a scene-style name, if present.
#[must_use]
pub fn parse_release_group(name: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(&RE, r"-(?P<group>[A-Za-z0-9]+)(?:\[[^\]]*\])?$");

    let stem = strip_extension(name.trim());
    let group = re.captures(stem)?.name("group")?.as_str();

    let lower = group.to_lowercase();
    let not_a_group = ["dl", "rip", "hd", "ts", "x264", "x265", "h264", "h265"];
    let is_resolution = lower
        .strip_suffix('p')
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()));
    if not_a_group.contains(&lower.as_str()) || is_resolution {
        return None;
    }

    Some(group.to_string())
}
