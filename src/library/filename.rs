// Title/artist guesses from file names. External tracks are keyed by their
// upload file name, so this is also how an external id maps back to a title.

use super::track::EXTERNAL_PREFIX;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFilename {
    pub title: String,
    pub artist: Option<String>,
}

pub struct FilenameParser {
    numbered: Option<Regex>,
    delimiters: Vec<&'static str>,
}

const NOISE: [&str; 12] = [
    "(Official Audio)",
    "(Official Video)",
    "(Official Music Video)",
    "(Official Lyric Video)",
    "(Audio)",
    "(Video)",
    "(Lyric Video)",
    "(Music Video)",
    "[Official Audio]",
    "[Official Video]",
    "[Audio]",
    "[Video]",
];

impl FilenameParser {
    pub fn new() -> Self {
        // "21 - blink-182 - TAKE ME IN.m4a": track number, artist, title
        let numbered = Regex::new(r"^\d+\s*[-.]\s*(.+?)\s+-\s+(.+)$").ok();

        // Checked in order; the first delimiter present wins
        let delimiters = vec![" - ", " – ", " | ", " ~ "];

        Self { numbered, delimiters }
    }

    pub fn parse_filename(&self, filename: &str) -> ParsedFilename {
        let stem = strip_extension(filename.trim()).replace('_', " ");

        if let Some(captures) = self.numbered.as_ref().and_then(|re| re.captures(&stem)) {
            let artist = captures.get(1).map(|m| clean_text(m.as_str())).unwrap_or_default();
            let title = captures.get(2).map(|m| clean_text(m.as_str())).unwrap_or_default();
            if !title.is_empty() && !artist.is_empty() {
                return ParsedFilename {
                    title,
                    artist: Some(artist),
                };
            }
        }

        for delimiter in &self.delimiters {
            if let Some((left, right)) = stem.split_once(delimiter) {
                let artist = clean_text(left);
                let title = clean_text(right);
                if artist.is_empty() || title.is_empty() {
                    continue;
                }
                return ParsedFilename {
                    title,
                    artist: Some(artist),
                };
            }
        }

        ParsedFilename {
            title: clean_text(&stem),
            artist: None,
        }
    }
}

impl Default for FilenameParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parser() -> &'static FilenameParser {
    static PARSER: OnceLock<FilenameParser> = OnceLock::new();
    PARSER.get_or_init(FilenameParser::new)
}

/// Title derived from an `external-<filename>` id. `None` for library ids.
pub fn title_from_external_id(id: &str) -> Option<String> {
    let name = id.trim().strip_prefix(EXTERNAL_PREFIX)?;
    let parsed = parser().parse_filename(name);
    if parsed.title.is_empty() {
        None
    } else {
        Some(parsed.title)
    }
}

/// Best-effort title and artist for a bare file name.
pub fn guess_from_filename(filename: &str) -> ParsedFilename {
    parser().parse_filename(filename)
}

// Only short alphanumeric suffixes count as extensions ("Mr. Brightside" keeps its dot)
fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) => {
            let ext = &name[pos + 1..];
            if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                &name[..pos]
            } else {
                name
            }
        }
        None => name,
    }
}

fn clean_text(text: &str) -> String {
    let mut cleaned = text.to_string();
    for noise in &NOISE {
        cleaned = cleaned.replace(noise, "");
    }

    let mut cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    cleaned = cleaned
        .trim_matches(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .to_string();

    // Drop a leading track number ("01. Intro" -> "Intro")
    if let Some(first_letter) = cleaned.chars().position(|c| c.is_alphabetic()) {
        if first_letter > 0 {
            let prefix: String = cleaned.chars().take(first_letter).collect();
            if prefix.chars().all(|c| c.is_numeric() || c == '.' || c == ' ' || c == '-') {
                cleaned = cleaned.chars().skip(first_letter).collect::<String>().trim().to_string();
            }
        }
    }

    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsing_patterns() {
        let parser = FilenameParser::new();

        let result = parser.parse_filename("21 - blink-182 - TAKE ME IN (Official Lyric Video).m4a");
        assert_eq!(result.title, "TAKE ME IN");
        assert_eq!(result.artist.as_deref(), Some("blink-182"));

        let result = parser.parse_filename("The Black Keys - Beautiful People (Stay High) (Official Video).m4a");
        assert_eq!(result.title, "Beautiful People (Stay High)");
        assert_eq!(result.artist.as_deref(), Some("The Black Keys"));

        let result = parser.parse_filename("01. Intro.mp3");
        assert_eq!(result.title, "Intro");
        assert_eq!(result.artist, None);
    }

    #[test]
    fn test_underscores_and_dotted_titles() {
        let parser = FilenameParser::new();

        assert_eq!(parser.parse_filename("night_drive.flac").title, "night drive");
        assert_eq!(parser.parse_filename("Mr. Brightside").title, "Mr. Brightside");
    }

    #[test]
    fn test_title_from_external_id() {
        assert_eq!(
            title_from_external_id("external-Daft Punk - Harder Better.mp3").as_deref(),
            Some("Harder Better")
        );
        assert_eq!(title_from_external_id("external-lullaby.ogg").as_deref(), Some("lullaby"));
        assert_eq!(title_from_external_id("42"), None);
        assert_eq!(title_from_external_id("external-"), None);
    }
}
