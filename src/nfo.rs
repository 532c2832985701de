// NFO metadata sidecars. Sidecars are best-effort enrichment: a missing
// or unparsable file leaves the item projecting from scan data alone.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::PathBuf;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonKind {
    Actor,
    Director,
    Writer,
}

impl PersonKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonKind::Actor => "Actor",
            PersonKind::Director => "Director",
            PersonKind::Writer => "Writer",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CastMember {
    pub name: String,
    pub role: Option<String>,
    pub kind: PersonKind,
    /// Poster URL when the sidecar carries one; served as a redirect.
    pub thumb: Option<String>,
}

/// Stream details some sidecars carry under `<fileinfo>`.
#[derive(Debug, Clone, Default)]
pub struct StreamDetails {
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_secs: Option<f64>,
    pub audio_channels: Option<i32>,
    pub audio_language: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Nfo {
    pub title: Option<String>,
    pub plot: Option<String>,
    pub tagline: Option<String>,
    /// ISO-8601 date, as written in the sidecar.
    pub premiered: Option<String>,
    pub aired: Option<String>,
    pub year: Option<i32>,
    /// Parental rating ("mpaa").
    pub official_rating: Option<String>,
    pub community_rating: Option<f64>,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<String>,
    pub tvdb_id: Option<String>,
    pub genres: Vec<String>,
    pub studios: Vec<String>,
    pub cast: Vec<CastMember>,
    /// Minutes.
    pub runtime: Option<u32>,
    pub streams: StreamDetails,
}

/// Parse a sidecar document. Tolerant by design: unknown elements are
/// skipped and a malformed document yields `None`.
pub fn parse(xml: &str) -> Option<Nfo> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut nfo = Nfo::default();
    let mut stack: Vec<String> = Vec::new();
    let mut actor: Option<CastMember> = None;
    let mut seen_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                if stack.is_empty() {
                    match name.as_str() {
                        "movie" | "tvshow" | "episodedetails" | "season" => seen_root = true,
                        _ => return None,
                    }
                }
                if name == "actor" {
                    actor = Some(CastMember {
                        name: String::new(),
                        role: None,
                        kind: PersonKind::Actor,
                        thumb: None,
                    });
                }
                stack.push(name);
            }
            Ok(Event::End(_)) => {
                if stack.last().map(String::as_str) == Some("actor") {
                    if let Some(a) = actor.take() {
                        if !a.name.is_empty() {
                            nfo.cast.push(a);
                        }
                    }
                }
                stack.pop();
            }
            Ok(Event::Text(t)) => {
                let Ok(text) = t.unescape() else { continue };
                let text = text.trim().to_string();
                if text.is_empty() {
                    continue;
                }
                apply_text(&mut nfo, &mut actor, &stack, text);
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
    }

    if seen_root {
        Some(nfo)
    } else {
        None
    }
}

fn apply_text(nfo: &mut Nfo, actor: &mut Option<CastMember>, stack: &[String], text: String) {
    let leaf = match stack.last() {
        Some(l) => l.as_str(),
        None => return,
    };
    let parent = stack
        .len()
        .checked_sub(2)
        .map(|i| stack[i].as_str())
        .unwrap_or("");

    // Actor sub-elements first; their leaf names collide with item fields.
    if parent == "actor" {
        if let Some(a) = actor.as_mut() {
            match leaf {
                "name" => a.name = text,
                "role" => a.role = Some(text),
                "thumb" => a.thumb = Some(text),
                _ => {}
            }
        }
        return;
    }

    // fileinfo/streamdetails/{video,audio}/...
    if parent == "video" {
        match leaf {
            "codec" => nfo.streams.video_codec = Some(text),
            "width" => nfo.streams.width = text.parse().ok(),
            "height" => nfo.streams.height = text.parse().ok(),
            "durationinseconds" => nfo.streams.duration_secs = text.parse().ok(),
            _ => {}
        }
        return;
    }
    if parent == "audio" {
        match leaf {
            "codec" => nfo.streams.audio_codec = Some(text),
            "channels" => nfo.streams.audio_channels = text.parse().ok(),
            "language" => nfo.streams.audio_language = Some(text),
            _ => {}
        }
        return;
    }

    match leaf {
        "title" => nfo.title = Some(text),
        "plot" => nfo.plot = Some(text),
        "tagline" => nfo.tagline = Some(text),
        "premiered" => nfo.premiered = Some(text),
        "aired" => nfo.aired = Some(text),
        "year" => nfo.year = text.parse().ok(),
        "mpaa" => nfo.official_rating = Some(text),
        "rating" => {
            if nfo.community_rating.is_none() {
                nfo.community_rating = text.parse().ok();
            }
        }
        // <ratings><rating name="..."><value>7.9</value></rating></ratings>
        "value" if parent == "rating" => {
            if nfo.community_rating.is_none() {
                nfo.community_rating = text.parse().ok();
            }
        }
        "genre" => nfo.genres.push(text),
        "studio" => nfo.studios.push(text),
        "director" => nfo.cast.push(CastMember {
            name: text,
            role: None,
            kind: PersonKind::Director,
            thumb: None,
        }),
        "credits" | "writer" => nfo.cast.push(CastMember {
            name: text,
            role: None,
            kind: PersonKind::Writer,
            thumb: None,
        }),
        "runtime" => nfo.runtime = text.parse().ok(),
        "imdbid" | "imdb" => nfo.imdb_id = Some(text),
        "tmdbid" => nfo.tmdb_id = Some(text),
        "tvdbid" => nfo.tvdb_id = Some(text),
        "uniqueid" => {
            // Without attribute inspection the bare value is ambiguous;
            // treat an IMDb-shaped value (ttNNN) as the IMDb ID.
            if text.starts_with("tt") && nfo.imdb_id.is_none() {
                nfo.imdb_id = Some(text);
            }
        }
        _ => {}
    }
}

/// Lazily parsed sidecar, safe to race: the first finished parse wins and
/// every later reader sees the same result.
#[derive(Debug, Default)]
pub struct NfoCell {
    path: Option<PathBuf>,
    cell: OnceLock<Option<Nfo>>,
}

impl NfoCell {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            cell: OnceLock::new(),
        }
    }

    /// Pre-populated cell (used by tests and virtual items).
    pub fn preparsed(nfo: Nfo) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Some(nfo));
        Self { path: None, cell }
    }

    pub fn get(&self) -> Option<&Nfo> {
        self.cell
            .get_or_init(|| {
                let path = self.path.as_ref()?;
                let xml = std::fs::read_to_string(path).ok()?;
                parse(&xml)
            })
            .as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOVIE_NFO: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<movie>
  <title>Blade Runner</title>
  <plot>A blade runner must pursue replicants.</plot>
  <tagline>Man has made his match.</tagline>
  <premiered>1982-06-25</premiered>
  <year>1982</year>
  <mpaa>R</mpaa>
  <rating>8.1</rating>
  <genre>Science Fiction</genre>
  <genre>Thriller</genre>
  <studio>Warner Bros.</studio>
  <runtime>117</runtime>
  <imdbid>tt0083658</imdbid>
  <director>Ridley Scott</director>
  <credits>Hampton Fancher</credits>
  <actor>
    <name>Harrison Ford</name>
    <role>Rick Deckard</role>
    <thumb>https://example.com/ford.jpg</thumb>
  </actor>
  <fileinfo>
    <streamdetails>
      <video>
        <codec>h264</codec>
        <width>1920</width>
        <height>1080</height>
        <durationinseconds>7020</durationinseconds>
      </video>
      <audio>
        <codec>ac3</codec>
        <channels>6</channels>
        <language>eng</language>
      </audio>
    </streamdetails>
  </fileinfo>
</movie>"#;

    #[test]
    fn parses_movie_sidecar() {
        let nfo = parse(MOVIE_NFO).expect("should parse");
        assert_eq!(nfo.title.as_deref(), Some("Blade Runner"));
        assert_eq!(nfo.year, Some(1982));
        assert_eq!(nfo.official_rating.as_deref(), Some("R"));
        assert_eq!(nfo.community_rating, Some(8.1));
        assert_eq!(nfo.genres, vec!["Science Fiction", "Thriller"]);
        assert_eq!(nfo.studios, vec!["Warner Bros."]);
        assert_eq!(nfo.runtime, Some(117));
        assert_eq!(nfo.imdb_id.as_deref(), Some("tt0083658"));

        let actor = nfo
            .cast
            .iter()
            .find(|c| c.kind == PersonKind::Actor)
            .unwrap();
        assert_eq!(actor.name, "Harrison Ford");
        assert_eq!(actor.role.as_deref(), Some("Rick Deckard"));
        let director = nfo
            .cast
            .iter()
            .find(|c| c.kind == PersonKind::Director)
            .unwrap();
        assert_eq!(director.name, "Ridley Scott");

        assert_eq!(nfo.streams.video_codec.as_deref(), Some("h264"));
        assert_eq!(nfo.streams.height, Some(1080));
        assert_eq!(nfo.streams.audio_channels, Some(6));
        assert_eq!(nfo.streams.duration_secs, Some(7020.0));
    }

    #[test]
    fn rejects_non_nfo_documents() {
        assert!(parse("<html><body>nope</body></html>").is_none());
        assert!(parse("not xml at all").is_none());
    }

    #[test]
    fn episode_sidecar_minimal() {
        let nfo = parse("<episodedetails><title>Pilot</title><aired>2008-01-20</aired></episodedetails>")
            .unwrap();
        assert_eq!(nfo.title.as_deref(), Some("Pilot"));
        assert_eq!(nfo.aired.as_deref(), Some("2008-01-20"));
        assert!(nfo.genres.is_empty());
    }

    #[test]
    fn cell_without_path_is_empty() {
        let cell = NfoCell::new(None);
        assert!(cell.get().is_none());
    }
}
