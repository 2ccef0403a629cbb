//! DASH manifest (MPD) parsing and stream selection.
//!
//! Only the parts needed to pick a download URL are read: adaptation sets,
//! their representations, declared bandwidth and `BaseURL` elements at the
//! document, adaptation-set and representation levels. Namespace prefixes are
//! ignored.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;
use url::Url;

use crate::error::ArchiveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCategory {
    Video,
    Audio,
}

impl StreamCategory {
    /// Category of a `mimeType` (`video/mp4`) or `contentType` (`audio`) value.
    fn from_declared(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        if value.starts_with("video") {
            Some(Self::Video)
        } else if value.starts_with("audio") {
            Some(Self::Audio)
        } else {
            None
        }
    }
}

/// One downloadable representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Representation {
    pub category: StreamCategory,
    pub bandwidth: u64,
    pub url: Url,
}

/// Best video and audio representation of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSelection {
    pub video: Option<Representation>,
    pub audio: Option<Representation>,
}

impl StreamSelection {
    /// Keep `rep` if it beats the current pick for its category. Ties keep the
    /// earlier representation.
    fn offer(&mut self, rep: Representation) {
        let slot = match rep.category {
            StreamCategory::Video => &mut self.video,
            StreamCategory::Audio => &mut self.audio,
        };
        if slot.as_ref().map_or(true, |best| rep.bandwidth > best.bandwidth) {
            *slot = Some(rep);
        }
    }
}

/// Parse every video/audio representation with a `BaseURL`, in document order.
///
/// Relative URLs are resolved against the enclosing `BaseURL` elements and
/// finally against `manifest_url`.
///
/// # Errors
///
/// Returns [`ArchiveError::Manifest`] if the document is not well-formed XML
/// or has no `MPD` root.
pub fn parse_representations(xml: &str, manifest_url: &Url) -> Result<Vec<Representation>, ArchiveError> {
    let mut parser = ManifestParser::new(manifest_url);
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => parser.open(&e, false),
            Ok(Event::Empty(e)) => parser.open(&e, true),
            Ok(Event::End(e)) => parser.close(e.local_name().as_ref()),
            Ok(Event::Text(t)) => {
                if let Some(text) = parser.text.as_mut() {
                    let chunk = t
                        .unescape()
                        .map_err(|e| ArchiveError::Manifest(e.to_string()))?;
                    text.push_str(&chunk);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(text) = parser.text.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok(_) => {}
            Err(e) => return Err(ArchiveError::Manifest(e.to_string())),
        }
    }

    if !parser.saw_root {
        return Err(ArchiveError::Manifest("no MPD element".to_string()));
    }
    Ok(parser.found)
}

/// Pick the highest-bandwidth video and audio representation.
///
/// # Errors
///
/// See [`parse_representations`].
pub fn select_streams(xml: &str, manifest_url: &Url) -> Result<StreamSelection, ArchiveError> {
    let mut selection = StreamSelection::default();
    for rep in parse_representations(xml, manifest_url)? {
        selection.offer(rep);
    }
    debug!(
        video = ?selection.video.as_ref().map(|r| r.url.as_str()),
        audio = ?selection.audio.as_ref().map(|r| r.url.as_str()),
        "Selected DASH streams"
    );
    Ok(selection)
}

#[derive(Default)]
struct AdaptationSet {
    declared: Option<String>,
    base: Option<String>,
}

#[derive(Default)]
struct PendingRepresentation {
    declared: Option<String>,
    bandwidth: u64,
    base: Option<String>,
}

struct ManifestParser<'a> {
    manifest_url: &'a Url,
    saw_root: bool,
    document_base: Option<String>,
    set: Option<AdaptationSet>,
    rep: Option<PendingRepresentation>,
    /// Text of the `BaseURL` being read.
    text: Option<String>,
    found: Vec<Representation>,
}

impl<'a> ManifestParser<'a> {
    fn new(manifest_url: &'a Url) -> Self {
        Self {
            manifest_url,
            saw_root: false,
            document_base: None,
            set: None,
            rep: None,
            text: None,
            found: Vec::new(),
        }
    }

    fn open(&mut self, e: &BytesStart<'_>, empty: bool) {
        match e.local_name().as_ref() {
            b"MPD" => self.saw_root = true,
            b"AdaptationSet" if !empty => {
                self.set = Some(AdaptationSet {
                    declared: attribute(e, b"mimeType").or_else(|| attribute(e, b"contentType")),
                    base: None,
                });
            }
            b"Representation" => {
                self.rep = Some(PendingRepresentation {
                    declared: attribute(e, b"mimeType").or_else(|| attribute(e, b"contentType")),
                    bandwidth: attribute(e, b"bandwidth")
                        .and_then(|b| b.trim().parse().ok())
                        .unwrap_or(0),
                    base: None,
                });
                if empty {
                    self.finish_representation();
                }
            }
            b"BaseURL" if !empty => self.text = Some(String::new()),
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"BaseURL" => {
                let Some(text) = self.text.take() else {
                    return;
                };
                let text = text.trim().to_string();
                if text.is_empty() {
                    return;
                }
                if let Some(rep) = self.rep.as_mut() {
                    rep.base.get_or_insert(text);
                } else if let Some(set) = self.set.as_mut() {
                    set.base.get_or_insert(text);
                } else {
                    self.document_base.get_or_insert(text);
                }
            }
            b"Representation" => self.finish_representation(),
            b"AdaptationSet" => self.set = None,
            _ => {}
        }
    }

    fn finish_representation(&mut self) {
        let Some(rep) = self.rep.take() else {
            return;
        };
        let Some(rep_base) = rep.base else {
            return;
        };
        let set = self.set.as_ref();
        let declared = rep
            .declared
            .as_deref()
            .or_else(|| set.and_then(|s| s.declared.as_deref()));
        let Some(category) = declared.and_then(StreamCategory::from_declared) else {
            return;
        };

        let mut base = self.manifest_url.clone();
        for level in [self.document_base.as_deref(), set.and_then(|s| s.base.as_deref())]
            .into_iter()
            .flatten()
        {
            if let Ok(joined) = base.join(level) {
                base = joined;
            }
        }
        let Ok(url) = base.join(&rep_base) else {
            debug!(base_url = %rep_base, "Skipping representation with unresolvable BaseURL");
            return;
        };

        self.found.push(Representation {
            category,
            bandwidth: rep.bandwidth,
            url,
        });
    }
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}
