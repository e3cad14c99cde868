//! SDP session descriptions (RFC 4566) carried in SIP bodies.

use std::fmt;

use super::Normalize;
use crate::error::ProtocolError;
use crate::record::FieldWriter;

const PROTOCOL: &str = "SDP";

/// A parsed session description.
///
/// Field values are kept as the text after `x=`; nothing below the line
/// level is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDescription {
    pub version: String,
    pub origin: String,
    pub session_name: String,
    pub information: Option<String>,
    pub uri: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub connection: Option<String>,
    pub bandwidths: Vec<String>,
    pub timings: Vec<Timing>,
    pub time_zones: Option<String>,
    pub encryption_key: Option<String>,
    pub attributes: Vec<String>,
    pub media: Vec<MediaDescription>,
}

/// `t=` line with its `r=` repeat lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timing {
    pub time: String,
    pub repeats: Vec<String>,
}

/// `m=` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaDescription {
    pub media: String,
    pub title: Option<String>,
    pub connection: Option<String>,
    pub bandwidths: Vec<String>,
    pub encryption_key: Option<String>,
    pub attributes: Vec<String>,
}

/// Parse a session description.
///
/// The first line must be `v=` and the `o=` and `s=` lines are required.
/// Unknown line types are an error.
pub fn parse(text: &str) -> Result<SessionDescription, ProtocolError> {
    let mut sdp = SessionDescription::default();
    let mut seen_version = false;
    let mut seen_origin = false;
    let mut seen_name = false;

    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let (kind, value) = split_line(line)?;
        if i == 0 && kind != 'v' {
            return Err(ProtocolError::invalid(PROTOCOL, "version", "must be the first line"));
        }
        let value = value.to_string();

        if let Some(media) = sdp.media.last_mut() {
            match kind {
                'm' => {}
                'i' => {
                    media.title = Some(value);
                    continue;
                }
                'c' => {
                    media.connection = Some(value);
                    continue;
                }
                'b' => {
                    media.bandwidths.push(value);
                    continue;
                }
                'k' => {
                    media.encryption_key = Some(value);
                    continue;
                }
                'a' => {
                    media.attributes.push(value);
                    continue;
                }
                _ => {
                    return Err(ProtocolError::invalid(
                        PROTOCOL,
                        "line",
                        format!("'{kind}=' not allowed in a media section"),
                    ))
                }
            }
        }

        match kind {
            'v' => {
                seen_version = true;
                sdp.version = value;
            }
            'o' => {
                seen_origin = true;
                sdp.origin = value;
            }
            's' => {
                seen_name = true;
                sdp.session_name = value;
            }
            'i' => sdp.information = Some(value),
            'u' => sdp.uri = Some(value),
            'e' => sdp.email = Some(value),
            'p' => sdp.phone = Some(value),
            'c' => sdp.connection = Some(value),
            'b' => sdp.bandwidths.push(value),
            't' => sdp.timings.push(Timing {
                time: value,
                repeats: Vec::new(),
            }),
            'r' => match sdp.timings.last_mut() {
                Some(timing) => timing.repeats.push(value),
                None => {
                    return Err(ProtocolError::invalid(PROTOCOL, "repeat", "'r=' without 't='"))
                }
            },
            'z' => sdp.time_zones = Some(value),
            'k' => sdp.encryption_key = Some(value),
            'a' => sdp.attributes.push(value),
            'm' => sdp.media.push(MediaDescription {
                media: value,
                ..Default::default()
            }),
            other => {
                return Err(ProtocolError::invalid(
                    PROTOCOL,
                    "line",
                    format!("unknown line type '{other}='"),
                ))
            }
        }
    }

    if !(seen_version && seen_origin && seen_name) {
        return Err(ProtocolError::invalid(
            PROTOCOL,
            "session",
            "missing v=, o= or s= line",
        ));
    }
    Ok(sdp)
}

fn split_line(line: &str) -> Result<(char, &str), ProtocolError> {
    let mut chars = line.chars();
    match (chars.next(), chars.next()) {
        (Some(kind), Some('=')) if kind.is_ascii_lowercase() => Ok((kind, &line[2..])),
        _ => Err(ProtocolError::invalid(
            PROTOCOL,
            "line",
            format!("malformed line '{line}'"),
        )),
    }
}

/// Canonical text form, CRLF line endings, lines in RFC 4566 order.
impl fmt::Display for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v={}\r\n", self.version)?;
        write!(f, "o={}\r\n", self.origin)?;
        write!(f, "s={}\r\n", self.session_name)?;
        write_opt(f, 'i', &self.information)?;
        write_opt(f, 'u', &self.uri)?;
        write_opt(f, 'e', &self.email)?;
        write_opt(f, 'p', &self.phone)?;
        write_opt(f, 'c', &self.connection)?;
        for b in &self.bandwidths {
            write!(f, "b={b}\r\n")?;
        }
        for timing in &self.timings {
            write!(f, "t={}\r\n", timing.time)?;
            for r in &timing.repeats {
                write!(f, "r={r}\r\n")?;
            }
        }
        write_opt(f, 'z', &self.time_zones)?;
        write_opt(f, 'k', &self.encryption_key)?;
        for a in &self.attributes {
            write!(f, "a={a}\r\n")?;
        }
        for media in &self.media {
            write!(f, "m={}\r\n", media.media)?;
            write_opt(f, 'i', &media.title)?;
            write_opt(f, 'c', &media.connection)?;
            for b in &media.bandwidths {
                write!(f, "b={b}\r\n")?;
            }
            write_opt(f, 'k', &media.encryption_key)?;
            for a in &media.attributes {
                write!(f, "a={a}\r\n")?;
            }
        }
        Ok(())
    }
}

fn write_opt(f: &mut fmt::Formatter<'_>, kind: char, value: &Option<String>) -> fmt::Result {
    match value {
        Some(v) => write!(f, "{kind}={v}\r\n"),
        None => Ok(()),
    }
}

impl Normalize for SessionDescription {
    fn normalize_into(&self, w: &mut FieldWriter<'_>) {
        w.put("Version", &self.version);
        w.put("Origin", &self.origin);
        w.put("SessionName", &self.session_name);
        if let Some(v) = &self.information {
            w.put("SessionInformation", v);
        }
        if let Some(v) = &self.uri {
            w.put("Uri", v);
        }
        if let Some(v) = &self.email {
            w.put("Email", v);
        }
        if let Some(v) = &self.phone {
            w.put("Phone", v);
        }
        w.put("Connection", self.connection.as_deref().unwrap_or_default());
        put_numbered(w, "Bandwidth", &self.bandwidths);
        w.each("Timing", &self.timings, |t, timing| {
            t.put("Time", &timing.time);
            put_numbered(t, "Repeat", &timing.repeats);
        });
        put_numbered(w, "Attribute", &self.attributes);
        w.each("Media", &self.media, |m, media| {
            m.put("Media", &media.media);
            if let Some(title) = &media.title {
                m.put("Title", title);
            }
            if let Some(connection) = &media.connection {
                m.put("Connection", connection);
            }
            put_numbered(m, "Bandwidth", &media.bandwidths);
            put_numbered(m, "Attribute", &media.attributes);
        });
    }
}

/// `<label>_<i>` fields for a list of bare values.
fn put_numbered(w: &mut FieldWriter<'_>, label: &str, values: &[String]) {
    for (i, value) in values.iter().enumerate() {
        w.put(&format!("{label}_{}", i + 1), value);
    }
}
