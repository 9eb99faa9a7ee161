//! Client side of the smart HTTP protocol.
//!
//! Ref discovery is a GET against the advertisement endpoint; pack
//! negotiation POSTs pkt-line framed `want` lines and receives a packfile.
//! Responses are buffered to completion before parsing.

use crate::pktline::{PktLine, PktLineReader, PktLineWriter};
use crate::{GitError, Result};
use skiff_storage::ObjectId;
use std::io::Cursor;

/// Service name used for fetch/clone.
pub const UPLOAD_PACK_SERVICE: &str = "git-upload-pack";

/// A ref advertised by the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    /// Object ID the ref points to.
    pub id: ObjectId,
    /// Reference name (e.g., `refs/heads/master`).
    pub name: String,
}

/// Blocking smart-HTTP transport for one remote.
pub struct HttpClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl HttpClient {
    /// Creates a client for the given remote URL.
    pub fn new(remote_url: &str) -> Self {
        Self {
            base_url: remote_url.trim_end_matches('/').to_string(),
            http: reqwest::blocking::Client::new(),
        }
    }

    /// Performs ref discovery against the remote.
    pub fn discover_refs(&self) -> Result<Vec<RemoteRef>> {
        let url = format!("{}/info/refs?service={}", self.base_url, UPLOAD_PACK_SERVICE);
        tracing::debug!(url = %url, "discovering refs");

        let body = self.http.get(&url).send()?.error_for_status()?.bytes()?;
        parse_ref_advertisement(&body)
    }

    /// Negotiates a pack for the wanted ids and returns its raw bytes.
    pub fn fetch_pack(&self, wants: &[ObjectId]) -> Result<Vec<u8>> {
        let url = format!("{}/{}", self.base_url, UPLOAD_PACK_SERVICE);
        tracing::debug!(url = %url, wants = wants.len(), "negotiating pack");

        let body = self
            .http
            .post(&url)
            .header("Content-Type", "application/x-git-upload-pack-request")
            .body(build_fetch_request(wants)?)
            .send()?
            .error_for_status()?
            .bytes()?;
        strip_response_header(&body)
    }
}

/// Parses a ref advertisement body.
///
/// The stream is a service banner, a flush, a first ref line carrying
/// NUL-separated capabilities, further `<40-hex> <name>` lines, and a
/// terminating flush. The banner and the capability line are discarded.
pub fn parse_ref_advertisement(body: &[u8]) -> Result<Vec<RemoteRef>> {
    let mut reader = PktLineReader::new(Cursor::new(body));

    match reader.read()? {
        Some(PktLine::Data(_)) => {}
        _ => return Err(GitError::Protocol("missing service banner".to_string())),
    }
    match reader.read()? {
        Some(PktLine::Flush) => {}
        _ => {
            return Err(GitError::Protocol(
                "missing banner terminator".to_string(),
            ))
        }
    }

    let lines = reader.read_until_flush()?;

    let mut refs = Vec::new();
    for pkt in lines.iter().skip(1) {
        refs.push(parse_ref_line(pkt)?);
    }
    Ok(refs)
}

fn parse_ref_line(pkt: &PktLine) -> Result<RemoteRef> {
    let text = pkt
        .as_str()
        .ok_or_else(|| GitError::Protocol("non-utf8 ref line".to_string()))?;

    let (id_hex, name) = text
        .split_once(' ')
        .ok_or_else(|| GitError::Protocol(format!("malformed ref line: {:?}", text)))?;
    let id = ObjectId::from_hex(id_hex)
        .map_err(|_| GitError::Protocol(format!("invalid ref id: {:?}", id_hex)))?;
    if name.is_empty() {
        return Err(GitError::Protocol("empty ref name".to_string()));
    }

    Ok(RemoteRef {
        id,
        name: name.to_string(),
    })
}

/// Builds the negotiation request body: `want` lines, flush, `done`.
pub fn build_fetch_request(wants: &[ObjectId]) -> Result<Vec<u8>> {
    let mut writer = PktLineWriter::new(Vec::new());
    for id in wants {
        writer.write_line(&format!("want {}", id))?;
    }
    writer.flush_pkt()?;
    writer.write_line("done")?;
    Ok(writer.into_inner())
}

/// Strips the single leading pkt-line (the NAK) from a negotiation
/// response, leaving raw pack bytes.
fn strip_response_header(body: &[u8]) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(body);
    {
        let mut reader = PktLineReader::new(&mut cursor);
        match reader.read()? {
            Some(PktLine::Data(line))
                if line.starts_with(b"NAK") || line.starts_with(b"ACK") => {}
            _ => {
                return Err(GitError::Protocol(
                    "expected NAK before pack data".to_string(),
                ))
            }
        }
    }

    let rest = &body[cursor.position() as usize..];
    if !rest.starts_with(b"PACK") {
        // A multiplexed (side-band) response would put a channel byte here.
        return Err(GitError::Protocol(
            "response is not bare pack data (side-band is unsupported)".to_string(),
        ));
    }
    Ok(rest.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const ID_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn advertisement(ref_lines: &[String]) -> Vec<u8> {
        let mut writer = PktLineWriter::new(Vec::new());
        writer
            .write_line(&format!("# service={}", UPLOAD_PACK_SERVICE))
            .unwrap();
        writer.flush_pkt().unwrap();
        writer
            .write_line(&format!(
                "{} HEAD\0multi_ack side-band-64k ofs-delta agent=git/2.40",
                ID_A
            ))
            .unwrap();
        for line in ref_lines {
            writer.write_line(line).unwrap();
        }
        writer.flush_pkt().unwrap();
        writer.into_inner()
    }

    #[test]
    fn test_parse_advertisement_two_refs() {
        let body = advertisement(&[
            format!("{} refs/heads/master", ID_A),
            format!("{} refs/tags/v1.0", ID_B),
        ]);

        let refs = parse_ref_advertisement(&body).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].id.to_hex(), ID_A);
        assert_eq!(refs[0].name, "refs/heads/master");
        assert_eq!(refs[1].id.to_hex(), ID_B);
        assert_eq!(refs[1].name, "refs/tags/v1.0");
    }

    #[test]
    fn test_parse_advertisement_discards_banner_and_capabilities() {
        let body = advertisement(&[format!("{} refs/heads/master", ID_B)]);

        let refs = parse_ref_advertisement(&body).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "refs/heads/master");
    }

    #[test]
    fn test_parse_advertisement_empty_repo() {
        // Only the banner and the capabilities placeholder line
        let body = advertisement(&[]);
        assert!(parse_ref_advertisement(&body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_advertisement_missing_banner() {
        assert!(matches!(
            parse_ref_advertisement(b""),
            Err(GitError::Protocol(_))
        ));

        // A flush where the banner should be
        assert!(matches!(
            parse_ref_advertisement(b"0000"),
            Err(GitError::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_advertisement_malformed_ref() {
        let body = advertisement(&["not a ref line".to_string()]);
        assert!(matches!(
            parse_ref_advertisement(&body),
            Err(GitError::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_advertisement_bad_id() {
        let body = advertisement(&["tooshort refs/heads/master".to_string()]);
        assert!(matches!(
            parse_ref_advertisement(&body),
            Err(GitError::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_advertisement_bad_framing() {
        // Declared length runs past the end of the body
        let mut body = advertisement(&[format!("{} refs/heads/master", ID_A)]);
        body.truncate(body.len() - 10);
        body.extend_from_slice(b"ffff");
        assert!(parse_ref_advertisement(&body).is_err());
    }

    #[test]
    fn test_build_fetch_request_wire_format() {
        let id = ObjectId::from_hex(ID_A).unwrap();
        let request = build_fetch_request(&[id]).unwrap();

        // "want <40-hex>\n" is 50 bytes with its prefix; "done\n" is 9.
        let mut expected = format!("0032want {}\n", ID_A).into_bytes();
        expected.extend_from_slice(b"0000");
        expected.extend_from_slice(b"0009done\n");
        assert_eq!(request, expected);
    }

    #[test]
    fn test_build_fetch_request_multiple_wants() {
        let ids = [
            ObjectId::from_hex(ID_A).unwrap(),
            ObjectId::from_hex(ID_B).unwrap(),
        ];
        let request = build_fetch_request(&ids).unwrap();

        let text = String::from_utf8_lossy(&request);
        assert!(text.contains(&format!("want {}", ID_A)));
        assert!(text.contains(&format!("want {}", ID_B)));
        assert!(text.ends_with("0009done\n"));
    }

    #[test]
    fn test_strip_response_header() {
        let mut body = b"0008NAK\n".to_vec();
        body.extend_from_slice(b"PACKrest-of-pack-bytes");

        let pack = strip_response_header(&body).unwrap();
        assert_eq!(pack, b"PACKrest-of-pack-bytes");
    }

    #[test]
    fn test_strip_response_header_sideband_rejected() {
        let mut body = b"0008NAK\n".to_vec();
        // Side-band channel 1 byte ahead of the pack data
        body.extend_from_slice(b"2005\x01PACK");

        assert!(matches!(
            strip_response_header(&body),
            Err(GitError::Protocol(_))
        ));
    }

    #[test]
    fn test_strip_response_header_no_nak() {
        // "PACK" is not a valid pkt-line prefix
        assert!(strip_response_header(b"PACK").is_err());

        // Well-framed, but not an ACK/NAK line
        assert!(matches!(
            strip_response_header(b"000bERR no\n"),
            Err(GitError::Protocol(_))
        ));
    }

    #[test]
    fn test_client_strips_trailing_slash() {
        let client = HttpClient::new("http://example.com/repo.git/");
        assert_eq!(client.base_url, "http://example.com/repo.git");
    }
}
