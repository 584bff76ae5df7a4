// Character set handling for the inbound and outbound files
//
// Only the handful of charsets the tool has always accepted are supported.
// Inbound lines are decoded one at a time so large files stream through the
// pipeline; outbound rows are encoded with the same charset.

use std::fmt;
use std::io::{self, BufRead, Read, Write};

use tracing::warn;

const BOM: char = '\u{FEFF}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    /// UTF-16 with byte order taken from a BOM, big endian without one
    Utf16,
    UsAscii,
    Iso8859_1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl Charset {
    /// Look up a charset by its canonical label (exact match)
    pub fn parse_label(label: &str) -> Option<Self> {
        match label {
            "UTF-8" => Some(Charset::Utf8),
            "UTF-16LE" => Some(Charset::Utf16Le),
            "UTF-16BE" => Some(Charset::Utf16Be),
            "UTF-16" => Some(Charset::Utf16),
            "US-ASCII" => Some(Charset::UsAscii),
            "ISO-8859-1" => Some(Charset::Iso8859_1),
            _ => None,
        }
    }

    /// Like [`Charset::parse_label`] but unknown labels fall back to UTF-8
    pub fn from_label(label: &str) -> Self {
        Self::parse_label(label).unwrap_or_else(|| {
            warn!(label, "unknown encoding, falling back to UTF-8");
            Charset::Utf8
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Utf16Le => "UTF-16LE",
            Charset::Utf16Be => "UTF-16BE",
            Charset::Utf16 => "UTF-16",
            Charset::UsAscii => "US-ASCII",
            Charset::Iso8859_1 => "ISO-8859-1",
        }
    }

    fn is_utf16(&self) -> bool {
        matches!(self, Charset::Utf16 | Charset::Utf16Le | Charset::Utf16Be)
    }

    fn decode_bytes(&self, bytes: Vec<u8>) -> io::Result<String> {
        match self {
            Charset::Iso8859_1 => Ok(bytes.into_iter().map(char::from).collect()),
            Charset::UsAscii => Ok(bytes
                .into_iter()
                .map(|b| {
                    if b.is_ascii() {
                        char::from(b)
                    } else {
                        char::REPLACEMENT_CHARACTER
                    }
                })
                .collect()),
            _ => String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
        }
    }

    /// Append the encoded form of `text` to `out`
    pub fn encode_into(&self, text: &str, out: &mut Vec<u8>) {
        match self {
            Charset::Utf8 => out.extend_from_slice(text.as_bytes()),
            Charset::UsAscii => out.extend(
                text.chars()
                    .map(|c| if c.is_ascii() { c as u8 } else { b'?' }),
            ),
            Charset::Iso8859_1 => out.extend(
                text.chars()
                    .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?')),
            ),
            Charset::Utf16Le => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
            }
            Charset::Utf16Be | Charset::Utf16 => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
            }
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

const LF_UNIT: u16 = b'\n' as u16;
const CR_UNIT: u16 = b'\r' as u16;

fn decode_unit(pair: [u8; 2], order: ByteOrder) -> u16 {
    match order {
        ByteOrder::Little => u16::from_le_bytes(pair),
        ByteOrder::Big => u16::from_be_bytes(pair),
    }
}

/// Reads newline-terminated lines in a given charset.
///
/// A line ends at `\n`, `\r\n` or a lone `\r`. Terminators are stripped, as
/// is a leading BOM on the first line.
pub struct LineReader<R> {
    inner: R,
    charset: Charset,
    byte_order: Option<ByteOrder>,
    first_line: bool,
    /// UTF-16 code unit read past a `\r` that did not turn out to be `\n`
    pushback: Option<[u8; 2]>,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R, charset: Charset) -> Self {
        let byte_order = match charset {
            Charset::Utf16Le => Some(ByteOrder::Little),
            Charset::Utf16Be => Some(ByteOrder::Big),
            _ => None,
        };
        Self {
            inner,
            charset,
            byte_order,
            first_line: true,
            pushback: None,
        }
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Read the next line, or `None` at end of input
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let line = if self.charset.is_utf16() {
            self.read_utf16_line()?
        } else {
            self.read_byte_line()?
        };

        Ok(line.map(|mut line| {
            if self.first_line {
                self.first_line = false;
                if line.starts_with(BOM) {
                    line.remove(0);
                }
            }
            line
        }))
    }

    fn read_byte_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        let mut saw_any = false;

        loop {
            let (used, terminator) = {
                let available = match self.inner.fill_buf() {
                    Ok(available) => available,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                };
                if available.is_empty() {
                    break;
                }
                saw_any = true;
                match available.iter().position(|b| *b == b'\n' || *b == b'\r') {
                    Some(i) => {
                        buf.extend_from_slice(&available[..i]);
                        (i + 1, Some(available[i]))
                    }
                    None => {
                        buf.extend_from_slice(available);
                        (available.len(), None)
                    }
                }
            };
            self.inner.consume(used);

            match terminator {
                Some(b'\r') => {
                    self.skip_byte_lf()?;
                    break;
                }
                Some(_) => break,
                None => {}
            }
        }

        if !saw_any {
            return Ok(None);
        }
        self.charset.decode_bytes(buf).map(Some)
    }

    /// Consume a `\n` directly following a `\r`
    fn skip_byte_lf(&mut self) -> io::Result<()> {
        loop {
            match self.inner.fill_buf() {
                Ok(available) => {
                    if available.first() == Some(&b'\n') {
                        self.inner.consume(1);
                    }
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn read_utf16_line(&mut self) -> io::Result<Option<String>> {
        let mut units = Vec::new();
        let mut saw_any = false;

        while let Some(pair) = self.read_pair()? {
            saw_any = true;
            let order = match self.byte_order {
                Some(order) => order,
                None => {
                    // Auto-detect from the first code unit
                    let (order, is_bom) = match pair {
                        [0xFF, 0xFE] => (ByteOrder::Little, true),
                        [0xFE, 0xFF] => (ByteOrder::Big, true),
                        _ => (ByteOrder::Big, false),
                    };
                    self.byte_order = Some(order);
                    if is_bom {
                        continue;
                    }
                    order
                }
            };

            let unit = decode_unit(pair, order);
            if unit == LF_UNIT {
                break;
            }
            if unit == CR_UNIT {
                if let Some(next) = self.read_pair()? {
                    if decode_unit(next, order) != LF_UNIT {
                        self.pushback = Some(next);
                    }
                }
                break;
            }
            units.push(unit);
        }

        if !saw_any {
            return Ok(None);
        }
        String::from_utf16(&units)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn read_pair(&mut self) -> io::Result<Option<[u8; 2]>> {
        if let Some(pair) = self.pushback.take() {
            return Ok(Some(pair));
        }
        let mut pair = [0u8; 2];
        let mut filled = 0;
        while filled < 2 {
            match self.inner.read(&mut pair[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        match filled {
            0 => Ok(None),
            2 => Ok(Some(pair)),
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated UTF-16 code unit",
            )),
        }
    }
}

/// Writes `\n`-terminated lines in a given charset
pub struct LineWriter<W: Write> {
    inner: W,
    charset: Charset,
    wrote_bom: bool,
    buf: Vec<u8>,
}

impl<W: Write> LineWriter<W> {
    pub fn new(inner: W, charset: Charset) -> Self {
        Self {
            inner,
            charset,
            wrote_bom: false,
            buf: Vec::with_capacity(128),
        }
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.buf.clear();
        if self.charset == Charset::Utf16 && !self.wrote_bom {
            self.buf.extend_from_slice(&[0xFE, 0xFF]);
            self.wrote_bom = true;
        }
        self.charset.encode_into(line, &mut self.buf);
        self.charset.encode_into("\n", &mut self.buf);
        self.inner.write_all(&self.buf)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all(bytes: &[u8], charset: Charset) -> io::Result<Vec<String>> {
        let mut reader = LineReader::new(Cursor::new(bytes.to_vec()), charset);
        let mut lines = Vec::new();
        while let Some(line) = reader.read_line()? {
            lines.push(line);
        }
        Ok(lines)
    }

    fn write_all(lines: &[&str], charset: Charset) -> Vec<u8> {
        let mut writer = LineWriter::new(Vec::new(), charset);
        for line in lines {
            writer.write_line(line).unwrap();
        }
        writer.into_inner()
    }

    #[test]
    fn test_known_labels() {
        assert_eq!(Charset::from_label("UTF-16LE"), Charset::Utf16Le);
        assert_eq!(Charset::from_label("US-ASCII"), Charset::UsAscii);
        assert_eq!(Charset::from_label("ISO-8859-1").label(), "ISO-8859-1");
    }

    #[test]
    fn test_unknown_label_falls_back_to_utf8() {
        assert_eq!(Charset::parse_label("UNKNOWN"), None);
        assert_eq!(Charset::from_label("UNKNOWN"), Charset::Utf8);
        assert_eq!(Charset::from_label("utf-8"), Charset::Utf8);
    }

    #[test]
    fn test_utf8_lines_and_crlf() {
        let lines = read_all(b"a,b\r\nc,d\n\ne,f", Charset::Utf8).unwrap();
        assert_eq!(lines, vec!["a,b", "c,d", "", "e,f"]);
    }

    #[test]
    fn test_lone_carriage_return_ends_a_line() {
        let lines = read_all(b"1,a,b,c\r2,d,e,f\r3,g,h,i\r", Charset::Utf8).unwrap();
        assert_eq!(lines, vec!["1,a,b,c", "2,d,e,f", "3,g,h,i"]);

        let mixed = read_all(b"a\r\rb\r\nc\nd", Charset::Iso8859_1).unwrap();
        assert_eq!(mixed, vec!["a", "", "b", "c", "d"]);
    }

    #[test]
    fn test_carriage_return_at_buffer_boundary() {
        // A one-byte buffer forces the `\r` and `\n` into separate fills
        let reader = io::BufReader::with_capacity(1, Cursor::new(b"ab\r\ncd\r".to_vec()));
        let mut reader = LineReader::new(reader, Charset::Utf8);
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("ab"));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("cd"));
        assert_eq!(reader.read_line().unwrap(), None);
    }

    #[test]
    fn test_utf16_lone_carriage_return_ends_a_line() {
        let mut bytes = Vec::new();
        for unit in "1,a\r2,b\r\n3,c".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(
            read_all(&bytes, Charset::Utf16Be).unwrap(),
            vec!["1,a", "2,b", "3,c"]
        );
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let lines = read_all("\u{FEFF}Account ID,x\n1,y\n".as_bytes(), Charset::Utf8).unwrap();
        assert_eq!(lines, vec!["Account ID,x", "1,y"]);
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let err = read_all(b"ok\n\xff\xfe,bad\n", Charset::Utf8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_latin1_round_trip() {
        let bytes = write_all(&["1,Müller,Zoë"], Charset::Iso8859_1);
        assert_eq!(bytes, b"1,M\xfcller,Zo\xeb\n");
        assert_eq!(
            read_all(&bytes, Charset::Iso8859_1).unwrap(),
            vec!["1,Müller,Zoë"]
        );
    }

    #[test]
    fn test_ascii_replaces_unmappable() {
        assert_eq!(write_all(&["Zoë"], Charset::UsAscii), b"Zo?\n");
        assert_eq!(
            read_all(b"Zo\xeb\n", Charset::UsAscii).unwrap(),
            vec!["Zo\u{FFFD}"]
        );
    }

    #[test]
    fn test_utf16_with_bom_detects_little_endian() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "1,a\r\n2,b\n".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(read_all(&bytes, Charset::Utf16).unwrap(), vec!["1,a", "2,b"]);
    }

    #[test]
    fn test_utf16_writer_emits_single_bom() {
        let bytes = write_all(&["a", "b"], Charset::Utf16);
        assert_eq!(bytes, vec![0xFE, 0xFF, 0, b'a', 0, b'\n', 0, b'b', 0, b'\n']);
        assert_eq!(read_all(&bytes, Charset::Utf16).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_utf16le_round_trip() {
        let bytes = write_all(&["100,Tony", "ünï"], Charset::Utf16Le);
        assert_eq!(
            read_all(&bytes, Charset::Utf16Le).unwrap(),
            vec!["100,Tony", "ünï"]
        );
    }

    #[test]
    fn test_truncated_utf16_is_an_error() {
        let err = read_all(&[0x00, b'a', 0x00], Charset::Utf16Be).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
