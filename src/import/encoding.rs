//! Character encoding detection and decoding for text sources
//!
//! Detection samples the leading bytes of a file and runs statistical charset
//! inference. It never fails: any problem falls back to UTF-8.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Default number of leading bytes sampled for detection
pub const DEFAULT_SAMPLE_SIZE: usize = 10_000;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Encoding used to decode a text source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    /// ISO-8859-1, one byte per code point
    Latin1,
    Other(&'static Encoding),
}

impl SourceEncoding {
    /// Label reported in file descriptors and logs
    pub fn label(&self) -> &'static str {
        match self {
            SourceEncoding::Utf8 => "UTF-8",
            SourceEncoding::Latin1 => "ISO-8859-1",
            SourceEncoding::Other(encoding) => encoding.name(),
        }
    }

    /// Decode bytes to text, stripping a byte-order mark and replacing invalid sequences.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            SourceEncoding::Utf8 => {
                let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                String::from_utf8_lossy(bytes).into_owned()
            }
            SourceEncoding::Latin1 => {
                let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                bytes.iter().map(|&b| b as char).collect()
            }
            SourceEncoding::Other(encoding) => {
                // decode() sniffs and removes any BOM itself
                let (text, _, _) = encoding.decode(bytes);
                text.into_owned()
            }
        }
    }
}

impl fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Infer the encoding of a complete byte sample.
///
/// - empty or pure ASCII sample → UTF-8
/// - windows-1252 guess → ISO-8859-1
/// - anything else → the guessed encoding
pub fn detect_sample(sample: &[u8]) -> SourceEncoding {
    detect_prefix(sample, true)
}

/// Infer the encoding of the leading bytes of an input.
///
/// When `at_eof` is false the sample was cut from a longer input, so a
/// multibyte sequence split by the cut is dropped before inference.
pub fn detect_prefix(sample: &[u8], at_eof: bool) -> SourceEncoding {
    let sample = if at_eof {
        sample
    } else {
        trim_partial_utf8(sample)
    };

    if sample.is_empty() || sample.is_ascii() {
        return SourceEncoding::Utf8;
    }
    if sample.starts_with(UTF8_BOM) {
        return SourceEncoding::Utf8;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(sample, at_eof);
    let guess = detector.guess(None, true);

    if guess == UTF_8 {
        SourceEncoding::Utf8
    } else if guess == WINDOWS_1252 {
        SourceEncoding::Latin1
    } else {
        SourceEncoding::Other(guess)
    }
}

/// Drop an incomplete UTF-8 sequence from the end of `bytes`.
fn trim_partial_utf8(bytes: &[u8]) -> &[u8] {
    let floor = bytes.len().saturating_sub(3);
    for start in (floor..bytes.len()).rev() {
        let byte = bytes[start];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        if bytes.len() - start < width {
            return &bytes[..start];
        }
        return bytes;
    }
    bytes
}

/// Detect the encoding of a file from at most `sample_size` leading bytes.
///
/// Any I/O error yields UTF-8.
pub fn detect_encoding(path: &Path, sample_size: usize) -> SourceEncoding {
    let mut sample = Vec::with_capacity(sample_size.min(1 << 20));
    let read = File::open(path).and_then(|file| {
        file.take(sample_size as u64).read_to_end(&mut sample)
    });

    match read {
        Ok(_) => detect_prefix(&sample, sample.len() < sample_size),
        Err(e) => {
            tracing::debug!("Encoding sample of {} failed, assuming UTF-8: {}", path.display(), e);
            SourceEncoding::Utf8
        }
    }
}

/// Read a whole text file and decode it with the given encoding.
pub fn read_text(path: &Path, encoding: SourceEncoding) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(encoding.decode(&bytes))
}
