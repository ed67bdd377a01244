//! Collaborator contracts at the edge of the core.
//!
//! # Responsibility
//! - Canonicalize user-supplied paths into file entity names.
//! - Convert text between the process encoding and the store's UTF-8.
//! - Deliver ordered output lines to the caller's sink.
//!
//! # Invariants
//! - The core only ever sees UTF-8 names; conversion happens here.
//! - Sinks receive one name per call, without a trailing newline.

use std::error::Error;
use std::ffi::OsStr;
use std::fmt::{Display, Formatter};
use std::io::{self, Write};
use std::path::Path;

/// Maps a user-supplied path to the canonical name of a file entity.
pub trait PathCanonicalizer {
    fn canonicalize(&self, raw: &str) -> io::Result<String>;
}

/// Canonicalizes through the operating system (absolute, symlinks resolved).
#[derive(Debug, Clone, Copy, Default)]
pub struct FsCanonicalizer;

impl PathCanonicalizer for FsCanonicalizer {
    fn canonicalize(&self, raw: &str) -> io::Result<String> {
        let absolute = std::fs::canonicalize(Path::new(raw))?;
        absolute.into_os_string().into_string().map_err(|value| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("path is not valid UTF-8: {}", value.to_string_lossy()),
            )
        })
    }
}

/// Text conversion failure at the process boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingError {
    pub lossy: String,
}

impl Display for EncodingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "argument is not valid in the store encoding: `{}`", self.lossy)
    }
}

impl Error for EncodingError {}

/// Converts between external (process) text and internal UTF-8 text.
pub trait TextCodec {
    fn to_internal(&self, external: &OsStr) -> Result<String, EncodingError>;
    fn to_external(&self, internal: &str) -> Vec<u8>;
}

/// Codec for environments whose external encoding already is UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Codec;

impl TextCodec for Utf8Codec {
    fn to_internal(&self, external: &OsStr) -> Result<String, EncodingError> {
        external.to_str().map(str::to_owned).ok_or_else(|| EncodingError {
            lossy: external.to_string_lossy().into_owned(),
        })
    }

    fn to_external(&self, internal: &str) -> Vec<u8> {
        internal.as_bytes().to_vec()
    }
}

/// Ordered, line-oriented output sink.
pub trait LineSink {
    fn emit_line(&mut self, line: &str) -> io::Result<()>;
}

impl LineSink for Vec<String> {
    fn emit_line(&mut self, line: &str) -> io::Result<()> {
        self.push(line.to_string());
        Ok(())
    }
}

/// Writes lines to any `Write`, encoding them with a [`TextCodec`].
pub struct WriterSink<W: Write, C: TextCodec> {
    writer: W,
    codec: C,
}

impl<W: Write, C: TextCodec> WriterSink<W, C> {
    pub fn new(writer: W, codec: C) -> Self {
        Self { writer, codec }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl<W: Write, C: TextCodec> LineSink for WriterSink<W, C> {
    fn emit_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(&self.codec.to_external(line))?;
        self.writer.write_all(b"\n")
    }
}

#[cfg(test)]
mod tests {
    use super::{FsCanonicalizer, LineSink, PathCanonicalizer, TextCodec, Utf8Codec, WriterSink};
    use std::ffi::OsStr;

    #[test]
    fn utf8_codec_passes_text_through() {
        let codec = Utf8Codec;
        assert_eq!(codec.to_internal(OsStr::new("été")).unwrap(), "été");
        assert_eq!(codec.to_external("été"), "été".as_bytes());
    }

    #[test]
    fn writer_sink_terminates_each_line() {
        let mut sink = WriterSink::new(Vec::new(), Utf8Codec);
        sink.emit_line("a").unwrap();
        sink.emit_line("b c").unwrap();
        assert_eq!(sink.writer, b"a\nb c\n");
    }

    #[test]
    fn fs_canonicalizer_returns_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sound.mp3");
        std::fs::write(&file, b"").unwrap();

        let canonical = FsCanonicalizer
            .canonicalize(file.to_str().unwrap())
            .unwrap();
        assert!(std::path::Path::new(&canonical).is_absolute());
        assert!(canonical.ends_with("sound.mp3"));
    }

    #[test]
    fn fs_canonicalizer_fails_for_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(FsCanonicalizer
            .canonicalize(missing.to_str().unwrap())
            .is_err());
    }
}
