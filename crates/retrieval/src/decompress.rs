//! Unpacking compressed granules.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::{RetrievalError, RetrievalResult};

/// Compression detected from a file name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Unix,
}

impl Compression {
    pub fn detect(file_name: &str) -> Self {
        if file_name.ends_with(".gz") {
            Compression::Gzip
        } else if file_name.ends_with(".bz2") {
            Compression::Bzip2
        } else if file_name.ends_with(".Z") {
            Compression::Unix
        } else {
            Compression::None
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => ".gz",
            Compression::Bzip2 => ".bz2",
            Compression::Unix => ".Z",
        }
    }
}

/// Strip the compression suffix from a file name.
pub fn strip_suffix(file_name: &str) -> &str {
    let compression = Compression::detect(file_name);
    file_name
        .strip_suffix(compression.suffix())
        .unwrap_or(file_name)
}

/// Decompress `input` into `output`.
///
/// The input file is left in place. A failed decompression leaves no
/// output behind.
pub fn decompress(input: &Path, output: &Path, compression: Compression) -> RetrievalResult<()> {
    match compression {
        Compression::None => {
            std::fs::copy(input, output)?;
            Ok(())
        }
        Compression::Gzip => {
            let mut decoder = GzDecoder::new(BufReader::new(File::open(input)?));
            let mut writer = BufWriter::new(File::create(output)?);
            if let Err(e) = io::copy(&mut decoder, &mut writer).and_then(|_| writer.flush()) {
                drop(writer);
                let _ = std::fs::remove_file(output);
                return Err(e.into());
            }
            debug!(input = %input.display(), output = %output.display(), "Decompressed gzip granule");
            Ok(())
        }
        Compression::Bzip2 | Compression::Unix => Err(RetrievalError::UnsupportedCompression(
            input.display().to_string(),
        )),
    }
}
