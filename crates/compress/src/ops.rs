//! Compression Operations

use crate::Compression;
use crate::error::{ErrorKind, Result};
use bzip2::{Compression as BzCompression, read::BzDecoder, write::BzEncoder};
use exn::ResultExt;
use flate2::{Compression as GzCompression, read::MultiGzDecoder, write::GzEncoder};
use std::io::{Read, Write};
#[cfg(feature = "xz")]
use xz2::{read::XzDecoder, write::XzEncoder};

// Compression is only ever used to build fixtures; speed matters more than size.
const BZIP2_LEVEL: BzCompression = BzCompression::fast();
const GZIP_LEVEL: GzCompression = GzCompression::fast();
#[cfg(feature = "xz")]
const XZ_LEVEL: u32 = 1;

impl Compression {
    /// Compress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use mirrorcheck_compress::Compression;
    ///
    /// let data = b"Package: hello\nFilename: pool/main/h/hello/hello_2.10-3_amd64.deb\n";
    /// let compressed = Compression::Gzip.compress(data).unwrap();
    /// assert_ne!(compressed, data);
    /// ```
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        match self {
            Compression::None => output.extend_from_slice(input),
            Compression::Bzip2 => {
                let mut encoder = BzEncoder::new(&mut output, BZIP2_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(&mut output, GZIP_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
            #[cfg(feature = "xz")]
            Compression::Xz => {
                let mut encoder = XzEncoder::new(&mut output, XZ_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
        }
        Ok(output)
    }

    /// Wrap a reader with the appropriate decompression layer.
    ///
    /// Gzip input may consist of several concatenated members; all of them
    /// are decoded.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::{Cursor, Read};
    /// use mirrorcheck_compress::Compression;
    ///
    /// let original = b"Package: hello\n";
    /// let compressed = Compression::Gzip.compress(original).unwrap();
    /// let mut reader = Compression::Gzip.wrap_reader(Cursor::new(compressed)).unwrap();
    /// let mut decompressed = Vec::new();
    /// reader.read_to_end(&mut decompressed).unwrap();
    /// assert_eq!(decompressed, original);
    /// ```
    pub fn wrap_reader<'a, R: Read + 'a>(&self, reader: R) -> Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Compression::None => Box::new(reader),
            Compression::Bzip2 => Box::new(BzDecoder::new(reader)),
            Compression::Gzip => Box::new(MultiGzDecoder::new(reader)),
            #[cfg(feature = "xz")]
            Compression::Xz => Box::new(XzDecoder::new(reader)),
        })
    }
}
