use crate::element::{Element, IndexType, TypeDescriptor};
use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use sprs::CompressedStorage;
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// Number of 32-bit words in the metadata header
pub const NUM_META_DATA: usize = 6;

/// Size of the metadata header in bytes
pub const META_DATA_SIZE: usize = NUM_META_DATA * 4;

/// Storage format of a matrix. The discriminant is the format tag written to the header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// Standard compressed sparse storage: one value and one index per non-zero
    PlainCsc = 1,

    /// Distinct values per vector, with a count and a flat index list per value
    ValueGrouped = 2,

    /// Runs of delta-encoded indices per distinct value, with per-run index width
    DeltaRunLength = 3,
}

impl Format {
    /// All formats, in tag order
    pub const ALL: [Format; 3] = [Format::PlainCsc, Format::ValueGrouped, Format::DeltaRunLength];

    /// Tag stored in the first header word
    pub fn tag(self) -> u32 {
        self as u32
    }

    /// Format for a header tag, if it names one
    pub fn from_tag(tag: u32) -> Option<Format> {
        match tag {
            1 => Some(Format::PlainCsc),
            2 => Some(Format::ValueGrouped),
            3 => Some(Format::DeltaRunLength),
            _ => None,
        }
    }

    /// Short name, also accepted by `FromStr`
    pub fn name(self) -> &'static str {
        match self {
            Format::PlainCsc => "csc",
            Format::ValueGrouped => "vcsc",
            Format::DeltaRunLength => "ivcsc",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Format> {
        match s.to_ascii_lowercase().as_str() {
            "csc" | "plain" | "1" => Ok(Format::PlainCsc),
            "vcsc" | "grouped" | "2" => Ok(Format::ValueGrouped),
            "ivcsc" | "delta" | "3" => Ok(Format::DeltaRunLength),
            _ => Err(Error::MalformedInput(format!("unknown format '{s}'"))),
        }
    }
}

/// Self-describing header of a matrix: {format tag, inner dim, outer dim, nnz,
/// value type descriptor, index width in bytes}.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetadataHeader {
    /// Tag of the storage format
    pub format_tag: u32,
    /// Length of each outer vector
    pub inner_dim: u32,
    /// Number of outer vectors
    pub outer_dim: u32,
    /// Stored entries, explicit zeros included
    pub nnz: u32,
    /// Element type and storage order
    pub value_type: TypeDescriptor,
    /// Size of the index type in bytes
    pub index_width: u32,
}

impl MetadataHeader {
    /// The header as its six words, in file order
    pub fn words(&self) -> [u32; NUM_META_DATA] {
        [
            self.format_tag,
            self.inner_dim,
            self.outer_dim,
            self.nnz,
            self.value_type.raw(),
            self.index_width,
        ]
    }

    /// Header from six words in file order
    pub fn from_words(words: [u32; NUM_META_DATA]) -> MetadataHeader {
        MetadataHeader {
            format_tag: words[0],
            inner_dim: words[1],
            outer_dim: words[2],
            nnz: words[3],
            value_type: TypeDescriptor::from_raw(words[4]),
            index_width: words[5],
        }
    }

    /// Format named by the tag, if any
    pub fn format(&self) -> Option<Format> {
        Format::from_tag(self.format_tag)
    }

    /// Write the header little-endian
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        for word in self.words() {
            w.write_u32::<LittleEndian>(word)?;
        }
        Ok(())
    }

    /// Read a little-endian header
    pub fn read_from<R: Read>(r: &mut R) -> Result<MetadataHeader> {
        let mut words = [0u32; NUM_META_DATA];
        r.read_u32_into::<LittleEndian>(&mut words)?;
        Ok(MetadataHeader::from_words(words))
    }

    /// Check the header against the codec `format`, element type `T`, index type `I`
    /// and `storage` order. Nothing past the header may be interpreted until this passes.
    pub fn validate<T: Element, I: IndexType>(&self, format: Format, storage: CompressedStorage) -> Result<()> {
        if self.format_tag != format.tag() {
            return Err(Error::FormatMismatch {
                expected: format,
                found: self.format_tag,
            });
        }

        self.value_type.validate::<T>(storage)?;

        if self.index_width as usize != I::width() {
            return Err(Error::TypeMismatch {
                field: "index width",
                expected: I::width() as u32,
                found: self.index_width,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn header() -> MetadataHeader {
        MetadataHeader {
            format_tag: Format::DeltaRunLength.tag(),
            inner_dim: 4,
            outer_dim: 3,
            nnz: 6,
            value_type: TypeDescriptor::of::<i32>(CompressedStorage::CSC),
            index_width: 4,
        }
    }

    #[test]
    fn header_bytes() {
        let h = header();
        let mut buf = Vec::new();
        h.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), META_DATA_SIZE);
        assert_eq!(&buf[..4], &[3, 0, 0, 0]);
        assert_eq!(&buf[12..16], &[6, 0, 0, 0]);

        let back = MetadataHeader::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(back, h);
        assert_eq!(back.format(), Some(Format::DeltaRunLength));
    }

    #[test]
    fn header_validation() {
        let h = header();
        assert!(h.validate::<i32, u32>(Format::DeltaRunLength, CompressedStorage::CSC).is_ok());

        assert!(matches!(
            h.validate::<i32, u32>(Format::ValueGrouped, CompressedStorage::CSC),
            Err(Error::FormatMismatch { found: 3, .. })
        ));
        assert!(matches!(
            h.validate::<f32, u32>(Format::DeltaRunLength, CompressedStorage::CSC),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            h.validate::<i32, u16>(Format::DeltaRunLength, CompressedStorage::CSC),
            Err(Error::TypeMismatch {
                field: "index width",
                ..
            })
        ));
    }

    #[test]
    fn format_names() {
        for f in Format::ALL {
            assert_eq!(f.name().parse::<Format>().unwrap(), f);
            assert_eq!(Format::from_tag(f.tag()), Some(f));
        }
        assert!("csr".parse::<Format>().is_err());
        assert_eq!(Format::from_tag(0), None);
    }
}
