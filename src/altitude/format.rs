//! ALT binary file format
//!
//! An ALT file is a fixed header followed by a row-major f32 height
//! grid: 8 byte magic, u16 version, grid geometry (origin, deltas and
//! row/column counts), then `rows * columns` samples. Little-endian on
//! disk unless a different byte order is selected.

use std::io::SeekFrom;

use crate::errors::{CoordError, CoordResult};
use crate::io::byte_order::ByteOrderHandler;
use crate::io::seekable::{SeekableReader, SeekableWriter};

/// Magic number opening every ALT file
pub const ALT_MAGIC: u64 = 0x37FB6AEC7BD29721;

/// Highest ALT format version this implementation reads
pub const ALT_VERSION: u16 = 1;

/// Serialization contract shared by the altitude types
///
/// `write` emits the complete object at the current stream position and
/// `read` consumes it back. `push_back` appends the same bytes at the
/// end of the stream, for building multi-record archives incrementally.
/// `data_size` predicts the byte count `write` will produce so callers
/// can pre-allocate buffers.
pub trait Serialize {
    fn write(
        &self,
        stream: &mut dyn SeekableWriter,
        handler: &dyn ByteOrderHandler,
    ) -> CoordResult<()>;

    fn read(
        &mut self,
        stream: &mut dyn SeekableReader,
        handler: &dyn ByteOrderHandler,
    ) -> CoordResult<()>;

    fn push_back(
        &self,
        stream: &mut dyn SeekableWriter,
        handler: &dyn ByteOrderHandler,
    ) -> CoordResult<()> {
        stream.seek(SeekFrom::End(0))?;
        self.write(stream, handler)
    }

    fn data_size(&self) -> u64;
}

/// Grid geometry of one altitude dataset
///
/// `latitude`/`longitude` is the position of sample `[0][0]` in
/// degrees, the south-west corner; deltas are positive going north and
/// east.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatLongInfo {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
    pub latitude_rows: u32,
    pub longitude_columns: u32,
}

impl LatLongInfo {
    /// Northern edge of the covered bounding box, degrees
    pub fn latitude_max(&self) -> f64 {
        self.latitude + self.latitude_delta * (self.latitude_rows.saturating_sub(1)) as f64
    }

    /// Eastern edge of the covered bounding box, degrees
    pub fn longitude_max(&self) -> f64 {
        self.longitude + self.longitude_delta * (self.longitude_columns.saturating_sub(1)) as f64
    }

    /// Whether the point (degrees) falls inside the covered box
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.latitude
            && latitude <= self.latitude_max()
            && longitude >= self.longitude
            && longitude <= self.longitude_max()
    }

    pub fn sample_count(&self) -> usize {
        self.latitude_rows as usize * self.longitude_columns as usize
    }
}

/// The fixed-size ALT file header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AltFileHeader {
    pub magic: u64,
    pub version: u16,
    pub info: LatLongInfo,
}

/// Byte size of the serialized header
pub const ALT_HEADER_SIZE: u64 = 8 + 2 + 8 * 4 + 4 * 2;

impl AltFileHeader {
    pub fn new(info: LatLongInfo) -> Self {
        AltFileHeader { magic: ALT_MAGIC, version: ALT_VERSION, info }
    }

    /// Validate the magic and version after a read
    pub fn validate(&self) -> CoordResult<()> {
        if self.magic != ALT_MAGIC {
            return Err(CoordError::BadMagic(self.magic));
        }
        if self.version > ALT_VERSION {
            return Err(CoordError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

impl Default for AltFileHeader {
    fn default() -> Self {
        AltFileHeader::new(LatLongInfo::default())
    }
}

impl Serialize for AltFileHeader {
    fn write(
        &self,
        stream: &mut dyn SeekableWriter,
        handler: &dyn ByteOrderHandler,
    ) -> CoordResult<()> {
        handler.write_u64(stream, self.magic)?;
        handler.write_u16(stream, self.version)?;
        handler.write_f64(stream, self.info.latitude)?;
        handler.write_f64(stream, self.info.longitude)?;
        handler.write_f64(stream, self.info.latitude_delta)?;
        handler.write_f64(stream, self.info.longitude_delta)?;
        handler.write_u32(stream, self.info.latitude_rows)?;
        handler.write_u32(stream, self.info.longitude_columns)?;
        Ok(())
    }

    fn read(
        &mut self,
        stream: &mut dyn SeekableReader,
        handler: &dyn ByteOrderHandler,
    ) -> CoordResult<()> {
        self.magic = handler.read_u64(stream)?;
        self.version = handler.read_u16(stream)?;
        self.info.latitude = handler.read_f64(stream)?;
        self.info.longitude = handler.read_f64(stream)?;
        self.info.latitude_delta = handler.read_f64(stream)?;
        self.info.longitude_delta = handler.read_f64(stream)?;
        self.info.latitude_rows = handler.read_u32(stream)?;
        self.info.longitude_columns = handler.read_u32(stream)?;
        self.validate()
    }

    fn data_size(&self) -> u64 {
        ALT_HEADER_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::byte_order::{BigEndianHandler, LittleEndianHandler};
    use std::io::Cursor;

    fn sample_info() -> LatLongInfo {
        LatLongInfo {
            latitude: 59.0,
            longitude: 18.0,
            latitude_delta: 0.5,
            longitude_delta: 0.5,
            latitude_rows: 3,
            longitude_columns: 3,
        }
    }

    #[test]
    fn test_header_round_trip() {
        let header = AltFileHeader::new(sample_info());
        let mut buffer = Cursor::new(Vec::new());
        header.write(&mut buffer, &LittleEndianHandler).unwrap();

        assert_eq!(buffer.get_ref().len() as u64, header.data_size());

        buffer.set_position(0);
        let mut decoded = AltFileHeader::default();
        decoded.read(&mut buffer, &LittleEndianHandler).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_header_magic_bytes_little_endian() {
        let header = AltFileHeader::new(sample_info());
        let mut buffer = Cursor::new(Vec::new());
        header.write(&mut buffer, &LittleEndianHandler).unwrap();

        assert_eq!(
            &buffer.get_ref()[..8],
            &[0x21, 0x97, 0xD2, 0x7B, 0xEC, 0x6A, 0xFB, 0x37]
        );
        assert_eq!(&buffer.get_ref()[8..10], &[0x01, 0x00]);
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let mut buffer = Cursor::new(Vec::new());
        let mut header = AltFileHeader::new(sample_info());
        header.magic = 0xDEADBEEF;
        header.write(&mut buffer, &LittleEndianHandler).unwrap();

        buffer.set_position(0);
        let mut decoded = AltFileHeader::default();
        match decoded.read(&mut buffer, &LittleEndianHandler) {
            Err(CoordError::BadMagic(m)) => assert_eq!(m, 0xDEADBEEF),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let mut buffer = Cursor::new(Vec::new());
        let mut header = AltFileHeader::new(sample_info());
        header.version = ALT_VERSION + 1;
        header.write(&mut buffer, &LittleEndianHandler).unwrap();

        buffer.set_position(0);
        let mut decoded = AltFileHeader::default();
        assert!(matches!(
            decoded.read(&mut buffer, &LittleEndianHandler),
            Err(CoordError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_mixed_endianness_fails_magic_check() {
        let header = AltFileHeader::new(sample_info());
        let mut buffer = Cursor::new(Vec::new());
        header.write(&mut buffer, &BigEndianHandler).unwrap();

        buffer.set_position(0);
        let mut decoded = AltFileHeader::default();
        assert!(decoded.read(&mut buffer, &LittleEndianHandler).is_err());

        buffer.set_position(0);
        assert!(decoded.read(&mut buffer, &BigEndianHandler).is_ok());
    }

    #[test]
    fn test_bounding_box() {
        let info = sample_info();
        assert_eq!(info.latitude_max(), 60.0);
        assert_eq!(info.longitude_max(), 19.0);
        assert!(info.contains(59.5, 18.5));
        assert!(info.contains(59.0, 18.0));
        assert!(info.contains(60.0, 19.0));
        assert!(!info.contains(60.1, 18.5));
        assert!(!info.contains(59.5, 17.9));
        assert_eq!(info.sample_count(), 9);
    }
}
