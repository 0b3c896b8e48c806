//! Binary I/O support for altitude dataset files

pub mod byte_order;
pub mod seekable;

pub use byte_order::{ByteOrder, ByteOrderHandler};
pub use seekable::{SeekableReader, SeekableWriter};
