//! Mark state shared by the collector and the write barrier.

pub mod bitmap;

pub use bitmap::MarkBitmap;
