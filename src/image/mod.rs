//! Raster access for the grid stage.
//!
//! - `traits`: row-oriented [`ImageView`] and the [`PixelSource`] foreground test.
//! - `gray`: borrowed/owned 8-bit grayscale buffers.
//! - `binary`: the [`BinaryImage`] foreground/background buffer read by every stage.
//! - `area`: vertical core analysis between two vertical lines.
//! - `io`: image loading and JSON output helpers.
pub mod area;
pub mod binary;
pub mod gray;
pub mod io;
pub mod traits;

pub use self::area::{vertical_core, BandLine, CoreData};
pub use self::binary::BinaryImage;
pub use self::gray::{GrayImageU8, ImageU8};
pub use self::traits::{ImageView, PixelSource};
