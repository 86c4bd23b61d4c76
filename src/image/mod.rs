pub mod io;
pub mod owned;
pub mod traits;
pub mod u8;

pub use self::owned::ImageBufU8;
pub use self::traits::{ImageView, ImageViewMut, Rows};
pub use self::u8::ImageU8;
