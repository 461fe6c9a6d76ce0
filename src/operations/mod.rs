mod common;
mod cut;
mod fuse;
mod section;

pub use common::Common;
pub use cut::Cut;
pub use fuse::Fuse;
pub use section::Section;
