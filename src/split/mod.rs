pub mod edge;
pub mod face;

pub use edge::{split_edges, EdgeSplits};
pub use face::{split_faces, FaceFragment};

pub(crate) use face::boundary_with_paves;
