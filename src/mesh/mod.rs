//! Core mesh data structures.
//!
//! The primary type is [`Surface`], which owns one triangle mesh as a
//! half-edge graph: arenas of [`Vertex`], [`HalfEdge`], and [`Face`]
//! elements addressed by type-safe ids.
//!
//! # Construction
//!
//! Surfaces are linked from flat coordinate/index lists, with 1-based
//! triangle indices as found in `.obj` files:
//!
//! ```
//! use trisurf::mesh::Surface;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let surface = Surface::link(&vertices, &[[1, 2, 3]]).unwrap();
//! assert_eq!(surface.vertex_count(), 3);
//! ```

mod halfedge;
mod index;
mod surface;
mod validate;

pub use halfedge::{EdgeRole, Face, HalfEdge, Vertex};
pub use index::{FaceId, HalfEdgeId, VertexId};
pub use surface::{Sizes, Surface, SurfaceStats};
pub use validate::{Entity, InvariantKind};
