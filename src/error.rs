//! Error types for trisurf.
//!
//! This module defines all error types used throughout the library.

use std::path::PathBuf;
use thiserror::Error;

use crate::mesh::{Entity, InvariantKind};

/// Result type alias using [`SurfaceError`].
pub type Result<T> = std::result::Result<T, SurfaceError>;

/// Errors that can occur while building, subdividing, or validating a surface.
#[derive(Error, Debug)]
pub enum SurfaceError {
    /// The input has no triangles.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A triangle references a vertex index outside the vertex list.
    /// Indices are 1-based, so 0 is never valid.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index in the input list.
        face: usize,
        /// The offending 1-based vertex index.
        vertex: usize,
    },

    /// A triangle has duplicate vertex indices.
    #[error("face {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The face index in the input list.
        face: usize,
    },

    /// The same directed edge occurs in more than one triangle, so the
    /// input is either non-manifold or inconsistently wound.
    #[error("edge ({v0}, {v1}) appears twice with the same orientation")]
    NonManifoldEdge {
        /// 1-based index of the edge's first vertex.
        v0: usize,
        /// 1-based index of the edge's second vertex.
        v1: usize,
    },

    /// A structural invariant of the half-edge graph does not hold.
    ///
    /// Produced by [`Surface::validate`](crate::mesh::Surface::validate),
    /// and by [`Surface::subdivide`](crate::mesh::Surface::subdivide) when
    /// a boundary vertex does not have exactly two boundary neighbors.
    #[error("{kind} violated on {entity}")]
    InvariantViolation {
        /// The rule that failed.
        kind: InvariantKind,
        /// The entity it failed on.
        entity: Entity,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing a mesh file.
    #[error("failed to load mesh from {path}: {message}")]
    LoadError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// The file extension does not name a supported mesh format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },
}
