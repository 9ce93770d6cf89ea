//! The surface aggregate: arenas of vertices, half-edges, and faces.
//!
//! A [`Surface`] owns the whole half-edge graph of one mesh. It is
//! built from flat coordinate/index lists by [`Surface::link`], refined
//! in place by [`Surface::subdivide`](crate::subdivide), checked by
//! [`Surface::validate`], and exported back to flat lists by
//! [`Surface::export_mesh`].

use std::fmt;

use nalgebra::Point3;

use crate::error::{Result, SurfaceError};
use crate::subdivide::BetaCache;

use super::halfedge::{EdgeRole, Face, HalfEdge, Vertex};
use super::index::{FaceId, HalfEdgeId, VertexId};

/// Element counts of one generation of a surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sizes {
    /// Number of faces.
    pub faces: usize,
    /// Number of vertices in the current flat vertex list.
    pub vertices: usize,
    /// Number of half-edges. Interior mesh edges count twice, once per
    /// orientation.
    pub edges: usize,
}

impl fmt::Display for Sizes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} faces, {} vertices, {} edges",
            self.faces, self.vertices, self.edges
        )
    }
}

/// Before/after element counts reported by [`Surface::stats`].
#[derive(Debug, Clone, Copy)]
pub struct SurfaceStats {
    /// Counts recorded when the surface was linked.
    pub initial: Sizes,
    /// Counts of the current generation.
    pub current: Sizes,
}

impl fmt::Display for SurfaceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Started with {}", self.initial)?;
        write!(f, "Ended with {}", self.current)
    }
}

/// A triangle mesh held as a half-edge graph, ready for Loop
/// subdivision.
///
/// All elements live in arenas owned by the surface and refer to each
/// other through [`VertexId`]/[`HalfEdgeId`]/[`FaceId`] handles. Each
/// subdivision pass replaces the half-edge and face arenas wholesale;
/// vertices persist, with original vertices relocated in place.
#[derive(Debug)]
pub struct Surface {
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) halfedges: Vec<HalfEdge>,
    pub(crate) faces: Vec<Face>,

    /// The current generation's vertices in face-discovery order. This
    /// list carries the output indexing; the arena may also hold
    /// vertices no face references any more.
    pub(crate) vertex_order: Vec<VertexId>,

    /// Counts captured at link time, for [`Surface::stats`].
    pub(crate) initial: Sizes,

    /// Memoized smoothing weights, persistent across passes.
    pub(crate) betas: BetaCache,
}

impl Surface {
    /// Build the half-edge graph from a coordinate list and a triangle
    /// list of 1-based indices into it, as in a Wavefront `.obj` file.
    ///
    /// Triangles must be consistently wound counter-clockwise and
    /// 2-manifold (each edge shared by at most two triangles). The
    /// errors reported here catch only local problems in the input
    /// lists; deeper damage surfaces later through
    /// [`validate`](Surface::validate).
    ///
    /// # Example
    ///
    /// ```
    /// use trisurf::mesh::Surface;
    /// use nalgebra::Point3;
    ///
    /// let vertices = vec![
    ///     Point3::new(0.0, 0.0, 0.0),
    ///     Point3::new(1.0, 0.0, 0.0),
    ///     Point3::new(0.0, 1.0, 0.0),
    ///     Point3::new(1.0, 1.0, 0.0),
    /// ];
    /// let faces = vec![[1, 2, 3], [2, 4, 3]];
    ///
    /// let surface = Surface::link(&vertices, &faces).unwrap();
    /// assert_eq!(surface.face_count(), 2);
    /// assert_eq!(surface.halfedge_count(), 6);
    /// ```
    pub fn link(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> Result<Surface> {
        if faces.is_empty() {
            return Err(SurfaceError::EmptyMesh);
        }

        for (fi, tri) in faces.iter().enumerate() {
            for &vi in tri {
                if vi == 0 || vi > vertices.len() {
                    return Err(SurfaceError::InvalidVertexIndex { face: fi, vertex: vi });
                }
            }
            if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
                return Err(SurfaceError::DegenerateFace { face: fi });
            }
        }

        let mut surface = Surface {
            vertices: vertices.iter().map(|&p| Vertex::new(p)).collect(),
            halfedges: Vec::with_capacity(faces.len() * 3),
            faces: Vec::with_capacity(faces.len()),
            vertex_order: Vec::new(),
            initial: Sizes::default(),
            betas: BetaCache::new(),
        };

        for tri in faces {
            let corners = [
                VertexId::new(tri[0] - 1),
                VertexId::new(tri[1] - 1),
                VertexId::new(tri[2] - 1),
            ];

            let fid = FaceId::new(surface.faces.len());
            surface.faces.push(Face::new(corners));

            let mut prev = HalfEdgeId::invalid();
            for i in 0..3 {
                let head = corners[i];
                let tail = corners[(i + 1) % 3];

                if surface.edge_between(head, head, tail).is_valid() {
                    return Err(SurfaceError::NonManifoldEdge {
                        v0: tri[i],
                        v1: tri[(i + 1) % 3],
                    });
                }
                // The reverse orientation, if an earlier triangle built it
                let twin = surface.edge_between(head, tail, head);

                let eid = surface.push_halfedge(head, tail, fid, EdgeRole::Original);
                if twin.is_valid() {
                    let twin_left = surface.halfedge(twin).left;
                    let edge = surface.halfedge_mut(eid);
                    edge.twin = twin;
                    edge.right = twin_left;
                    let other = surface.halfedge_mut(twin);
                    other.twin = eid;
                    other.right = fid;
                }

                surface.faces[fid.index()].halfedges[i] = eid;
                if prev.is_valid() {
                    surface.halfedge_mut(prev).next = eid;
                }
                prev = eid;
            }
            let first = surface.faces[fid.index()].halfedges[0];
            surface.halfedge_mut(prev).next = first;
        }

        surface.vertex_order = (0..surface.vertices.len()).map(VertexId::new).collect();
        surface.assign_indices();
        surface.initial = surface.sizes();
        Ok(surface)
    }

    // ==================== Accessors ====================

    /// Number of faces in the current generation.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Number of vertices in the current generation.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertex_order.len()
    }

    /// Number of half-edges in the current generation. Interior mesh
    /// edges count twice, once per orientation.
    #[inline]
    pub fn halfedge_count(&self) -> usize {
        self.halfedges.len()
    }

    /// Get a vertex by id.
    #[inline]
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.index()]
    }

    /// Get a mutable vertex by id.
    #[inline]
    pub(crate) fn vertex_mut(&mut self, id: VertexId) -> &mut Vertex {
        &mut self.vertices[id.index()]
    }

    /// Get a half-edge by id.
    #[inline]
    pub fn halfedge(&self, id: HalfEdgeId) -> &HalfEdge {
        &self.halfedges[id.index()]
    }

    /// Get a mutable half-edge by id.
    #[inline]
    pub(crate) fn halfedge_mut(&mut self, id: HalfEdgeId) -> &mut HalfEdge {
        &mut self.halfedges[id.index()]
    }

    /// Get a face by id.
    #[inline]
    pub fn face(&self, id: FaceId) -> &Face {
        &self.faces[id.index()]
    }

    /// Get the position of a vertex.
    #[inline]
    pub fn position(&self, v: VertexId) -> &Point3<f64> {
        &self.vertex(v).position
    }

    // ==================== Topology queries ====================

    /// The vertex connected to `v` by the given half-edge, i.e.
    /// whichever of its endpoints is not `v`.
    #[inline]
    pub fn across(&self, edge: HalfEdgeId, v: VertexId) -> VertexId {
        let e = self.halfedge(edge);
        if e.head == v {
            e.tail
        } else {
            e.head
        }
    }

    /// A vertex is on the boundary of the surface iff at least one of
    /// its spokes is a boundary half-edge.
    pub fn is_boundary_vertex(&self, v: VertexId) -> bool {
        self.vertex(v)
            .spokes
            .iter()
            .any(|&s| self.halfedge(s).is_boundary())
    }

    /// The neighbors of `v` reached across its boundary spokes. On a
    /// well-formed open surface a boundary vertex has exactly two.
    pub fn boundary_neighbors(&self, v: VertexId) -> Vec<VertexId> {
        self.vertex(v)
            .spokes
            .iter()
            .filter(|&&s| self.halfedge(s).is_boundary())
            .map(|&s| self.across(s, v))
            .collect()
    }

    /// The distinct neighbors of `v`, one reachable through each spoke,
    /// in first-seen order.
    pub fn distinct_neighbors(&self, v: VertexId) -> Vec<VertexId> {
        let mut others: Vec<VertexId> = Vec::new();
        for &s in &self.vertex(v).spokes {
            let other = self.across(s, v);
            if !others.contains(&other) {
                others.push(other);
            }
        }
        others
    }

    /// Search `v`'s spokes for the half-edge with exactly the given
    /// head and tail. Returns an invalid id when there is none.
    pub(crate) fn edge_between(&self, v: VertexId, head: VertexId, tail: VertexId) -> HalfEdgeId {
        for &s in &self.vertex(v).spokes {
            let e = self.halfedge(s);
            if e.head == head && e.tail == tail {
                return s;
            }
        }
        HalfEdgeId::invalid()
    }

    // ==================== Construction helpers ====================

    /// Append a vertex to the arena.
    pub(crate) fn push_vertex(&mut self, position: Point3<f64>) -> VertexId {
        let id = VertexId::new(self.vertices.len());
        self.vertices.push(Vertex::new(position));
        id
    }

    /// Append a half-edge to the arena, registering it on the spoke
    /// lists of both its endpoints.
    pub(crate) fn push_halfedge(
        &mut self,
        head: VertexId,
        tail: VertexId,
        left: FaceId,
        role: EdgeRole,
    ) -> HalfEdgeId {
        let id = HalfEdgeId::new(self.halfedges.len());
        self.halfedges.push(HalfEdge::new(head, tail, left, role));
        self.vertex_mut(head).spokes.push(id);
        self.vertex_mut(tail).spokes.push(id);
        id
    }

    /// Rebuild the flat vertex list by walking the faces in order,
    /// keeping the first occurrence of each shared vertex.
    pub(crate) fn rebuild_vertex_order(&mut self) {
        let mut seen = vec![false; self.vertices.len()];
        let mut order = Vec::with_capacity(self.vertex_order.len());
        for face in &self.faces {
            for &v in &face.vertices {
                if !seen[v.index()] {
                    seen[v.index()] = true;
                    order.push(v);
                }
            }
        }
        self.vertex_order = order;
    }

    /// Reassign every listed vertex's output index to its position in
    /// the flat vertex list.
    pub(crate) fn assign_indices(&mut self) {
        for i in 0..self.vertex_order.len() {
            let v = self.vertex_order[i];
            self.vertices[v.index()].index = i;
        }
    }

    // ==================== Export & stats ====================

    /// Flatten the current generation back into a coordinate list and a
    /// triangle list of 1-based indices, in output-index order and face
    /// discovery order respectively.
    pub fn export_mesh(&self) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let vertices: Vec<Point3<f64>> = self
            .vertex_order
            .iter()
            .map(|&v| self.vertices[v.index()].position)
            .collect();

        let faces: Vec<[usize; 3]> = self
            .faces
            .iter()
            .map(|f| {
                [
                    self.vertices[f.vertices[0].index()].index + 1,
                    self.vertices[f.vertices[1].index()].index + 1,
                    self.vertices[f.vertices[2].index()].index + 1,
                ]
            })
            .collect();

        (vertices, faces)
    }

    /// Element counts of the current generation.
    pub(crate) fn sizes(&self) -> Sizes {
        Sizes {
            faces: self.faces.len(),
            vertices: self.vertex_order.len(),
            edges: self.halfedges.len(),
        }
    }

    /// Element counts at link time and now.
    pub fn stats(&self) -> SurfaceStats {
        SurfaceStats {
            initial: self.initial,
            current: self.sizes(),
        }
    }
}
