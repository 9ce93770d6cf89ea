//! Structural validation of the half-edge graph.
//!
//! [`Surface::validate`] walks every face, half-edge, and vertex of the
//! current generation and checks the internal consistency of the graph:
//! face cycles, twin symmetry, face ownership, and vertex incidence.
//! It stops at the first violation and reports which rule failed on
//! which entity. Intended for tests and debugging; a violation means
//! the mesh (or the code that built it) is broken beyond recovery, not
//! something to retry around.

use std::fmt;

use crate::error::{Result, SurfaceError};

use super::index::{FaceId, HalfEdgeId, VertexId};
use super::surface::Surface;

/// The structural rule a validation failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantKind {
    /// Following `next` three times must return to the same half-edge.
    EdgeCycle,
    /// A face's half-edges must chain consecutively in stored order.
    FaceCycle,
    /// `halfedges[i].head` must be `vertices[i]` on its face.
    CornerHead,
    /// `halfedges[i].tail` must be `vertices[(i + 1) % 3]` on its face.
    CornerTail,
    /// A half-edge's `left` must be the face that lists it.
    OwnerFace,
    /// A half-edge must always have an owning face.
    MissingLeft,
    /// A twinned pair must reference each other symmetrically.
    TwinSymmetry,
    /// `right` must be the twin's `left`, and absent without a twin.
    RightFace,
    /// A vertex's spoke list must not repeat a half-edge.
    DuplicateSpoke,
    /// Each (head, tail) pair must occur on exactly one spoke of both
    /// endpoints: no parallel duplicate half-edges.
    SpokeCount,
    /// A boundary vertex must have exactly two boundary neighbors.
    BoundaryValence,
}

impl fmt::Display for InvariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InvariantKind::EdgeCycle => "edge cycle",
            InvariantKind::FaceCycle => "face cycle",
            InvariantKind::CornerHead => "corner head",
            InvariantKind::CornerTail => "corner tail",
            InvariantKind::OwnerFace => "owner face",
            InvariantKind::MissingLeft => "missing left face",
            InvariantKind::TwinSymmetry => "twin symmetry",
            InvariantKind::RightFace => "right face",
            InvariantKind::DuplicateSpoke => "duplicate spoke",
            InvariantKind::SpokeCount => "spoke count",
            InvariantKind::BoundaryValence => "boundary valence",
        };
        write!(f, "{} invariant", name)
    }
}

/// Identity of the entity a validation failure occurred on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    /// A vertex, by arena id.
    Vertex(VertexId),
    /// A half-edge, by arena id.
    HalfEdge(HalfEdgeId),
    /// A face, by arena id.
    Face(FaceId),
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Vertex(id) => write!(f, "vertex {:?}", id),
            Entity::HalfEdge(id) => write!(f, "half-edge {:?}", id),
            Entity::Face(id) => write!(f, "face {:?}", id),
        }
    }
}

fn violation<T>(kind: InvariantKind, entity: Entity) -> Result<T> {
    Err(SurfaceError::InvariantViolation { kind, entity })
}

impl Surface {
    /// Check the internal consistency of the whole half-edge graph,
    /// failing fast with the violated rule and the offending entity.
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
    ///     Point3::new(0.5, 1.0, 0.0),
    /// ];
    /// let surface = Surface::link(&vertices, &[[1, 2, 3]]).unwrap();
    /// surface.validate().unwrap();
    /// ```
    pub fn validate(&self) -> Result<()> {
        for f in 0..self.faces.len() {
            self.check_face(FaceId::new(f))?;
        }
        // Twin symmetry is checked across the whole arena before any
        // other per-edge rule, so a one-sided twin reference is always
        // reported as such rather than as collateral damage.
        for e in 0..self.halfedges.len() {
            let id = HalfEdgeId::new(e);
            let edge = self.halfedge(id);
            if edge.twin.is_valid() && self.halfedge(edge.twin).twin != id {
                return violation(InvariantKind::TwinSymmetry, Entity::HalfEdge(id));
            }
        }
        for &v in &self.vertex_order {
            self.check_vertex(v)?;
        }
        for e in 0..self.halfedges.len() {
            self.check_halfedge(HalfEdgeId::new(e))?;
        }
        Ok(())
    }

    fn check_face(&self, f: FaceId) -> Result<()> {
        let face = self.face(f);
        for i in 0..3 {
            let j = (i + 1) % 3;
            let id = face.halfedges[i];
            if !id.is_valid() {
                return violation(InvariantKind::FaceCycle, Entity::Face(f));
            }
            let edge = self.halfedge(id);
            if edge.next != face.halfedges[j] {
                return violation(InvariantKind::FaceCycle, Entity::Face(f));
            }
            if edge.head != face.vertices[i] {
                return violation(InvariantKind::CornerHead, Entity::Face(f));
            }
            if edge.tail != face.vertices[j] {
                return violation(InvariantKind::CornerTail, Entity::Face(f));
            }
            if edge.left != f {
                return violation(InvariantKind::OwnerFace, Entity::HalfEdge(id));
            }
        }
        Ok(())
    }

    fn check_halfedge(&self, id: HalfEdgeId) -> Result<()> {
        let edge = self.halfedge(id);

        if !edge.next.is_valid() {
            return violation(InvariantKind::EdgeCycle, Entity::HalfEdge(id));
        }
        let second = self.halfedge(edge.next).next;
        if !second.is_valid() || self.halfedge(second).next != id {
            return violation(InvariantKind::EdgeCycle, Entity::HalfEdge(id));
        }

        if !edge.left.is_valid() {
            return violation(InvariantKind::MissingLeft, Entity::HalfEdge(id));
        }

        if edge.twin.is_valid() {
            let twin = self.halfedge(edge.twin);
            if edge.right != twin.left {
                return violation(InvariantKind::RightFace, Entity::HalfEdge(id));
            }
        } else if edge.right.is_valid() {
            return violation(InvariantKind::RightFace, Entity::HalfEdge(id));
        }

        // Both endpoints must list exactly one half-edge with this
        // orientation, and this one must be it.
        for v in [edge.head, edge.tail] {
            let mut matches = 0;
            let mut found_self = false;
            for &s in &self.vertex(v).spokes {
                let e = self.halfedge(s);
                if e.head == edge.head && e.tail == edge.tail {
                    matches += 1;
                    found_self |= s == id;
                }
            }
            if matches != 1 || !found_self {
                return violation(InvariantKind::SpokeCount, Entity::HalfEdge(id));
            }
        }

        Ok(())
    }

    fn check_vertex(&self, v: VertexId) -> Result<()> {
        let spokes = &self.vertex(v).spokes;
        for (i, &s) in spokes.iter().enumerate() {
            if spokes[i + 1..].contains(&s) {
                return violation(InvariantKind::DuplicateSpoke, Entity::Vertex(v));
            }
        }

        if self.is_boundary_vertex(v) && self.boundary_neighbors(v).len() != 2 {
            return violation(InvariantKind::BoundaryValence, Entity::Vertex(v));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn unit_square() -> Surface {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        Surface::link(&vertices, &[[1, 2, 3], [2, 4, 3]]).unwrap()
    }

    fn tetrahedron() -> Surface {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];
        let faces = vec![[1, 3, 2], [1, 2, 4], [2, 3, 4], [3, 1, 4]];
        Surface::link(&vertices, &faces).unwrap()
    }

    fn kind_of(err: SurfaceError) -> InvariantKind {
        match err {
            SurfaceError::InvariantViolation { kind, .. } => kind,
            other => panic!("expected invariant violation, got {}", other),
        }
    }

    #[test]
    fn test_linked_meshes_are_valid() {
        unit_square().validate().unwrap();
        tetrahedron().validate().unwrap();
    }

    #[test]
    fn test_one_sided_twin_clear() {
        let mut surface = unit_square();

        // Clear one half of a twin pair but not the other
        let interior = HalfEdgeId::new(
            surface
                .halfedges
                .iter()
                .position(|e| !e.is_boundary())
                .unwrap(),
        );
        let twin = surface.halfedge(interior).twin;
        surface.halfedge_mut(interior).twin = HalfEdgeId::invalid();

        let err = surface.validate().unwrap_err();
        assert_eq!(kind_of(err), InvariantKind::TwinSymmetry);
        match surface.validate().unwrap_err() {
            SurfaceError::InvariantViolation { entity, .. } => {
                // The surviving reference is the one that gets reported
                assert_eq!(entity, Entity::HalfEdge(twin));
            }
            other => panic!("expected invariant violation, got {}", other),
        }
    }

    #[test]
    fn test_retargeted_twin() {
        let mut surface = tetrahedron();

        // Point a twin reference at an unrelated half-edge
        let e0 = HalfEdgeId::new(0);
        let wrong = self_twin_of_other(&surface, e0);
        surface.halfedge_mut(e0).twin = wrong;

        let err = surface.validate().unwrap_err();
        assert_eq!(kind_of(err), InvariantKind::TwinSymmetry);
    }

    fn self_twin_of_other(surface: &Surface, not: HalfEdgeId) -> HalfEdgeId {
        // Any valid half-edge that is neither `not` nor its twin
        let avoid = surface.halfedge(not).twin;
        (0..surface.halfedge_count())
            .map(HalfEdgeId::new)
            .find(|&e| e != not && e != avoid)
            .unwrap()
    }

    #[test]
    fn test_broken_face_cycle() {
        let mut surface = unit_square();
        let face = surface.face(FaceId::new(0));
        let e0 = face.halfedges[0];
        let e2 = face.halfedges[2];
        surface.halfedge_mut(e0).next = e2;

        let err = surface.validate().unwrap_err();
        assert_eq!(kind_of(err), InvariantKind::FaceCycle);
    }

    #[test]
    fn test_swapped_face_vertices() {
        let mut surface = unit_square();
        surface.faces[0].vertices.swap(0, 1);

        let err = surface.validate().unwrap_err();
        assert_eq!(kind_of(err), InvariantKind::CornerHead);
    }

    #[test]
    fn test_duplicate_spoke() {
        let mut surface = unit_square();
        let dup = surface.vertices[0].spokes[0];
        surface.vertices[0].spokes.push(dup);

        let err = surface.validate().unwrap_err();
        assert_eq!(kind_of(err), InvariantKind::DuplicateSpoke);
    }

    #[test]
    fn test_bowtie_boundary_valence() {
        // Two triangles sharing only a single vertex: that vertex has
        // four boundary neighbors
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(-1.0, -1.0, 0.0),
        ];
        let surface = Surface::link(&vertices, &[[1, 2, 3], [1, 4, 5]]).unwrap();

        let err = surface.validate().unwrap_err();
        assert_eq!(kind_of(err), InvariantKind::BoundaryValence);
        match surface.validate().unwrap_err() {
            SurfaceError::InvariantViolation { entity, .. } => {
                assert_eq!(entity, Entity::Vertex(VertexId::new(0)));
            }
            other => panic!("expected invariant violation, got {}", other),
        }
    }

    #[test]
    fn test_closed_mesh_has_no_boundary() {
        let surface = tetrahedron();
        for i in 0..surface.vertex_count() {
            assert!(!surface.is_boundary_vertex(VertexId::new(i)));
        }
        assert_eq!(surface.halfedge_count(), 12);
    }
}
