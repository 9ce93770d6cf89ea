//! Loop subdivision of a linked surface.
//!
//! One pass quadruples the face count: a new vertex is inserted on
//! every mesh edge and every original vertex is relocated to a weighted
//! average of its neighborhood (Loop, 1987). The pass runs in two
//! strictly ordered phases:
//!
//! 1. **Positions.** For every half-edge, the position of the vertex to
//!    insert at its midpoint; for every vertex, its smoothed position.
//!    Both read only the current generation, so no formula ever sees a
//!    half-moved neighbor.
//! 2. **Topology.** Every face is split into three corner faces plus a
//!    center face (the triforce), the split halves of twinned edges are
//!    re-twinned crosswise, the old half-edges and faces are discarded
//!    wholesale, and the original vertices move to their precomputed
//!    positions.
//!
//! Boundary edges and vertices use the boundary rules, so an open
//! surface keeps its rim: boundary edges split into boundary halves and
//! boundary vertices stay on the boundary.
//!
//! # Example
//!
//! ```
//! use trisurf::mesh::Surface;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//! ];
//! let mut surface = Surface::link(&vertices, &[[1, 2, 3], [2, 4, 3]]).unwrap();
//!
//! surface.subdivide().unwrap();
//! assert_eq!(surface.face_count(), 8);
//! ```

use std::collections::HashMap;
use std::f64::consts::PI;

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::error::{Result, SurfaceError};
use crate::mesh::{EdgeRole, Entity, Face, FaceId, HalfEdgeId, InvariantKind, Surface, VertexId};

/// Options for a subdivision pass.
#[derive(Debug, Clone)]
pub struct SubdivideOptions {
    /// Whether to evaluate smoothed vertex positions in parallel.
    /// Position evaluation only reads the prior generation, so it can
    /// fan out across vertices; the topology rebuild is always
    /// sequential.
    pub parallel: bool,
}

impl Default for SubdivideOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl SubdivideOptions {
    /// Set whether to evaluate vertex positions in parallel.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

/// Memoized Loop smoothing weights, keyed by vertex valence.
///
/// β is a pure function of the valence, so the cache is only a
/// performance shortcut. Each [`Surface`] owns its own cache rather
/// than sharing a process-wide one.
#[derive(Debug, Default)]
pub struct BetaCache {
    weights: HashMap<usize, f64>,
}

impl BetaCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The smoothing weight for the given valence, computing and
    /// memoizing it on first use.
    pub fn beta(&mut self, valence: usize) -> f64 {
        *self
            .weights
            .entry(valence)
            .or_insert_with(|| loop_beta(valence))
    }

    /// Read a memoized weight without computing missing ones.
    pub fn lookup(&self, valence: usize) -> Option<f64> {
        self.weights.get(&valence).copied()
    }
}

/// The Loop smoothing weight β for a vertex with `n` distinct
/// neighbors: `3/16` for valence 3, otherwise
/// `(1/n)·(5/8 − (3/8 + 1/4·cos(2π/n))²)`.
pub fn loop_beta(n: usize) -> f64 {
    if n == 3 {
        3.0 / 16.0
    } else {
        let n = n as f64;
        (1.0 / n) * (0.625 - (0.375 + 0.25 * (2.0 * PI / n).cos()).powi(2))
    }
}

impl Surface {
    /// Run one Loop subdivision pass with default options.
    ///
    /// Repeatable: each call replaces the face and half-edge
    /// collections with the next, four-times-finer generation.
    pub fn subdivide(&mut self) -> Result<()> {
        self.subdivide_with(&SubdivideOptions::default())
    }

    /// Run one Loop subdivision pass.
    ///
    /// Fails without touching the mesh if a boundary vertex does not
    /// have exactly two boundary neighbors, which means the input was
    /// not a 2-manifold surface.
    pub fn subdivide_with(&mut self, options: &SubdivideOptions) -> Result<()> {
        let old_edges = self.halfedges.len();
        let old_faces = self.faces.len();

        // Phase 1: smoothed positions for every current vertex, then
        // one edge point per undirected edge.
        let moved = self.smoothed_positions(options)?;
        for e in 0..old_edges {
            self.edge_point(HalfEdgeId::new(e));
        }

        // Phase 2: split every face into its four children.
        for f in 0..old_faces {
            self.split_face(FaceId::new(f));
        }

        // Re-twin the split halves across every original interior edge.
        for e in 0..old_edges {
            self.relink_halves(HalfEdgeId::new(e));
        }

        // Drop per-pass scratch and detach the original half-edges from
        // the vertices they used to connect.
        for e in 0..old_edges {
            self.cleanup_edge(HalfEdgeId::new(e));
        }

        // Relocate the original vertices in place.
        for (i, position) in moved.into_iter().enumerate() {
            let v = self.vertex_order[i];
            self.vertices[v.index()].position = position;
        }

        self.finish_pass(old_edges, old_faces);
        Ok(())
    }

    /// Compute the smoothed position of every vertex in the current
    /// flat list, in list order.
    fn smoothed_positions(&mut self, options: &SubdivideOptions) -> Result<Vec<Point3<f64>>> {
        // Warm the weight cache up front so the evaluation below can
        // read it without locking.
        let interior_valences: Vec<usize> = self
            .vertex_order
            .iter()
            .filter(|&&v| !self.is_boundary_vertex(v))
            .map(|&v| self.distinct_neighbors(v).len())
            .filter(|&n| n > 0)
            .collect();
        for n in interior_valences {
            self.betas.beta(n);
        }

        let this: &Surface = self;
        if options.parallel {
            this.vertex_order
                .par_iter()
                .map(|&v| this.smoothed_position(v))
                .collect()
        } else {
            this.vertex_order
                .iter()
                .map(|&v| this.smoothed_position(v))
                .collect()
        }
    }

    /// The position this vertex moves to at the end of the pass.
    fn smoothed_position(&self, v: VertexId) -> Result<Point3<f64>> {
        let position = self.vertex(v).position.coords;

        if self.is_boundary_vertex(v) {
            let ends = self.boundary_neighbors(v);
            if ends.len() != 2 {
                return Err(SurfaceError::InvariantViolation {
                    kind: InvariantKind::BoundaryValence,
                    entity: Entity::Vertex(v),
                });
            }
            let b1 = self.position(ends[0]).coords;
            let b2 = self.position(ends[1]).coords;
            Ok(Point3::from((b1 + b2 + position * 6.0) / 8.0))
        } else {
            let others = self.distinct_neighbors(v);
            if others.is_empty() {
                // An unreferenced vertex has nothing to average with
                return Ok(Point3::from(position));
            }
            let n = others.len();
            let beta = self.betas.lookup(n).unwrap_or_else(|| loop_beta(n));
            let sum: Vector3<f64> = others.iter().map(|&o| self.position(o).coords).sum();
            Ok(Point3::from(sum * beta + position * (1.0 - n as f64 * beta)))
        }
    }

    /// Choose the vertex to insert at this half-edge's midpoint.
    ///
    /// The calculation is symmetric with the twin, so if the twin
    /// already allocated its vertex the very same vertex is reused;
    /// both half-edges of an interior edge always agree on the shared
    /// new vertex.
    fn edge_point(&mut self, id: HalfEdgeId) {
        let (twin, head, tail, next) = {
            let e = self.halfedge(id);
            (e.twin, e.head, e.tail, e.next)
        };

        if twin.is_valid() {
            let shared = self.halfedge(twin).midpoint;
            if shared.is_valid() {
                self.halfedge_mut(id).midpoint = shared;
                return;
            }
        }

        let h = self.position(head).coords;
        let t = self.position(tail).coords;
        let position = if !twin.is_valid() {
            Point3::from((h + t) / 2.0)
        } else {
            // The third vertex of each adjoining triangle
            let o1 = self.position(self.halfedge(next).tail).coords;
            let twin_next = self.halfedge(twin).next;
            let o2 = self.position(self.halfedge(twin_next).tail).coords;
            Point3::from(((h + t) * 3.0 + o1 + o2) / 8.0)
        };

        let midpoint = self.push_vertex(position);
        self.halfedge_mut(id).midpoint = midpoint;
    }

    /// Split one face into three corner faces and a center face built
    /// from the corner faces' odd half-edges.
    fn split_face(&mut self, f: FaceId) {
        let edges = self.faces[f.index()].halfedges;

        let mut corners = [FaceId::invalid(); 3];
        for (i, &e) in edges.iter().enumerate() {
            corners[i] = self.split_corner(e);
        }

        let center = FaceId::new(self.faces.len());
        self.faces.push(Face::new([VertexId::invalid(); 3]));

        let mut rim = [HalfEdgeId::invalid(); 3];
        for (i, &corner) in corners.iter().enumerate() {
            let odd = self.faces[corner.index()].odd;
            rim[i] = self.opposite(odd, center);
        }
        for i in 0..3 {
            self.halfedge_mut(rim[i]).next = rim[(i + 1) % 3];
        }

        let heads = [
            self.halfedge(rim[0]).head,
            self.halfedge(rim[1]).head,
            self.halfedge(rim[2]).head,
        ];
        let face = &mut self.faces[center.index()];
        face.halfedges = rim;
        face.vertices = heads;
    }

    /// Build the corner face spanned by this half-edge's midpoint, its
    /// tail, and the following half-edge's midpoint.
    fn split_corner(&mut self, e: HalfEdgeId) -> FaceId {
        let (next, mid, tail) = {
            let edge = self.halfedge(e);
            (edge.next, edge.midpoint, edge.tail)
        };
        let next_mid = self.halfedge(next).midpoint;

        let f = FaceId::new(self.faces.len());
        self.faces.push(Face::new([mid, tail, next_mid]));

        let tail_half = self.push_halfedge(mid, tail, f, EdgeRole::TailHalf);
        let head_half = self.push_halfedge(tail, next_mid, f, EdgeRole::HeadHalf);
        let odd = self.push_halfedge(next_mid, mid, f, EdgeRole::Odd);

        self.halfedge_mut(e).tail_half = tail_half;
        self.halfedge_mut(next).head_half = head_half;

        self.halfedge_mut(tail_half).next = head_half;
        self.halfedge_mut(head_half).next = odd;
        self.halfedge_mut(odd).next = tail_half;

        let face = &mut self.faces[f.index()];
        face.halfedges = [tail_half, head_half, odd];
        face.odd = odd;
        f
    }

    /// Create the oppositely oriented mate of `e` belonging to face
    /// `f`, twinning the two.
    fn opposite(&mut self, e: HalfEdgeId, f: FaceId) -> HalfEdgeId {
        let (head, tail, left) = {
            let edge = self.halfedge(e);
            (edge.tail, edge.head, edge.left)
        };

        let opp = self.push_halfedge(head, tail, f, EdgeRole::Opposite);
        {
            let edge = self.halfedge_mut(opp);
            edge.right = left;
            edge.twin = e;
        }
        let edge = self.halfedge_mut(e);
        edge.twin = opp;
        edge.right = f;
        opp
    }

    /// This half-edge and its twin have each been split in two. Twin
    /// the corresponding halves: the child keeping this head spans the
    /// same segment as the child keeping the twin's tail, in the
    /// opposite direction. Each call links only its own children; the
    /// twin's own call completes the symmetry.
    fn relink_halves(&mut self, e: HalfEdgeId) {
        let twin = self.halfedge(e).twin;
        if !twin.is_valid() {
            return;
        }

        let (head_half, tail_half) = {
            let edge = self.halfedge(e);
            (edge.head_half, edge.tail_half)
        };
        let (twin_head_half, twin_tail_half) = {
            let edge = self.halfedge(twin);
            (edge.head_half, edge.tail_half)
        };

        let across = self.halfedge(twin_tail_half).left;
        {
            let edge = self.halfedge_mut(head_half);
            edge.twin = twin_tail_half;
            edge.right = across;
        }

        let across = self.halfedge(twin_head_half).left;
        let edge = self.halfedge_mut(tail_half);
        edge.twin = twin_head_half;
        edge.right = across;
    }

    /// Drop the split state and detach this half-edge from its
    /// endpoints; those vertices are now connected only through the
    /// finer half-edges.
    fn cleanup_edge(&mut self, e: HalfEdgeId) {
        let (head, tail) = {
            let edge = self.halfedge_mut(e);
            edge.clear_scratch();
            (edge.head, edge.tail)
        };
        self.vertex_mut(head).remove_spoke(e);
        self.vertex_mut(tail).remove_spoke(e);
    }

    /// Discard the old generation and rebase every stored id. The new
    /// half-edges and faces were appended after the old ones, so the
    /// rebase is a plain offset.
    fn finish_pass(&mut self, old_edges: usize, old_faces: usize) {
        self.halfedges.drain(..old_edges);
        self.faces.drain(..old_faces);

        let rebase_edge = |id: HalfEdgeId| HalfEdgeId::new(id.index() - old_edges);
        let rebase_face = |id: FaceId| FaceId::new(id.index() - old_faces);

        for edge in &mut self.halfedges {
            edge.left = rebase_face(edge.left);
            if edge.right.is_valid() {
                edge.right = rebase_face(edge.right);
            }
            if edge.twin.is_valid() {
                edge.twin = rebase_edge(edge.twin);
            }
            edge.next = rebase_edge(edge.next);
        }

        for face in &mut self.faces {
            for h in &mut face.halfedges {
                *h = rebase_edge(*h);
            }
            face.odd = HalfEdgeId::invalid();
        }

        // Old spokes were removed during cleanup; only new ids remain
        for vertex in &mut self.vertices {
            for s in &mut vertex.spokes {
                *s = rebase_edge(*s);
            }
        }

        self.rebuild_vertex_order();
        self.assign_indices();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_triangle() -> Surface {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
        ];
        Surface::link(&vertices, &[[1, 2, 3]]).unwrap()
    }

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

    #[test]
    fn test_beta_weights() {
        assert_eq!(loop_beta(3), 0.1875);
        // Valence 6 closes to exactly 1/16: cos(π/3) = 1/2
        assert!((loop_beta(6) - 0.0625).abs() < 1e-12);
        // The general formula stays positive for plausible valences
        for n in 4..20 {
            assert!(loop_beta(n) > 0.0 && loop_beta(n) < 0.2);
        }
    }

    #[test]
    fn test_beta_cache() {
        let mut cache = BetaCache::new();
        assert_eq!(cache.lookup(6), None);

        let first = cache.beta(6);
        assert_eq!(cache.lookup(6), Some(first));
        assert_eq!(cache.beta(6), first);
        assert_eq!(cache.weights.len(), 1);
    }

    #[test]
    fn test_single_triangle_one_pass() {
        let mut surface = single_triangle();
        surface.subdivide().unwrap();

        assert_eq!(surface.face_count(), 4);
        // 3 originals + 3 edge points
        assert_eq!(surface.vertex_count(), 6);
        assert_eq!(surface.halfedge_count(), 12);
        surface.validate().unwrap();
    }

    #[test]
    fn test_unit_square_scenario() {
        let mut surface = unit_square();
        surface.validate().unwrap();

        surface.subdivide().unwrap();
        assert_eq!(surface.face_count(), 8);
        surface.validate().unwrap();

        surface.subdivide().unwrap();
        assert_eq!(surface.face_count(), 32);
        surface.validate().unwrap();
    }

    #[test]
    fn test_twins_share_edge_point() {
        // 4 original vertices and 5 undirected edges: exactly 9
        // vertices after one pass, which requires the two half-edges of
        // the diagonal to have agreed on a single new vertex
        let mut surface = unit_square();
        surface.subdivide().unwrap();
        assert_eq!(surface.vertex_count(), 9);
        assert_eq!(surface.halfedge_count(), 24);
    }

    #[test]
    fn test_face_count_quadruples() {
        let mut surface = tetrahedron();
        for pass in 1..=3 {
            surface.subdivide().unwrap();
            assert_eq!(surface.face_count(), 4 * 4usize.pow(pass));
            surface.validate().unwrap();
        }
    }

    #[test]
    fn test_closed_mesh_stays_closed() {
        let mut surface = tetrahedron();
        surface.subdivide().unwrap();

        for e in &surface.halfedges {
            assert!(!e.is_boundary());
        }
        // V - E + F = 2 for a sphere-like surface
        let euler = surface.vertex_count() as i64 - (surface.halfedge_count() / 2) as i64
            + surface.face_count() as i64;
        assert_eq!(euler, 2);
    }

    #[test]
    fn test_boundary_edges_double() {
        let mut surface = unit_square();

        let boundary = |s: &Surface| s.halfedges.iter().filter(|e| e.is_boundary()).count();
        assert_eq!(boundary(&surface), 4);

        surface.subdivide().unwrap();
        assert_eq!(boundary(&surface), 8);

        surface.subdivide().unwrap();
        assert_eq!(boundary(&surface), 16);
    }

    #[test]
    fn test_boundary_vertices_stay_boundary() {
        let mut surface = unit_square();
        surface.subdivide().unwrap();

        // The four original corners kept their identity
        for v in 0..4 {
            assert!(surface.is_boundary_vertex(VertexId::new(v)));
        }
    }

    #[test]
    fn test_boundary_edge_point_is_midpoint() {
        let mut surface = single_triangle();
        surface.subdivide().unwrap();

        // Boundary edge points are plain midpoints, so the bottom edge
        // of the triangle gains a vertex at (0.5, 0, 0)
        let expected = Point3::new(0.5, 0.0, 0.0);
        assert!(surface
            .vertices
            .iter()
            .any(|v| (v.position - expected).norm() < 1e-12));
    }

    #[test]
    fn test_interior_edge_point_position() {
        // Two triangles sharing the edge between the first two
        // vertices; the interior rule weighs the shared edge's ends by
        // 3/8 and the two opposite corners by 1/8:
        // 3/8·((0,0,0) + (2,0,0)) + 1/8·((1,2,0) + (1,-2,0)) = (1,0,0)
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(1.0, -2.0, 0.0),
        ];
        let mut surface = Surface::link(&vertices, &[[1, 2, 3], [2, 1, 4]]).unwrap();
        surface.subdivide().unwrap();

        let expected = Point3::new(1.0, 0.0, 0.0);
        assert!(surface
            .vertices
            .iter()
            .any(|v| (v.position - expected).norm() < 1e-12));
    }

    #[test]
    fn test_boundary_vertex_rule() {
        // Corner (0,0,0) of the square has boundary neighbors (1,0,0)
        // and (0,1,0): new position = (b1 + b2 + 6·v) / 8 = (1/8, 1/8, 0)
        let mut surface = unit_square();
        surface.subdivide().unwrap();

        let moved = surface.vertices[0].position;
        assert!((moved - Point3::new(0.125, 0.125, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_interior_vertices_shrink_into_hull() {
        let mut surface = tetrahedron();

        let originals: Vec<Point3<f64>> =
            (0..4).map(|i| surface.vertices[i].position).collect();
        let centroid: Vector3<f64> =
            originals.iter().map(|p| p.coords).sum::<Vector3<f64>>() / 4.0;

        surface.subdivide().unwrap();

        // Every relocated original vertex stays inside the hull of
        // itself and its prior neighbors (here: the whole tetrahedron),
        // so it moves strictly toward the centroid
        for (i, original) in originals.iter().enumerate() {
            let moved = surface.vertices[i].position;
            let before = (original.coords - centroid).norm();
            let after = (moved.coords - centroid).norm();
            assert!(after < before);
        }
    }

    #[test]
    fn test_vertex_counts_grow_by_edge_count() {
        let mut surface = tetrahedron();
        // 4 faces, 12 half-edges, all interior: 6 undirected edges
        surface.subdivide().unwrap();
        assert_eq!(surface.vertex_count(), 4 + 6);

        // Generation two: 16 faces, 48 half-edges, 24 undirected edges
        surface.subdivide().unwrap();
        assert_eq!(surface.vertex_count(), 10 + 24);
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let mut parallel = tetrahedron();
        let mut sequential = tetrahedron();

        parallel
            .subdivide_with(&SubdivideOptions::default())
            .unwrap();
        sequential
            .subdivide_with(&SubdivideOptions::default().sequential())
            .unwrap();

        let (pv, pf) = parallel.export_mesh();
        let (sv, sf) = sequential.export_mesh();
        assert_eq!(pv, sv);
        assert_eq!(pf, sf);
    }

    #[test]
    fn test_bowtie_vertex_fails() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(-1.0, -1.0, 0.0),
        ];
        let mut surface = Surface::link(&vertices, &[[1, 2, 3], [1, 4, 5]]).unwrap();

        let err = surface.subdivide().unwrap_err();
        match err {
            SurfaceError::InvariantViolation { kind, entity } => {
                assert_eq!(kind, InvariantKind::BoundaryValence);
                assert_eq!(entity, Entity::Vertex(VertexId::new(0)));
            }
            other => panic!("expected invariant violation, got {}", other),
        }
    }

    #[test]
    fn test_stats_track_growth() {
        let mut surface = unit_square();
        surface.subdivide().unwrap();

        let stats = surface.stats();
        assert_eq!(stats.initial.faces, 2);
        assert_eq!(stats.initial.vertices, 4);
        assert_eq!(stats.initial.edges, 6);
        assert_eq!(stats.current.faces, 8);
        assert_eq!(stats.current.vertices, 9);
        assert_eq!(stats.current.edges, 24);
    }
}
