//! Wavefront OBJ support, limited to the `v` and `f` commands.
//!
//! Every other command (normals, texture coordinates, groups,
//! materials, comments) is ignored on input and never produced on
//! output. Face entries may carry `/`-separated attribute suffixes;
//! only the leading vertex index is used.

use std::fs;
use std::path::Path;

use nalgebra::Point3;

use crate::error::{Result, SurfaceError};
use crate::mesh::Surface;

/// Load a surface from an OBJ file.
///
/// # Example
///
/// ```no_run
/// use trisurf::io::obj;
///
/// let surface = obj::load("model.obj").unwrap();
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> Result<Surface> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let (vertices, faces) = parse(&text).map_err(|message| SurfaceError::LoadError {
        path: path.to_path_buf(),
        message,
    })?;
    Surface::link(&vertices, &faces)
}

/// Save a surface to an OBJ file.
pub fn save<P: AsRef<Path>>(surface: &Surface, path: P) -> Result<()> {
    fs::write(path, render(surface))?;
    Ok(())
}

/// Parse the `v`/`f` subset of an OBJ document into a coordinate list
/// and a list of 1-based index triples.
pub fn parse(text: &str) -> std::result::Result<(Vec<Point3<f64>>, Vec<[usize; 3]>), String> {
    let mut vertices = Vec::new();
    let mut faces = Vec::new();

    for (number, line) in text.lines().enumerate() {
        let number = number + 1;
        let mut fields = line.split_whitespace();
        match fields.next() {
            Some("v") => {
                let mut coords = [0.0; 3];
                for c in &mut coords {
                    let field = fields
                        .next()
                        .ok_or_else(|| format!("line {}: vertex needs 3 coordinates", number))?;
                    *c = field
                        .parse()
                        .map_err(|_| format!("line {}: bad coordinate {:?}", number, field))?;
                }
                vertices.push(Point3::new(coords[0], coords[1], coords[2]));
            }
            Some("f") => {
                let mut indices = [0usize; 3];
                for i in &mut indices {
                    let field = fields
                        .next()
                        .ok_or_else(|| format!("line {}: face needs 3 vertices", number))?;
                    // "7/1/3" style references: the vertex index leads
                    let lead = field.split('/').next().unwrap_or(field);
                    *i = lead
                        .parse()
                        .map_err(|_| format!("line {}: bad vertex index {:?}", number, field))?;
                }
                if fields.next().is_some() {
                    return Err(format!("line {}: only triangles are supported", number));
                }
                faces.push(indices);
            }
            _ => {}
        }
    }

    Ok((vertices, faces))
}

/// Render a surface as an OBJ document with `v` lines in output-index
/// order followed by `f` lines in face order.
pub fn render(surface: &Surface) -> String {
    let (vertices, faces) = surface.export_mesh();

    let mut out = String::new();
    for v in &vertices {
        out.push_str(&format!("v {} {} {}\n", v.x, v.y, v.z));
    }
    for f in &faces {
        out.push_str(&format!("f {} {} {}\n", f[0], f[1], f[2]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = "\
# a unit square
v 0 0 0
v 1 0 0
v 0 1 0
v 1 1 0
f 1 2 3
f 2 4 3
";

    #[test]
    fn test_parse_square() {
        let (vertices, faces) = parse(SQUARE).unwrap();
        assert_eq!(vertices.len(), 4);
        assert_eq!(vertices[1], Point3::new(1.0, 0.0, 0.0));
        assert_eq!(faces, vec![[1, 2, 3], [2, 4, 3]]);
    }

    #[test]
    fn test_ignores_other_commands() {
        let text = "vn 0 0 1\nvt 0.5 0.5\ng top\nv 1 2 3\nusemtl none\nf 1/1/1 1/2/1 1/3/1\n";
        let (vertices, faces) = parse(text).unwrap();
        assert_eq!(vertices.len(), 1);
        // Slash suffixes are stripped down to the vertex index
        assert_eq!(faces, vec![[1, 1, 1]]);
    }

    #[test]
    fn test_bad_coordinate() {
        let err = parse("v 0 zero 0\n").unwrap_err();
        assert!(err.contains("line 1"));
    }

    #[test]
    fn test_short_face() {
        assert!(parse("f 1 2\n").is_err());
    }

    #[test]
    fn test_quad_face_rejected() {
        assert!(parse("f 1 2 3 4\n").is_err());
    }

    #[test]
    fn test_render_roundtrip() {
        let (vertices, faces) = parse(SQUARE).unwrap();
        let surface = Surface::link(&vertices, &faces).unwrap();

        let text = render(&surface);
        let (again_vertices, again_faces) = parse(&text).unwrap();
        assert_eq!(again_vertices, vertices);
        assert_eq!(again_faces, faces);
    }

    #[test]
    fn test_render_shape() {
        let (vertices, faces) = parse(SQUARE).unwrap();
        let surface = Surface::link(&vertices, &faces).unwrap();

        let text = render(&surface);
        assert!(text.starts_with("v 0 0 0\n"));
        assert!(text.ends_with("f 2 4 3\n"));
    }
}
