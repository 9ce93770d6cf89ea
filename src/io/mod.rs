//! Mesh file I/O.
//!
//! The core works on flat coordinate and index lists; this module is
//! the collaborator that moves those lists to and from disk. Only the
//! Wavefront OBJ format is spoken, and only its `v`/`f` subset.
//!
//! ```no_run
//! use trisurf::io;
//!
//! let mut surface = io::load("model.obj").unwrap();
//! surface.subdivide().unwrap();
//! io::save(&surface, "smooth.obj").unwrap();
//! ```

pub mod obj;

use std::path::Path;

use crate::error::{Result, SurfaceError};
use crate::mesh::Surface;

fn require_obj(path: &Path) -> Result<()> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("(none)");
    if extension.eq_ignore_ascii_case("obj") {
        Ok(())
    } else {
        Err(SurfaceError::UnsupportedFormat {
            extension: extension.to_string(),
        })
    }
}

/// Load and link a surface from a mesh file, dispatching on the
/// extension.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Surface> {
    let path = path.as_ref();
    require_obj(path)?;
    obj::load(path)
}

/// Save a surface to a mesh file, dispatching on the extension.
pub fn save<P: AsRef<Path>>(surface: &Surface, path: P) -> Result<()> {
    let path = path.as_ref();
    require_obj(path)?;
    obj::save(surface, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_extension() {
        let result = load("model.stl");
        assert!(matches!(
            result,
            Err(SurfaceError::UnsupportedFormat { extension }) if extension == "stl"
        ));
    }
}
