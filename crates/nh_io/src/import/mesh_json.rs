// crates/nh_io/src/import/mesh_json.rs

//! 网格 JSON 导入
//!
//! 核心引擎不构造网格，这里只做持久化格式到 [`TriMesh`] 的
//! 映射。面的存储顺序即运行时编号，逐位一致。
//!
//! # 文件格式
//!
//! ```json
//! {
//!     "projection": { "kind": "utm", "zone": 11, "south": false },
//!     "faces": [
//!         { "vertices": [[0,0,100],[1,0,100],[0,1,100]], "neighbors": [1, null, null] }
//!     ]
//! }
//! ```

use crate::error::ImportError;
use nh_geo::geometry::Point3D;
use nh_geo::projection::MeshProjection;
use nh_mesh::{FaceInit, TriMesh, VegAttributes};
use serde::Deserialize;
use std::path::Path;

/// 磁盘上的面布局（顶点写成三元组数组）
#[derive(Debug, Deserialize)]
struct FaceRecord {
    vertices: [[f64; 3]; 3],
    #[serde(default)]
    neighbors: [Option<usize>; 3],
    #[serde(default)]
    is_ghost: bool,
    #[serde(default)]
    vegetation: Option<VegAttributes>,
}

/// 磁盘上的网格布局
#[derive(Debug, Deserialize)]
struct MeshFile {
    projection: MeshProjection,
    faces: Vec<FaceRecord>,
}

/// 加载网格 JSON
pub fn load_mesh(path: &Path) -> Result<TriMesh, ImportError> {
    if !path.exists() {
        return Err(ImportError::MissingFile(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_mesh(&content, path)
}

/// 从字符串解析网格
pub fn parse_mesh(content: &str, path: &Path) -> Result<TriMesh, ImportError> {
    let file: MeshFile = serde_json::from_str(content).map_err(|e| ImportError::Format {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let inits: Vec<FaceInit> = file
        .faces
        .into_iter()
        .map(|r| FaceInit {
            vertices: [
                Point3D::new(r.vertices[0][0], r.vertices[0][1], r.vertices[0][2]),
                Point3D::new(r.vertices[1][0], r.vertices[1][1], r.vertices[1][2]),
                Point3D::new(r.vertices[2][0], r.vertices[2][1], r.vertices[2][2]),
            ],
            neighbors: r.neighbors,
            is_ghost: r.is_ghost,
            vegetation: r.vegetation,
        })
        .collect();

    TriMesh::from_parts(file.projection, inits).map_err(|e| ImportError::Format {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const MESH: &str = r#"{
        "projection": { "kind": "utm", "zone": 11, "south": false },
        "faces": [
            { "vertices": [[0,0,2],[1,0,2],[0,1,2]], "neighbors": [1, null, null] },
            { "vertices": [[1,0,1],[2,0,1],[1,1,1]], "neighbors": [0, null, null] }
        ]
    }"#;

    #[test]
    fn test_parse_mesh() {
        let mesh = parse_mesh(MESH, &PathBuf::from("<test>")).unwrap();
        assert_eq!(mesh.n_faces(), 2);
        assert!((mesh.face(0).z() - 2.0).abs() < 1e-12);
        assert_eq!(mesh.face(0).neighbor(0), Some(nh_mesh::FaceId(1)));
    }

    #[test]
    fn test_geographic_projection_tag() {
        let geo = MESH.replace(
            r#"{ "kind": "utm", "zone": 11, "south": false }"#,
            r#"{ "kind": "geographic" }"#,
        );
        let mesh = parse_mesh(&geo, &PathBuf::from("<test>")).unwrap();
        assert!(mesh.projection().is_geographic());
    }

    #[test]
    fn test_bad_json_rejected() {
        assert!(parse_mesh("{", &PathBuf::from("<test>")).is_err());
    }
}
