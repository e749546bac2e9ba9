// crates/nh_io/src/exporters/vtu.rs

//! VTU 导出
//!
//! 将三角网格与一组面变量写成 VTK XML UnstructuredGrid（ASCII），
//! 供 ParaView 等工具检视。每个面输出为一个独立三角形单元，
//! 顶点不做共享去重。

use nh_foundation::error::{NhError, NhResult};
use nh_mesh::TriMesh;
use std::io::Write;
use std::path::Path;

/// VTK 三角形单元类型编号
const VTK_TRIANGLE: u8 = 5;

/// 写出网格与面变量
///
/// `fields` 是 (变量名, 每面值) 的列表；所有数组长度必须等于面数。
pub fn write_vtu(path: &Path, mesh: &TriMesh, fields: &[(&str, &[f64])]) -> NhResult<()> {
    let n_faces = mesh.n_faces();
    for (name, values) in fields {
        if values.len() != n_faces {
            return Err(NhError::size_mismatch("vtu field", n_faces, values.len()));
        }
        if name.is_empty() {
            return Err(NhError::invalid_input("empty vtu field name"));
        }
    }

    let file = std::fs::File::create(path)
        .map_err(|e| NhError::io_with_source(format!("create {}", path.display()), e))?;
    let mut w = std::io::BufWriter::new(file);

    let n_points = n_faces * 3;
    writeln!(w, r#"<?xml version="1.0"?>"#)?;
    writeln!(
        w,
        r#"<VTKFile type="UnstructuredGrid" version="0.1" byte_order="LittleEndian">"#
    )?;
    writeln!(w, "  <UnstructuredGrid>")?;
    writeln!(
        w,
        r#"    <Piece NumberOfPoints="{}" NumberOfCells="{}">"#,
        n_points, n_faces
    )?;

    // 顶点
    writeln!(w, "      <Points>")?;
    writeln!(
        w,
        r#"        <DataArray type="Float64" NumberOfComponents="3" format="ascii">"#
    )?;
    for face in mesh.iter_faces() {
        for v in face.vertices() {
            writeln!(w, "          {} {} {}", v.x, v.y, v.z)?;
        }
    }
    writeln!(w, "        </DataArray>")?;
    writeln!(w, "      </Points>")?;

    // 单元
    writeln!(w, "      <Cells>")?;
    writeln!(
        w,
        r#"        <DataArray type="Int64" Name="connectivity" format="ascii">"#
    )?;
    for i in 0..n_faces {
        let base = i * 3;
        writeln!(w, "          {} {} {}", base, base + 1, base + 2)?;
    }
    writeln!(w, "        </DataArray>")?;
    writeln!(
        w,
        r#"        <DataArray type="Int64" Name="offsets" format="ascii">"#
    )?;
    for i in 0..n_faces {
        writeln!(w, "          {}", (i + 1) * 3)?;
    }
    writeln!(w, "        </DataArray>")?;
    writeln!(
        w,
        r#"        <DataArray type="UInt8" Name="types" format="ascii">"#
    )?;
    for _ in 0..n_faces {
        writeln!(w, "          {}", VTK_TRIANGLE)?;
    }
    writeln!(w, "        </DataArray>")?;
    writeln!(w, "      </Cells>")?;

    // 面变量
    writeln!(w, "      <CellData>")?;
    for (name, values) in fields {
        writeln!(
            w,
            r#"        <DataArray type="Float64" Name="{}" format="ascii">"#,
            name
        )?;
        for v in *values {
            writeln!(w, "          {}", v)?;
        }
        writeln!(w, "        </DataArray>")?;
    }
    writeln!(w, "      </CellData>")?;

    writeln!(w, "    </Piece>")?;
    writeln!(w, "  </UnstructuredGrid>")?;
    writeln!(w, "</VTKFile>")?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nh_geo::geometry::Point3D;
    use nh_geo::projection::MeshProjection;
    use nh_mesh::FaceInit;

    fn two_face_mesh() -> TriMesh {
        let tri = |x: f64, z: f64, n: [Option<usize>; 3]| FaceInit {
            vertices: [
                Point3D::new(x, 0.0, z),
                Point3D::new(x + 1.0, 0.0, z),
                Point3D::new(x, 1.0, z),
            ],
            neighbors: n,
            is_ghost: false,
            vegetation: None,
        };
        TriMesh::from_parts(
            MeshProjection::Utm {
                zone: 11,
                south: false,
            },
            vec![
                tri(0.0, 2.0, [Some(1), None, None]),
                tri(1.0, 1.0, [Some(0), None, None]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_write_vtu() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.vtu");
        let mesh = two_face_mesh();
        let t = [1.5, 2.5];
        write_vtu(&path, &mesh, &[("t", &t)]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains(r#"NumberOfCells="2""#));
        assert!(text.contains(r#"Name="t""#));
        assert!(text.contains("2.5"));
    }

    #[test]
    fn test_field_length_checked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.vtu");
        let mesh = two_face_mesh();
        let bad = [1.0];
        assert!(write_vtu(&path, &mesh, &[("t", &bad)]).is_err());
    }
}
