// crates/nh_mesh/src/mesh.rs

//! 三角网格容器
//!
//! [`TriMesh`] 持有全部面并提供只读访问。构造时验证邻居
//! 对称性：凡两侧都存在的邻接关系必须互指。

use crate::face::{Face, FaceId, FaceInit};
use nh_foundation::error::{NhError, NhResult};
use nh_geo::projection::MeshProjection;

/// 非结构三角网格（只读）
///
/// 面按加载顺序稳定编号；引擎消费网格，不修改它。
#[derive(Debug)]
pub struct TriMesh {
    faces: Vec<Face>,
    projection: MeshProjection,
}

impl TriMesh {
    /// 从构造描述建立网格
    ///
    /// # 错误
    ///
    /// - 邻居索引越界
    /// - 邻居关系不对称（a 指向 b 但 b 不指回 a）
    pub fn from_parts(projection: MeshProjection, inits: Vec<FaceInit>) -> NhResult<Self> {
        let n = inits.len();
        for (i, init) in inits.iter().enumerate() {
            for neigh in init.neighbors.iter().flatten() {
                if *neigh >= n {
                    return Err(NhError::invalid_input(format!(
                        "face {}: neighbor index {} out of range ({} faces)",
                        i, neigh, n
                    )));
                }
                if *neigh == i {
                    return Err(NhError::invalid_input(format!(
                        "face {} lists itself as neighbor",
                        i
                    )));
                }
            }
        }

        // 对称性：a 的邻居 b 必须把 a 列为自己的邻居
        for (i, init) in inits.iter().enumerate() {
            for neigh in init.neighbors.iter().flatten() {
                let back = inits[*neigh].neighbors.iter().flatten().any(|&m| m == i);
                if !back {
                    return Err(NhError::invalid_input(format!(
                        "asymmetric neighbor relation: face {} -> face {}",
                        i, neigh
                    )));
                }
            }
        }

        let faces = inits
            .iter()
            .enumerate()
            .map(|(i, init)| Face::from_init(FaceId(i), init))
            .collect();

        Ok(Self { faces, projection })
    }

    /// 面数量
    #[inline]
    #[must_use]
    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    /// 按索引取面句柄
    ///
    /// 面排序在整个运行期间稳定：同一索引总是返回同一句柄。
    ///
    /// # Panics
    ///
    /// 索引越界时 panic；调用方应使用 `0..n_faces()`。
    #[inline]
    #[must_use]
    pub fn face(&self, i: usize) -> &Face {
        &self.faces[i]
    }

    /// 按 id 取面句柄
    #[inline]
    #[must_use]
    pub fn face_by_id(&self, id: FaceId) -> &Face {
        &self.faces[id.0]
    }

    /// 取面的第 `slot` 个邻居句柄
    #[inline]
    #[must_use]
    pub fn neighbor(&self, face: &Face, slot: usize) -> Option<&Face> {
        face.neighbor(slot).map(|id| &self.faces[id.0])
    }

    /// 网格参考系
    #[inline]
    #[must_use]
    pub fn projection(&self) -> MeshProjection {
        self.projection
    }

    /// 迭代所有面
    pub fn iter_faces(&self) -> impl Iterator<Item = &Face> {
        self.faces.iter()
    }
}
