// crates/nh_mesh/src/lib.rs

//! NivaHydro 网格层
//!
//! 非结构三角网格的只读拓扑与几何访问。核心引擎不构造网格，
//! 只消费它：面的排序在整个运行期间稳定，`face(i)` 总是返回
//! 同一个句柄。
//!
//! - [`face`]: 面句柄（几何、邻居槽位、ghost 标志、植被属性）
//! - [`mesh`]: [`TriMesh`] 容器与邻居对称性验证

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod face;
pub mod mesh;

pub use face::{Face, FaceId, FaceInit, VegAttributes};
pub use mesh::TriMesh;
