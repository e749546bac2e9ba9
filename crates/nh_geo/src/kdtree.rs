// crates/nh_geo/src/kdtree.rs

//! 站点空间索引
//!
//! 静态 2-D k-d 树，使用滑动中点（sliding midpoint）分割。
//! 构建一次后只读；站点集合变化（剪除站点）时整树重建。
//!
//! 支持两类查询：
//!
//! - 半径查询（模糊球）：返回距查询点不超过 `r` 的全部站点
//! - k 近邻查询：按当前度量距离返回最近的 `k` 个站点，
//!   距离相同时按插入顺序决定先后，保证结果确定
//!
//! 度量由网格坐标系决定（见 [`DistanceMetric`]）；大圆度量下的
//! 剪枝使用到边界经线/纬线圈的精确大圆距离作为下界，
//! 因此查询结果与暴力扫描一致。

use crate::distance::{DistanceMetric, EARTH_RADIUS_M};
use crate::geometry::Point2D;

/// 叶节点最大站点数
const LEAF_SIZE: usize = 8;

/// k-d 树节点
#[derive(Debug)]
enum KdNode {
    /// 叶节点：插入顺序索引列表
    Leaf { indices: Vec<u32> },
    /// 内部节点：分割维度与分割值
    ///
    /// 不变量：左子树所有点 `coord <= value`，右子树所有点 `coord >= value`。
    Split {
        dim: u8,
        value: f64,
        left: u32,
        right: u32,
    },
}

/// 站点空间索引
///
/// 索引按插入顺序持有点位置；查询返回插入顺序下标，
/// 由调用方映射回站点句柄。
#[derive(Debug)]
pub struct StationKdTree {
    points: Vec<Point2D>,
    nodes: Vec<KdNode>,
    root: Option<u32>,
    metric: DistanceMetric,
}

impl StationKdTree {
    /// 从点集批量构建
    #[must_use]
    pub fn build(points: Vec<Point2D>, metric: DistanceMetric) -> Self {
        let mut tree = Self {
            points,
            nodes: Vec::new(),
            root: None,
            metric,
        };
        if !tree.points.is_empty() {
            let all: Vec<u32> = (0..tree.points.len() as u32).collect();
            let root = tree.build_node(all);
            tree.root = Some(root);
        }
        tree
    }

    /// 索引中的站点数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 检查索引是否为空
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 使用的距离度量
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// 半径查询（模糊球）
    ///
    /// 返回距 `(x, y)` 不超过 `radius`（米）的站点插入顺序下标，
    /// 结果按插入顺序排序。
    #[must_use]
    pub fn query_within_distance(&self, center: &Point2D, radius: f64) -> Vec<usize> {
        let mut out = Vec::new();
        if let Some(root) = self.root {
            self.radius_recurse(root, center, radius, &mut out);
        }
        out.sort_unstable();
        out
    }

    /// k 近邻查询
    ///
    /// 返回按 (距离, 插入顺序) 升序排列的最多 `k` 个下标。
    #[must_use]
    pub fn query_nearest(&self, center: &Point2D, k: usize) -> Vec<usize> {
        if k == 0 || self.points.is_empty() {
            return Vec::new();
        }
        let mut heap: std::collections::BinaryHeap<Candidate> = std::collections::BinaryHeap::new();
        if let Some(root) = self.root {
            self.nearest_recurse(root, center, k, &mut heap);
        }
        let mut results = heap.into_vec();
        results.sort_unstable();
        results.into_iter().map(|c| c.index as usize).collect()
    }

    /// 迭代所有点（插入顺序）
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Point2D)> {
        self.points.iter().enumerate()
    }

    // ------------------------------------------------------------------
    // 构建
    // ------------------------------------------------------------------

    fn build_node(&mut self, indices: Vec<u32>) -> u32 {
        if indices.len() <= LEAF_SIZE {
            return self.push(KdNode::Leaf { indices });
        }

        // 包围盒与最长维度
        let (mut min, mut max) = ([f64::INFINITY; 2], [f64::NEG_INFINITY; 2]);
        for &i in &indices {
            let p = self.points[i as usize];
            for d in 0..2 {
                min[d] = min[d].min(p.coord(d));
                max[d] = max[d].max(p.coord(d));
            }
        }
        let ext = [max[0] - min[0], max[1] - min[1]];
        let dim = usize::from(ext[1] > ext[0]);
        if ext[dim] < 1e-12 {
            // 全部重合点，无法再分
            return self.push(KdNode::Leaf { indices });
        }

        // 滑动中点：中点分割若产生空侧，滑动到最近的点坐标
        let mut split = 0.5 * (min[dim] + max[dim]);
        let mut left: Vec<u32> = Vec::new();
        let mut right: Vec<u32> = Vec::new();
        for &i in &indices {
            if self.points[i as usize].coord(dim) < split {
                left.push(i);
            } else {
                right.push(i);
            }
        }

        if left.is_empty() {
            split = min[dim];
            left.clear();
            right.clear();
            for &i in &indices {
                if self.points[i as usize].coord(dim) <= split {
                    left.push(i);
                } else {
                    right.push(i);
                }
            }
        } else if right.is_empty() {
            split = max[dim];
            left.clear();
            right.clear();
            for &i in &indices {
                if self.points[i as usize].coord(dim) < split {
                    left.push(i);
                } else {
                    right.push(i);
                }
            }
        }

        let left_id = self.build_node(left);
        let right_id = self.build_node(right);
        self.push(KdNode::Split {
            dim: dim as u8,
            value: split,
            left: left_id,
            right: right_id,
        })
    }

    fn push(&mut self, node: KdNode) -> u32 {
        let id = self.nodes.len() as u32;
        self.nodes.push(node);
        id
    }

    // ------------------------------------------------------------------
    // 查询
    // ------------------------------------------------------------------

    /// 从查询点到分割平面另一侧区域的距离下界 [m]
    ///
    /// 平面度量下就是坐标差；大圆度量下为到边界经线圈/纬线圈的
    /// 精确大圆距离（经线圈: sin d = sin Δλ · cos φ；纬线圈: d = R·Δφ）。
    fn plane_lower_bound(&self, q: &Point2D, dim: u8, split: f64) -> f64 {
        let delta = (q.coord(dim as usize) - split).abs();
        match self.metric {
            DistanceMetric::Planar => delta,
            DistanceMetric::GreatCircle => {
                if dim == 1 {
                    delta.to_radians() * EARTH_RADIUS_M
                } else {
                    let s = delta.to_radians().sin().abs() * q.y.to_radians().cos();
                    s.min(1.0).asin() * EARTH_RADIUS_M
                }
            }
        }
    }

    fn radius_recurse(&self, node: u32, q: &Point2D, r: f64, out: &mut Vec<usize>) {
        match &self.nodes[node as usize] {
            KdNode::Leaf { indices } => {
                for &i in indices {
                    if self.metric.distance(q, &self.points[i as usize]) <= r {
                        out.push(i as usize);
                    }
                }
            }
            KdNode::Split {
                dim,
                value,
                left,
                right,
            } => {
                let lb = self.plane_lower_bound(q, *dim, *value);
                let on_left = q.coord(*dim as usize) < *value;
                let (near, far) = if on_left {
                    (*left, *right)
                } else {
                    (*right, *left)
                };
                self.radius_recurse(near, q, r, out);
                if lb <= r {
                    self.radius_recurse(far, q, r, out);
                }
            }
        }
    }

    fn nearest_recurse(
        &self,
        node: u32,
        q: &Point2D,
        k: usize,
        heap: &mut std::collections::BinaryHeap<Candidate>,
    ) {
        match &self.nodes[node as usize] {
            KdNode::Leaf { indices } => {
                for &i in indices {
                    let dist = self.metric.distance(q, &self.points[i as usize]);
                    let cand = Candidate { dist, index: i };
                    if heap.len() < k {
                        heap.push(cand);
                    } else if let Some(worst) = heap.peek() {
                        if cand < *worst {
                            heap.pop();
                            heap.push(cand);
                        }
                    }
                }
            }
            KdNode::Split {
                dim,
                value,
                left,
                right,
            } => {
                let on_left = q.coord(*dim as usize) < *value;
                let (near, far) = if on_left {
                    (*left, *right)
                } else {
                    (*right, *left)
                };
                self.nearest_recurse(near, q, k, heap);
                let lb = self.plane_lower_bound(q, *dim, *value);
                let must_visit = match heap.peek() {
                    Some(worst) if heap.len() >= k => lb <= worst.dist,
                    _ => true,
                };
                if must_visit {
                    self.nearest_recurse(far, q, k, heap);
                }
            }
        }
    }
}

/// k 近邻候选
///
/// 排序键为 (距离, 插入顺序)，使等距站点的取舍确定。
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    dist: f64,
    index: u32,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
