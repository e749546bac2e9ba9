// crates/nh_engine/src/graph.rs

//! 模块依赖图
//!
//! 顶点是模块描述符加上气象变量的合成顶点。当 v 依赖名字 n，
//! 且 u 提供 n（或 u 是 n 的气象合成顶点）时存在边 u → v。
//!
//! 解析规则：名字先解析到唯一的**模块**提供者；没有模块提供者
//! 而气象列出该名字时解析到气象顶点（保留温度分布模块提供 `t`
//! 而气象同样供应 `t` 观测的原语义）；两个模块提供同名变量是
//! `ambiguous-provider`，都没有是 `unresolved-dependency`。
//!
//! 拓扑排序确定：独立模块间按模块名破平。环致命。
//!
//! 批次是共享面并行标签且相互独立的模块的极大连续段；
//! 全域串行模块独占一个批次并终止前一批次。面并行模块的
//! 邻面依赖必须由更早批次（或气象）满足。

use crate::module::{Module, Parallelism, SpatialType};
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

/// 图构建错误（启动期致命）
#[derive(Debug, Error)]
pub enum GraphError {
    /// 模块名重复
    #[error("duplicate module name '{0}'")]
    DuplicateModule(String),

    /// 依赖没有提供者
    #[error("unresolved dependency: module '{module}' needs '{variable}'")]
    UnresolvedDependency {
        /// 消费模块
        module: String,
        /// 无提供者的变量
        variable: String,
    },

    /// 同一变量有多个模块提供者
    #[error("ambiguous provider for '{variable}': '{first}' and '{second}'")]
    AmbiguousProvider {
        /// 变量名
        variable: String,
        /// 先登记的提供者
        first: String,
        /// 后登记的提供者
        second: String,
    },

    /// 依赖环
    #[error("dependency cycle involving modules {0:?}")]
    Cycle(Vec<String>),

    /// 面并行模块的邻面依赖在同一批次内被提供
    #[error("module '{module}': neighbour dependency '{variable}' provided in same batch")]
    NeighbourRace {
        /// 消费模块
        module: String,
        /// 变量名
        variable: String,
    },
}

/// 一个执行批次
#[derive(Debug)]
pub struct Batch {
    /// 批内模块（声明序）
    pub modules: Vec<usize>,
    /// 批次并行度
    pub parallelism: Parallelism,
}

/// 已解析的模块图
#[derive(Debug)]
pub struct ModuleGraph {
    order: Vec<usize>,
    batches: Vec<Batch>,
    /// 变量名 → 模块提供者下标
    providers: HashMap<String, usize>,
}

impl ModuleGraph {
    /// 从模块表与气象变量表构建
    pub fn build(
        modules: &[Box<dyn Module>],
        met_variables: &BTreeSet<String>,
    ) -> Result<Self, GraphError> {
        let n = modules.len();

        // 模块名唯一
        let mut names: HashMap<&str, usize> = HashMap::with_capacity(n);
        for (i, m) in modules.iter().enumerate() {
            if names.insert(m.name(), i).is_some() {
                return Err(GraphError::DuplicateModule(m.name().to_string()));
            }
        }

        // 提供者解析：每个名字至多一个模块提供者
        let mut providers: HashMap<String, usize> = HashMap::new();
        for (i, m) in modules.iter().enumerate() {
            for p in m.provides() {
                if let Some(&prev) = providers.get(p) {
                    return Err(GraphError::AmbiguousProvider {
                        variable: p.clone(),
                        first: modules[prev].name().to_string(),
                        second: m.name().to_string(),
                    });
                }
                providers.insert(p.clone(), i);
            }
        }

        // 建边：提供者 → 消费者
        let mut succ: Vec<HashSet<usize>> = vec![HashSet::new(); n];
        let mut indegree = vec![0usize; n];
        for (i, m) in modules.iter().enumerate() {
            for dep in m.depends() {
                match providers.get(&dep.name) {
                    Some(&p) if p == i => {
                        // 模块依赖自己提供的名字构成自环
                        return Err(GraphError::Cycle(vec![m.name().to_string()]));
                    }
                    Some(&p) => {
                        if succ[p].insert(i) {
                            indegree[i] += 1;
                        }
                    }
                    None => {
                        if !met_variables.contains(&dep.name) {
                            return Err(GraphError::UnresolvedDependency {
                                module: m.name().to_string(),
                                variable: dep.name.clone(),
                            });
                        }
                        // 气象合成顶点满足，不影响模块间排序
                    }
                }
            }
            for dep in m.depends_from_met() {
                if !met_variables.contains(dep) {
                    return Err(GraphError::UnresolvedDependency {
                        module: m.name().to_string(),
                        variable: dep.clone(),
                    });
                }
            }
        }

        // Kahn 拓扑排序；就绪集按模块名取最小，保证确定性
        let mut order = Vec::with_capacity(n);
        let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        while !ready.is_empty() {
            let pos = (0..ready.len())
                .min_by_key(|&p| modules[ready[p]].name())
                .expect("non-empty");
            let current = ready.swap_remove(pos);
            order.push(current);
            for &next in &succ[current] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push(next);
                }
            }
        }
        if order.len() < n {
            let mut remaining: Vec<String> = (0..n)
                .filter(|&i| indegree[i] > 0)
                .map(|i| modules[i].name().to_string())
                .collect();
            remaining.sort_unstable();
            return Err(GraphError::Cycle(remaining));
        }

        // 批次划分
        let mut batches: Vec<Batch> = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        for &m in &order {
            match modules[m].parallelism() {
                Parallelism::Domain => {
                    if !current.is_empty() {
                        batches.push(Batch {
                            modules: std::mem::take(&mut current),
                            parallelism: Parallelism::Data,
                        });
                    }
                    batches.push(Batch {
                        modules: vec![m],
                        parallelism: Parallelism::Domain,
                    });
                }
                Parallelism::Data => {
                    let dependent = current.iter().any(|&b| succ[b].contains(&m));
                    if dependent {
                        batches.push(Batch {
                            modules: std::mem::take(&mut current),
                            parallelism: Parallelism::Data,
                        });
                    }
                    current.push(m);
                }
            }
        }
        if !current.is_empty() {
            batches.push(Batch {
                modules: current,
                parallelism: Parallelism::Data,
            });
        }

        let graph = Self {
            order,
            batches,
            providers,
        };
        graph.validate_neighbour_deps(modules)?;
        Ok(graph)
    }

    /// 验证面并行模块的邻面依赖由更早批次满足
    fn validate_neighbour_deps(&self, modules: &[Box<dyn Module>]) -> Result<(), GraphError> {
        let batch_of: HashMap<usize, usize> = self
            .batches
            .iter()
            .enumerate()
            .flat_map(|(bi, b)| b.modules.iter().map(move |&m| (m, bi)))
            .collect();

        for batch in &self.batches {
            if batch.parallelism != Parallelism::Data {
                continue;
            }
            for &m in &batch.modules {
                for dep in modules[m].depends() {
                    if dep.spatial != SpatialType::Neighbour {
                        continue;
                    }
                    if let Some(&p) = self.providers.get(&dep.name) {
                        if batch_of[&p] >= batch_of[&m] {
                            return Err(GraphError::NeighbourRace {
                                module: modules[m].name().to_string(),
                                variable: dep.name.clone(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// 执行顺序（模块下标）
    #[must_use]
    pub fn execution_order(&self) -> &[usize] {
        &self.order
    }

    /// 执行批次
    #[must_use]
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// 变量的模块提供者
    #[must_use]
    pub fn provider_of(&self, variable: &str) -> Option<usize> {
        self.providers.get(variable).copied()
    }
}
