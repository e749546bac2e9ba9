// crates/nh_engine/tests/driver_loop.rs

//! 驱动循环集成测试
//!
//! 用最小模块组合检验外层循环的契约：
//!
//! - 子集窗口内 tick 数精确
//! - 模块图顺序对交换声明顺序不敏感
//! - 周期检查点与失败检查点
//! - tick 错误中止运行并上抛

use chrono::Duration;
use nh_engine::{
    Depend, EngineContext, FaceStore, FaceWrites, Module, Parallelism, Simulation, TickInfo,
};
use nh_foundation::config::ConfigTree;
use nh_foundation::error::{NhError, NhResult};
use nh_geo::geometry::Point3D;
use nh_geo::projection::MeshProjection;
use nh_io::CheckpointStore;
use nh_mesh::{Face, FaceInit, TriMesh};
use nh_met::{AsciiStationRecord, MetCoordinator};
use std::io::Write as _;
use std::path::Path;

// ============================================================================
// 测试辅助
// ============================================================================

fn flat_face(x: f64, z: f64) -> FaceInit {
    FaceInit {
        vertices: [
            Point3D::new(x, 0.0, z),
            Point3D::new(x + 1.0, 0.0, z),
            Point3D::new(x, 1.0, z),
        ],
        neighbors: [None; 3],
        is_ghost: false,
        vegetation: None,
    }
}

fn mesh(n: usize) -> TriMesh {
    TriMesh::from_parts(
        MeshProjection::Utm {
            zone: 11,
            south: false,
        },
        (0..n).map(|i| flat_face(i as f64 * 2.0, 100.0)).collect(),
    )
    .unwrap()
}

/// 10 天逐小时的单站数据
fn hourly_met(dir: &Path, days: usize) -> MetCoordinator {
    let path = dir.join("s.txt");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "datetime,t").unwrap();
    for h in 0..(days * 24) {
        writeln!(
            f,
            "2020-01-{:02} {:02}:00:00,{}",
            1 + h / 24,
            h % 24,
            h as f64 * 0.1
        )
        .unwrap();
    }
    MetCoordinator::from_ascii(
        vec![AsciiStationRecord {
            id: "s".to_string(),
            longitude: -117.0,
            latitude: 50.0,
            elevation: 0.0,
            path,
            filters: Vec::new(),
        }],
        0,
        MeshProjection::Utm {
            zone: 11,
            south: false,
        },
    )
    .unwrap()
}

/// 每 tick 自增计数并写入变量
struct Counter {
    provides: Vec<String>,
    count: std::sync::atomic::AtomicU64,
}

impl Counter {
    fn new(var: &str) -> Self {
        Self {
            provides: vec![var.to_string()],
            count: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

impl Module for Counter {
    fn name(&self) -> &str {
        "counter"
    }
    fn parallelism(&self) -> Parallelism {
        Parallelism::Domain
    }
    fn provides(&self) -> &[String] {
        &self.provides
    }
    fn run_domain(&self, store: &mut FaceStore, tick: &TickInfo) -> NhResult<()> {
        let c = self
            .count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;
        for i in 0..tick.mesh.n_faces() {
            store.set(i, &self.provides[0], c as f64);
        }
        Ok(())
    }
    fn checkpoint(&self, mesh: &TriMesh, sink: &mut CheckpointStore) -> NhResult<()> {
        let c = self.count.load(std::sync::atomic::Ordering::SeqCst) as f64;
        sink.put("counter:count", vec![c; mesh.n_faces()])
            .map_err(|e| NhError::io(e.to_string()))
    }
    fn load_checkpoint(&mut self, _mesh: &TriMesh, source: &CheckpointStore) -> NhResult<()> {
        let values = source
            .require("counter:count")
            .map_err(|e| NhError::invalid_input(e.to_string()))?;
        self.count
            .store(values[0] as u64, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

/// 在第 N 个 tick 失败
struct FailAt {
    provides: Vec<String>,
    fail_at: u64,
    seen: std::sync::atomic::AtomicU64,
}

impl Module for FailAt {
    fn name(&self) -> &str {
        "fail_at"
    }
    fn parallelism(&self) -> Parallelism {
        Parallelism::Data
    }
    fn provides(&self) -> &[String] {
        &self.provides
    }
    fn run_face(
        &self,
        face: &Face,
        _store: &FaceStore,
        _tick: &TickInfo,
        out: &mut FaceWrites,
    ) -> NhResult<()> {
        if face.id().0 == 0 {
            let n = self.seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            if n >= self.fail_at {
                return Err(NhError::insufficient_data(format!("{}", face.id())));
            }
        }
        out.set(&self.provides[0], 1.0)
    }
}

// ============================================================================
// 场景
// ============================================================================

#[test]
fn test_subset_gives_exact_tick_count() {
    let dir = tempfile::tempdir().unwrap();
    let met = hourly_met(dir.path(), 10);
    let modules: Vec<Box<dyn Module>> = vec![Box::new(Counter::new("step"))];
    let mut sim = Simulation::new(mesh(3), met, modules, &ConfigTree::empty()).unwrap();

    // 第 3 天起 3 整天：3·(86400/dt) + 1 个 tick
    let start = sim.met().start_time() + Duration::days(2);
    let end = start + Duration::days(3);
    sim.subset(start, end).unwrap();

    let summary = sim.run().unwrap();
    assert_eq!(summary.ticks, 3 * 24 + 1);
    assert_eq!(sim.store().get(0, "step").unwrap(), (3 * 24 + 1) as f64);
}

#[test]
fn test_full_window_runs_every_timestep() {
    let dir = tempfile::tempdir().unwrap();
    let met = hourly_met(dir.path(), 2);
    let expected = met.n_timesteps() as u64;
    let modules: Vec<Box<dyn Module>> = vec![Box::new(Counter::new("step"))];
    let mut sim = Simulation::new(mesh(2), met, modules, &ConfigTree::empty()).unwrap();
    let summary = sim.run().unwrap();
    assert_eq!(summary.ticks, expected);
}

#[test]
fn test_periodic_checkpoint_and_resume() {
    let dir = tempfile::tempdir().unwrap();
    let ck_dir = dir.path().join("ck");
    let cfg = ConfigTree::from_str(&format!(
        r#"{{"checkpoint": {{"interval": 5, "directory": "{}"}}}}"#,
        ck_dir.display()
    ))
    .unwrap();

    let met = hourly_met(dir.path(), 1);
    let modules: Vec<Box<dyn Module>> = vec![Box::new(Counter::new("step"))];
    let mut sim = Simulation::new(mesh(2), met, modules, &cfg).unwrap();
    sim.run().unwrap();

    let ck_path = ck_dir.join("checkpoint_00000005.nhck");
    assert!(ck_path.exists());

    // 从第 5 步的检查点恢复一个新实例
    let met2 = hourly_met(dir.path(), 1);
    let modules2: Vec<Box<dyn Module>> = vec![Box::new(Counter::new("step"))];
    let mut sim2 = Simulation::new(mesh(2), met2, modules2, &ConfigTree::empty()).unwrap();
    sim2.init().unwrap();
    sim2.load_checkpoint(&ck_path).unwrap();
    assert_eq!(sim2.completed_ticks(), 5);
}

#[test]
fn test_failure_checkpoint_written() {
    let dir = tempfile::tempdir().unwrap();
    let ck_dir = dir.path().join("ck");
    let cfg = ConfigTree::from_str(&format!(
        r#"{{"checkpoint": {{"on_failure": true, "directory": "{}"}}}}"#,
        ck_dir.display()
    ))
    .unwrap();

    let met = hourly_met(dir.path(), 1);
    let modules: Vec<Box<dyn Module>> = vec![
        Box::new(Counter::new("step")),
        Box::new(FailAt {
            provides: vec!["flag".to_string()],
            fail_at: 3,
            seen: std::sync::atomic::AtomicU64::new(0),
        }),
    ];
    let mut sim = Simulation::new(mesh(2), met, modules, &cfg).unwrap();
    let err = sim.run().unwrap_err();
    assert!(err.to_string().contains("face"));
    assert!(ck_dir.join("failure.nhck").exists());
}

#[test]
fn test_output_files_emitted() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("out");
    let cfg = ConfigTree::from_str(&format!(
        r#"{{"output": {{"interval": 12, "variables": ["step"], "directory": "{}"}}}}"#,
        out_dir.display()
    ))
    .unwrap();

    let met = hourly_met(dir.path(), 1);
    let modules: Vec<Box<dyn Module>> = vec![Box::new(Counter::new("step"))];
    let mut sim = Simulation::new(mesh(2), met, modules, &cfg).unwrap();
    sim.run().unwrap();

    assert!(out_dir.join("fields_00000012.vtu").exists());
    assert!(out_dir.join("fields_00000024.vtu").exists());
}

#[test]
fn test_unresolved_graph_fails_at_assembly() {
    struct Orphan {
        provides: Vec<String>,
        depends: Vec<Depend>,
    }
    impl Module for Orphan {
        fn name(&self) -> &str {
            "orphan"
        }
        fn parallelism(&self) -> Parallelism {
            Parallelism::Data
        }
        fn provides(&self) -> &[String] {
            &self.provides
        }
        fn depends(&self) -> &[Depend] {
            &self.depends
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let met = hourly_met(dir.path(), 1);
    let modules: Vec<Box<dyn Module>> = vec![Box::new(Orphan {
        provides: vec![],
        depends: vec![Depend::same("nowhere")],
    })];
    let err = Simulation::new(mesh(1), met, modules, &ConfigTree::empty()).unwrap_err();
    assert!(err.to_string().contains("nowhere"));
}

#[test]
fn test_engine_context_threaded_from_config() {
    let cfg = ConfigTree::from_str(
        r#"{"interp_algorithm": "nn", "station_search_radius": 123.0}"#,
    )
    .unwrap();
    let ctx = EngineContext::from_config(&cfg).unwrap();
    assert_eq!(ctx.station_search_radius, 123.0);
}
