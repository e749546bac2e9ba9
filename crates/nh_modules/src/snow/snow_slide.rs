// crates/nh_modules/src/snow/snow_slide.rs

//! 重力驱动的积雪再分配
//!
//! 按面高程加垂直雪深的键值降序遍历全域，把超出持雪上限的
//! 积雪按高差权重路由到更低的邻面。三种情形：
//!
//! 1. 边界面（任一邻居槽位为空或 ghost）：超出量直接移出域外，
//!    不沉积
//! 2. 内部汇（无更低邻居）：不路由，保持原状
//! 3. 内部面：权重归一化后路由，雪深换算经面积比保持体积
//!
//! 持雪上限在 `init` 参数化：
//! `maxDepth_norm = max(a·θ^b, 冠层高度)`，θ 为坡度（度，下限 10°），
//! `maxDepth_vert = maxDepth_norm · max(0.001, cos 坡度)`。
//!
//! **Depends:** `snowdepthavg`（邻面）、`swe`
//!
//! **Provides:** `delta_avalanche_snowdepth`、`delta_avalanche_mass`、`maxDepth`
//!
//! **Configuration keys:**
//! - `avalache_mult`（默认 3178.4）
//! - `avalache_pow`（默认 -1.998）
//! - `use_vertical_snow`（默认 true）
//! - `mass_balance_tolerance`（默认 1e-4 m³）
//!
//! 内部面的质量闭合在每次路由后检查；超差记 `warn` 日志，
//! 执行继续。ghost 面只读，不被写。

use nh_engine::{Depend, EngineContext, FaceStore, Module, Parallelism, TickInfo};
use nh_foundation::config::ConfigTree;
use nh_foundation::error::{NhError, NhResult};
use nh_io::CheckpointStore;
use nh_mesh::TriMesh;
use parking_lot::Mutex;
use rayon::prelude::*;

/// 每面的再分配状态
#[derive(Debug, Clone, Copy, Default)]
struct SlideState {
    /// 垂直于面法向的持雪上限 [m]
    max_depth_norm: f64,
    /// 铅直持雪上限 [m]
    max_depth_vert: f64,
    /// 本 tick 内可修改的雪深副本 [m]
    snowdepthavg_copy: f64,
    /// 铅直雪深副本 [m]
    snowdepthavg_vert_copy: f64,
    /// SWE 副本 [m]
    swe_copy: f64,
    /// 坡度 [rad]
    slope: f64,
    /// 雪深输运量 [m³]
    delta_avalanche_snowdepth: f64,
    /// SWE 输运量 [m³]
    delta_avalanche_mass: f64,
}

/// 重力积雪再分配模块
pub struct SnowSlide {
    provides: Vec<String>,
    depends: Vec<Depend>,
    use_vertical_snow: bool,
    avalache_mult: f64,
    avalache_pow: f64,
    mass_tolerance: f64,
    state: Mutex<Vec<SlideState>>,
}

impl SnowSlide {
    /// 从配置构造
    pub fn from_config(cfg: &ConfigTree) -> NhResult<Self> {
        Ok(Self {
            provides: vec![
                "delta_avalanche_mass".to_string(),
                "delta_avalanche_snowdepth".to_string(),
                "maxDepth".to_string(),
            ],
            depends: vec![Depend::neighbour("snowdepthavg"), Depend::same("swe")],
            use_vertical_snow: cfg.get("use_vertical_snow", true),
            avalache_mult: cfg.get("avalache_mult", 3178.4),
            avalache_pow: cfg.get("avalache_pow", -1.998),
            mass_tolerance: cfg.get("mass_balance_tolerance", 1e-4),
            state: Mutex::new(Vec::new()),
        })
    }
}

/// 铅直换算因子：cos 坡度的安全下限
#[inline]
fn vert_factor(slope: f64) -> f64 {
    slope.cos().max(0.001)
}

impl Module for SnowSlide {
    fn name(&self) -> &str {
        "snow_slide"
    }

    fn parallelism(&self) -> Parallelism {
        Parallelism::Domain
    }

    fn provides(&self) -> &[String] {
        &self.provides
    }

    fn depends(&self) -> &[Depend] {
        &self.depends
    }

    fn init(
        &mut self,
        mesh: &TriMesh,
        store: &mut FaceStore,
        _engine: &EngineContext,
    ) -> NhResult<()> {
        let mut state = Vec::with_capacity(mesh.n_faces());
        for i in 0..mesh.n_faces() {
            let face = mesh.face(i);
            let canopy = face
                .vegetation()
                .map_or(0.0, |veg| veg.canopy_height);

            // 坡度下限 10° 避免上限发散
            let slope_deg = (face.slope().to_degrees()).max(10.0);
            let max_norm = (self.avalache_mult * slope_deg.powf(self.avalache_pow)).max(canopy);
            let max_vert = max_norm * vert_factor(face.slope());

            state.push(SlideState {
                max_depth_norm: max_norm,
                max_depth_vert: max_vert,
                slope: face.slope(),
                ..SlideState::default()
            });
            store.set(i, "maxDepth", max_norm);
        }
        *self.state.lock() = state;
        Ok(())
    }

    fn run_domain(&self, store: &mut FaceStore, tick: &TickInfo) -> NhResult<()> {
        let mesh = tick.mesh;
        let n = mesh.n_faces();
        let mut state = self.state.lock();
        if state.len() != n {
            return Err(NhError::internal(
                "snow_slide state not initialized for this mesh",
            ));
        }

        // 快照阶段（面并行）：复制雪深/SWE、清零输运量、构造排序键
        let snowdepth = store.column("snowdepthavg")?;
        let swe = store.column("swe")?;
        let mut sorted_z: Vec<(f64, usize)> = vec![(0.0, 0); n];
        state
            .par_iter_mut()
            .zip(sorted_z.par_iter_mut())
            .enumerate()
            .for_each(|(i, (data, key))| {
                let face = mesh.face(i);
                data.snowdepthavg_copy = snowdepth[i];
                data.snowdepthavg_vert_copy = snowdepth[i] / vert_factor(face.slope());
                data.swe_copy = swe[i] / 1000.0; // mm → m
                data.slope = face.slope();
                data.delta_avalanche_snowdepth = 0.0;
                data.delta_avalanche_mass = 0.0;
                *key = (face.z() + data.snowdepthavg_vert_copy, i);
            });

        // 键值降序，面号升序破平；路由阶段必须单线程
        sorted_z.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        for &(_, idx) in &sorted_z {
            let face = mesh.face(idx);
            if face.is_ghost() {
                continue;
            }
            let cen_area = face.area();

            let data = state[idx];
            let max_depth = if self.use_vertical_snow {
                data.max_depth_vert
            } else {
                data.max_depth_norm
            };
            let snowdepthavg = data.snowdepthavg_copy;
            let snowdepthavg_vert = data.snowdepthavg_vert_copy;
            let swe_m = data.swe_copy;

            if snowdepthavg > max_depth {
                let del_depth = snowdepthavg - max_depth;
                let del_swe = swe_m * (1.0 - max_depth / snowdepthavg);
                let orig_mass = del_swe * cen_area;

                // 面高程加铅直雪深构成当前自由面
                let z_s = face.z() + snowdepthavg_vert;
                let mut w = [0.0f64; 3];
                let mut w_dem = 0.0;
                let mut edge_flag = false;

                for (slot, weight) in w.iter_mut().enumerate() {
                    match mesh.neighbor(face, slot) {
                        Some(n_face) if !n_face.is_ghost() => {
                            let n_data = &state[n_face.id().0];
                            *weight =
                                (z_s - (n_face.z() + n_data.snowdepthavg_vert_copy)).max(0.0);
                            w_dem += *weight;
                        }
                        _ => edge_flag = true,
                    }
                }

                if edge_flag {
                    // 边界面：超出量移出域外，不沉积
                    let data = &mut state[idx];
                    data.snowdepthavg_copy = max_depth;
                    data.swe_copy = swe_m * max_depth / snowdepthavg;
                    data.delta_avalanche_snowdepth -= del_depth * cen_area;
                    data.delta_avalanche_mass -= del_swe * cen_area;
                } else if w_dem == 0.0 {
                    // 内部汇：无更低邻居，不路由
                } else {
                    for weight in &mut w {
                        *weight /= w_dem;
                    }

                    let mut out_mass = 0.0;
                    for (slot, &weight) in w.iter().enumerate() {
                        if let Some(n_face) = mesh.neighbor(face, slot) {
                            if n_face.is_ghost() {
                                continue;
                            }
                            let n_area = n_face.area();
                            let n_data = &mut state[n_face.id().0];
                            // 面积比把源面的深度变化换算为邻面深度
                            n_data.snowdepthavg_copy += del_depth * (cen_area / n_area) * weight;
                            n_data.swe_copy += del_swe * (cen_area / n_area) * weight;
                            n_data.snowdepthavg_vert_copy =
                                n_data.snowdepthavg_copy / vert_factor(face.slope());

                            n_data.delta_avalanche_snowdepth += del_depth * cen_area * weight;
                            n_data.delta_avalanche_mass += del_swe * cen_area * weight;
                            out_mass += del_swe * cen_area * weight;
                        }
                    }

                    let data = &mut state[idx];
                    data.snowdepthavg_copy = max_depth;
                    data.snowdepthavg_vert_copy = data.snowdepthavg_copy / vert_factor(face.slope());
                    data.swe_copy = swe_m * max_depth / snowdepthavg;
                    data.delta_avalanche_snowdepth -= del_depth * cen_area;
                    data.delta_avalanche_mass -= del_swe * cen_area;

                    if (orig_mass - out_mass).abs() > self.mass_tolerance {
                        log::warn!(
                            "snow_slide: mass balance not conserved at {} (diff = {:.6e} m^3)",
                            face.id(),
                            orig_mass - out_mass
                        );
                    }
                }
            }

        }

        // 全部路由完成后一次性写回；循环中写会漏掉
        // 后处理面向先处理面的回传量
        for (i, data) in state.iter().enumerate() {
            if mesh.face(i).is_ghost() {
                continue;
            }
            store.set(i, "delta_avalanche_snowdepth", data.delta_avalanche_snowdepth);
            store.set(i, "delta_avalanche_mass", data.delta_avalanche_mass);
        }

        Ok(())
    }

    fn checkpoint(&self, mesh: &TriMesh, sink: &mut CheckpointStore) -> NhResult<()> {
        let state = self.state.lock();
        if state.len() != mesh.n_faces() {
            return Err(NhError::internal("snow_slide state not initialized"));
        }
        sink.put(
            "snow_slide:delta_avalanche_snowdepth",
            state.iter().map(|d| d.delta_avalanche_snowdepth).collect(),
        )
        .map_err(|e| NhError::io(e.to_string()))?;
        sink.put(
            "snow_slide:delta_avalanche_mass",
            state.iter().map(|d| d.delta_avalanche_mass).collect(),
        )
        .map_err(|e| NhError::io(e.to_string()))?;
        Ok(())
    }

    fn load_checkpoint(&mut self, mesh: &TriMesh, source: &CheckpointStore) -> NhResult<()> {
        let mut state = self.state.lock();
        if state.len() != mesh.n_faces() {
            return Err(NhError::internal(
                "snow_slide must be initialized before checkpoint load",
            ));
        }
        let depth = source
            .require("snow_slide:delta_avalanche_snowdepth")
            .map_err(|e| NhError::invalid_input(e.to_string()))?;
        let mass = source
            .require("snow_slide:delta_avalanche_mass")
            .map_err(|e| NhError::invalid_input(e.to_string()))?;
        for (i, data) in state.iter_mut().enumerate() {
            data.delta_avalanche_snowdepth = depth[i];
            data.delta_avalanche_mass = mass[i];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nh_geo::geometry::Point3D;
    use nh_geo::projection::MeshProjection;
    use nh_met::{AsciiStationRecord, MetCoordinator};
    use nh_mesh::FaceInit;
    use std::io::Write as _;

    /// 单位面积（约 1.3 m²）的水平三角形，面心在 (x, 0, z)
    fn flat_face(x: f64, z: f64, neighbors: [Option<usize>; 3]) -> FaceInit {
        let s = 3.0f64.sqrt() / 2.0;
        FaceInit {
            vertices: [
                Point3D::new(x + 1.0, 0.0, z),
                Point3D::new(x - 0.5, s, z),
                Point3D::new(x - 0.5, -s, z),
            ],
            neighbors,
            is_ghost: false,
            vegetation: None,
        }
    }

    /// 三面下降山脊：face0 (z=2) – face1 (z=1) – face2 (z=0)
    ///
    /// face0 与 face1 均有空邻居槽位，是边界面。
    fn ridge_mesh() -> TriMesh {
        TriMesh::from_parts(
            MeshProjection::Utm {
                zone: 11,
                south: false,
            },
            vec![
                flat_face(0.0, 2.0, [Some(1), None, None]),
                flat_face(3.0, 1.0, [Some(0), Some(2), None]),
                flat_face(6.0, 0.0, [Some(1), None, None]),
            ],
        )
        .unwrap()
    }

    /// 顶面 (z=2) 三槽位齐全：centre/bottom (z=0) 在下，aux (z=10) 在上
    fn interior_top_mesh() -> TriMesh {
        TriMesh::from_parts(
            MeshProjection::Utm {
                zone: 11,
                south: false,
            },
            vec![
                flat_face(0.0, 2.0, [Some(1), Some(2), Some(3)]),
                flat_face(3.0, 0.0, [Some(0), None, None]),
                flat_face(6.0, 0.0, [Some(0), None, None]),
                flat_face(9.0, 10.0, [Some(0), None, None]),
            ],
        )
        .unwrap()
    }

    fn dummy_met(dir: &std::path::Path) -> MetCoordinator {
        let path = dir.join("s.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "datetime,t").unwrap();
        writeln!(f, "2020-01-01 00:00:00,0").unwrap();
        writeln!(f, "2020-01-01 01:00:00,0").unwrap();
        let mut met = MetCoordinator::from_ascii(
            vec![AsciiStationRecord {
                id: "s".to_string(),
                longitude: -117.0,
                latitude: 0.0,
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
        .unwrap();
        met.next().unwrap();
        met
    }

    /// maxDepth = 1 m 的配置（幂为 0，系数即上限）
    fn unit_max_depth() -> ConfigTree {
        ConfigTree::from_str(
            r#"{"avalache_mult": 1.0, "avalache_pow": 0.0, "use_vertical_snow": true}"#,
        )
        .unwrap()
    }

    fn run_slide(
        mesh: &TriMesh,
        met: &MetCoordinator,
        depths: &[f64],
        swe_mm: &[f64],
    ) -> (FaceStore, SnowSlide) {
        let mut module = SnowSlide::from_config(&unit_max_depth()).unwrap();
        let mut store = FaceStore::new(mesh.n_faces());
        let engine = EngineContext::default();
        for (i, (&d, &s)) in depths.iter().zip(swe_mm).enumerate() {
            store.set(i, "snowdepthavg", d);
            store.set(i, "swe", s);
        }
        module.init(mesh, &mut store, &engine).unwrap();
        let tick = TickInfo {
            mesh,
            met,
            time: met.current_time(),
            engine: &engine,
        };
        module.run_domain(&mut store, &tick).unwrap();
        (store, module)
    }

    #[test]
    fn test_interior_routing_conserves_mass() {
        let dir = tempfile::tempdir().unwrap();
        let met = dummy_met(dir.path());
        let mesh = interior_top_mesh();

        // 顶面雪深 2 m，上限 1 m → 1 m 超出量路由给两个更低邻居；
        // 接收面仍在上限之下，不发生二次崩塌
        let (store, _) = run_slide(
            &mesh,
            &met,
            &[2.0, 0.0, 0.0, 0.0],
            &[1000.0, 0.0, 0.0, 0.0],
        );

        let d0 = store.get(0, "delta_avalanche_mass").unwrap();
        let d1 = store.get(1, "delta_avalanche_mass").unwrap();
        let d2 = store.get(2, "delta_avalanche_mass").unwrap();
        let d3 = store.get(3, "delta_avalanche_mass").unwrap();

        // 顶面失去的质量全部到达邻面（域内守恒）
        assert!(d0 < 0.0);
        assert!(
            (d0 + d1 + d2 + d3).abs() < 1e-6,
            "sum = {}",
            d0 + d1 + d2 + d3
        );

        // centre 与 bottom 同高程，等分超出量；aux 更高，权重为 0
        assert!((d1 - d2).abs() < 1e-12);
        assert!(d1 > 0.0);
        assert_eq!(d3, 0.0);

        // 雪深输运量同样守恒
        let s: f64 = (0..4)
            .map(|i| store.get(i, "delta_avalanche_snowdepth").unwrap())
            .sum();
        assert!(s.abs() < 1e-6);
    }

    #[test]
    fn test_edge_face_mass_leaves_domain() {
        let dir = tempfile::tempdir().unwrap();
        let met = dummy_met(dir.path());
        let mesh = ridge_mesh();

        // 顶面（有空邻居槽位）超限 → 质量移出域外
        let (store, _) = run_slide(&mesh, &met, &[5.0, 0.0, 0.0], &[1000.0, 0.0, 0.0]);

        let d0 = store.get(0, "delta_avalanche_mass").unwrap();
        let d1 = store.get(1, "delta_avalanche_mass").unwrap();
        let d2 = store.get(2, "delta_avalanche_mass").unwrap();
        assert!(d0 < 0.0);
        // 不沉积：边界面不得给邻面带来任何质量
        assert_eq!(d1, 0.0);
        assert_eq!(d2, 0.0);
    }

    #[test]
    fn test_below_threshold_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let met = dummy_met(dir.path());
        let mesh = ridge_mesh();
        let (store, _) = run_slide(&mesh, &met, &[0.5, 0.5, 0.5], &[100.0, 100.0, 100.0]);
        for i in 0..3 {
            assert_eq!(store.get(i, "delta_avalanche_mass").unwrap(), 0.0);
            assert_eq!(store.get(i, "delta_avalanche_snowdepth").unwrap(), 0.0);
        }
    }

    #[test]
    fn test_interior_sink_keeps_snow() {
        // 洼地：中心面被三个更高的面包围，超限也不路由
        let dir = tempfile::tempdir().unwrap();
        let met = dummy_met(dir.path());
        let sink_mesh = TriMesh::from_parts(
            MeshProjection::Utm {
                zone: 11,
                south: false,
            },
            vec![
                flat_face(0.0, 0.0, [Some(1), Some(2), Some(3)]),
                flat_face(3.0, 5.0, [Some(0), None, None]),
                flat_face(6.0, 5.0, [Some(0), None, None]),
                flat_face(9.0, 5.0, [Some(0), None, None]),
            ],
        )
        .unwrap();

        let (store, _) = run_slide(
            &sink_mesh,
            &met,
            &[5.0, 0.0, 0.0, 0.0],
            &[1000.0, 0.0, 0.0, 0.0],
        );
        // 中心面是汇：保持超限雪深，不产生输运
        for i in 0..4 {
            assert_eq!(store.get(i, "delta_avalanche_mass").unwrap(), 0.0);
        }
    }

    #[test]
    fn test_max_depth_written_at_init() {
        let dir = tempfile::tempdir().unwrap();
        let met = dummy_met(dir.path());
        let mesh = ridge_mesh();
        let (store, _) = run_slide(&mesh, &met, &[0.0; 3], &[0.0; 3]);
        for i in 0..3 {
            assert_eq!(store.get(i, "maxDepth").unwrap(), 1.0);
        }
    }

    #[test]
    fn test_vegetation_raises_max_depth() {
        let dir = tempfile::tempdir().unwrap();
        let met = dummy_met(dir.path());
        let mut inits = vec![flat_face(0.0, 0.0, [None; 3])];
        inits[0].vegetation = Some(nh_mesh::VegAttributes {
            canopy_height: 3.5,
            lai: 1.0,
        });
        let mesh = TriMesh::from_parts(
            MeshProjection::Utm {
                zone: 11,
                south: false,
            },
            inits,
        )
        .unwrap();
        let (store, _) = run_slide(&mesh, &met, &[0.0], &[0.0]);
        assert_eq!(store.get(0, "maxDepth").unwrap(), 3.5);
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let met = dummy_met(dir.path());
        let mesh = ridge_mesh();
        let (_, module) = run_slide(&mesh, &met, &[0.0, 5.0, 0.0], &[0.0, 1000.0, 0.0]);

        let mut sink = CheckpointStore::new(met.current_time(), 1, mesh.n_faces());
        module.checkpoint(&mesh, &mut sink).unwrap();

        let mut fresh = SnowSlide::from_config(&unit_max_depth()).unwrap();
        let mut store = FaceStore::new(mesh.n_faces());
        fresh
            .init(&mesh, &mut store, &EngineContext::default())
            .unwrap();
        fresh.load_checkpoint(&mesh, &sink).unwrap();

        let restored = fresh.state.lock();
        let original = module.state.lock();
        for (a, b) in restored.iter().zip(original.iter()) {
            assert_eq!(a.delta_avalanche_mass, b.delta_avalanche_mass);
            assert_eq!(a.delta_avalanche_snowdepth, b.delta_avalanche_snowdepth);
        }
    }

    #[test]
    fn test_missing_checkpoint_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let met = dummy_met(dir.path());
        let mesh = ridge_mesh();
        let mut module = SnowSlide::from_config(&unit_max_depth()).unwrap();
        let mut store = FaceStore::new(mesh.n_faces());
        module
            .init(&mesh, &mut store, &EngineContext::default())
            .unwrap();

        let empty = CheckpointStore::new(met.current_time(), 0, mesh.n_faces());
        assert!(module.load_checkpoint(&mesh, &empty).is_err());
    }
}
