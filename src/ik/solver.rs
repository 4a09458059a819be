//! IK 驱动器 - 每条链一个，负责读入姿态、求解、写回
//!
//! 多条互不依赖的链用 rayon 并行求解；
//! 链之间有共享或嵌套关节时退回按顺序求解。

use glam::Vec3;
use rayon::prelude::*;

use super::{ccd, fabrik, Chain, Target};
use crate::config::{get_config, CcdConfig, FabrikConfig};
use crate::skeleton::JointSet;
use crate::Result;

/// 求解算法及其配置
#[derive(Clone, Debug, PartialEq)]
pub enum SolverKind {
    Ccd(CcdConfig),
    Fabrik(FabrikConfig),
}

/// 单条链的 IK 驱动器
#[derive(Clone, Debug)]
pub struct IkSolver {
    /// IK 链
    pub chain: Chain,
    /// 求解算法
    pub kind: SolverKind,
    /// 当前目标（世界空间），`None` 时不求解
    pub target: Option<Target>,
    /// 极向量位置（世界空间，仅 FABRIK 使用）
    pub pole: Option<Vec3>,
    /// 是否启用
    pub enabled: bool,
}

impl IkSolver {
    /// 创建新的 IK 驱动器
    pub fn new(chain: Chain, kind: SolverKind) -> Self {
        Self {
            chain,
            kind,
            target: None,
            pole: None,
            enabled: true,
        }
    }

    pub fn ccd(chain: Chain, config: CcdConfig) -> Self {
        Self::new(chain, SolverKind::Ccd(config))
    }

    pub fn fabrik(chain: Chain, config: FabrikConfig) -> Self {
        Self::new(chain, SolverKind::Fabrik(config))
    }

    /// 设置目标
    #[inline]
    pub fn set_target(&mut self, target: Target) {
        self.target = Some(target);
    }

    /// 设置目标并记录其初始朝向
    pub fn bind_target(&mut self, target: Target) {
        self.chain.bind_target(&target);
        self.target = Some(target);
    }

    #[inline]
    pub fn clear_target(&mut self) {
        self.target = None;
    }

    /// 启用且有目标
    #[inline]
    pub fn is_active(&self) -> bool {
        self.enabled && self.target.is_some()
    }

    /// 只在链自身的姿态缓冲区上求解，不读写关节集合
    pub fn solve_chain(&mut self) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(target) = self.target else {
            return false;
        };

        match self.kind {
            SolverKind::Ccd(ref config) => ccd::solve(&mut self.chain, &target, config),
            SolverKind::Fabrik(ref config) => {
                fabrik::solve(&mut self.chain, &target, self.pole, config)
            }
        }
    }

    /// 读入姿态 → 求解 → 写回
    ///
    /// 未启用或没有目标时不做任何修改，返回 `false`
    pub fn solve(&mut self, set: &mut JointSet) -> Result<bool> {
        if !self.is_active() {
            return Ok(false);
        }
        self.chain.pull_poses(set)?;
        let converged = self.solve_chain();
        self.chain.push_poses(set)?;
        Ok(converged)
    }
}

/// 批量求解，返回收敛的链数
///
/// 活动链两两独立时并行求解；否则按数组顺序依次求解，
/// 后面的链读到前面链写回的结果。
/// 求解前检查所有活动链的关节索引，任一失败时集合不被修改。
pub fn solve_all(solvers: &mut [IkSolver], set: &mut JointSet) -> Result<usize> {
    let runtime = get_config();

    for solver in solvers.iter().filter(|s| s.is_active()) {
        solver.chain.check_joints(set)?;
    }

    if has_dependency(solvers, set) {
        if runtime.debug_log {
            log::debug!("IK 链之间存在共享或嵌套关节，按顺序求解 {} 条链", solvers.len());
        }
        let mut converged = 0;
        for solver in solvers.iter_mut() {
            if solver.solve(set)? {
                converged += 1;
            }
        }
        return Ok(converged);
    }

    for solver in solvers.iter_mut().filter(|s| s.is_active()) {
        solver.chain.pull_poses(set)?;
    }

    let converged = solvers
        .par_iter_mut()
        .filter(|s| s.is_active())
        .map(|s| s.solve_chain())
        .filter(|&c| c)
        .count();

    for solver in solvers.iter().filter(|s| s.is_active()) {
        solver.chain.push_poses(set)?;
    }

    if runtime.debug_log {
        log::debug!("IK 批量求解完成: {}/{} 条链收敛", converged, solvers.len());
    }
    Ok(converged)
}

/// 活动链中是否有任意两条互相依赖
fn has_dependency(solvers: &[IkSolver], set: &JointSet) -> bool {
    solvers.iter().enumerate().filter(|(_, s)| s.is_active()).any(|(i, a)| {
        solvers[i + 1..]
            .iter()
            .filter(|b| b.is_active())
            .any(|b| a.chain.depends_on(&b.chain, set))
    })
}
