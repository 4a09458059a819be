//! IK 求解
//!
//! - Chain: 一次性构建的链描述 + 姿态缓冲区
//! - ccd / fabrik: 两种迭代求解器，直接修改链上的姿态
//! - IkSolver: 每条链一个的驱动器，负责从关节集合读入/写回姿态

mod ccd;
mod chain;
mod fabrik;
mod policy;
mod solver;
pub mod space;

pub use ccd::solve as solve_ccd;
pub use chain::Chain;
pub use fabrik::solve as solve_fabrik;
pub use solver::{solve_all, IkSolver, SolverKind};

use glam::{Quat, Vec3};

use crate::skeleton::JointPose;

/// IK 目标（世界空间）
///
/// 每次求解由外部提供，求解器只读取
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Target {
    /// 末端要到达的位置
    pub position: Vec3,
    /// 末端要匹配的朝向（`None` 时末端保持自身朝向）
    pub rotation: Option<Quat>,
}

impl Target {
    /// 仅位置目标
    #[inline]
    pub fn new(position: Vec3) -> Self {
        Self { position, rotation: None }
    }

    /// 位置 + 朝向目标
    #[inline]
    pub fn with_rotation(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation: Some(rotation) }
    }

    /// 从姿态创建
    #[inline]
    pub fn from_pose(pose: &JointPose) -> Self {
        Self::with_rotation(pose.translation, pose.rotation)
    }
}
