//! 关节层级 - 宿主侧的最小骨骼表示
//!
//! 核心设计思想：
//! - Joint: 单个关节节点，持有本地姿态与缓存的世界姿态
//! - JointSet: 管理关节层级，父变换更新时子关节跟随
//! - IK 链只通过索引读取/写回姿态，不持有关节

mod joint;
mod joint_set;

pub use joint::Joint;
pub use joint_set::JointSet;

use glam::{Quat, Vec3};

// ============================================================================
// 公共类型定义
// ============================================================================

/// 关节姿态（位置 + 朝向，无缩放）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointPose {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for JointPose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl JointPose {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    #[inline]
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self { translation, rotation }
    }

    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::IDENTITY)
    }

    /// 组合变换：`self * local`
    ///
    /// 父姿态 * 本地姿态 = 世界姿态
    #[inline]
    pub fn mul_pose(&self, local: &JointPose) -> JointPose {
        JointPose {
            translation: self.translation + self.rotation * local.translation,
            rotation: (self.rotation * local.rotation).normalize(),
        }
    }

    /// 逆变换
    #[inline]
    pub fn inverse(&self) -> JointPose {
        let inv_rot = self.rotation.inverse();
        JointPose {
            translation: inv_rot * -self.translation,
            rotation: inv_rot,
        }
    }

    /// 变换一个点
    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.translation + self.rotation * point
    }
}
