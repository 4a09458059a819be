//! 关节节点
//!
//! Joint 是关节层级的基本单元，每个 Joint 代表层级中的一个节点。

use super::JointPose;

/// 关节节点
///
/// - 静态数据：名称、父关节索引
/// - 动态数据：本地姿态（相对父关节）与缓存的世界姿态
/// - 变换计算：world = parent.world * local
#[derive(Clone, Debug)]
pub struct Joint {
    // ========================================
    // 静态数据（初始化后不变）
    // ========================================

    /// 关节名称
    pub name: String,

    /// 父关节索引（只读回溯，不拥有父关节）
    pub(crate) parent: Option<usize>,

    // ========================================
    // 动态数据（每帧更新）
    // ========================================

    /// 本地姿态 (local_to_parent)
    pub(crate) local: JointPose,

    /// 世界姿态 (local_to_world)
    pub(crate) world: JointPose,
}

impl Joint {
    /// 创建新关节
    pub(crate) fn new(name: impl Into<String>, parent: Option<usize>, local: JointPose) -> Self {
        Self {
            name: name.into(),
            parent,
            local,
            world: local,
        }
    }

    // ========================================
    // 访问器
    // ========================================

    /// 父关节索引
    #[inline]
    pub fn parent_id(&self) -> Option<usize> {
        self.parent
    }

    /// 本地姿态
    #[inline]
    pub fn local_pose(&self) -> JointPose {
        self.local
    }

    /// 世界姿态
    #[inline]
    pub fn world_pose(&self) -> JointPose {
        self.world
    }

    /// 由父关节世界姿态重新计算世界姿态
    #[inline]
    pub(crate) fn compute_world(&mut self, parent_world: Option<&JointPose>) {
        self.world = match parent_world {
            Some(parent) => parent.mul_pose(&self.local),
            None => self.local,
        };
    }
}
