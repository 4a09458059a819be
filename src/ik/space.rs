//! 根空间换算
//!
//! 纯函数：根空间由调用时传入的根姿态决定，不捕获任何状态。
//! FABRIK 在根空间中求解，使结果不受根自身移动/旋转的影响。

use glam::{Quat, Vec3};

use crate::skeleton::JointPose;

/// 世界位置 → 根空间位置
#[inline]
pub fn position_to_root_space(root: &JointPose, position: Vec3) -> Vec3 {
    root.rotation.inverse() * (position - root.translation)
}

/// 根空间位置 → 世界位置
#[inline]
pub fn position_from_root_space(root: &JointPose, position: Vec3) -> Vec3 {
    root.rotation * position + root.translation
}

/// 世界旋转 → 根空间旋转
#[inline]
pub fn rotation_to_root_space(root: &JointPose, rotation: Quat) -> Quat {
    (root.rotation.inverse() * rotation).normalize()
}

/// 根空间旋转 → 世界旋转
#[inline]
pub fn rotation_from_root_space(root: &JointPose, rotation: Quat) -> Quat {
    (root.rotation * rotation).normalize()
}

/// 世界姿态 → 根空间姿态
#[inline]
pub fn to_root_space(root: &JointPose, pose: &JointPose) -> JointPose {
    JointPose::new(
        position_to_root_space(root, pose.translation),
        rotation_to_root_space(root, pose.rotation),
    )
}

/// 根空间姿态 → 世界姿态
#[inline]
pub fn from_root_space(root: &JointPose, pose: &JointPose) -> JointPose {
    JointPose::new(
        position_from_root_space(root, pose.translation),
        rotation_from_root_space(root, pose.rotation),
    )
}
