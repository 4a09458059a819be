//! 可达性与收敛判定（CCD / FABRIK 共用）
//!
//! 所有阈值比较都使用距离平方，避免开方。

use glam::{Quat, Vec3};

/// 末端是否已收敛到目标
#[inline]
pub(crate) fn is_converged(tip: Vec3, target: Vec3, threshold: f32) -> bool {
    tip.distance_squared(target) <= threshold * threshold
}

/// 目标是否在链长范围内
///
/// 距离恰好等于总长也视为不可达，走直线摆放。
#[inline]
pub(crate) fn is_reachable(origin: Vec3, target: Vec3, total_length: f32) -> bool {
    origin.distance_squared(target) < total_length * total_length
}

/// 单位方向；长度平方不超过 `epsilon` 时视为零方向
#[inline]
pub(crate) fn direction(v: Vec3, epsilon: f32) -> Option<Vec3> {
    let len_sq = v.length_squared();
    if len_sq > epsilon && len_sq.is_finite() {
        Some(v / len_sq.sqrt())
    } else {
        None
    }
}

/// `from` → `to` 的最短弧旋转；任一方向退化时返回 `None`
#[inline]
pub(crate) fn shortest_arc(from: Vec3, to: Vec3, epsilon: f32) -> Option<Quat> {
    let from = direction(from, epsilon)?;
    let to = direction(to, epsilon)?;
    Some(Quat::from_rotation_arc(from, to))
}

/// 不可达时的直线摆放
///
/// 以 `positions[0]` 为起点，沿指向 `target` 的直线按骨段长度依次排列。
pub(crate) fn lay_straight(positions: &mut [Vec3], lengths: &[f32], target: Vec3, epsilon: f32) {
    let Some(dir) = direction(target - positions[0], epsilon) else {
        return;
    };
    for i in 1..positions.len() {
        positions[i] = positions[i - 1] + dir * lengths[i - 1];
    }
}
