//! CCD 求解器（循环坐标下降）
//!
//! 从末端向根逐个旋转关节，使“关节 → 末端”对准“关节 → 目标”。
//! 每个关节的旋转按混合权重插值，后继关节随之移动。

use glam::Quat;

use super::policy;
use super::{Chain, Target};
use crate::config::{get_config, CcdConfig};

/// CCD 求解
///
/// 直接修改链上的世界姿态，返回末端是否收敛到目标。
/// 未收敛不是错误，链保持当前最优姿态。
pub fn solve(chain: &mut Chain, target: &Target, config: &CcdConfig) -> bool {
    let debug_log = get_config().debug_log;
    let epsilon = config.degenerate_epsilon;

    if config.max_iterations == 0 {
        return policy::is_converged(chain.tip_position(), target.position, config.position_threshold);
    }

    let tip = chain.tip_index();
    let first = if config.include_first_joint { 0 } else { 1 };

    // 不可达：从可旋转的第一个关节起按权重摆向指向目标的直线
    let reach: f32 = chain.segment_lengths[first..].iter().sum();
    if !policy::is_reachable(chain.poses[first].translation, target.position, reach) {
        straighten(chain, first, target, config);
        blend_tip_rotation(chain, target, config);

        let converged =
            policy::is_converged(chain.tip_position(), target.position, config.position_threshold);
        if debug_log {
            log::debug!(
                "CCD 目标不可达: 距离 {:.4} > 链长 {:.4}",
                chain.poses[first].translation.distance(target.position),
                reach
            );
        }
        return converged;
    }

    for iteration in 0..config.max_iterations {
        for i in (first..=tip).rev() {
            if i == tip {
                blend_tip_rotation(chain, target, config);
                continue;
            }

            let joint_pos = chain.poses[i].translation;
            let to_tip = chain.tip_position() - joint_pos;
            let to_target = target.position - joint_pos;

            // 退化方向：本次迭代跳过该关节
            let Some(arc) = policy::shortest_arc(to_tip, to_target, epsilon) else {
                continue;
            };

            let current = chain.poses[i].rotation;
            let aimed = (arc * current).normalize();
            let blended = current.slerp(aimed, config.blend_weight(i)).normalize();
            let delta = (blended * current.inverse()).normalize();
            chain.rotate_joint(i, delta);
        }

        if policy::is_converged(chain.tip_position(), target.position, config.position_threshold) {
            blend_tip_rotation(chain, target, config);
            if debug_log {
                log::debug!("CCD 收敛: 第 {} 次迭代", iteration + 1);
            }
            return true;
        }
    }

    // 父关节的旋转会带动末端朝向，结束前再对齐一次
    blend_tip_rotation(chain, target, config);

    if debug_log {
        log::debug!(
            "CCD 未收敛: {} 次迭代后剩余距离 {:.4}",
            config.max_iterations,
            chain.tip_position().distance(target.position)
        );
    }
    false
}

/// 末端朝向向目标朝向插值（目标无朝向时不动）
fn blend_tip_rotation(chain: &mut Chain, target: &Target, config: &CcdConfig) {
    let Some(rotation) = target.rotation else {
        return;
    };
    let tip = chain.tip_index();
    let current = chain.poses[tip].rotation;
    chain.poses[tip].rotation = current.slerp(rotation, config.blend_weight(tip)).normalize();
}

/// 依次旋转 `first..tip` 的关节，使每段骨骼转向目标方向
///
/// 每个关节的旋转按混合权重插值：权重全为 1 时得到精确直线，权重 0 的关节不动
fn straighten(chain: &mut Chain, first: usize, target: &Target, config: &CcdConfig) {
    let epsilon = config.degenerate_epsilon;
    let Some(dir) = policy::direction(target.position - chain.poses[first].translation, epsilon) else {
        return;
    };
    for i in first..chain.tip_index() {
        let weight = config.blend_weight(i);
        if weight <= 0.0 {
            continue;
        }
        let segment = chain.poses[i + 1].translation - chain.poses[i].translation;
        if let Some(arc) = policy::shortest_arc(segment, dir, epsilon) {
            chain.rotate_joint(i, Quat::IDENTITY.slerp(arc, weight).normalize());
        }
    }
}
