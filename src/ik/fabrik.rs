//! FABRIK 求解器（前后向到达）
//!
//! 设计原则：
//! - 在根空间中迭代关节位置，根移动/旋转不影响结果
//! - 前后两遍扫描保持骨段长度
//! - 位置确定后再由“初始指向 → 新指向”推导每个关节的朝向
//! - 可选极向量（pole）控制弯曲平面（膝盖、手肘朝向）

use glam::{Quat, Vec3};

use super::{policy, space};
use super::{Chain, Target};
use crate::config::{get_config, FabrikConfig};
use crate::skeleton::JointPose;

/// FABRIK 求解
///
/// `pole` 为世界空间位置。直接修改链上的世界姿态，返回末端是否收敛到目标。
pub fn solve(chain: &mut Chain, target: &Target, pole: Option<Vec3>, config: &FabrikConfig) -> bool {
    let debug_log = get_config().debug_log;
    let epsilon = config.degenerate_epsilon;

    if config.max_iterations == 0 {
        return policy::is_converged(chain.tip_position(), target.position, config.position_threshold);
    }

    let frame = chain.space_pose;
    let target_pos = space::position_to_root_space(&frame, target.position);

    // 读入根空间位置
    for (p, pose) in chain.state.positions.iter_mut().zip(&chain.poses) {
        *p = space::position_to_root_space(&frame, pose.translation);
    }

    let positions = &mut chain.state.positions;
    let lengths = &chain.segment_lengths;
    let rest = &chain.initial_directions;
    let tip = positions.len() - 1;

    let converged = if !policy::is_reachable(positions[0], target_pos, chain.total_length) {
        // 不可达：直线摆放是精确解，无需迭代
        policy::lay_straight(positions, lengths, target_pos, epsilon);
        if debug_log {
            log::debug!(
                "FABRIK 目标不可达: 距离 {:.4} >= 链长 {:.4}",
                positions[0].distance(target_pos),
                chain.total_length
            );
        }
        policy::is_converged(positions[tip], target_pos, config.position_threshold)
    } else {
        // 向静止形状回拉，稳定收敛方向
        let weight = config.snap_back_weight.clamp(0.0, 1.0);
        for i in 0..tip {
            let rest_pos = positions[i] + rest[i];
            positions[i + 1] = positions[i + 1].lerp(rest_pos, weight);
        }
        iterate(positions, lengths, rest, target_pos, config, epsilon)
    };

    if let Some(pole) = pole {
        let pole_pos = space::position_to_root_space(&frame, pole);
        bend_toward_pole(positions, pole_pos, epsilon);
    }

    // 由位置推导朝向并写回世界姿态
    let target_rotation = target
        .rotation
        .map(|r| space::rotation_to_root_space(&frame, r));
    for i in 0..=tip {
        let position = space::position_from_root_space(&frame, chain.state.positions[i]);
        let rotation = if i == tip {
            match target_rotation {
                // 末端跟随目标相对绑定时的旋转
                Some(t) => space::rotation_from_root_space(
                    &frame,
                    t * chain.initial_target_rotation.inverse() * chain.initial_rotations[i],
                ),
                None => chain.poses[i].rotation,
            }
        } else {
            let dir = chain.state.positions[i + 1] - chain.state.positions[i];
            match policy::shortest_arc(chain.initial_directions[i], dir, epsilon) {
                Some(arc) => {
                    space::rotation_from_root_space(&frame, arc * chain.initial_rotations[i])
                }
                None => chain.poses[i].rotation,
            }
        };
        chain.poses[i] = JointPose::new(position, rotation);
    }

    if debug_log && !converged {
        log::debug!(
            "FABRIK 未收敛: 剩余距离 {:.4}",
            chain.tip_position().distance(target.position)
        );
    }
    converged
}

/// 前后向迭代
fn iterate(
    positions: &mut [Vec3],
    lengths: &[f32],
    rest: &[Vec3],
    target: Vec3,
    config: &FabrikConfig,
    epsilon: f32,
) -> bool {
    let tip = positions.len() - 1;

    for _ in 0..config.max_iterations {
        // 后向：末端放到目标，向根逐段拉回
        positions[tip] = target;
        for i in (1..tip).rev() {
            let dir = direction_or(positions[i] - positions[i + 1], -rest[i], epsilon);
            positions[i] = positions[i + 1] + dir * lengths[i];
        }

        // 前向：第一个关节固定，向末端逐段推出
        for i in 1..=tip {
            let dir = direction_or(positions[i] - positions[i - 1], rest[i - 1], epsilon);
            positions[i] = positions[i - 1] + dir * lengths[i - 1];
        }

        if policy::is_converged(positions[tip], target, config.position_threshold) {
            return true;
        }
    }
    false
}

/// 相邻关节重合时退回静止方向
#[inline]
fn direction_or(v: Vec3, fallback: Vec3, epsilon: f32) -> Vec3 {
    policy::direction(v, epsilon).unwrap_or_else(|| fallback.normalize_or_zero())
}

/// 极向量修正
///
/// 对每个中间关节：以前驱为原点、前驱 → 后继为法线作平面，
/// 把关节和极点都投影到平面上，绕骨段轴旋转关节使两者方向一致。
/// 旋转轴经过前驱与后继，骨段长度不变。
fn bend_toward_pole(positions: &mut [Vec3], pole: Vec3, epsilon: f32) {
    for i in 1..positions.len().saturating_sub(1) {
        let prev = positions[i - 1];
        let Some(normal) = policy::direction(positions[i + 1] - prev, epsilon) else {
            continue;
        };

        let projected_pole = pole - normal * normal.dot(pole - prev);
        let projected_joint = positions[i] - normal * normal.dot(positions[i] - prev);
        let from = projected_joint - prev;
        let to = projected_pole - prev;
        if from.length_squared() <= epsilon || to.length_squared() <= epsilon {
            continue;
        }

        let angle = signed_angle(from, to, normal);
        positions[i] = Quat::from_axis_angle(normal, angle) * (positions[i] - prev) + prev;
    }
}

/// `from` → `to` 绕 `axis` 的有符号夹角（弧度）
#[inline]
fn signed_angle(from: Vec3, to: Vec3, axis: Vec3) -> f32 {
    from.cross(to).dot(axis).atan2(from.dot(to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ik::test_util::{segment_distances, vertical_chain};
    use crate::skeleton::JointSet;

    fn three_joint_chain() -> Chain {
        let (set, joints) = vertical_chain(&[1.5, 1.5]);
        Chain::build(&set, &joints, joints[0]).unwrap()
    }

    fn positions(chain: &Chain) -> Vec<Vec3> {
        chain.poses().iter().map(|p| p.translation).collect()
    }

    fn config(max_iterations: u32) -> FabrikConfig {
        FabrikConfig::new(max_iterations, 0.01, 1.0).unwrap()
    }

    #[test]
    fn test_reachable_convergence() {
        let _ = env_logger::builder().is_test(true).try_init();

        for target in [Vec3::new(1.2, 1.6, 0.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 1.2, -1.6)] {
            let mut chain = three_joint_chain();
            assert!(solve(&mut chain, &Target::new(target), None, &config(10)), "target {:?}", target);
            assert!(chain.tip_position().distance(target) <= 0.01);
        }
    }

    #[test]
    fn test_segment_lengths_preserved() {
        let (set, joints) = vertical_chain(&[1.0, 0.5, 1.0, 0.75]);
        let mut chain = Chain::build(&set, &joints, joints[0]).unwrap();
        let pole = Some(Vec3::new(0.0, 1.0, 2.0));

        for (target, snap) in [
            (Vec3::new(1.0, 2.0, 0.5), 1.0),
            (Vec3::new(-1.5, 0.2, 1.0), 0.3),
            (Vec3::new(0.3, -2.0, 0.0), 0.0),
        ] {
            let config = FabrikConfig::new(1, 0.001, snap).unwrap();
            solve(&mut chain, &Target::new(target), pole, &config);
            for (got, want) in segment_distances(&positions(&chain)).iter().zip(chain.segment_lengths()) {
                assert!((got - want).abs() < 1e-4, "{} vs {}", got, want);
            }
        }
    }

    #[test]
    fn test_unreachable_target_is_straight_line() {
        let (set, joints) = vertical_chain(&[1.0, 1.0, 1.0]);
        let mut chain = Chain::build(&set, &joints, joints[0]).unwrap();

        assert!(!solve(&mut chain, &Target::new(Vec3::new(10.0, 0.0, 0.0)), None, &config(10)));
        for (i, p) in positions(&chain).iter().enumerate() {
            assert!((*p - Vec3::new(i as f32, 0.0, 0.0)).length() < 1e-5, "joint {}: {:?}", i, p);
        }
    }

    #[test]
    fn test_coincident_joints_fall_back_to_rest_direction() {
        // 目标落在中间关节上：后向扫描时相邻位置重合，退回静止方向
        let mut chain = three_joint_chain();
        let config = FabrikConfig::new(10, 0.01, 0.0).unwrap();

        assert!(!solve(&mut chain, &Target::new(Vec3::new(0.0, 1.5, 0.0)), None, &config));
        for pose in chain.poses() {
            assert!(pose.translation.is_finite());
            assert!(pose.rotation.is_finite());
        }
        for (got, want) in segment_distances(&positions(&chain)).iter().zip(chain.segment_lengths()) {
            assert!((got - want).abs() < 1e-4, "{} vs {}", got, want);
        }
    }

    #[test]
    fn test_idempotent_under_stationary_target() {
        let mut chain = three_joint_chain();
        let target = Target::new(Vec3::new(1.2, 1.6, 0.0));

        assert!(solve(&mut chain, &target, None, &config(10)));
        let first = positions(&chain);
        assert!(solve(&mut chain, &target, None, &config(10)));

        for (a, b) in positions(&chain).iter().zip(&first) {
            assert!(a.distance(*b) < 0.01);
        }
    }

    #[test]
    fn test_zero_iterations_is_noop() {
        let mut chain = three_joint_chain();
        let before = chain.poses().to_vec();
        let zero = FabrikConfig {
            max_iterations: 0,
            ..FabrikConfig::default()
        };

        // 不可达目标也不修改
        assert!(!solve(&mut chain, &Target::new(Vec3::new(10.0, 0.0, 0.0)), None, &zero));
        assert!(!solve(&mut chain, &Target::new(Vec3::new(1.2, 1.6, 0.0)), Some(Vec3::Z), &zero));
        assert_eq!(chain.poses(), &before[..]);
    }

    #[test]
    fn test_pole_bend_direction() {
        let target = Target::new(Vec3::new(1.2, 1.6, 0.0));

        for pole in [Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0)] {
            let mut chain = three_joint_chain();
            assert!(solve(&mut chain, &target, Some(pole), &config(10)));

            // 中间关节与极点位于根 → 末端连线的同一侧
            let root = chain.poses()[0].translation;
            let axis = (chain.tip_position() - root).normalize();
            let offset = |p: Vec3| {
                let v = p - root;
                v - axis * axis.dot(v)
            };
            let mid = offset(chain.poses()[1].translation);
            assert!(mid.dot(offset(pole)) > 0.0, "pole {:?}, mid {:?}", pole, mid);
            assert!(mid.length() > 0.1);
        }
    }

    #[test]
    fn test_rotations_follow_segments() {
        let mut chain = three_joint_chain();
        solve(&mut chain, &Target::new(Vec3::new(-1.0, 1.0, 1.0)), Some(Vec3::X), &config(10));

        let poses = chain.poses();
        for i in 0..poses.len() - 1 {
            let axis = poses[i].rotation * Vec3::Y;
            let dir = (poses[i + 1].translation - poses[i].translation).normalize();
            assert!(axis.distance(dir) < 1e-3);
        }
    }

    #[test]
    fn test_tip_tracks_bound_target_rotation() {
        let mut chain = three_joint_chain();
        let bound = Quat::from_rotation_x(0.3);
        chain.bind_target(&Target::with_rotation(chain.tip_position(), bound));

        let turn = Quat::from_rotation_y(0.6);
        let target = Target::with_rotation(Vec3::new(1.2, 1.6, 0.0), turn * bound);
        solve(&mut chain, &target, None, &config(10));

        // 末端初始朝向为单位旋转：末端 = 目标 * 绑定朝向⁻¹
        let tip = chain.poses()[chain.tip_index()].rotation;
        assert!(tip.angle_between(turn) < 1e-2);
    }

    #[test]
    fn test_invariant_to_root_motion() {
        // hips 作为根空间：整体平移 + 旋转后，相对 hips 的结果不变
        let mut set = JointSet::new();
        let hips = set.add_joint("hips", None, JointPose::IDENTITY).unwrap();
        let a = set.add_joint("a", Some(hips), JointPose::from_translation(Vec3::Y)).unwrap();
        let b = set.add_joint("b", Some(a), JointPose::from_translation(Vec3::Y * 1.5)).unwrap();
        let c = set.add_joint("c", Some(b), JointPose::from_translation(Vec3::Y * 1.5)).unwrap();

        let local_target = Vec3::new(1.2, 2.6, 0.0);
        let mut still = Chain::build(&set, &[a, b, c], hips).unwrap();
        assert!(solve(&mut still, &Target::new(local_target), None, &config(10)));

        let moved = JointPose::new(Vec3::new(5.0, -2.0, 3.0), Quat::from_rotation_z(1.1));
        set.set_world_pose(hips, moved).unwrap();
        let mut chain = Chain::build(&set, &[a, b, c], hips).unwrap();
        chain.pull_poses(&set).unwrap();
        assert!(solve(&mut chain, &Target::new(moved.transform_point(local_target)), None, &config(10)));

        for (p, q) in chain.poses().iter().zip(still.poses()) {
            let local = moved.inverse().transform_point(p.translation);
            assert!(local.distance(q.translation) < 1e-3);
        }
    }

    #[test]
    fn test_degenerate_pole_is_ignored() {
        let mut chain = three_joint_chain();
        let target = Target::new(Vec3::new(1.2, 1.6, 0.0));
        // 极点落在根 → 末端连线上：投影退化，不旋转
        let mut plain = three_joint_chain();
        solve(&mut plain, &target, None, &config(10));
        solve(&mut chain, &target, Some(plain.tip_position() * 0.5), &config(10));

        for (a, b) in positions(&chain).iter().zip(&positions(&plain)) {
            assert!(a.distance(*b) < 1e-4);
        }
    }
}
