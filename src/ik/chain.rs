//! IK 链描述
//!
//! 构建时对关节姿态做一次快照，记录骨段长度、初始朝向与初始指向。
//! 求解期间这些数据只读；链自带一份世界姿态缓冲区，宿主负责读入与写回。

use glam::{Quat, Vec3};

use super::space;
use super::Target;
use crate::skeleton::{JointPose, JointSet};
use crate::{IkError, Result};

/// 每条链的求解暂存数据（构建时一次性分配，逐帧复用）
#[derive(Clone, Debug, Default)]
pub(super) struct SolverState {
    /// 根空间下的工作位置，每关节一个
    pub positions: Vec<Vec3>,
}

/// IK 链
#[derive(Clone, Debug)]
pub struct Chain {
    // ========================================
    // 静态数据（构建后不变）
    // ========================================

    /// 关节索引（根 → 末端）
    pub(super) joints: Vec<usize>,
    /// 构建时指定的根关节
    pub(super) root: usize,
    /// 定义根空间的关节
    ///
    /// 根在链外时就是根本身；根是链的第一个关节时取它的父关节
    /// （第一个关节的朝向由求解器改写，不能再作为参考系）；都没有时为世界空间
    pub(super) space_joint: Option<usize>,
    /// 骨段长度，`len == joints.len() - 1`
    pub(super) segment_lengths: Vec<f32>,
    /// 链总长（缓存）
    pub(super) total_length: f32,
    /// 初始朝向（根空间）
    pub(super) initial_rotations: Vec<Quat>,
    /// 初始指向后继关节的向量（根空间），`len == joints.len() - 1`
    pub(super) initial_directions: Vec<Vec3>,
    /// 绑定目标时的目标朝向（根空间）
    pub(super) initial_target_rotation: Quat,

    // ========================================
    // 动态数据（每帧更新）
    // ========================================

    /// 当前世界姿态，每关节一个
    pub(super) poses: Vec<JointPose>,
    /// 根空间参考姿态（世界空间）
    pub(super) space_pose: JointPose,
    /// 求解暂存
    pub(super) state: SolverState,
}

impl Chain {
    /// 构建 IK 链
    ///
    /// `joints` 按根 → 末端排列，且每个关节都是下一个关节的祖先；
    /// `root` 必须是第一个关节本身或它的祖先。
    pub fn build(set: &JointSet, joints: &[usize], root: usize) -> Result<Self> {
        match Self::build_inner(set, joints, root) {
            Ok(chain) => {
                log::info!(
                    "IK 链构建完成: {} 关节, 总长 {:.4}",
                    chain.len(),
                    chain.total_length
                );
                Ok(chain)
            }
            Err(e) => {
                log::warn!("IK 链构建失败: {}", e);
                Err(e)
            }
        }
    }

    /// 从末端沿父关节向上查找到 `root`，再构建链
    pub fn from_tip(set: &JointSet, tip: usize, root: usize) -> Result<Self> {
        let joints = set.collect_chain(tip, root)?;
        Self::build(set, &joints, root)
    }

    fn build_inner(set: &JointSet, joints: &[usize], root: usize) -> Result<Self> {
        if joints.len() < 2 {
            return Err(IkError::InvalidChain(format!(
                "chain needs at least 2 joints, got {}",
                joints.len()
            )));
        }

        let name_of = |idx: usize| {
            set.get(idx)
                .map(|j| j.name.clone())
                .ok_or_else(|| IkError::InvalidChain(format!("joint index {} is out of range", idx)))
        };

        for &idx in joints.iter().chain(std::iter::once(&root)) {
            name_of(idx)?;
        }

        for pair in joints.windows(2) {
            if !set.is_ancestor(pair[0], pair[1]) {
                return Err(IkError::InvalidChain(format!(
                    "joint '{}' is not an ancestor of '{}'",
                    name_of(pair[0])?,
                    name_of(pair[1])?
                )));
            }
        }

        let first = joints[0];
        let tip = joints[joints.len() - 1];
        if root != first && !set.is_ancestor(root, first) {
            return Err(IkError::InvalidChain(format!(
                "root '{}' is not an ancestor of tip '{}'",
                name_of(root)?,
                name_of(tip)?
            )));
        }

        let space_joint = if root == first { set.parent_of(first) } else { Some(root) };
        let space_pose = match space_joint {
            Some(idx) => set.world_pose(idx)?,
            None => JointPose::IDENTITY,
        };

        let poses = joints
            .iter()
            .map(|&idx| set.world_pose(idx))
            .collect::<Result<Vec<_>>>()?;

        let mut segment_lengths = Vec::with_capacity(joints.len() - 1);
        let mut initial_directions = Vec::with_capacity(joints.len() - 1);
        for (i, pair) in poses.windows(2).enumerate() {
            let from = space::position_to_root_space(&space_pose, pair[0].translation);
            let to = space::position_to_root_space(&space_pose, pair[1].translation);
            let direction = to - from;
            let length = direction.length();

            // NaN 也在这里被拒绝
            if !(length > f32::EPSILON) {
                return Err(IkError::InvalidChain(format!(
                    "segment {} ('{}' → '{}') has non-positive length {}",
                    i,
                    name_of(joints[i])?,
                    name_of(joints[i + 1])?,
                    length
                )));
            }
            segment_lengths.push(length);
            initial_directions.push(direction);
        }

        let initial_rotations: Vec<Quat> = poses
            .iter()
            .map(|p| space::rotation_to_root_space(&space_pose, p.rotation))
            .collect();

        let total_length = segment_lengths.iter().sum();
        let initial_target_rotation = initial_rotations[initial_rotations.len() - 1];

        Ok(Self {
            joints: joints.to_vec(),
            root,
            space_joint,
            segment_lengths,
            total_length,
            initial_rotations,
            initial_directions,
            initial_target_rotation,
            state: SolverState {
                positions: vec![Vec3::ZERO; poses.len()],
            },
            poses,
            space_pose,
        })
    }

    // ========================================
    // 访问器
    // ========================================

    /// 关节数
    #[inline]
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// 链至少有 2 个关节，永远非空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// 关节索引（根 → 末端）
    #[inline]
    pub fn joints(&self) -> &[usize] {
        &self.joints
    }

    #[inline]
    pub fn root(&self) -> usize {
        self.root
    }

    /// 定义根空间的关节（`None` 为世界空间）
    #[inline]
    pub fn space_joint(&self) -> Option<usize> {
        self.space_joint
    }

    #[inline]
    pub fn segment_lengths(&self) -> &[f32] {
        &self.segment_lengths
    }

    #[inline]
    pub fn total_length(&self) -> f32 {
        self.total_length
    }

    #[inline]
    pub fn initial_rotations(&self) -> &[Quat] {
        &self.initial_rotations
    }

    #[inline]
    pub fn initial_directions(&self) -> &[Vec3] {
        &self.initial_directions
    }

    #[inline]
    pub fn initial_target_rotation(&self) -> Quat {
        self.initial_target_rotation
    }

    /// 末端关节在链中的下标
    #[inline]
    pub fn tip_index(&self) -> usize {
        self.joints.len() - 1
    }

    /// 末端世界位置
    #[inline]
    pub fn tip_position(&self) -> Vec3 {
        self.poses[self.tip_index()].translation
    }

    /// 当前世界姿态
    #[inline]
    pub fn poses(&self) -> &[JointPose] {
        &self.poses
    }

    #[inline]
    pub fn pose(&self, index: usize) -> Option<&JointPose> {
        self.poses.get(index)
    }

    /// 根空间参考姿态
    #[inline]
    pub fn space_pose(&self) -> JointPose {
        self.space_pose
    }

    /// 位于末端当前姿态的目标
    #[inline]
    pub fn tip_target(&self) -> Target {
        Target::from_pose(&self.poses[self.tip_index()])
    }

    // ========================================
    // 姿态读写
    // ========================================

    /// 设置单个关节的世界姿态（宿主自行管理场景时使用）
    pub fn set_pose(&mut self, index: usize, pose: JointPose) -> Result<()> {
        let len = self.poses.len();
        let slot = self.poses.get_mut(index).ok_or_else(|| {
            IkError::InvalidJoint(format!("chain index {} is out of range (len {})", index, len))
        })?;
        *slot = pose;
        Ok(())
    }

    /// 设置根空间参考姿态（宿主自行管理场景时使用）
    #[inline]
    pub fn set_space_pose(&mut self, pose: JointPose) {
        self.space_pose = pose;
    }

    /// 记录目标的初始朝向
    ///
    /// 之后 FABRIK 让末端跟随目标相对这一朝向的旋转；未绑定时使用末端的初始朝向
    pub fn bind_target(&mut self, target: &Target) {
        if let Some(rotation) = target.rotation {
            self.initial_target_rotation = space::rotation_to_root_space(&self.space_pose, rotation);
        }
    }

    /// 从关节集合读入当前世界姿态
    pub fn pull_poses(&mut self, set: &JointSet) -> Result<()> {
        for (pose, &idx) in self.poses.iter_mut().zip(&self.joints) {
            *pose = set.world_pose(idx)?;
        }
        if let Some(idx) = self.space_joint {
            self.space_pose = set.world_pose(idx)?;
        }
        Ok(())
    }

    /// 检查链引用的关节（含根空间关节）都在集合中
    pub fn check_joints(&self, set: &JointSet) -> Result<()> {
        match self
            .joints
            .iter()
            .copied()
            .chain(self.space_joint)
            .find(|&idx| set.get(idx).is_none())
        {
            Some(idx) => Err(IkError::InvalidJoint(format!(
                "chain joint index {} is out of range (set has {} joints)",
                idx,
                set.len()
            ))),
            None => Ok(()),
        }
    }

    /// 将姿态写回关节集合（根 → 末端顺序，链外子关节随之更新）
    ///
    /// 先检查全部索引，失败时集合不被修改
    pub fn push_poses(&self, set: &mut JointSet) -> Result<()> {
        self.check_joints(set)?;
        for (pose, &idx) in self.poses.iter().zip(&self.joints) {
            set.set_world_pose(idx, *pose)?;
        }
        Ok(())
    }

    /// 以关节 `index` 为支点施加旋转，后继关节跟随
    pub(super) fn rotate_joint(&mut self, index: usize, delta: Quat) {
        let pivot = self.poses[index].translation;
        self.poses[index].rotation = (delta * self.poses[index].rotation).normalize();
        for pose in &mut self.poses[index + 1..] {
            pose.translation = pivot + delta * (pose.translation - pivot);
            pose.rotation = (delta * pose.rotation).normalize();
        }
    }

    /// 两条链的关节是否相交或嵌套（任一方的关节是另一方关节或根空间关节的祖先）
    pub fn depends_on(&self, other: &Chain, set: &JointSet) -> bool {
        let touches = |writer: &Chain, reader: &Chain| {
            writer.joints.iter().any(|&w| {
                reader
                    .joints
                    .iter()
                    .copied()
                    .chain(reader.space_joint)
                    .any(|r| w == r || set.is_ancestor(w, r))
            })
        };
        touches(other, self) || touches(self, other)
    }
}
