//! 关节集合 - 管理关节层级结构
//!
//! 父关节索引总是小于子关节索引（添加时校验），层级天然无环。

use std::collections::HashMap;

use super::{Joint, JointPose};
use crate::config::get_config;
use crate::{IkError, Result};

/// 关节集合
#[derive(Clone, Debug, Default)]
pub struct JointSet {
    /// 所有关节
    joints: Vec<Joint>,
    /// 子关节索引缓存
    children_cache: Vec<Vec<usize>>,
    /// 名称 → 索引
    name_index: HashMap<String, usize>,
}

impl JointSet {
    /// 创建空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加关节（本地姿态相对父关节）
    pub fn add_joint(
        &mut self,
        name: impl Into<String>,
        parent: Option<usize>,
        local: JointPose,
    ) -> Result<usize> {
        let name = name.into();
        if let Some(p) = parent {
            if p >= self.joints.len() {
                return Err(IkError::InvalidJoint(format!(
                    "parent index {} of joint '{}' is out of range",
                    p, name
                )));
            }
        }
        if self.name_index.contains_key(&name) {
            return Err(IkError::InvalidJoint(format!("duplicate joint name '{}'", name)));
        }

        let idx = self.joints.len();
        let mut joint = Joint::new(name.clone(), parent, local);
        joint.compute_world(parent.map(|p| &self.joints[p].world));

        self.joints.push(joint);
        self.children_cache.push(Vec::new());
        if let Some(p) = parent {
            self.children_cache[p].push(idx);
        }
        self.name_index.insert(name, idx);
        Ok(idx)
    }

    /// 添加关节（给定世界姿态，自动换算本地姿态）
    pub fn add_joint_world(
        &mut self,
        name: impl Into<String>,
        parent: Option<usize>,
        world: JointPose,
    ) -> Result<usize> {
        let local = match parent {
            Some(p) => self.joint(p)?.world.inverse().mul_pose(&world),
            None => world,
        };
        self.add_joint(name, parent, local)
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Joint> {
        self.joints.get(idx)
    }

    /// 按名称查找关节索引
    #[inline]
    pub fn find(&self, name: &str) -> Option<usize> {
        self.name_index.get(name).copied()
    }

    /// 父关节索引
    #[inline]
    pub fn parent_of(&self, idx: usize) -> Option<usize> {
        self.joints.get(idx).and_then(|j| j.parent)
    }

    fn joint(&self, idx: usize) -> Result<&Joint> {
        self.joints.get(idx).ok_or_else(|| {
            IkError::InvalidJoint(format!("joint index {} is out of range", idx))
        })
    }

    /// 世界姿态
    pub fn world_pose(&self, idx: usize) -> Result<JointPose> {
        Ok(self.joint(idx)?.world)
    }

    // ========================================
    // 变换更新
    // ========================================

    /// 设置本地姿态，子关节跟随
    pub fn set_local_pose(&mut self, idx: usize, local: JointPose) -> Result<()> {
        self.joint(idx)?;
        self.joints[idx].local = local;
        self.update_world_recursive(idx);
        Ok(())
    }

    /// 设置世界姿态，换算为本地姿态后子关节跟随
    pub fn set_world_pose(&mut self, idx: usize, world: JointPose) -> Result<()> {
        let local = match self.joint(idx)?.parent {
            Some(p) => self.joints[p].world.inverse().mul_pose(&world),
            None => world,
        };
        self.set_local_pose(idx, local)
    }

    /// 递归更新世界姿态
    fn update_world_recursive(&mut self, idx: usize) {
        let parent_world = self.joints[idx].parent.map(|p| self.joints[p].world);
        self.joints[idx].compute_world(parent_world.as_ref());

        for i in 0..self.children_cache[idx].len() {
            let child = self.children_cache[idx][i];
            self.update_world_recursive(child);
        }
    }

    // ========================================
    // 层级查询
    // ========================================

    /// `ancestor` 是否为 `node` 的（严格）祖先
    pub fn is_ancestor(&self, ancestor: usize, node: usize) -> bool {
        let mut current = self.parent_of(node);
        while let Some(idx) = current {
            if idx == ancestor {
                return true;
            }
            current = self.parent_of(idx);
        }
        false
    }

    /// 从末端沿父关节向上收集 IK 链（根 → 末端顺序）
    ///
    /// 步数受 `max_chain_depth` 限制；未到达 `root` 时返回错误。
    pub fn collect_chain(&self, tip: usize, root: usize) -> Result<Vec<usize>> {
        self.joint(tip)?;
        self.joint(root)?;

        let max_depth = get_config().max_chain_depth;
        let mut chain = Vec::new();
        let mut current = Some(tip);

        while let Some(idx) = current {
            if chain.len() >= max_depth {
                return Err(IkError::InvalidChain(format!(
                    "chain from '{}' exceeds {} joints before reaching '{}'",
                    self.joints[tip].name, max_depth, self.joints[root].name
                )));
            }
            chain.push(idx);
            if idx == root {
                chain.reverse();
                return Ok(chain);
            }
            current = self.joints[idx].parent;
        }

        Err(IkError::InvalidChain(format!(
            "root '{}' is not in the same hierarchy as '{}'",
            self.joints[root].name, self.joints[tip].name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    /// hips → thigh → knee → ankle，另有 spine 分支
    fn leg() -> JointSet {
        let mut set = JointSet::new();
        let hips = set.add_joint("hips", None, JointPose::from_translation(Vec3::new(0.0, 3.0, 0.0))).unwrap();
        let thigh = set.add_joint("thigh", Some(hips), JointPose::from_translation(Vec3::new(0.5, 0.0, 0.0))).unwrap();
        let knee = set.add_joint("knee", Some(thigh), JointPose::from_translation(Vec3::new(0.0, -1.5, 0.0))).unwrap();
        set.add_joint("ankle", Some(knee), JointPose::from_translation(Vec3::new(0.0, -1.5, 0.0))).unwrap();
        set.add_joint("spine", Some(hips), JointPose::from_translation(Vec3::new(0.0, 1.0, 0.0))).unwrap();
        set
    }

    #[test]
    fn test_world_pose_propagation() {
        let mut set = leg();
        let ankle = set.find("ankle").unwrap();
        assert!((set.world_pose(ankle).unwrap().translation - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-5);

        // 膝盖绕 X 轴旋转 90°，脚踝跟随
        let knee = set.find("knee").unwrap();
        let mut local = set.get(knee).unwrap().local_pose();
        local.rotation = Quat::from_rotation_x(std::f32::consts::FRAC_PI_2);
        set.set_local_pose(knee, local).unwrap();

        let p = set.world_pose(ankle).unwrap().translation;
        assert!((p - Vec3::new(0.5, 1.5, -1.5)).length() < 1e-4);
    }

    #[test]
    fn test_set_world_pose_keeps_children_attached() {
        let mut set = leg();
        let thigh = set.find("thigh").unwrap();
        let knee = set.find("knee").unwrap();

        let moved = JointPose::from_translation(Vec3::new(2.0, 3.0, 0.0));
        set.set_world_pose(thigh, moved).unwrap();

        assert!((set.world_pose(thigh).unwrap().translation - moved.translation).length() < 1e-5);
        assert!((set.world_pose(knee).unwrap().translation - Vec3::new(2.0, 1.5, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_add_joint_rejects_bad_parent() {
        let mut set = JointSet::new();
        assert!(set.add_joint("a", Some(3), JointPose::IDENTITY).is_err());
        set.add_joint("a", None, JointPose::IDENTITY).unwrap();
        assert!(set.add_joint("a", None, JointPose::IDENTITY).is_err());
    }

    #[test]
    fn test_add_joint_world() {
        let mut set = JointSet::new();
        let root = set
            .add_joint("root", None, JointPose::new(Vec3::ONE, Quat::from_rotation_z(0.7)))
            .unwrap();
        let world = JointPose::new(Vec3::new(3.0, -1.0, 2.0), Quat::from_rotation_y(-0.4));
        let child = set.add_joint_world("child", Some(root), world).unwrap();

        let got = set.world_pose(child).unwrap();
        assert!((got.translation - world.translation).length() < 1e-5);
        assert!(got.rotation.angle_between(world.rotation) < 1e-2);

        let joint = set.get(child).unwrap();
        assert_eq!(joint.parent_id(), Some(root));
        assert_eq!(joint.world_pose(), got);
        assert_eq!(set.get(root).unwrap().parent_id(), None);
    }

    #[test]
    fn test_is_ancestor() {
        let set = leg();
        let hips = set.find("hips").unwrap();
        let ankle = set.find("ankle").unwrap();
        let spine = set.find("spine").unwrap();

        assert!(set.is_ancestor(hips, ankle));
        assert!(!set.is_ancestor(ankle, hips));
        assert!(!set.is_ancestor(spine, ankle));
        assert!(!set.is_ancestor(ankle, ankle));
    }

    #[test]
    fn test_collect_chain() {
        let set = leg();
        let thigh = set.find("thigh").unwrap();
        let knee = set.find("knee").unwrap();
        let ankle = set.find("ankle").unwrap();

        assert_eq!(set.collect_chain(ankle, thigh).unwrap(), vec![thigh, knee, ankle]);

        // spine 不在 ankle 的祖先路径上
        let spine = set.find("spine").unwrap();
        assert!(matches!(
            set.collect_chain(ankle, spine),
            Err(IkError::InvalidChain(_))
        ));
    }

    #[test]
    fn test_collect_chain_depth_cap() {
        let mut set = JointSet::new();
        let mut parent = None;
        for i in 0..100 {
            let idx = set
                .add_joint(format!("j{}", i), parent, JointPose::from_translation(Vec3::Y))
                .unwrap();
            parent = Some(idx);
        }
        // 默认上限 64
        assert!(set.collect_chain(99, 0).is_err());
        assert_eq!(set.collect_chain(99, 40).unwrap().len(), 60);
    }
}
