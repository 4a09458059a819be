//! 实时 IK 引擎
//!
//! 在关节链上求解反向运动学，每帧由宿主驱动：
//! - skeleton: 最小的关节层级（本地/世界姿态，父变换更新时子关节跟随）
//! - ik: 链描述、CCD / FABRIK 求解器、每链驱动器与批量并行求解
//! - config: 全局运行时配置与每次求解的配置

pub mod config;
pub mod error;
pub mod ik;
pub mod skeleton;

pub use config::{CcdConfig, FabrikConfig, RuntimeConfig};
pub use error::{IkError, Result};
pub use ik::{solve_all, solve_ccd, solve_fabrik, Chain, IkSolver, SolverKind, Target};
pub use skeleton::{Joint, JointPose, JointSet};
