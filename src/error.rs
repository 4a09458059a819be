//! 错误类型

use thiserror::Error;

/// IK 引擎错误
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IkError {
    /// IK 链构建失败（关节过少、根不在祖先路径上、骨段长度非正）
    #[error("Invalid IK chain: {0}")]
    InvalidChain(String),

    /// 关节索引或父关节无效
    #[error("Invalid joint: {0}")]
    InvalidJoint(String),

    /// 求解器配置无效
    #[error("Invalid solver config: {0}")]
    InvalidConfig(String),
}

/// Result 别名
pub type Result<T> = std::result::Result<T, IkError>;
