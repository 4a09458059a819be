//! IK 配置
//!
//! - 全局运行时配置（扁平化，不嵌套）：只放调试开关等运行参数
//! - 每次求解传入的 CCD / FABRIK 配置：所有影响求解结果的参数

use once_cell::sync::Lazy;
use std::sync::RwLock;

use crate::{IkError, Result};

// ============================================================================
// 全局运行时配置
// ============================================================================

/// 运行时配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    // ========== 链查找 ==========
    /// 沿父关节向上查找链时的最大步数，默认 64
    pub max_chain_depth: usize,

    // ========== 调试 ==========
    /// 是否输出逐帧求解日志，默认 false
    pub debug_log: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            // ====== 链查找 ======
            // 人形骨骼最长的链（脊柱到指尖）远小于此值
            max_chain_depth: 64,

            // ====== 调试 ======
            debug_log: false,
        }
    }
}

/// 全局配置实例
static RUNTIME_CONFIG: Lazy<RwLock<RuntimeConfig>> = Lazy::new(|| {
    RwLock::new(RuntimeConfig::default())
});

/// 获取当前配置（只读）
pub fn get_config() -> RuntimeConfig {
    RUNTIME_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: RuntimeConfig) {
    *RUNTIME_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *RUNTIME_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = RuntimeConfig::default();
}

// ============================================================================
// CCD 配置
// ============================================================================

/// 零方向判定的默认值，与 glam normalize_or_zero 的判定量级一致
pub const DEFAULT_DEGENERATE_EPSILON: f32 = 1e-8;

/// CCD 求解配置
#[derive(Debug, Clone, PartialEq)]
pub struct CcdConfig {
    /// 最大迭代次数（0 表示只检查是否已收敛，不修改姿态）
    pub max_iterations: u32,
    /// 末端到目标的收敛距离
    pub position_threshold: f32,
    /// 每关节混合权重（1.0 = 直接对齐，0.0 = 不动）
    ///
    /// 数组比链短时，超出部分使用最后一个值；`None` 时全部为 1.0
    pub blend_weights: Option<Vec<f32>>,
    /// 是否旋转链的第一个关节
    pub include_first_joint: bool,
    /// 方向向量长度平方不超过此值视为零方向，该关节本次迭代跳过
    pub degenerate_epsilon: f32,
}

impl Default for CcdConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            position_threshold: 0.01,
            blend_weights: None,
            include_first_joint: true,
            degenerate_epsilon: DEFAULT_DEGENERATE_EPSILON,
        }
    }
}

impl CcdConfig {
    /// 创建配置并校验
    pub fn new(max_iterations: u32, position_threshold: f32) -> Result<Self> {
        let config = Self {
            max_iterations,
            position_threshold,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// 设置每关节混合权重
    pub fn with_blend_weights(mut self, weights: Vec<f32>) -> Result<Self> {
        self.blend_weights = Some(weights);
        self.validate()?;
        Ok(self)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.position_threshold)?;
        validate_epsilon(self.degenerate_epsilon)?;
        if let Some(ref weights) = self.blend_weights {
            if let Some(w) = weights.iter().find(|w| !(0.0..=1.0).contains(*w)) {
                return Err(IkError::InvalidConfig(format!(
                    "blend weight {} is outside [0, 1]",
                    w
                )));
            }
        }
        Ok(())
    }

    /// 获取关节 `index` 的混合权重
    #[inline]
    pub fn blend_weight(&self, index: usize) -> f32 {
        match self.blend_weights {
            Some(ref weights) if !weights.is_empty() => {
                weights[index.min(weights.len() - 1)].clamp(0.0, 1.0)
            }
            _ => 1.0,
        }
    }
}

// ============================================================================
// FABRIK 配置
// ============================================================================

/// FABRIK 求解配置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FabrikConfig {
    /// 最大迭代次数（0 表示只检查是否已收敛，不修改姿态）
    pub max_iterations: u32,
    /// 末端到目标的收敛距离
    pub position_threshold: f32,
    /// 迭代前向静止姿态回拉的比例（0 = 不回拉，1 = 完全回到静止形状）
    pub snap_back_weight: f32,
    /// 方向向量长度平方不超过此值视为零方向，退回静止方向
    pub degenerate_epsilon: f32,
}

impl Default for FabrikConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            position_threshold: 0.001,
            snap_back_weight: 1.0,
            degenerate_epsilon: DEFAULT_DEGENERATE_EPSILON,
        }
    }
}

impl FabrikConfig {
    /// 创建配置并校验
    pub fn new(max_iterations: u32, position_threshold: f32, snap_back_weight: f32) -> Result<Self> {
        let config = Self {
            max_iterations,
            position_threshold,
            snap_back_weight,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.position_threshold)?;
        validate_epsilon(self.degenerate_epsilon)?;
        if !(0.0..=1.0).contains(&self.snap_back_weight) {
            return Err(IkError::InvalidConfig(format!(
                "snap_back_weight {} is outside [0, 1]",
                self.snap_back_weight
            )));
        }
        Ok(())
    }
}

fn validate_epsilon(epsilon: f32) -> Result<()> {
    if !epsilon.is_finite() || epsilon < 0.0 {
        return Err(IkError::InvalidConfig(format!(
            "degenerate_epsilon must be a non-negative finite number, got {}",
            epsilon
        )));
    }
    Ok(())
}

fn validate_threshold(threshold: f32) -> Result<()> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(IkError::InvalidConfig(format!(
            "position_threshold must be a positive finite number, got {}",
            threshold
        )));
    }
    Ok(())
}
