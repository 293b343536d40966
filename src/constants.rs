/// 默认目标保持率
pub const DEFAULT_TARGET_R: f64 = 0.85;

/// 引擎接受的目标保持率区间
pub const TARGET_R_MIN: f64 = 0.01;
pub const TARGET_R_MAX: f64 = 0.99;

/// 设置接口接受的目标保持率区间（与前端输入框一致）
pub const SETTINGS_TARGET_R_MIN: f64 = 0.7;
pub const SETTINGS_TARGET_R_MAX: f64 = 0.99;

/// 稳定度下限（天）
pub const MIN_STABILITY: f64 = 0.1;

/// 单次间隔上限（天）
pub const MAX_INTERVAL_DAYS: f64 = 3650.0;

/// 从未复习过的卡片在到期队列中的优先级
pub const NEVER_REVIEWED_PRIORITY: i64 = 999_999;

/// 混淆补救插入卡片的优先级，高于任何到期卡片
pub const REMEDIATION_PRIORITY: i64 = 1_000_000;

/// 交错选择默认前瞻窗口
pub const DEFAULT_INTERLEAVE_SAMPLE_SIZE: usize = 6;

/// 仪表盘默认展示的混淆对数量
pub const DEFAULT_TOP_CONFUSIONS: usize = 10;

/// 混淆对列表最大返回数量
pub const MAX_CONFUSION_PAIRS: usize = 100;

/// 数据集导入格式标识
pub const DATASET_SCHEMA: &str = "memory-dataset/v1";

/// 进度备份格式标识
pub const PROGRESS_SCHEMA: &str = "memory-progress/v1";

pub const MILLIS_PER_MINUTE: i64 = 60_000;
pub const MILLIS_PER_DAY: i64 = 86_400_000;
