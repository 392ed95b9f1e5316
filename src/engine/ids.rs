// ==========================================
// 精酿啤酒灌装台账系统 - ID 生成器
// ==========================================

use uuid::Uuid;

/// ID 生成器（外部协作方, 默认 UUID v4）
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
