// ==========================================
// 精酿啤酒灌装台账系统 - 库存汇总引擎
// ==========================================
// 净额 = Σ 入 - Σ 出 - Σ 报废, 全部由台账流水派生（在制品池除外）
// 派生净额为负时钳位为 0 并记录数据完整性告警, 不抛错
// 短 TTL 缓存只服务读请求, 状态机在事务内始终重新计算
// ==========================================

use crate::domain::label::LabelIdentity;
use crate::domain::production::FinishedKey;
use crate::domain::types::{MovementType, ProductionStatus, StockPool};
use crate::engine::error::EngineResult;
use crate::repository::{
    EmptyCanBatchRepository, InProcessFilter, LabelBatchRepository, LedgerStore,
    MovementRepository, MovementSumFilter, ProductionRepository, RepositoryResult,
};
use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

// ==========================================
// StockFilter - 净额过滤条件
// ==========================================
/// 库存池过滤条件
///
/// - 标签池: `label_name` 非空时只按名称匹配自定义标签, 否则按 brand/style 匹配目录标签
/// - 成品池: brand/style 为有效键
/// - 在制品池: brand/style 为批次自身品牌/款式
/// - 空罐池: 忽略 brand/style/label_name
/// - `from` / `to` 为闭区间, 只给 `to` 即为时点查询
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockFilter {
    pub brand_id: Option<i64>,
    pub style_id: Option<i64>,
    pub label_name: Option<String>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

impl StockFilter {
    pub fn for_label(identity: &LabelIdentity) -> Self {
        let (brand_id, style_id, label_name) = identity.to_columns();
        Self {
            brand_id,
            style_id,
            label_name,
            ..Default::default()
        }
    }

    pub fn for_key(key: FinishedKey) -> Self {
        Self {
            brand_id: Some(key.brand_id),
            style_id: Some(key.style_id),
            ..Default::default()
        }
    }

    pub fn as_of(mut self, to: NaiveDateTime) -> Self {
        self.to = Some(to);
        self
    }

    fn custom_name(&self) -> Option<&str> {
        self.label_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

/// 全部库存池净额
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummary {
    pub empty_cans: i64,
    pub labels: i64,
    pub finished_goods: i64,
    pub in_process: i64,
}

// ==========================================
// 完整性核对
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityCheck {
    /// 成品台账净额与 FINAL 批次数量不一致
    FinishedGoodsMismatch,
    /// 空罐入库批次合计与 EMPTY_CANS_ADD 不一致
    EmptyCanIntakeMismatch,
    /// 标签入库批次合计与 LABEL_ADD 不一致
    LabelIntakeMismatch,
    /// 派生净额为负
    NegativeNet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityIssue {
    pub check: IntegrityCheck,
    pub subject: String,
    pub expected: i64,
    pub actual: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub issues: Vec<IntegrityIssue>,
    pub checked_at: NaiveDateTime,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

// ==========================================
// StockAggregator - 库存汇总
// ==========================================

struct CachedNet {
    value: i64,
    computed_at: Instant,
}

pub struct StockAggregator {
    store: LedgerStore,
    ttl: Duration,
    cache: Mutex<HashMap<(StockPool, StockFilter), CachedNet>>,
    /// 每次 invalidate 递增; 计算期间代数变化则不回填
    generation: AtomicU64,
}

impl StockAggregator {
    pub fn new(store: LedgerStore, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cache: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// 查询净额（允许命中缓存）
    pub fn net_quantity(&self, pool: StockPool, filter: &StockFilter) -> EngineResult<i64> {
        let key = (pool, filter.clone());
        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&key) {
                if hit.computed_at.elapsed() < self.ttl {
                    debug!(pool = pool.as_str(), value = hit.value, "库存缓存命中");
                    return Ok(hit.value);
                }
            }
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let value = self
            .store
            .read(|conn| Self::net_quantity_tx(conn, pool, filter))?;
        self.remember(key, value, generation);
        Ok(value)
    }

    /// 回填缓存; 计算开始后若已失效则丢弃
    fn remember(&self, key: (StockPool, StockFilter), value: i64, generation: u64) {
        if let Ok(mut cache) = self.cache.lock() {
            if self.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            cache.insert(
                key,
                CachedNet {
                    value,
                    computed_at: Instant::now(),
                },
            );
        }
    }

    /// 清空缓存（每次提交变更后调用）
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// 全部库存池净额（不走缓存）
    pub fn stock_summary(&self) -> EngineResult<StockSummary> {
        let summary = self.store.read(|conn| {
            let all = StockFilter::default();
            Ok(StockSummary {
                empty_cans: Self::net_quantity_tx(conn, StockPool::EmptyCans, &all)?,
                labels: Self::net_quantity_tx(conn, StockPool::Labels, &all)?,
                finished_goods: Self::net_quantity_tx(conn, StockPool::FinishedGoods, &all)?,
                in_process: Self::net_quantity_tx(conn, StockPool::InProcess, &all)?,
            })
        })?;
        Ok(summary)
    }

    /// 事务内计算净额（负值钳位为 0）
    pub fn net_quantity_tx(
        conn: &Connection,
        pool: StockPool,
        filter: &StockFilter,
    ) -> RepositoryResult<i64> {
        let raw = Self::raw_net_tx(conn, pool, filter)?;
        if raw < 0 {
            warn!(
                pool = pool.as_str(),
                raw_net = raw,
                filter = ?filter,
                "数据完整性告警: 派生库存净额为负, 已钳位为 0"
            );
            return Ok(0);
        }
        Ok(raw)
    }

    /// 未钳位的净额
    fn raw_net_tx(conn: &Connection, pool: StockPool, filter: &StockFilter) -> RepositoryResult<i64> {
        let sum = |t: MovementType, f: &MovementSumFilter| MovementRepository::sum_tx(conn, t, f);

        match pool {
            StockPool::EmptyCans => {
                let f = MovementSumFilter {
                    from: filter.from,
                    to: filter.to,
                    ..Default::default()
                };
                Ok(sum(MovementType::EmptyCansAdd, &f)?
                    - sum(MovementType::EmptyCansCons, &f)?
                    - sum(MovementType::EmptyCansScrap, &f)?)
            }
            StockPool::Labels => {
                let f = match filter.custom_name() {
                    Some(name) => MovementSumFilter {
                        label_name: Some(name.to_string()),
                        from: filter.from,
                        to: filter.to,
                        ..Default::default()
                    },
                    None if filter.brand_id.is_some() || filter.style_id.is_some() => {
                        MovementSumFilter {
                            brand_id: filter.brand_id,
                            style_id: filter.style_id,
                            catalog_only: true,
                            from: filter.from,
                            to: filter.to,
                            ..Default::default()
                        }
                    }
                    None => MovementSumFilter {
                        from: filter.from,
                        to: filter.to,
                        ..Default::default()
                    },
                };
                Ok(sum(MovementType::LabelAdd, &f)? - sum(MovementType::LabelCons, &f)?)
            }
            StockPool::FinishedGoods => {
                let f = MovementSumFilter {
                    brand_id: filter.brand_id,
                    style_id: filter.style_id,
                    production_status: Some(ProductionStatus::Final),
                    from: filter.from,
                    to: filter.to,
                    ..Default::default()
                };
                Ok(sum(MovementType::ProdFinalIn, &f)?
                    - sum(MovementType::ProdFinalOut, &f)?
                    - sum(MovementType::ProdScrap, &f)?)
            }
            StockPool::InProcess => ProductionRepository::sum_in_process_tx(
                conn,
                &InProcessFilter {
                    brand_id: filter.brand_id,
                    style_id: filter.style_id,
                    from: filter.from,
                    to: filter.to,
                },
            ),
        }
    }

    // ==========================================
    // 完整性核对
    // ==========================================

    /// 核对台账派生数据与实体表, 返回差异（只告警, 不失败）
    pub fn verify_integrity(&self) -> EngineResult<IntegrityReport> {
        let issues = self.store.read(|conn| {
            let mut issues = Vec::new();
            Self::check_finished_goods(conn, &mut issues)?;
            Self::check_empty_cans(conn, &mut issues)?;
            Self::check_labels(conn, &mut issues)?;
            Ok(issues)
        })?;

        for issue in &issues {
            warn!(
                check = ?issue.check,
                subject = %issue.subject,
                expected = issue.expected,
                actual = issue.actual,
                "数据完整性差异"
            );
        }

        Ok(IntegrityReport {
            issues,
            checked_at: Utc::now().naive_utc(),
        })
    }

    fn check_finished_goods(conn: &Connection, issues: &mut Vec<IntegrityIssue>) -> RepositoryResult<()> {
        let mut merged: BTreeMap<FinishedKey, (i64, i64)> = BTreeMap::new();
        for (key, qty) in ProductionRepository::final_totals_by_key_tx(conn)? {
            merged.entry(key).or_default().0 = qty;
        }
        for (key, net) in MovementRepository::finished_net_by_key_tx(conn)? {
            merged.entry(key).or_default().1 = net;
        }

        for (key, (expected, actual)) in merged {
            if expected != actual {
                issues.push(IntegrityIssue {
                    check: IntegrityCheck::FinishedGoodsMismatch,
                    subject: key.to_string(),
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    fn check_empty_cans(conn: &Connection, issues: &mut Vec<IntegrityIssue>) -> RepositoryResult<()> {
        let received = EmptyCanBatchRepository::total_received_tx(conn)?;
        let added = MovementRepository::sum_tx(
            conn,
            MovementType::EmptyCansAdd,
            &MovementSumFilter::default(),
        )?;
        if received != added {
            issues.push(IntegrityIssue {
                check: IntegrityCheck::EmptyCanIntakeMismatch,
                subject: StockPool::EmptyCans.as_str().to_string(),
                expected: received,
                actual: added,
            });
        }

        let raw = Self::raw_net_tx(conn, StockPool::EmptyCans, &StockFilter::default())?;
        if raw < 0 {
            issues.push(IntegrityIssue {
                check: IntegrityCheck::NegativeNet,
                subject: StockPool::EmptyCans.as_str().to_string(),
                expected: 0,
                actual: raw,
            });
        }
        Ok(())
    }

    fn check_labels(conn: &Connection, issues: &mut Vec<IntegrityIssue>) -> RepositoryResult<()> {
        for (identity, received) in LabelBatchRepository::received_totals_tx(conn)? {
            let filter = StockFilter::for_label(&identity);
            let added = MovementRepository::sum_tx(
                conn,
                MovementType::LabelAdd,
                &label_sum_filter(&identity),
            )?;
            if received != added {
                issues.push(IntegrityIssue {
                    check: IntegrityCheck::LabelIntakeMismatch,
                    subject: identity.key(),
                    expected: received,
                    actual: added,
                });
            }

            let raw = Self::raw_net_tx(conn, StockPool::Labels, &filter)?;
            if raw < 0 {
                issues.push(IntegrityIssue {
                    check: IntegrityCheck::NegativeNet,
                    subject: identity.key(),
                    expected: 0,
                    actual: raw,
                });
            }
        }
        Ok(())
    }
}

/// 标签身份 → 流水汇总条件
fn label_sum_filter(identity: &LabelIdentity) -> MovementSumFilter {
    match identity {
        LabelIdentity::Catalog { brand_id, style_id } => MovementSumFilter {
            brand_id: Some(*brand_id),
            style_id: Some(*style_id),
            catalog_only: true,
            ..Default::default()
        },
        LabelIdentity::Custom { name } => MovementSumFilter {
            label_name: Some(name.clone()),
            ..Default::default()
        },
    }
}
