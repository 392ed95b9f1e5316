// ==========================================
// 精酿啤酒灌装台账系统 - 台账 API
// ==========================================
// 职责: 对外命令/查询入口, 解析输入并委派给引擎与仓储
// 说明: 写操作全部经由引擎; 只读查询可直接走仓储
// ==========================================

use std::sync::Arc;
use tracing::debug;

use crate::api::dto::{
    AdvanceProductionRequest, AdvanceProductionResponse, CreateProductionRequest,
    CreateProductionResponse, FulfillDeliveryRequest, FulfillDeliveryResponse, MovementQuery,
    ReceiveLabelsRequest, ScrapProductionResponse, StockQuery,
};
use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::ConfigManager;
use crate::domain::delivery::{DeliveryLine, DeliveryRecord, DeliveryRequestLine};
use crate::domain::inventory::EmptyCanBatch;
use crate::domain::label::{LabelBatch, LabelIdentity};
use crate::domain::movement::{MovementFilter, MovementPage, PageRequest};
use crate::domain::production::{Production, ProductionHistoryEntry};
use crate::domain::types::{MovementType, ProductionStatus, StockPool};
use crate::engine::delivery::{DeliveryCoordinator, DeliveryOrder};
use crate::engine::intake::{InventoryIntake, SupplySource};
use crate::engine::label_index::LabelAllocationIndex;
use crate::engine::production::ProductionStateMachine;
use crate::engine::stock::{IntegrityReport, StockAggregator, StockFilter, StockSummary};
use crate::repository::{DeliveryRecordRepository, MovementRepository, ProductionRepository};

// ==========================================
// LedgerApi - 台账 API
// ==========================================

/// 台账API
///
/// 职责：
/// 1. 生产批次命令（创建、推进、报废）
/// 2. 物料入库与空罐报废
/// 3. 发货履约
/// 4. 库存/流水/历史查询与完整性核对
pub struct LedgerApi {
    production_repo: Arc<ProductionRepository>,
    movement_repo: Arc<MovementRepository>,
    delivery_repo: Arc<DeliveryRecordRepository>,
    config: Arc<ConfigManager>,
    stock: Arc<StockAggregator>,
    labels: Arc<LabelAllocationIndex>,
    state_machine: Arc<ProductionStateMachine>,
    delivery: Arc<DeliveryCoordinator>,
    intake: Arc<InventoryIntake>,
}

impl LedgerApi {
    /// 创建新的LedgerApi实例
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        production_repo: Arc<ProductionRepository>,
        movement_repo: Arc<MovementRepository>,
        delivery_repo: Arc<DeliveryRecordRepository>,
        config: Arc<ConfigManager>,
        stock: Arc<StockAggregator>,
        labels: Arc<LabelAllocationIndex>,
        state_machine: Arc<ProductionStateMachine>,
        delivery: Arc<DeliveryCoordinator>,
        intake: Arc<InventoryIntake>,
    ) -> Self {
        Self {
            production_repo,
            movement_repo,
            delivery_repo,
            config,
            stock,
            labels,
            state_machine,
            delivery,
            intake,
        }
    }

    // ==========================================
    // 生产批次命令
    // ==========================================

    /// 创建生产批次
    ///
    /// # 返回
    /// - Err(ApiError::InsufficientEmptyCans): 空罐不足
    pub fn create_production(&self, req: &CreateProductionRequest) -> ApiResult<CreateProductionResponse> {
        debug!(brand_id = req.brand_id, style_id = req.style_id, quantity = req.quantity, "create_production");
        let production = self
            .state_machine
            .create_production(req.brand_id, req.style_id, req.quantity)?;
        Ok(CreateProductionResponse { id: production.id })
    }

    /// 推进生产批次状态
    ///
    /// # 返回
    /// - Err(RevisitNotAllowed / TerminalState / FinalRequiresPriorStage /
    ///   MissingLabelSelection / InsufficientLabelStock)
    pub fn advance_production(&self, req: &AdvanceProductionRequest) -> ApiResult<AdvanceProductionResponse> {
        debug!(
            production_id = %req.production_id,
            target_status = %req.target_status,
            "advance_production"
        );
        let target = parse_status(&req.target_status)?;
        let outcome = self
            .state_machine
            .advance(&req.production_id, target, req.label_selection())?;
        Ok(AdvanceProductionResponse {
            id: outcome.id,
            status: outcome.status,
            merged_into: outcome.merged_into,
        })
    }

    /// 报废生产批次部分数量
    pub fn scrap_production(&self, production_id: &str, quantity: i64) -> ApiResult<ScrapProductionResponse> {
        debug!(production_id, quantity, "scrap_production");
        let outcome = self.state_machine.scrap(production_id, quantity)?;
        Ok(ScrapProductionResponse {
            id: outcome.id,
            new_qty: outcome.new_quantity,
        })
    }

    /// 报废空罐
    pub fn scrap_empty_cans(&self, quantity: i64, detail: Option<String>) -> ApiResult<()> {
        debug!(quantity, "scrap_empty_cans");
        self.state_machine.scrap_empty_cans(quantity, detail)?;
        Ok(())
    }

    // ==========================================
    // 入库命令
    // ==========================================

    pub fn receive_empty_cans(
        &self,
        quantity: i64,
        provider: Option<&str>,
        lot: Option<&str>,
    ) -> ApiResult<EmptyCanBatch> {
        debug!(quantity, provider = ?provider, lot = ?lot, "receive_empty_cans");
        Ok(self
            .intake
            .receive_empty_cans(quantity, SupplySource::new(provider, lot))?)
    }

    pub fn receive_labels(&self, req: &ReceiveLabelsRequest) -> ApiResult<LabelBatch> {
        debug!(quantity = req.quantity, "receive_labels");
        let identity = require_identity(req.brand_id, req.style_id, req.label_name.as_deref())?;
        Ok(self.intake.receive_labels(
            identity,
            req.quantity,
            SupplySource::new(req.provider.as_deref(), req.lot.as_deref()),
        )?)
    }

    // ==========================================
    // 发货
    // ==========================================

    /// 履约发货单（整单一个事务）
    ///
    /// # 返回
    /// - Err(ApiError::InsufficientFinalStock): 任一成品键不足, 未做任何写入
    /// - Err(ApiError::DuplicateDelivery): 发货单号已有记录
    pub fn fulfill_delivery(&self, req: &FulfillDeliveryRequest) -> ApiResult<FulfillDeliveryResponse> {
        debug!(order_id = %req.order_id, lines = req.lines.len(), "fulfill_delivery");
        let operator = match req.operator.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(op) => op.to_string(),
            None => self.config.default_operator()?,
        };
        let order = DeliveryOrder {
            order_id: req.order_id.trim().to_string(),
            client: req.client.clone(),
            operator,
            lines: req.lines.clone(),
        };
        let outcome = self.delivery.fulfill(&order)?;
        Ok(FulfillDeliveryResponse {
            order_id: outcome.order_id,
            consumed: outcome.consumed,
            records: outcome.records,
        })
    }

    /// 外部订单待发行 + 可用成品数
    pub fn pending_delivery_lines(&self, lines: &[DeliveryRequestLine]) -> ApiResult<Vec<DeliveryLine>> {
        Ok(self.delivery.pending_lines(lines)?)
    }

    pub fn list_deliveries(&self, order_id: &str) -> ApiResult<Vec<DeliveryRecord>> {
        Ok(self.delivery_repo.list_by_order(order_id.trim())?)
    }

    // ==========================================
    // 库存查询
    // ==========================================

    /// 查询库存池净额（≥ 0, 可能命中短期缓存）
    pub fn query_net_stock(&self, query: &StockQuery) -> ApiResult<i64> {
        let pool = StockPool::parse(&query.pool)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知库存池: {}", query.pool)))?;
        let filter = StockFilter {
            brand_id: query.brand_id,
            style_id: query.style_id,
            label_name: query.label_name.clone(),
            from: query.from,
            to: query.to,
        };
        Ok(self.stock.net_quantity(pool, &filter)?)
    }

    pub fn stock_summary(&self) -> ApiResult<StockSummary> {
        Ok(self.stock.stock_summary()?)
    }

    pub fn verify_integrity(&self) -> ApiResult<IntegrityReport> {
        Ok(self.stock.verify_integrity()?)
    }

    /// 某标签身份的可用数量（实时）
    pub fn label_availability(
        &self,
        brand_id: Option<i64>,
        style_id: Option<i64>,
        label_name: Option<&str>,
    ) -> ApiResult<i64> {
        let identity = require_identity(brand_id, style_id, label_name)?;
        Ok(self.labels.availability(&identity)?)
    }

    // ==========================================
    // 流水查询
    // ==========================================

    /// 分页查询台账流水（时间倒序）
    pub fn query_movements(&self, query: &MovementQuery) -> ApiResult<MovementPage> {
        let movement_type = match query.movement_type.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(
                MovementType::parse(raw)
                    .ok_or_else(|| ApiError::InvalidInput(format!("未知流水类型: {}", raw)))?,
            ),
            None => None,
        };
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(ApiError::InvalidInput(format!(
                    "时间范围无效: from={} > to={}",
                    from, to
                )));
            }
        }

        let page_size = self.config.resolve_page_size(query.page_size)?;
        let page = PageRequest::new(query.page.unwrap_or(1).max(1), page_size);
        let filter = MovementFilter {
            movement_type,
            reference_id_prefix: query.reference_id_prefix.clone(),
            from: query.from,
            to: query.to,
        };
        Ok(self.movement_repo.query(&filter, page)?)
    }

    // ==========================================
    // 生产批次查询
    // ==========================================

    pub fn get_production(&self, production_id: &str) -> ApiResult<Production> {
        self.production_repo
            .find_by_id(production_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Production(id={})不存在", production_id)))
    }

    pub fn list_productions(&self, status: Option<&str>) -> ApiResult<Vec<Production>> {
        let status = match status.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(parse_status(raw)?),
            None => None,
        };
        Ok(self.production_repo.list(status)?)
    }

    /// 批次历史（时间正序）; 批次已被合并删除时返回 NotFound
    pub fn production_history(&self, production_id: &str) -> ApiResult<Vec<ProductionHistoryEntry>> {
        self.get_production(production_id)?;
        Ok(self.production_repo.list_history(production_id)?)
    }
}

fn parse_status(raw: &str) -> ApiResult<ProductionStatus> {
    ProductionStatus::parse(raw).ok_or_else(|| ApiError::InvalidInput(format!("未知批次状态: {}", raw)))
}

fn require_identity(
    brand_id: Option<i64>,
    style_id: Option<i64>,
    label_name: Option<&str>,
) -> ApiResult<LabelIdentity> {
    LabelIdentity::from_selection(brand_id, style_id, label_name).ok_or_else(|| {
        ApiError::InvalidInput("标签身份需要 brand_id + style_id 或非空 label_name".to_string())
    })
}
