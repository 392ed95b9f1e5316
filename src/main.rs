// ==========================================
// 精酿啤酒灌装台账系统 - 命令行入口
// ==========================================
// 用法:
//   brewery-ledger init
//   brewery-ledger stock [pool]
//   brewery-ledger movements [type] [page]
//   brewery-ledger receive-cans <qty> [provider] [lot]
//   brewery-ledger verify
//
// 数据库路径: BREWERY_LEDGER_DB_PATH, 否则用户数据目录
// 输出: JSON（stdout）; 日志写 stderr
// ==========================================

use anyhow::{bail, Context};
use brewery_ledger::api::{ApiError, ErrorResponse, MovementQuery, StockQuery};
use brewery_ledger::app::{get_default_db_path, AppState};
use brewery_ledger::domain::types::StockPool;
use brewery_ledger::logging;
use serde_json::{json, Value};

const USAGE: &str = "usage: brewery-ledger <init | stock [pool] | movements [type] [page] | receive-cans <qty> [provider] [lot] | verify>";

fn main() -> anyhow::Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        bail!(USAGE);
    };

    let db_path = get_default_db_path();
    tracing::info!(db_path = %db_path, version = brewery_ledger::VERSION, "{}", brewery_ledger::APP_NAME);

    let state = AppState::new(db_path.clone())
        .map_err(anyhow::Error::msg)
        .context("无法初始化AppState")?;

    match run(&state, command, &args[1..]) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(CliError::Api(err)) => {
            println!("{}", serde_json::to_string_pretty(&ErrorResponse::from(&err))?);
            Err(anyhow::Error::new(err))
        }
        Err(CliError::Usage(msg)) => bail!("{}\n{}", msg, USAGE),
    }
}

enum CliError {
    Api(ApiError),
    Usage(String),
}

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        CliError::Api(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Api(ApiError::InternalError(err.to_string()))
    }
}

fn run(state: &AppState, command: &str, rest: &[String]) -> Result<Value, CliError> {
    let api = &state.ledger_api;
    match command {
        "init" => Ok(json!({
            "db_path": state.db_path,
            "config": serde_json::from_str::<Value>(&state.config.get_config_snapshot().map_err(ApiError::from)?)?,
        })),
        "stock" => match rest.first() {
            Some(pool) => {
                let net = api.query_net_stock(&StockQuery {
                    pool: pool.clone(),
                    ..Default::default()
                })?;
                Ok(json!({ "pool": pool.to_uppercase(), "net": net }))
            }
            None => {
                let mut out = serde_json::Map::new();
                for pool in StockPool::ALL {
                    let net = api.query_net_stock(&StockQuery {
                        pool: pool.as_str().to_string(),
                        ..Default::default()
                    })?;
                    out.insert(pool.as_str().to_string(), json!(net));
                }
                Ok(Value::Object(out))
            }
        },
        "movements" => {
            let page = match rest.get(1) {
                Some(raw) => Some(
                    raw.parse::<u32>()
                        .map_err(|_| CliError::Usage(format!("无效页码: {}", raw)))?,
                ),
                None => None,
            };
            let result = api.query_movements(&MovementQuery {
                movement_type: rest.first().cloned(),
                page,
                ..Default::default()
            })?;
            Ok(serde_json::to_value(result)?)
        }
        "receive-cans" => {
            let raw = rest
                .first()
                .ok_or_else(|| CliError::Usage("缺少数量参数".to_string()))?;
            let quantity = raw
                .parse::<i64>()
                .map_err(|_| CliError::Usage(format!("无效数量: {}", raw)))?;
            let batch = api.receive_empty_cans(
                quantity,
                rest.get(1).map(String::as_str),
                rest.get(2).map(String::as_str),
            )?;
            Ok(serde_json::to_value(batch)?)
        }
        "verify" => Ok(serde_json::to_value(api.verify_integrity()?)?),
        other => Err(CliError::Usage(format!("未知命令: {}", other))),
    }
}
