//! East Money datacenter client for the quarterly earnings bulletin report
//! (`RPT_LICO_FN_CPD`), the same dataset behind the 业绩报表 page.

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use super::{ApiError, EarningsProvider};
use crate::models::{Config, EarningsBatch, EarningsRecord, ReportPeriod, STOCK_CODE_COLUMN};

const REPORT_NAME: &str = "RPT_LICO_FN_CPD";

/// Provider returns this code instead of an empty page when a period has no rows
const NO_DATA_CODE: i64 = 9201;

/// Provider field -> stored column, in storage order
const FIELD_COLUMNS: &[(&str, &str)] = &[
    ("SECURITY_CODE", STOCK_CODE_COLUMN),
    ("SECURITY_NAME_ABBR", "stock_name"),
    ("BASIC_EPS", "eps"),
    ("TOTAL_OPERATE_INCOME", "revenue"),
    ("YSTZ", "revenue_yoy"),
    ("YSHZ", "revenue_qoq"),
    ("PARENT_NETPROFIT", "net_profit"),
    ("SJLTZ", "net_profit_yoy"),
    ("SJLHZ", "net_profit_qoq"),
    ("BPS", "bvps"),
    ("WEIGHTAVG_ROE", "roe"),
    ("MGJYXJJE", "ocf_per_share"),
    ("XSMLL", "gross_margin"),
    ("PUBLISHNAME", "industry"),
    ("UPDATE_DATE", "latest_notice_date"),
];

/// Columns whose timestamps are cut down to `YYYY-MM-DD`
const DATE_COLUMNS: &[&str] = &["latest_notice_date"];

#[derive(Debug, Deserialize)]
struct DatacenterResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: i64,
    result: Option<DatacenterResult>,
}

#[derive(Debug, Deserialize)]
struct DatacenterResult {
    #[serde(default)]
    pages: u32,
    #[serde(default)]
    data: Vec<Map<String, Value>>,
}

/// Blocking client for the datacenter `api/data/v1/get` endpoint
pub struct EastMoneyClient {
    client: Client,
    base_url: String,
    page_size: u32,
}

impl EastMoneyClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("yjbb-sync/0.1")
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            page_size: config.page_size.max(1),
        })
    }

    /// Stored column names produced by this provider, stock code first
    pub fn columns() -> Vec<String> {
        FIELD_COLUMNS
            .iter()
            .map(|(_, column)| column.to_string())
            .collect()
    }

    fn query(&self, period: ReportPeriod, page: u32) -> Vec<(&'static str, String)> {
        let report_date = period
            .end_date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();

        vec![
            ("sortColumns", "UPDATE_DATE,SECURITY_CODE".to_string()),
            ("sortTypes", "-1,-1".to_string()),
            ("pageSize", self.page_size.to_string()),
            ("pageNumber", page.to_string()),
            ("reportName", REPORT_NAME.to_string()),
            ("columns", "ALL".to_string()),
            ("filter", format!("(REPORTDATE='{report_date}')")),
        ]
    }

    fn request_page(&self, period: ReportPeriod, page: u32) -> Result<DatacenterResponse, ApiError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&self.query(period, page))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                period,
            });
        }

        let body = response.text()?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            period,
            message: e.to_string(),
        })
    }
}

impl EarningsProvider for EastMoneyClient {
    fn fetch_period(&self, period: ReportPeriod) -> Result<EarningsBatch, ApiError> {
        let mut batch = EarningsBatch::with_columns(Self::columns());
        let mut page = 1;

        loop {
            let Some(result) = page_result(self.request_page(period, page)?)? else {
                break;
            };
            debug!("{} page {}/{}: {} rows", period, page, result.pages, result.data.len());

            for row in &result.data {
                batch.push(map_row(row))?;
            }

            if page >= result.pages {
                break;
            }
            page += 1;
        }

        Ok(batch)
    }
}

/// `None` when the provider reports the period as having no rows
fn page_result(response: DatacenterResponse) -> Result<Option<DatacenterResult>, ApiError> {
    if response.code == NO_DATA_CODE {
        return Ok(None);
    }
    if !response.success {
        return Err(ApiError::Provider {
            code: response.code,
            message: response.message.unwrap_or_default(),
        });
    }
    Ok(response.result)
}

fn map_row(row: &Map<String, Value>) -> EarningsRecord {
    let mut record = EarningsRecord::new();
    for (field, column) in FIELD_COLUMNS {
        let mut value = row.get(*field).and_then(value_text);
        if DATE_COLUMNS.contains(column) {
            value = value.map(|v| v.chars().take(10).collect());
        }
        record.insert(*column, value);
    }
    record
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
