//! End-to-end run against canned market data
//!
//! The data adapters return fixed payloads so only the LLM backend is live.
//! Configure it through `.env` or the environment (`AI_PROVIDER`,
//! `AI_API_KEY`, `OLLAMA_BASE_URL`, ...).
//!
//! Run with: cargo run -p equity-agents --example basic_run -- WEGE3

use async_trait::async_trait;
use equity_agents::EquityGraph;
use equity_core::{
    CapabilityAdapter, CapabilityError, CapabilityRegistry, CapabilityRequest, DataDomain,
};
use equity_utils::{Settings, init_tracing};
use serde_json::{Value, json};
use std::sync::Arc;

struct CannedData {
    domain: DataDomain,
    payload: Value,
}

#[async_trait]
impl CapabilityAdapter for CannedData {
    fn name(&self) -> &str {
        "canned"
    }

    fn domain(&self) -> DataDomain {
        self.domain
    }

    async fn call(&self, request: CapabilityRequest) -> Result<Value, CapabilityError> {
        Ok(json!({
            "ticker": request.subject.identifier(),
            "data": self.payload,
        }))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let ticker = std::env::args().nth(1).unwrap_or_else(|| "WEGE3".to_string());

    let registry = CapabilityRegistry::new()
        .with(Arc::new(CannedData {
            domain: DataDomain::FinancialStatements,
            payload: json!({
                "period": "2024",
                "net_revenue_brl_mm": 37_992,
                "ebitda_brl_mm": 8_261,
                "net_income_brl_mm": 5_732,
                "net_debt_brl_mm": -2_130,
            }),
        }))
        .with(Arc::new(CannedData {
            domain: DataDomain::MarketData,
            payload: json!({
                "close": 52.31,
                "return_12m_pct": 18.4,
                "volatility_annual_pct": 27.9,
                "beta_ibov": 0.71,
            }),
        }))
        .with(Arc::new(CannedData {
            domain: DataDomain::News,
            payload: json!([
                "Company raises capex guidance for transmission equipment",
                "Exports grow on North American grid demand",
            ]),
        }));

    let graph = EquityGraph::from_settings(Settings::from_env()?, registry)?;
    let report = graph.run(&ticker).await?;

    println!("{}", report.document.body);
    println!();
    for branch in &report.branches {
        println!(
            "{:<16} {:?} after {} attempt(s)",
            branch.agent.as_str(),
            branch.outcome,
            branch.attempts
        );
    }

    Ok(())
}
