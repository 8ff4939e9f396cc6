//! Credit estimation, pre-checks, and deductions.
//!
//! Two-phase billing discipline: a conservative pre-flight estimate gates
//! the whole operation before any expensive work; exact per-stage charges
//! are deducted after each stage completes. A failed deduction is logged
//! and never rolls back or blocks delivery of already-produced results.

use crate::config::BillingSettings;
use crate::error::{OpptakError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A credit ledger collaborator.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Whether the owner's balance covers the given cost.
    async fn check(&self, owner: &str, cost: f64) -> Result<bool>;

    /// Deduct a charge. Returns false when the ledger refused it.
    async fn deduct(&self, owner: &str, cost: f64, reason: &str) -> Result<bool>;
}

/// Ledger used when billing is disabled: everything is allowed, nothing
/// is recorded.
pub struct NoopLedger;

#[async_trait]
impl CreditLedger for NoopLedger {
    async fn check(&self, _owner: &str, _cost: f64) -> Result<bool> {
        Ok(true)
    }

    async fn deduct(&self, _owner: &str, _cost: f64, _reason: &str) -> Result<bool> {
        Ok(true)
    }
}

/// HTTP implementation against the credit ledger service.
pub struct HttpCreditLedger {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct ChargeRequest<'a> {
    owner: &'a str,
    cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

#[derive(Deserialize)]
struct ChargeResponse {
    ok: bool,
}

impl HttpCreditLedger {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| OpptakError::Billing(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, path: &str, body: &ChargeRequest<'_>) -> Result<bool> {
        let url = format!("{}/{}", self.base_url, path);
        let response: ChargeResponse = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| OpptakError::Billing(format!("Ledger request failed: {e}")))?
            .error_for_status()
            .map_err(|e| OpptakError::Billing(format!("Ledger returned error: {e}")))?
            .json()
            .await
            .map_err(|e| OpptakError::Billing(format!("Invalid ledger response: {e}")))?;

        Ok(response.ok)
    }
}

#[async_trait]
impl CreditLedger for HttpCreditLedger {
    async fn check(&self, owner: &str, cost: f64) -> Result<bool> {
        self.post(
            "check",
            &ChargeRequest {
                owner,
                cost,
                reason: None,
            },
        )
        .await
    }

    async fn deduct(&self, owner: &str, cost: f64, reason: &str) -> Result<bool> {
        self.post(
            "deduct",
            &ChargeRequest {
                owner,
                cost,
                reason: Some(reason),
            },
        )
        .await
    }
}

/// Transient cost figure for one stage.
#[derive(Debug, Clone)]
pub struct CostEstimate {
    pub base_cost: f64,
    /// Base cost with the margin multiplier applied.
    pub final_cost: f64,
    /// Human-readable description of what the estimate was derived from.
    pub basis: String,
}

/// Pre-flight checks and exact per-stage charges against the ledger.
pub struct CostGuard {
    ledger: Arc<dyn CreditLedger>,
    settings: BillingSettings,
}

impl CostGuard {
    pub fn new(ledger: Arc<dyn CreditLedger>, settings: BillingSettings) -> Self {
        Self { ledger, settings }
    }

    /// Conservative text-volume estimate: price the assumed transcript as
    /// both transcription minutes and synthesis tokens.
    pub fn estimate_text(&self, chars: u64) -> CostEstimate {
        // Rough proxies: ~1000 chars of transcript per minute of speech,
        // ~4 chars per token.
        let minutes = (chars as f64 / 1000.0).ceil();
        let tokens = chars as f64 / 4.0;

        let base_cost = minutes * self.settings.transcription_per_minute
            + tokens / 1000.0 * self.settings.synthesis_per_1k_tokens;

        CostEstimate {
            base_cost,
            final_cost: base_cost * self.settings.margin,
            basis: format!("{} chars (~{:.0} min, ~{:.0} tokens)", chars, minutes, tokens),
        }
    }

    /// Exact transcription cost, priced per minute of audio (rounded up).
    pub fn transcription_cost(&self, duration_seconds: f64) -> CostEstimate {
        let minutes = (duration_seconds / 60.0).ceil().max(1.0);
        let base_cost = minutes * self.settings.transcription_per_minute;

        CostEstimate {
            base_cost,
            final_cost: base_cost * self.settings.margin,
            basis: format!("{:.1}s of audio ({:.0} min)", duration_seconds, minutes),
        }
    }

    /// Exact synthesis cost, priced per 1000 tokens.
    pub fn synthesis_cost(&self, tokens: u64) -> CostEstimate {
        let base_cost = tokens as f64 / 1000.0 * self.settings.synthesis_per_1k_tokens;

        CostEstimate {
            base_cost,
            final_cost: base_cost * self.settings.margin,
            basis: format!("{} tokens", tokens),
        }
    }

    /// Pre-flight gate: estimate from the configured text-volume proxy and
    /// reject the whole operation up front when the balance is short.
    pub async fn precheck(&self, owner: &str) -> Result<()> {
        let estimate = self.estimate_text(self.settings.precheck_chars);
        debug!(
            "Pre-check for {}: {:.4} credits ({})",
            owner, estimate.final_cost, estimate.basis
        );

        let allowed = self.ledger.check(owner, estimate.final_cost).await?;
        if !allowed {
            return Err(OpptakError::InsufficientCredits(format!(
                "Estimated cost {:.4} exceeds available balance",
                estimate.final_cost
            )));
        }

        Ok(())
    }

    /// Deduct an exact stage charge after the stage completed.
    ///
    /// Failed deductions are logged and swallowed: the work is already
    /// done and the result will be delivered regardless.
    pub async fn charge(&self, owner: &str, estimate: &CostEstimate, reason: &str) {
        match self.ledger.deduct(owner, estimate.final_cost, reason).await {
            Ok(true) => {
                info!(
                    "Charged {} {:.4} credits for {} ({})",
                    owner, estimate.final_cost, reason, estimate.basis
                );
            }
            Ok(false) => {
                warn!(
                    "Ledger refused {} charge of {:.4} for {}; continuing",
                    reason, estimate.final_cost, owner
                );
            }
            Err(e) => {
                warn!(
                    "Failed to record {} charge of {:.4} for {}: {}; continuing",
                    reason, estimate.final_cost, owner, e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BillingSettings {
        BillingSettings {
            enabled: true,
            ledger_url: String::new(),
            transcription_per_minute: 0.01,
            synthesis_per_1k_tokens: 0.002,
            margin: 1.5,
            precheck_chars: 10_000,
        }
    }

    struct DenyingLedger;

    #[async_trait]
    impl CreditLedger for DenyingLedger {
        async fn check(&self, _owner: &str, _cost: f64) -> Result<bool> {
            Ok(false)
        }

        async fn deduct(&self, _owner: &str, _cost: f64, _reason: &str) -> Result<bool> {
            Ok(false)
        }
    }

    #[test]
    fn test_transcription_cost_rounds_minutes_up() {
        let guard = CostGuard::new(Arc::new(NoopLedger), settings());

        // 601s = 10.02 min, rounds to 11
        let estimate = guard.transcription_cost(601.0);
        assert!((estimate.base_cost - 0.11).abs() < 1e-9);
        assert!((estimate.final_cost - 0.165).abs() < 1e-9);
    }

    #[test]
    fn test_synthesis_cost_per_token() {
        let guard = CostGuard::new(Arc::new(NoopLedger), settings());

        let estimate = guard.synthesis_cost(5000);
        assert!((estimate.base_cost - 0.01).abs() < 1e-9);
        assert!((estimate.final_cost - 0.015).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_text_applies_margin() {
        let guard = CostGuard::new(Arc::new(NoopLedger), settings());

        let estimate = guard.estimate_text(10_000);
        assert!(estimate.final_cost > estimate.base_cost);
        assert!((estimate.final_cost - estimate.base_cost * 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_precheck_passes_with_noop_ledger() {
        let guard = CostGuard::new(Arc::new(NoopLedger), settings());
        assert!(guard.precheck("owner-1").await.is_ok());
    }

    #[tokio::test]
    async fn test_precheck_rejects_insufficient_balance() {
        let guard = CostGuard::new(Arc::new(DenyingLedger), settings());
        let result = guard.precheck("owner-1").await;
        assert!(matches!(
            result,
            Err(OpptakError::InsufficientCredits(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_deduction_does_not_panic_or_error() {
        let guard = CostGuard::new(Arc::new(DenyingLedger), settings());
        let estimate = guard.synthesis_cost(1000);
        // Refused charge is logged and swallowed
        guard.charge("owner-1", &estimate, "synthesis").await;
    }
}
