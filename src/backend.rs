// Single seam for everything a production deployment would send to a server.
// LocalBackend answers in-process with the heuristics in this crate.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assistant;
use crate::catalog::Catalog;
use crate::error::Result;
use crate::offer::{self, Decision};
use crate::trends::TrendLedger;
use crate::types::*;

/// Request kinds the storefront can submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    Negotiate,
    Chat,
    TrendVote,
    TrendList,
    DreamToProduct,
}

/// Transport-agnostic capability: submit a JSON payload, get a JSON response.
pub trait Backend {
    fn submit(&mut self, kind: RequestKind, payload: Value) -> Result<Value>;
}

/// Typed wrapper around `Backend::submit`.
pub fn call<Req, Resp>(backend: &mut impl Backend, kind: RequestKind, request: &Req) -> Result<Resp>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    let payload = serde_json::to_value(request)?;
    let response = backend.submit(kind, payload)?;
    Ok(serde_json::from_value(response)?)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiateRequest {
    pub product_id: ProductId,
    pub offer: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiateResponse {
    pub decision: Decision,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatContext {
    #[serde(default)]
    pub products: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub context: ChatContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendsResponse {
    pub trends: Vec<TrendEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DreamRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DreamResponse {
    pub suggestions: Vec<DreamSuggestion>,
}

/// In-process backend. Owns the trend ledger, which a server would keep.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    catalog: Catalog,
    ledger: TrendLedger,
}

impl LocalBackend {
    pub fn new(catalog: Catalog, ledger: TrendLedger) -> Self {
        LocalBackend { catalog, ledger }
    }

    pub fn ledger(&self) -> &TrendLedger {
        &self.ledger
    }
}

impl Backend for LocalBackend {
    fn submit(&mut self, kind: RequestKind, payload: Value) -> Result<Value> {
        tracing::debug!(?kind, "backend request");
        let response = match kind {
            RequestKind::Negotiate => {
                let request: NegotiateRequest = serde_json::from_value(payload)?;
                let product = self.catalog.get(request.product_id)?;
                let decision = offer::evaluate(product, request.offer)?;
                serde_json::to_value(NegotiateResponse { decision })?
            }
            RequestKind::Chat => {
                let request: ChatRequest = serde_json::from_value(payload)?;
                let answer = assistant::chat_answer(&request.prompt)?;
                serde_json::to_value(ChatResponse { answer })?
            }
            RequestKind::TrendVote => {
                let request: VoteRequest = serde_json::from_value(payload)?;
                self.ledger.vote(&request.label)?;
                serde_json::to_value(TrendsResponse {
                    trends: self.ledger.list(),
                })?
            }
            RequestKind::TrendList => serde_json::to_value(TrendsResponse {
                trends: self.ledger.list(),
            })?,
            RequestKind::DreamToProduct => {
                let request: DreamRequest = serde_json::from_value(payload)?;
                let suggestions = assistant::dream_suggestions(&request.prompt)?;
                serde_json::to_value(DreamResponse { suggestions })?
            }
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorefrontError;
    use serde_json::json;

    fn backend() -> LocalBackend {
        let config = StorefrontConfig::default();
        LocalBackend::new(
            Catalog::new(config.catalog).unwrap(),
            TrendLedger::seeded(&config.trend_seeds),
        )
    }

    #[test]
    fn negotiate_round_trip() {
        let mut backend = backend();
        let response: NegotiateResponse = call(
            &mut backend,
            RequestKind::Negotiate,
            &NegotiateRequest {
                product_id: ProductId::new(1),
                offer: 2499.0,
            },
        )
        .unwrap();
        assert!(matches!(response.decision, Decision::Accepted { .. }));
    }

    #[test]
    fn negotiate_unknown_product() {
        let mut backend = backend();
        let err = backend
            .submit(RequestKind::Negotiate, json!({"product_id": 42, "offer": 10.0}))
            .unwrap_err();
        assert!(matches!(err, StorefrontError::UnknownProduct(_)));
    }

    #[test]
    fn malformed_payload_is_serialization_error() {
        let mut backend = backend();
        let err = backend
            .submit(RequestKind::Chat, json!({"question": "hi"}))
            .unwrap_err();
        assert!(matches!(err, StorefrontError::Serialization(_)));
    }

    #[test]
    fn votes_are_recorded() {
        let mut backend = backend();
        let response: TrendsResponse = call(
            &mut backend,
            RequestKind::TrendVote,
            &VoteRequest {
                label: "Block Print Scarf".to_string(),
            },
        )
        .unwrap();
        assert_eq!(response.trends.last().unwrap().label, "Block Print Scarf");
        assert_eq!(backend.ledger().votes("Block Print Scarf"), 1);
    }

    #[test]
    fn dream_and_chat() {
        let mut backend = backend();
        let dream: DreamResponse = call(
            &mut backend,
            RequestKind::DreamToProduct,
            &DreamRequest {
                prompt: "sunlit balcony garden".to_string(),
            },
        )
        .unwrap();
        assert_eq!(dream.suggestions.len(), 2);

        let chat: ChatResponse = call(
            &mut backend,
            RequestKind::Chat,
            &ChatRequest {
                prompt: "how to wash".to_string(),
                context: ChatContext::default(),
            },
        )
        .unwrap();
        assert!(chat.answer.contains("hand-washing"));
    }
}
