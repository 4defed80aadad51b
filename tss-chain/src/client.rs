use crate::error::ChainError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AccountDetail {
    pub sequence_number: i64,
}

#[derive(Debug, Clone, Default)]
pub struct SimulationResult {
    pub error: String,
    pub auth_entries_base64: Vec<String>,
    pub transaction_data_base64: String,
    pub min_resource_fee: i64,
}

impl SimulationResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SubmitResult {
    pub hash: String,
    pub result_xdr: String,
}

#[derive(Debug, Clone)]
pub struct TransactionDetail {
    pub result_xdr: String,
    pub ledger: u32,
    pub ledger_close_time: chrono::DateTime<chrono::Utc>,
    pub successful: bool,
}

/// Narrow, typed contract over the blockchain's RPC surface.
/// Treated as a remote callable: no query planner, no bespoke client — just
/// the four operations the core actually needs.
#[async_trait]
pub trait BlockchainClient: Send + Sync {
    async fn account_detail(&self, public_key: &str) -> Result<AccountDetail, ChainError>;

    async fn simulate_contract_invocation(
        &self,
        envelope_b64: &str,
    ) -> Result<SimulationResult, ChainError>;

    async fn submit_transaction(&self, envelope_b64: &str) -> Result<SubmitResult, ChainError>;

    async fn transaction_detail(&self, hash: &str) -> Result<TransactionDetail, ChainError>;

    /// Latest known ledger sequence number, used by `LedgerTracker`.
    async fn latest_ledger(&self) -> Result<u32, ChainError>;
}

/// HTTP implementation talking to a Horizon/RPC-style JSON endpoint.
pub struct HttpBlockchainClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBlockchainClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("reqwest client configuration is static and valid");
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ChainError> {
        let response = self.http.get(self.url(path)).send().await.map_err(map_reqwest_err)?;
        handle_response(response).await
    }

    async fn post_json<B: serde::Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ChainError> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_err)?;
        handle_response(response).await
    }
}

fn map_reqwest_err(err: reqwest::Error) -> ChainError {
    if err.is_timeout() {
        ChainError::Timeout
    } else {
        ChainError::Network(err.to_string())
    }
}

async fn handle_response<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, ChainError> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ChainError::NotFound);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ChainError::RateLimited);
    }
    if status.is_server_error() {
        return Err(ChainError::Network(format!("server error {status}")));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ChainError::Protocol { code: body });
    }
    response
        .json::<T>()
        .await
        .map_err(|e| ChainError::MalformedResponse(e.to_string()))
}

#[derive(Deserialize)]
struct AccountResponse {
    sequence: String,
}

#[derive(Deserialize)]
struct LedgerResponse {
    sequence: u32,
}

#[derive(Deserialize)]
struct SimulateResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    auth: Vec<String>,
    #[serde(default)]
    transaction_data: String,
    #[serde(default, rename = "minResourceFee")]
    min_resource_fee: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    hash: String,
    result_xdr: String,
    successful: bool,
}

#[derive(Deserialize)]
struct TransactionDetailResponse {
    result_xdr: String,
    ledger: u32,
    ledger_close_time: chrono::DateTime<chrono::Utc>,
    successful: bool,
}

#[async_trait]
impl BlockchainClient for HttpBlockchainClient {
    async fn account_detail(&self, public_key: &str) -> Result<AccountDetail, ChainError> {
        let resp: AccountResponse = self
            .get_json(&format!("accounts/{public_key}"))
            .await?;
        let sequence_number = resp
            .sequence
            .parse()
            .map_err(|_| ChainError::MalformedResponse("non-numeric sequence".into()))?;
        Ok(AccountDetail { sequence_number })
    }

    async fn simulate_contract_invocation(
        &self,
        envelope_b64: &str,
    ) -> Result<SimulationResult, ChainError> {
        let resp: SimulateResponse = self
            .post_json("simulateTransaction", &serde_json::json!({ "transaction": envelope_b64 }))
            .await?;
        let min_resource_fee = resp.min_resource_fee.parse().unwrap_or(0);
        Ok(SimulationResult {
            error: resp.error,
            auth_entries_base64: resp.auth,
            transaction_data_base64: resp.transaction_data,
            min_resource_fee,
        })
    }

    async fn submit_transaction(&self, envelope_b64: &str) -> Result<SubmitResult, ChainError> {
        let resp: SubmitResponse = self
            .post_json("transactions", &serde_json::json!({ "tx": envelope_b64 }))
            .await?;
        if !resp.successful {
            return Err(ChainError::Protocol {
                code: resp.result_xdr,
            });
        }
        Ok(SubmitResult {
            hash: resp.hash,
            result_xdr: resp.result_xdr,
        })
    }

    async fn transaction_detail(&self, hash: &str) -> Result<TransactionDetail, ChainError> {
        let resp: TransactionDetailResponse =
            self.get_json(&format!("transactions/{hash}")).await?;
        Ok(TransactionDetail {
            result_xdr: resp.result_xdr,
            ledger: resp.ledger,
            ledger_close_time: resp.ledger_close_time,
            successful: resp.successful,
        })
    }

    async fn latest_ledger(&self) -> Result<u32, ChainError> {
        let resp: LedgerResponse = self.get_json("ledgers?order=desc&limit=1").await?;
        Ok(resp.sequence)
    }
}
