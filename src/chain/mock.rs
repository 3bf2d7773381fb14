//! Chain, wallet and JSON-RPC node doubles for tests

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::{extract::State, routing::post, Json, Router};
use primitive_types::{H256, U256};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

use super::abi;
use super::wallet::{WalletSnapshot, WalletStatus};
use super::{format_hash, ChainReader, TransactionSender, TxConfirmation, WalletConnector};
use crate::swap::tokens::{format_address, Address};

#[derive(Default)]
struct ChainState {
    reserves: HashMap<(Address, Address), (U256, U256)>,
    /// (token, owner, spender) -> allowance
    allowances: HashMap<(Address, Address, Address), U256>,
    balances: HashMap<(Address, Address), U256>,
    sent: Vec<(Address, Vec<u8>)>,
    next_hash: u64,
    reads: usize,
    fail_reads: bool,
    fail_send: bool,
    fail_confirm: bool,
    revert: bool,
    omit_receipt_hash: bool,
}

/// Chain double that also signs for a single `owner` account.
/// `approve` calldata sent through it updates the allowance table.
pub struct MockChain {
    owner: Address,
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new(owner: Address) -> Arc<Self> {
        Arc::new(Self {
            owner,
            state: Mutex::new(ChainState::default()),
        })
    }

    fn with<R>(&self, f: impl FnOnce(&mut ChainState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn set_reserves(
        &self,
        token_a: Address,
        token_b: Address,
        reserve_a: U256,
        reserve_b: U256,
    ) {
        self.with(|s| {
            s.reserves.insert((token_a, token_b), (reserve_a, reserve_b));
        });
    }

    pub fn set_allowance(&self, token: Address, spender: Address, amount: U256) {
        let owner = self.owner;
        self.with(|s| {
            s.allowances.insert((token, owner, spender), amount);
        });
    }

    pub fn set_balance(&self, token: Address, amount: U256) {
        let owner = self.owner;
        self.with(|s| {
            s.balances.insert((token, owner), amount);
        });
    }

    pub fn fail_reads(&self, fail: bool) {
        self.with(|s| s.fail_reads = fail);
    }

    pub fn fail_send(&self, fail: bool) {
        self.with(|s| s.fail_send = fail);
    }

    pub fn fail_confirm(&self, fail: bool) {
        self.with(|s| s.fail_confirm = fail);
    }

    pub fn revert(&self, revert: bool) {
        self.with(|s| s.revert = revert);
    }

    pub fn omit_receipt_hash(&self, omit: bool) {
        self.with(|s| s.omit_receipt_hash = omit);
    }

    pub fn sent(&self) -> Vec<(Address, Vec<u8>)> {
        self.with(|s| s.sent.clone())
    }

    pub fn reads(&self) -> usize {
        self.with(|s| s.reads)
    }

    fn read<R>(&self, f: impl FnOnce(&ChainState) -> R) -> Result<R> {
        self.with(|s| {
            s.reads += 1;
            if s.fail_reads {
                return Err(anyhow!("rpc unavailable"));
            }
            Ok(f(s))
        })
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn get_reserves(
        &self,
        _amm: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<(U256, U256)> {
        self.read(|s| {
            if let Some(reserves) = s.reserves.get(&(token_a, token_b)) {
                *reserves
            } else if let Some((b, a)) = s.reserves.get(&(token_b, token_a)) {
                (*a, *b)
            } else {
                (U256::zero(), U256::zero())
            }
        })
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        self.read(|s| {
            s.allowances
                .get(&(token, owner, spender))
                .copied()
                .unwrap_or_default()
        })
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        self.read(|s| s.balances.get(&(token, owner)).copied().unwrap_or_default())
    }
}

#[async_trait]
impl TransactionSender for MockChain {
    fn address(&self) -> Address {
        self.owner
    }

    async fn send_transaction(&self, to: Address, data: Vec<u8>) -> Result<H256> {
        let owner = self.owner;
        self.with(|s| {
            if s.fail_send {
                return Err(anyhow!("user rejected transaction"));
            }
            if let Ok((spender, amount)) = abi::decode_approve_call(&data) {
                s.allowances.insert((to, owner, spender), amount);
            }
            s.sent.push((to, data));
            s.next_hash += 1;
            Ok(H256::from_low_u64_be(s.next_hash))
        })
    }

    async fn wait_for_confirmation(&self, hash: H256) -> Result<TxConfirmation> {
        self.with(|s| {
            if s.fail_confirm {
                return Err(anyhow!("receipt lookup failed"));
            }
            Ok(TxConfirmation {
                hash: if s.omit_receipt_hash { None } else { Some(hash) },
                success: !s.revert,
                block_number: Some(s.next_hash),
            })
        })
    }
}

/// Wallet double with a fixed connect result
pub struct MockWallet {
    on_connect: WalletSnapshot,
    signer: Option<Arc<dyn TransactionSender>>,
    state: Mutex<WalletSnapshot>,
}

impl MockWallet {
    pub fn new(
        on_connect: WalletSnapshot,
        signer: Option<Arc<dyn TransactionSender>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            on_connect,
            signer,
            state: Mutex::new(WalletSnapshot::disconnected()),
        })
    }

    /// Wallet that connects as `owner` on `chain_id`
    pub fn ready(chain: Arc<MockChain>, chain_id: u64) -> Arc<Self> {
        let snapshot = WalletSnapshot {
            status: WalletStatus::Ready,
            address: Some(chain.address()),
            chain_id: Some(chain_id),
            native_balance: Some(U256::exp10(18)),
            error: None,
        };
        Self::new(snapshot, Some(chain))
    }
}

#[async_trait]
impl WalletConnector for MockWallet {
    fn snapshot(&self) -> WalletSnapshot {
        self.state.lock().unwrap().clone()
    }

    fn signer(&self) -> Option<Arc<dyn TransactionSender>> {
        if self.snapshot().status == WalletStatus::Disconnected {
            return None;
        }
        self.signer.clone()
    }

    async fn connect(&self) -> WalletSnapshot {
        let snapshot = self.on_connect.clone();
        *self.state.lock().unwrap() = snapshot.clone();
        snapshot
    }

    async fn disconnect(&self) {
        *self.state.lock().unwrap() = WalletSnapshot::disconnected();
    }

    async fn refresh(&self) -> WalletSnapshot {
        self.snapshot()
    }
}

/// A held allowance or balance read: the token asked about and the
/// channel that answers it
pub type HeldRead = (Address, oneshot::Sender<U256>);

/// Reader whose allowance and balance answers the test releases by hand
pub struct HeldReads {
    requests: mpsc::UnboundedSender<HeldRead>,
}

impl HeldReads {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<HeldRead>) {
        let (requests, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { requests }), rx)
    }

    async fn hold(&self, token: Address) -> Result<U256> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send((token, tx))
            .map_err(|_| anyhow!("script closed"))?;
        Ok(rx.await?)
    }
}

#[async_trait]
impl ChainReader for HeldReads {
    async fn get_reserves(&self, _: Address, _: Address, _: Address) -> Result<(U256, U256)> {
        Err(anyhow!("reserves are not scripted"))
    }

    async fn allowance(&self, token: Address, _: Address, _: Address) -> Result<U256> {
        self.hold(token).await
    }

    async fn balance_of(&self, token: Address, _: Address) -> Result<U256> {
        self.hold(token).await
    }
}

#[derive(Default)]
struct NodeScript {
    chain_id: u64,
    accounts: Vec<Address>,
    balance: U256,
    /// `null` receipts served before the real one
    pending_polls: usize,
    receipt_polls: usize,
    /// method -> error message
    errors: HashMap<String, String>,
}

/// JSON-RPC node on a loopback port, answering from a script
pub struct FakeNode {
    url: String,
    script: Arc<Mutex<NodeScript>>,
}

/// Hash returned for every `eth_sendTransaction`
pub fn fake_tx_hash() -> H256 {
    H256::repeat_byte(0x22)
}

async fn answer(
    State(script): State<Arc<Mutex<NodeScript>>>,
    Json(request): Json<Value>,
) -> Json<Value> {
    let id = request["id"].clone();
    let method = request["method"].as_str().unwrap_or_default();
    let mut s = script.lock().unwrap();

    if let Some(message) = s.errors.get(method) {
        return Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32000, "message": message },
        }));
    }

    let result = match method {
        "eth_chainId" => json!(format!("0x{:x}", s.chain_id)),
        "eth_accounts" => json!(s.accounts.iter().map(format_address).collect::<Vec<_>>()),
        "eth_getBalance" => json!(format!("0x{:x}", s.balance)),
        "eth_sendTransaction" => json!(format_hash(&fake_tx_hash())),
        "eth_getTransactionReceipt" => {
            s.receipt_polls += 1;
            if s.receipt_polls <= s.pending_polls {
                Value::Null
            } else {
                json!({
                    "transactionHash": request["params"][0],
                    "status": "0x1",
                    "blockNumber": "0x2a",
                })
            }
        }
        _ => Value::Null,
    };
    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

impl FakeNode {
    pub async fn start(chain_id: u64, accounts: Vec<Address>) -> Self {
        let script = Arc::new(Mutex::new(NodeScript {
            chain_id,
            accounts,
            balance: U256::exp10(18),
            ..Default::default()
        }));
        let app = Router::new()
            .route("/", post(answer))
            .with_state(script.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { url, script }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Answer `method` with a JSON-RPC error object
    pub fn fail(&self, method: &str, message: &str) {
        let mut s = self.script.lock().unwrap();
        s.errors.insert(method.to_string(), message.to_string());
    }

    /// Serve `polls` null receipts before the mined one
    pub fn hold_receipt(&self, polls: usize) {
        self.script.lock().unwrap().pending_polls = polls;
    }

    pub fn receipt_polls(&self) -> usize {
        self.script.lock().unwrap().receipt_polls
    }
}
