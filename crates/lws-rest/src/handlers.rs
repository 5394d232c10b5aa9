//! The seven endpoint handlers.
//!
//! Shared shape: decode the typed request, authenticate the caller for
//! address-bearing endpoints, walk the account under one read snapshot,
//! finish the snapshot, then (only then) talk to the daemon oracle, and
//! build the response body.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use lws_crypto::secret_key_to_public;
use lws_db::{
    Account, Output, OutputId, RequestKind, Spend, Storage, StorageReader, TransactionLink,
};
use lws_rpc::{DaemonClient, RateSource};
use lws_types::constants::{COINBASE_UNLOCK_WINDOW, MAX_BLOCK_NUMBER};
use lws_types::{AccountAddress, Network};

use crate::error::Error;
use crate::json::{Hex32, HexBytes, JsonError, Timestamp, U64S};
use crate::projector::project_output;
use crate::tx::validate_tx_blob;
use crate::types::*;

/// Random-outs gates: the daemon is never asked for more than this.
pub const MAX_RANDOM_OUTS_COUNT: u64 = 50;
pub const MAX_RANDOM_OUTS_AMOUNTS: usize = 10;

/// Per-connection request context.
#[derive(Debug, Default, Clone, Copy)]
pub struct Context {
    pub logged_in: bool,
}

/// Everything a handler needs besides the request itself.
#[derive(Clone)]
pub struct HandlerState {
    pub disk: Storage,
    pub client: DaemonClient,
    pub rates: RateSource,
    pub network: Network,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub(crate) fn decode_request<T: DeserializeOwned>(root: &Value) -> Result<T, Error> {
    serde_json::from_value(root.clone()).map_err(|e| Error::Json(JsonError::from_serde(&e)))
}

pub(crate) fn encode_response<T: Serialize>(body: &T) -> Result<Value, Error> {
    serde_json::to_value(body).map_err(|e| {
        if e.to_string().contains("system clock out of range") {
            Error::SystemClockInvalidRange
        } else {
            Error::Json(JsonError::from_serde(&e))
        }
    })
}

/// `derive_public(view_key) == address.view_public`, the whole of the
/// authentication secret check.
fn key_check(address: &AccountAddress, view_key: &[u8; 32]) -> bool {
    secret_key_to_public(view_key) == Some(address.view_public)
}

/// Authenticate `(address, view_key)` against the snapshot. A hidden
/// account is reported exactly like a missing one.
fn get_account(
    state: &HandlerState,
    reader: &StorageReader,
    address: &str,
    view_key: &[u8; 32],
) -> Result<Account, Error> {
    let address = AccountAddress::from_str(state.network, address)?;
    if !key_check(&address, view_key) {
        return Err(Error::BadViewKey);
    }
    let (status, account) = reader.get_account(&address)?;
    if status.is_hidden() {
        return Err(Error::NoSuchAccount);
    }
    Ok(account)
}

/// Whether an output cannot be spent yet at `chain_height`. Coinbase
/// outputs mature over a fixed window; everything else consults the
/// unlock time, which is a block height below `MAX_BLOCK_NUMBER` and a
/// unix timestamp above it.
fn is_locked(out: &Output, chain_height: u64) -> bool {
    if out.is_coinbase() {
        return chain_height <= out.id.height + COINBASE_UNLOCK_WINDOW;
    }
    if out.unlock_time > MAX_BLOCK_NUMBER {
        out.unlock_time > unix_now()
    } else {
        out.unlock_time > chain_height
    }
}

/// The per-output fields spends join against.
#[derive(Debug, Clone, Copy)]
struct SpendMeta {
    id: OutputId,
    amount: u64,
    mixin_count: u32,
    index: u32,
    tx_public: [u8; 32],
}

impl SpendMeta {
    fn of(out: &Output) -> Self {
        SpendMeta {
            id: out.id,
            amount: out.amount,
            mixin_count: out.mixin_count,
            index: out.index,
            tx_public: out.tx_public,
        }
    }
}

/// Keep `metas` sorted by output id. Outputs usually arrive in order, so
/// the common case is a push.
fn insert_meta(metas: &mut Vec<SpendMeta>, meta: SpendMeta) {
    match metas.last() {
        Some(last) if meta.id <= last.id => {
            let at = metas.partition_point(|m| m.id < meta.id);
            metas.insert(at, meta);
        }
        _ => metas.push(meta),
    }
}

/// Binary search for the source output of a spend. A miss is a store
/// invariant violation and fatal for the request.
fn find_meta(metas: &[SpendMeta], id: OutputId) -> Result<SpendMeta, Error> {
    let at = metas.partition_point(|m| m.id < id);
    match metas.get(at) {
        Some(meta) if meta.id == id => Ok(*meta),
        _ => {
            error!("spend recorded without a matching receive");
            Err(Error::StorageCorrupt("no receive for spend"))
        }
    }
}

fn spent_output(meta: &SpendMeta, spend: &Spend) -> SpentOutput {
    SpentOutput {
        amount: U64S(meta.amount),
        key_image: Hex32(spend.image),
        tx_pub_key: Hex32(meta.tx_public),
        out_index: meta.index,
        mixin: spend.mixin_count,
    }
}

// ─── /login ─────────────────────────────────────────────────────────────────

pub async fn login(state: &HandlerState, root: &Value, ctx: &mut Context) -> Result<Value, Error> {
    let req: LoginRequest = decode_request(root)?;
    let address = AccountAddress::from_str(state.network, &req.address)?;
    if !key_check(&address, &req.view_key.0) {
        return Err(Error::BadViewKey);
    }

    {
        let reader = state.disk.start_read()?;
        let existing = reader.get_account(&address);
        reader.finish();

        match existing {
            Ok((status, _)) => {
                if status.is_hidden() {
                    return Err(Error::NoSuchAccount);
                }
                ctx.logged_in = true;
                if let Err(e) = state.disk.touch_access_time(&address, unix_now() as u32) {
                    warn!("unable to update access time: {}", e);
                }
                return encode_response(&LoginResponse { new_address: false });
            }
            Err(lws_db::DbError::AccountNotFound) if req.create_account => {}
            Err(lws_db::DbError::AccountNotFound) => return Err(Error::NoSuchAccount),
            Err(e) => return Err(e.into()),
        }
    }

    // Queuing a creation request is not a login.
    state.disk.creation_request(&address, &req.view_key.0)?;
    encode_response(&LoginResponse { new_address: true })
}

// ─── /get_address_info ──────────────────────────────────────────────────────

pub async fn get_address_info(
    state: &HandlerState,
    root: &Value,
    ctx: &mut Context,
) -> Result<Value, Error> {
    let req: AddressRequest = decode_request(root)?;

    let mut locked = 0u64;
    let mut received = 0u64;
    let mut spent = 0u64;
    let chain_height;
    let user_height;
    let user_start;
    let mut spent_outputs = Vec::new();

    {
        let reader = state.disk.start_read()?;
        let user = get_account(state, &reader, &req.address, &req.view_key.0)?;
        ctx.logged_in = true;

        let last = reader.get_last_block()?;
        chain_height = last.height;
        user_height = user.scan_height;
        user_start = user.start_height;

        let mut metas = Vec::new();
        for entry in reader.get_outputs(user.id)? {
            let out = entry?;
            insert_meta(&mut metas, SpendMeta::of(&out));
            received += out.amount;
            if is_locked(&out, chain_height) {
                locked += out.amount;
            }
        }

        for entry in reader.get_spends(user.id)? {
            let spend = entry?;
            let meta = find_meta(&metas, spend.source)?;
            spent += meta.amount;
            spent_outputs.push(spent_output(&meta, &spend));
        }

        reader.finish();
    }

    let rates = match state.rates.get_rates().await {
        Ok(rates) => Some(rates),
        Err(e) => {
            warn!("unable to retrieve exchange rates: {}", e);
            None
        }
    };

    encode_response(&AddressInfoResponse {
        locked_funds: U64S(locked),
        total_received: U64S(received),
        total_sent: U64S(spent),
        scanned_height: user_height,
        scanned_block_height: user_height,
        start_height: user_start,
        transaction_height: chain_height,
        blockchain_height: chain_height,
        spent_outputs,
        rates,
    })
}

// ─── /get_address_txs ───────────────────────────────────────────────────────

struct TxEntry {
    link: TransactionLink,
    timestamp: u64,
    unlock_time: u64,
    mixin_count: u32,
    coinbase: bool,
    payment_id: Option<Vec<u8>>,
    received: u64,
    spent: u64,
    spends: Vec<SpentOutput>,
}

impl TxEntry {
    fn from_output(out: &Output) -> Self {
        TxEntry {
            link: out.link,
            timestamp: out.timestamp,
            unlock_time: out.unlock_time,
            mixin_count: out.mixin_count,
            coinbase: out.is_coinbase(),
            payment_id: out.payment_id_bytes().map(<[u8]>::to_vec),
            received: out.amount,
            spent: 0,
            spends: Vec::new(),
        }
    }

    fn from_spend(meta: &SpendMeta, spend: &Spend) -> Self {
        TxEntry {
            link: spend.link,
            timestamp: spend.timestamp,
            unlock_time: spend.unlock_time,
            mixin_count: spend.mixin_count,
            coinbase: false,
            payment_id: None,
            received: 0,
            spent: 0,
            spends: vec![spent_output(meta, spend)],
        }
    }
}

pub async fn get_address_txs(
    state: &HandlerState,
    root: &Value,
    ctx: &mut Context,
) -> Result<Value, Error> {
    let req: AddressRequest = decode_request(root)?;

    let mut received = 0u64;
    let chain_height;
    let user_height;
    let user_start;
    let mut txes: Vec<TxEntry> = Vec::new();

    {
        let reader = state.disk.start_read()?;
        let user = get_account(state, &reader, &req.address, &req.view_key.0)?;
        ctx.logged_in = true;

        let last = reader.get_last_block()?;
        chain_height = last.height;
        user_height = user.scan_height;
        user_start = user.start_height;

        // Merge both sorted streams into per-transaction entries, walking
        // whichever cursor's next link is lesser.
        let outputs: Vec<Output> =
            reader.get_outputs(user.id)?.collect::<Result<_, _>>()?;
        let spends: Vec<Spend> = reader.get_spends(user.id)?.collect::<Result<_, _>>()?;
        reader.finish();

        let mut metas = Vec::with_capacity(outputs.len());
        let (mut i, mut j) = (0usize, 0usize);

        while i < outputs.len() || j < spends.len() {
            if let Some(last) = txes.last() {
                let regression = (i < outputs.len() && outputs[i].link < last.link)
                    || (j < spends.len() && spends[j].link < last.link);
                if regression {
                    error!("output/spend cursor regressed while merging transactions");
                    return Err(Error::StorageCorrupt("unexpected sort order"));
                }
            }

            let take_output =
                j >= spends.len() || (i < outputs.len() && outputs[i].link <= spends[j].link);

            if take_output {
                let out = &outputs[i];
                match txes.last_mut() {
                    Some(last) if last.link.tx_hash == out.link.tx_hash => {
                        last.received += out.amount;
                    }
                    _ => txes.push(TxEntry::from_output(out)),
                }
                insert_meta(&mut metas, SpendMeta::of(out));
                received += out.amount;
                i += 1;
            } else {
                let spend = &spends[j];
                let meta = find_meta(&metas, spend.source)?;
                match txes.last_mut() {
                    Some(last) if last.link.tx_hash == spend.link.tx_hash => {
                        last.spends.push(spent_output(&meta, spend));
                        last.spent += meta.amount;
                    }
                    _ => {
                        let mut entry = TxEntry::from_spend(&meta, spend);
                        entry.spent = meta.amount;
                        txes.push(entry);
                    }
                }
                j += 1;
            }
        }
    }

    let transactions = txes
        .into_iter()
        .enumerate()
        .map(|(id, tx)| AddressTx {
            id: id as u64,
            hash: Hex32(tx.link.tx_hash),
            timestamp: Timestamp(tx.timestamp),
            total_received: U64S(tx.received),
            total_sent: U64S(tx.spent),
            unlock_time: tx.unlock_time,
            height: tx.link.height,
            payment_id: tx.payment_id.map(HexBytes),
            coinbase: tx.coinbase,
            mempool: false,
            mixin: tx.mixin_count,
            spent_outputs: tx.spends,
        })
        .collect();

    encode_response(&AddressTxsResponse {
        total_received: U64S(received),
        scanned_height: user_height,
        scanned_block_height: user_height,
        start_height: user_start,
        transaction_height: chain_height,
        blockchain_height: chain_height,
        transactions,
    })
}

// ─── /get_unspent_outs ──────────────────────────────────────────────────────

pub async fn get_unspent_outs(
    state: &HandlerState,
    root: &Value,
    ctx: &mut Context,
) -> Result<Value, Error> {
    let req: UnspentOutsRequest = decode_request(root)?;

    // Dispatch the fee query before touching the database and await it
    // after the snapshot is finished, so no pages stay pinned across
    // network I/O.
    let fee_client = state.client.clone();
    let fee_task = tokio::spawn(async move { fee_client.get_fee_estimate(10).await });

    let threshold = if req.use_dust.unwrap_or(false) {
        0
    } else {
        req.dust_threshold.map(|d| d.0).unwrap_or(0)
    };
    let mixin = req.mixin.unwrap_or(0);

    let mut received = 0u64;
    let spend_public;
    let view_key = req.view_key.0;
    let mut unspent: Vec<(Output, Vec<[u8; 32]>)> = Vec::new();

    {
        let reader = state.disk.start_read()?;
        let user = get_account(state, &reader, &req.address, &view_key)?;
        ctx.logged_in = true;
        spend_public = user.address.spend_public;

        for entry in reader.get_outputs(user.id)? {
            let out = entry?;
            if out.amount < threshold || out.mixin_count < mixin {
                continue;
            }
            received += out.amount;
            let images = reader.get_images(out.id)?.collect::<Result<_, _>>()?;
            unspent.push((out, images));
        }

        if received < req.amount.0 {
            // Do not reveal whether the account exists but is short.
            return Err(Error::NoSuchAccount);
        }
        reader.finish();
    }

    let fee = fee_task
        .await
        .map_err(|_| Error::Internal("fee estimate task failed"))??;

    let outputs = unspent
        .into_iter()
        .map(|(out, images)| project_output(&out, images, &view_key, &spend_public))
        .collect::<Result<Vec<_>, _>>()?;

    encode_response(&UnspentOutsResponse {
        per_kb_fee: fee.fee,
        amount: U64S(received),
        outputs,
    })
}

// ─── /get_random_outs ───────────────────────────────────────────────────────

pub async fn get_random_outs(
    state: &HandlerState,
    root: &Value,
    ctx: &mut Context,
) -> Result<Value, Error> {
    if !ctx.logged_in {
        return Err(Error::NoSuchAccount);
    }

    let req: RandomOutsRequest = decode_request(root)?;
    if req.count > MAX_RANDOM_OUTS_COUNT || req.amounts.len() > MAX_RANDOM_OUTS_AMOUNTS {
        return Err(Error::ExceededRestRequestLimit);
    }

    let client = state.client.clone();
    let amounts: Vec<u64> = req.amounts.iter().map(|a| a.0).collect();
    let groups = client.get_random_outputs(req.count, &amounts).await?;

    let wanted: Vec<(u64, u64)> = groups
        .iter()
        .flat_map(|group| group.outputs.iter().map(|out| (group.amount, out.amount_index)))
        .collect();
    let mut keys = client.get_output_keys(&wanted).await?;
    keys.sort_unstable_by(|a, b| a.key.cmp(&b.key));

    let amount_outs = groups
        .iter()
        .map(|group| {
            let outputs = group
                .outputs
                .iter()
                .map(|out| {
                    let found = keys
                        .binary_search_by(|probe| probe.key.cmp(&out.key))
                        .map_err(|_| Error::BadDaemonResponse)?;
                    Ok(RandomOutput {
                        global_index: U64S(out.amount_index),
                        public_key: Hex32(out.key),
                        rct: Hex32(keys[found].mask),
                    })
                })
                .collect::<Result<Vec<_>, Error>>()?;
            Ok(RandomAmountOuts { amount: U64S(group.amount), outputs })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    encode_response(&RandomOutsResponse { amount_outs })
}

// ─── /import_request ────────────────────────────────────────────────────────

pub async fn import_request(
    state: &HandlerState,
    root: &Value,
    ctx: &mut Context,
) -> Result<Value, Error> {
    let req: AddressRequest = decode_request(root)?;
    let address = AccountAddress::from_str(state.network, &req.address)?;

    let mut new_request = false;
    let mut fulfilled = false;

    {
        let reader = state.disk.start_read()?;
        let user = get_account(state, &reader, &req.address, &req.view_key.0)?;
        ctx.logged_in = true;

        if user.start_height == 0 {
            fulfilled = true;
        } else if reader.get_request(RequestKind::ImportScan, &address)?.is_none() {
            new_request = true;
        }
        reader.finish();
    }

    if new_request {
        state.disk.import_request(&address, 0)?;
    }

    encode_response(&ImportRequestResponse {
        import_fee: U64S(0),
        new_request,
        request_fulfilled: fulfilled,
        status: if new_request {
            "Accepted, waiting for approval"
        } else if fulfilled {
            "Approved"
        } else {
            "Waiting for Approval"
        },
    })
}

// ─── /submit_raw_tx ─────────────────────────────────────────────────────────

pub async fn submit_raw_tx(
    state: &HandlerState,
    root: &Value,
    ctx: &mut Context,
) -> Result<Value, Error> {
    if !ctx.logged_in {
        return Err(Error::NoSuchAccount);
    }

    let req: SubmitRawTxRequest = decode_request(root)?;
    let blob = hex::decode(&req.tx).map_err(|_| Error::Json(JsonError::InvalidHex))?;
    if let Err(reason) = validate_tx_blob(&blob) {
        info!("rejecting client transaction: {}", reason);
        return Err(Error::BadClientTx);
    }

    let client = state.client.clone();
    let resp = client.send_raw_transaction(&req.tx).await?;
    if resp.not_relayed {
        return Err(Error::TxRelayFailed);
    }

    encode_response(&SubmitRawTxResponse { status: "OK" })
}
