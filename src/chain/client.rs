// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Alchemy JSON-RPC client (Ethereum Sepolia by default).

use alloy::consensus::TxEip1559;
use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, TxKind, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::TransportError;
use async_trait::async_trait;
use url::Url;

use super::{AssetTransfer, ChainData, RawTransferPage, TransferQuery};
use crate::error::ClientError;

/// Upper bound on followed `pageKey`s per query.
const MAX_PAGES: usize = 10;

/// Used when the latest block carries no base fee.
const FALLBACK_BASE_FEE: u128 = 1_000_000_000;

pub struct AlchemyClient {
    provider: DynProvider,
}

impl AlchemyClient {
    pub fn new(rpc_url: &Url) -> Self {
        let provider = ProviderBuilder::new()
            .connect_http(rpc_url.clone())
            .erased();
        Self { provider }
    }

    /// `(max_fee_per_gas, max_priority_fee_per_gas)` for the next block.
    async fn gas_prices(&self) -> Result<(u128, u128), ClientError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(rpc_error)?
            .ok_or_else(|| ClientError::NotFound("latest block".into()))?;

        let base_fee = block
            .header
            .base_fee_per_gas
            .map(u128::from)
            .unwrap_or(FALLBACK_BASE_FEE);
        let priority_fee = self
            .provider
            .get_max_priority_fee_per_gas()
            .await
            .map_err(rpc_error)?;

        // Leaves room for the base fee to double before inclusion.
        let max_fee = base_fee.saturating_mul(2).saturating_add(priority_fee);
        Ok((max_fee, priority_fee))
    }
}

fn rpc_error(e: TransportError) -> ClientError {
    match e.as_error_resp() {
        Some(payload) => ClientError::Remote {
            status: 200,
            message: payload.message.to_string(),
        },
        None => ClientError::Transport(e.to_string()),
    }
}

#[async_trait]
impl ChainData for AlchemyClient {
    async fn balance(&self, address: Address) -> Result<U256, ClientError> {
        self.provider.get_balance(address).await.map_err(rpc_error)
    }

    async fn block_number(&self) -> Result<u64, ClientError> {
        self.provider.get_block_number().await.map_err(rpc_error)
    }

    async fn asset_transfers(&self, query: &TransferQuery) -> Result<Vec<AssetTransfer>, ClientError> {
        let mut transfers = Vec::new();
        let mut page_key: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let params = query.params(page_key.as_deref());
            let page: RawTransferPage = self
                .provider
                .raw_request("alchemy_getAssetTransfers".into(), [params])
                .await
                .map_err(rpc_error)?;

            for raw in page.transfers {
                transfers.push(AssetTransfer::try_from(raw)?);
            }

            match page.page_key {
                Some(next) => page_key = Some(next),
                None => return Ok(transfers),
            }
        }

        tracing::warn!(
            address = %query.address,
            pages = MAX_PAGES,
            "Transfer history truncated"
        );
        Ok(transfers)
    }

    async fn prepare_transfer(
        &self,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<TxEip1559, ClientError> {
        let request = TransactionRequest::default().from(from).to(to).value(value);

        let chain_id = self.provider.get_chain_id().await.map_err(rpc_error)?;
        let nonce = self
            .provider
            .get_transaction_count(from)
            .pending()
            .await
            .map_err(rpc_error)?;
        let gas_limit = self.provider.estimate_gas(request).await.map_err(rpc_error)?;
        let (max_fee_per_gas, max_priority_fee_per_gas) = self.gas_prices().await?;

        tracing::debug!(%from, %to, nonce, gas_limit, max_fee_per_gas, "Prepared transfer");
        Ok(TxEip1559 {
            chain_id,
            nonce,
            gas_limit,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            to: TxKind::Call(to),
            value,
            access_list: Default::default(),
            input: Default::default(),
        })
    }

    async fn send_raw_transaction(&self, signed: &[u8]) -> Result<B256, ClientError> {
        let pending = self
            .provider
            .send_raw_transaction(signed)
            .await
            .map_err(rpc_error)?;
        let hash = *pending.tx_hash();
        tracing::info!(tx_hash = %hash, "Transaction broadcast");
        Ok(hash)
    }
}
