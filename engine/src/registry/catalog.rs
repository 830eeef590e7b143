//! Builtin operation catalog
//!
//! Declares every callable operation: the local analytics API surface and a
//! curated set of upstream Cosmos REST endpoints. Descriptions double as
//! LLM context, so they state what the operation returns and in which
//! units. All amounts on the upstream API are denominated in utia
//! (1 TIA = 1_000_000 utia).

use super::{OperationDescriptor, PageConvention, ParamType, Target};

/// The full builtin catalog. Validated by `Registry::new` at startup.
pub fn builtin_catalog() -> Vec<OperationDescriptor> {
    let mut ops = local_operations();
    ops.extend(upstream_operations());
    ops
}

/// Local analytics API: offset/limit pagination, rows under `items`.
fn local_operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "nodes",
            Target::Local,
            "/nodes",
            "Celestia network nodes with geo data (peer_id, ip, city, country, lat, lon, org)",
        )
        .with_pagination(PageConvention::OffsetLimit, "items"),
        OperationDescriptor::new(
            "chain",
            Target::Local,
            "/chain",
            "Historical chain metrics per timestamp: staked_tokens, missed_blocks, inflation, \
             apr, price (TIA price in USD), delegators, annual_provisions, supply",
        )
        .with_pagination(PageConvention::OffsetLimit, "items"),
        OperationDescriptor::new(
            "metrics_aggregate",
            Target::Local,
            "/metrics/aggregate",
            "Aggregated node metrics per instance over the last N hours (avg, min, max, count)",
        )
        .with_param("metric_name", ParamType::String)
        .with_optional_param("hours", ParamType::Integer),
        OperationDescriptor::new(
            "releases",
            Target::Local,
            "/releases",
            "Celestia software releases (version, published_at, upgrade deadline)",
        )
        .with_pagination(PageConvention::OffsetLimit, "items"),
    ]
}

/// Upstream Cosmos REST API: next_key pagination, rows path per endpoint.
fn upstream_operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "get_latest_block_height",
            Target::Upstream,
            "/cosmos/base/tendermint/v1beta1/blocks/latest",
            "Height of the latest block (block.header.height, integer)",
        ),
        OperationDescriptor::new(
            "get_block",
            Target::Upstream,
            "/cosmos/base/tendermint/v1beta1/blocks/{height}",
            "Block data for a specific height (header, data, evidence, last_commit)",
        )
        .with_param("height", ParamType::Integer),
        OperationDescriptor::new(
            "get_accounts",
            Target::Upstream,
            "/cosmos/auth/v1beta1/accounts",
            "All Cosmos accounts on the chain",
        )
        .with_pagination(PageConvention::NextKey, "accounts"),
        OperationDescriptor::new(
            "get_account",
            Target::Upstream,
            "/cosmos/auth/v1beta1/accounts/{address}",
            "Details for one account by bech32 address",
        )
        .with_param("address", ParamType::String),
        OperationDescriptor::new(
            "get_balances",
            Target::Upstream,
            "/cosmos/bank/v1beta1/balances/{address}",
            "All token balances for an account address (amounts in utia)",
        )
        .with_param("address", ParamType::String)
        .with_pagination(PageConvention::NextKey, "balances"),
        OperationDescriptor::new(
            "get_supply",
            Target::Upstream,
            "/cosmos/bank/v1beta1/supply/by_denom",
            "Total supply of a denom (use denom=utia for the native token)",
        )
        .with_param("denom", ParamType::String),
        OperationDescriptor::new(
            "get_validators",
            Target::Upstream,
            "/cosmos/staking/v1beta1/validators",
            "All validators with moniker, status, tokens (utia), and commission",
        )
        .with_optional_param("status", ParamType::String)
        .with_pagination(PageConvention::NextKey, "validators"),
        OperationDescriptor::new(
            "get_validator",
            Target::Upstream,
            "/cosmos/staking/v1beta1/validators/{validator_addr}",
            "One validator by operator address (moniker, status, tokens in utia)",
        )
        .with_param("validator_addr", ParamType::String),
        OperationDescriptor::new(
            "get_validator_delegations",
            Target::Upstream,
            "/cosmos/staking/v1beta1/validators/{validator_addr}/delegations",
            "All delegations to a validator; each row has delegation.delegator_address and \
             balance.amount (utia)",
        )
        .with_param("validator_addr", ParamType::String)
        .with_pagination(PageConvention::NextKey, "delegation_responses"),
        OperationDescriptor::new(
            "get_delegations",
            Target::Upstream,
            "/cosmos/staking/v1beta1/delegations/{delegator_addr}",
            "All delegations made by one delegator; rows have balance.amount (utia)",
        )
        .with_param("delegator_addr", ParamType::String)
        .with_pagination(PageConvention::NextKey, "delegation_responses"),
        OperationDescriptor::new(
            "get_staking_pool",
            Target::Upstream,
            "/cosmos/staking/v1beta1/pool",
            "Staking pool totals: bonded_tokens and not_bonded_tokens (utia)",
        ),
        OperationDescriptor::new(
            "get_community_pool",
            Target::Upstream,
            "/cosmos/distribution/v1beta1/community_pool",
            "Community pool balance (utia)",
        ),
        OperationDescriptor::new(
            "get_delegator_rewards",
            Target::Upstream,
            "/cosmos/distribution/v1beta1/delegators/{delegator_address}/rewards",
            "Outstanding staking rewards for a delegator across all validators (utia)",
        )
        .with_param("delegator_address", ParamType::String),
        OperationDescriptor::new(
            "get_signing_infos",
            Target::Upstream,
            "/cosmos/slashing/v1beta1/signing_infos",
            "Signing info for all validators (missed_blocks_counter, jailed_until)",
        )
        .with_pagination(PageConvention::NextKey, "info"),
        OperationDescriptor::new(
            "get_annual_provisions",
            Target::Upstream,
            "/cosmos/mint/v1beta1/annual_provisions",
            "Current annual provisions (minted utia per year)",
        ),
        OperationDescriptor::new(
            "get_proposals",
            Target::Upstream,
            "/cosmos/gov/v1/proposals",
            "Governance proposals with status, metadata, and tally",
        )
        .with_optional_param("proposal_status", ParamType::String)
        .with_pagination(PageConvention::NextKey, "proposals"),
        OperationDescriptor::new(
            "get_proposal_tally",
            Target::Upstream,
            "/cosmos/gov/v1/proposals/{proposal_id}/tally",
            "Live vote tally for one proposal (yes/no/abstain/veto counts in utia)",
        )
        .with_param("proposal_id", ParamType::Integer),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_both_targets() {
        let ops = builtin_catalog();
        assert!(ops.iter().any(|o| o.target == Target::Local));
        assert!(ops.iter().any(|o| o.target == Target::Upstream));
    }

    #[test]
    fn test_paginated_operations_declare_conventions() {
        for op in builtin_catalog() {
            if let Some(pagination) = &op.paginated {
                match op.target {
                    Target::Local => {
                        assert_eq!(pagination.convention, PageConvention::OffsetLimit)
                    }
                    Target::Upstream => {
                        assert_eq!(pagination.convention, PageConvention::NextKey)
                    }
                }
            }
        }
    }

    #[test]
    fn test_names_are_unique() {
        let ops = builtin_catalog();
        let mut names: Vec<_> = ops.iter().map(|o| o.name.as_str()).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }
}
