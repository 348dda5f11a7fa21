use std::fmt;

use alloy_primitives::{Address, U256};

use crate::abi;
use crate::cache::{CallArg, CallDescriptor};
use crate::error::CallCacheError;

/// Parses `<target>:<signature>[:<arg>,<arg>...]`, e.g.
/// `0xToken:balanceOf(address):0xHolder`. Arguments are typed by the
/// signature.
pub fn parse_watch(spec: &str) -> Result<CallDescriptor, CallCacheError> {
    let mut parts = spec.splitn(3, ':');
    let target = parts.next().unwrap_or_default().trim();
    let signature = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CallCacheError::WatchSpec(format!("missing signature in {spec}")))?;
    if target.is_empty() {
        return Err(CallCacheError::WatchSpec(format!("missing target in {spec}")));
    }

    let types = abi::param_types(signature)
        .map_err(|e| CallCacheError::WatchSpec(e.to_string()))?;
    let raw_args: Vec<&str> = match parts.next().map(str::trim) {
        Some(args) if !args.is_empty() => args.split(',').map(str::trim).collect(),
        _ => Vec::new(),
    };
    if raw_args.len() != types.len() {
        return Err(CallCacheError::WatchSpec(format!(
            "{signature} takes {} arguments, got {}",
            types.len(),
            raw_args.len()
        )));
    }

    let args = types
        .iter()
        .zip(raw_args)
        .map(|(ty, raw)| parse_arg(ty, raw))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CallDescriptor::new(target, signature, args))
}

/// Parses one argument as the given Solidity type.
pub fn parse_arg(ty: &str, raw: &str) -> Result<CallArg, CallCacheError> {
    match ty {
        "address" => raw
            .parse::<Address>()
            .map(CallArg::Address)
            .map_err(|e| invalid_arg(ty, raw, e)),
        "bool" => raw
            .parse::<bool>()
            .map(CallArg::Bool)
            .map_err(|e| invalid_arg(ty, raw, e)),
        ty if ty.starts_with("uint") => raw
            .parse::<U256>()
            .map(CallArg::Uint)
            .map_err(|e| invalid_arg(ty, raw, e)),
        ty => Err(CallCacheError::WatchSpec(format!("unsupported type {ty}"))),
    }
}

fn invalid_arg(ty: &str, raw: &str, e: impl fmt::Display) -> CallCacheError {
    CallCacheError::WatchSpec(format!("{raw} is not a valid {ty}: {e}"))
}
