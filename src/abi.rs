//! Calldata for static Solidity signatures such as `balanceOf(address)`.
//!
//! Only single-word types are supported (`address`, `uint<N>`, `bool`);
//! anything dynamic or nested is rejected.

use alloy_primitives::{U256, keccak256};

use crate::cache::CallArg;
use crate::error::CallCacheError;

const WORD: usize = 32;

/// First four bytes of the keccak-256 hash of the signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash.0[..4]);
    out
}

/// Splits `name(type,type)` into its parameter types.
pub fn param_types(signature: &str) -> Result<Vec<&str>, CallCacheError> {
    let open = signature
        .find('(')
        .ok_or_else(|| CallCacheError::Encoding(format!("missing '(' in {signature}")))?;
    let inner = signature[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| CallCacheError::Encoding(format!("missing ')' in {signature}")))?;
    if open == 0 {
        return Err(CallCacheError::Encoding(format!("missing name in {signature}")));
    }
    if inner.contains(['(', ')', '[']) {
        return Err(CallCacheError::Encoding(format!(
            "unsupported parameter types in {signature}"
        )));
    }
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(inner.split(',').map(str::trim).collect())
}

/// Selector followed by one word per argument.
pub fn encode_call(signature: &str, args: &[CallArg]) -> Result<Vec<u8>, CallCacheError> {
    let types = param_types(signature)?;
    if types.len() != args.len() {
        return Err(CallCacheError::Encoding(format!(
            "{signature} takes {} arguments, got {}",
            types.len(),
            args.len()
        )));
    }

    let mut data = Vec::with_capacity(4 + WORD * args.len());
    data.extend_from_slice(&selector(signature));
    for (ty, arg) in types.iter().zip(args) {
        data.extend_from_slice(&encode_word(ty, arg)?);
    }
    Ok(data)
}

fn encode_word(ty: &str, arg: &CallArg) -> Result<[u8; WORD], CallCacheError> {
    let mut word = [0u8; WORD];
    match (ty, arg) {
        ("address", CallArg::Address(address)) => {
            word[WORD - 20..].copy_from_slice(address.as_slice());
        }
        ("bool", CallArg::Bool(b)) => {
            word[WORD - 1] = u8::from(*b);
        }
        (ty, CallArg::Uint(value)) if ty.starts_with("uint") => {
            let bits = uint_bits(ty)?;
            if value.bit_len() > bits {
                return Err(CallCacheError::Encoding(format!("{value} does not fit in {ty}")));
            }
            word = value.to_be_bytes::<WORD>();
        }
        (ty, arg) => {
            return Err(CallCacheError::Encoding(format!(
                "cannot encode {arg} as {ty}"
            )));
        }
    }
    Ok(word)
}

fn uint_bits(ty: &str) -> Result<usize, CallCacheError> {
    let suffix = &ty["uint".len()..];
    if suffix.is_empty() {
        return Ok(U256::BITS);
    }
    match suffix.parse::<usize>() {
        Ok(bits) if bits > 0 && bits <= U256::BITS && bits % 8 == 0 => Ok(bits),
        _ => Err(CallCacheError::Encoding(format!("unknown type {ty}"))),
    }
}
