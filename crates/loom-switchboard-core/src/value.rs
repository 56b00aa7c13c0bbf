// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flag value typing.
//!
//! Flags are generic over their value type. Sources and interceptors are
//! type-erased and exchange values as [`serde_json::Value`]; the helpers here
//! convert between both representations.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Bound satisfied by every type that can be carried by a flag.
pub trait FlagValue:
	Serialize + DeserializeOwned + Clone + PartialEq + Debug + Send + Sync + 'static
{
}

impl<T> FlagValue for T where
	T: Serialize + DeserializeOwned + Clone + PartialEq + Debug + Send + Sync + 'static
{
}

/// Converts a typed flag value into its exchanged form.
pub fn encode_value<V: Serialize>(value: &V) -> Result<Value, serde_json::Error> {
	serde_json::to_value(value)
}

/// Converts an exchanged value back into the flag's value type.
pub fn decode_value<V: DeserializeOwned>(value: Value) -> Result<V, serde_json::Error> {
	serde_json::from_value(value)
}
