//! Serde adapters for gate values carried in JSON.

/// Serializes U256 as a decimal string and accepts decimal or "0x" hex on input.
pub mod identifier_serde {
	use crate::utils::parse_identifier;
	use alloy_primitives::U256;
	use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		value.to_string().serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		parse_identifier(&s).map_err(D::Error::custom)
	}
}

/// Signature bytes as a "0x"-prefixed hex string.
pub mod signature_serde {
	use crate::utils::parse_signature;
	use alloy_primitives::{hex, Bytes};
	use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		hex::encode_prefixed(value).serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		parse_signature(&s).map_err(D::Error::custom)
	}
}
