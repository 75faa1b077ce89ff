//! Append-only file ledger backend.
//!
//! Each committed key is one line in the log:
//!
//! ```text
//! <key> <beneficiary> <unix-seconds>
//! ```
//!
//! where `<key>` is the text form of [`NonceKey`]. The log is opened with an
//! exclusive advisory lock, so only one process can own a ledger file, and
//! replayed to rebuild the in-memory index. Commits are written and synced
//! before they return. Reservations are never persisted; a crash between
//! reserve and commit leaves the key unused.

use crate::implementations::memory::{
	count_consumed, ensure_reserved, release_slot, reserve_slot, Slot,
};
use crate::{LedgerError, LedgerRegistry, NonceLedgerInterface};
use alloy_primitives::hex;
use dashmap::DashMap;
use fs2::FileExt;
use gate_types::{
	parse_address, ConfigSchema, ConsumeRecord, Field, FieldType, ImplementationRegistry,
	NonceKey, Schema, ValidationError,
};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Fix applied to the end of the log after a crash.
#[derive(Debug, Clone, Copy)]
enum TailRepair {
	/// Drop an unparsable final record, starting at this byte offset.
	Truncate(u64),
	/// Terminate a complete final record that lost its newline.
	Terminate,
}

/// File-backed ledger implementation.
pub struct FileLedger {
	path: PathBuf,
	slots: DashMap<NonceKey, Slot>,
	/// Append handle; also holds the exclusive lock for the process lifetime.
	file: Mutex<File>,
}

impl std::fmt::Debug for FileLedger {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FileLedger")
			.field("path", &self.path)
			.field("consumed", &count_consumed(&self.slots))
			.finish()
	}
}

impl FileLedger {
	/// Opens or creates the log at `path` and replays it.
	///
	/// Fails if another process holds the lock or a line other than the last
	/// cannot be parsed. An unparsable last line is a write torn by a crash
	/// before its sync completed and is truncated away; a complete last line
	/// missing its newline is terminated so later appends start on a new line.
	pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
		let path = path.as_ref().to_path_buf();
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			std::fs::create_dir_all(parent).map_err(backend)?;
		}

		let mut file = OpenOptions::new()
			.create(true)
			.read(true)
			.append(true)
			.open(&path)
			.map_err(backend)?;
		file.try_lock_exclusive().map_err(|e| {
			LedgerError::Backend(format!(
				"ledger log {} is locked by another process: {}",
				path.display(),
				e
			))
		})?;

		let slots = DashMap::new();
		let mut repair = None;
		{
			let mut replay = file.try_clone().map_err(backend)?;
			replay.seek(SeekFrom::Start(0)).map_err(backend)?;
			let mut content = String::new();
			replay.read_to_string(&mut content).map_err(backend)?;

			let chunks: Vec<&str> = content.split_inclusive('\n').collect();
			let mut offset = 0u64;
			for (index, chunk) in chunks.iter().enumerate() {
				let line = chunk.trim_end_matches('\n');
				let is_last = index + 1 == chunks.len();
				if !line.trim().is_empty() {
					match parse_line(line) {
						Ok((key, record)) => {
							slots.insert(key, Slot::Consumed(record));
							if is_last && !chunk.ends_with('\n') {
								repair = Some(TailRepair::Terminate);
							}
						},
						Err(reason) if is_last => {
							tracing::warn!(
								line = index + 1,
								reason = %reason,
								path = %path.display(),
								"Truncating torn tail record from ledger log"
							);
							repair = Some(TailRepair::Truncate(offset));
						},
						Err(reason) => {
							return Err(LedgerError::Corrupt {
								line: index + 1,
								reason,
							});
						},
					}
				}
				offset += chunk.len() as u64;
			}
		}

		match repair {
			Some(TailRepair::Truncate(len)) => file.set_len(len).map_err(backend)?,
			Some(TailRepair::Terminate) => file.write_all(b"\n").map_err(backend)?,
			None => {},
		}
		if repair.is_some() {
			file.sync_all().map_err(backend)?;
		}

		tracing::info!(
			path = %path.display(),
			consumed = slots.len(),
			"Opened ledger log"
		);

		Ok(Self {
			path,
			slots,
			file: Mutex::new(file),
		})
	}

	/// Returns the path of the log file.
	pub fn path(&self) -> &Path {
		&self.path
	}
}

fn backend(e: std::io::Error) -> LedgerError {
	LedgerError::Backend(e.to_string())
}

fn format_line(key: &NonceKey, record: &ConsumeRecord) -> String {
	format!(
		"{} {} {}",
		key,
		hex::encode_prefixed(record.beneficiary),
		record.consumed_at
	)
}

fn parse_line(line: &str) -> Result<(NonceKey, ConsumeRecord), String> {
	let mut parts = line.split_whitespace();
	let (Some(key), Some(beneficiary), Some(consumed_at), None) =
		(parts.next(), parts.next(), parts.next(), parts.next())
	else {
		return Err("expected three fields".to_string());
	};

	let key = key.parse::<NonceKey>()?;
	let beneficiary = parse_address(beneficiary)?;
	let consumed_at = consumed_at
		.parse::<u64>()
		.map_err(|e| format!("invalid timestamp: {}", e))?;
	Ok((
		key,
		ConsumeRecord {
			beneficiary,
			consumed_at,
		},
	))
}

impl NonceLedgerInterface for FileLedger {
	fn reserve(&self, key: NonceKey) -> Result<(), LedgerError> {
		reserve_slot(&self.slots, key)
	}

	fn commit(&self, key: NonceKey, record: ConsumeRecord) -> Result<(), LedgerError> {
		ensure_reserved(&self.slots, key)?;

		// Durable before the key is marked consumed in memory.
		{
			let mut file = self
				.file
				.lock()
				.map_err(|_| LedgerError::Backend("ledger log mutex poisoned".to_string()))?;
			writeln!(file, "{}", format_line(&key, &record)).map_err(backend)?;
			file.sync_all().map_err(backend)?;
		}

		self.slots.insert(key, Slot::Consumed(record));
		Ok(())
	}

	fn release(&self, key: NonceKey) -> Result<(), LedgerError> {
		release_slot(&self.slots, key)
	}

	fn contains(&self, key: &NonceKey) -> Result<bool, LedgerError> {
		Ok(matches!(
			self.slots.get(key).map(|slot| *slot),
			Some(Slot::Consumed(_))
		))
	}

	fn len(&self) -> usize {
		count_consumed(&self.slots)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileLedgerSchema)
	}
}

/// Configuration schema for FileLedger.
pub struct FileLedgerSchema;

impl ConfigSchema for FileLedgerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("path", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(s) if !s.trim().is_empty() => Ok(()),
					_ => Err("path cannot be empty".to_string()),
				}
			})],
			vec![],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file ledger from configuration.
///
/// Configuration parameters:
/// - `path`: location of the append-only log (required)
pub fn create_ledger(config: &toml::Value) -> Result<Box<dyn NonceLedgerInterface>, LedgerError> {
	FileLedgerSchema
		.validate(config)
		.map_err(|e| LedgerError::Configuration(e.to_string()))?;

	let path = config
		.get("path")
		.and_then(|v| v.as_str())
		.ok_or_else(|| LedgerError::Configuration("path is required".to_string()))?;

	Ok(Box::new(FileLedger::open(path)?))
}

/// Registry for the file ledger implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = crate::LedgerFactory;

	fn factory() -> Self::Factory {
		create_ledger
	}
}

impl LedgerRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use gate_types::{Address, NonceScope, U256};
	use tempfile::TempDir;

	fn record(byte: u8) -> ConsumeRecord {
		ConsumeRecord {
			beneficiary: Address::repeat_byte(byte),
			consumed_at: 1_700_000_000,
		}
	}

	fn consume(ledger: &FileLedger, key: NonceKey, byte: u8) {
		ledger.reserve(key).unwrap();
		ledger.commit(key, record(byte)).unwrap();
	}

	#[test]
	fn test_replay_preserves_consumed_keys() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("ledger.log");
		let global = NonceKey::global(U256::from(1u8));
		let scoped = NonceKey::new(
			NonceScope::Beneficiary,
			Address::repeat_byte(2),
			U256::from(1u8) << 128,
		);

		{
			let ledger = FileLedger::open(&path).unwrap();
			consume(&ledger, global, 1);
			consume(&ledger, scoped, 2);
		}

		let ledger = FileLedger::open(&path).unwrap();
		assert_eq!(ledger.len(), 2);
		assert!(ledger.contains(&global).unwrap());
		assert!(ledger.contains(&scoped).unwrap());
		assert!(matches!(ledger.reserve(global), Err(LedgerError::AlreadyUsed(_))));
	}

	#[test]
	fn test_reservations_are_not_persisted() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("ledger.log");
		let key = NonceKey::global(U256::from(5u8));

		{
			let ledger = FileLedger::open(&path).unwrap();
			ledger.reserve(key).unwrap();
		}

		let ledger = FileLedger::open(&path).unwrap();
		assert!(ledger.is_empty());
		ledger.reserve(key).unwrap();
	}

	#[test]
	fn test_second_open_denied_while_locked() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("ledger.log");
		let _first = FileLedger::open(&path).unwrap();
		assert!(matches!(FileLedger::open(&path), Err(LedgerError::Backend(_))));
	}

	#[test]
	fn test_corrupt_mid_file_fails_open() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("ledger.log");
		let good = format_line(&NonceKey::global(U256::from(1u8)), &record(1));
		std::fs::write(&path, format!("garbage\n{}\n", good)).unwrap();

		assert!(matches!(
			FileLedger::open(&path),
			Err(LedgerError::Corrupt { line: 1, .. })
		));
	}

	#[test]
	fn test_torn_tail_is_truncated() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("ledger.log");
		let good = format_line(&NonceKey::global(U256::from(1u8)), &record(1));
		std::fs::write(&path, format!("{}\n*:0x2 0x1", good)).unwrap();

		{
			let ledger = FileLedger::open(&path).unwrap();
			assert_eq!(ledger.len(), 1);
			// The torn key was never committed and can be consumed.
			consume(&ledger, NonceKey::global(U256::from(2u8)), 1);
		}

		let contents = std::fs::read_to_string(&path).unwrap();
		assert_eq!(contents.lines().count(), 2);
		let reopened = FileLedger::open(&path).unwrap();
		assert!(reopened.contains(&NonceKey::global(U256::from(2u8))).unwrap());
	}

	#[test]
	fn test_unterminated_tail_record_is_kept() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("ledger.log");
		let first = NonceKey::global(U256::from(1u8));
		std::fs::write(&path, format_line(&first, &record(1))).unwrap();

		{
			let ledger = FileLedger::open(&path).unwrap();
			assert!(ledger.contains(&first).unwrap());
			consume(&ledger, NonceKey::global(U256::from(2u8)), 1);
		}

		let reopened = FileLedger::open(&path).unwrap();
		assert_eq!(reopened.len(), 2);
		assert!(reopened.contains(&first).unwrap());
	}

	#[test]
	fn test_factory_requires_path() {
		let empty = toml::Value::Table(toml::map::Map::new());
		assert!(matches!(create_ledger(&empty), Err(LedgerError::Configuration(_))));

		let dir = TempDir::new().unwrap();
		let mut table = toml::map::Map::new();
		table.insert(
			"path".to_string(),
			toml::Value::String(dir.path().join("nested/ledger.log").display().to_string()),
		);
		let ledger = create_ledger(&toml::Value::Table(table)).unwrap();
		assert!(ledger.is_empty());
	}
}
