//! Main entry point for the allowance gate.
//!
//! `serve` runs the gate behind its HTTP API. `sign` and `digest` are the
//! off-core tooling: the first signs allowances with the authorizer key, the
//! second prints the bytes and hashes a signer must agree on.

use alloy_primitives::hex;
use clap::{Parser, Subcommand};
use gate_config::Config;
use gate_core::MessageEncoder;
use gate_types::{parse_address, parse_identifier, Address, MessageLayout, U256};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the gate binary.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info", global = true)]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the gate and serve its HTTP API
	Serve {
		/// Path to configuration file
		#[arg(short, long, default_value = "config.toml")]
		config: PathBuf,
	},
	/// Sign allowances with the configured authorizer account
	Sign {
		/// Path to configuration file
		#[arg(short, long, default_value = "config.toml")]
		config: PathBuf,
		/// JSON file mapping beneficiary addresses to allowances
		#[arg(short, long)]
		allowances: PathBuf,
		/// Tier-encode each allowance as a sequence in this tier
		#[arg(short, long)]
		tier: Option<u128>,
		/// Write the signed allowances here instead of stdout
		#[arg(short, long)]
		output: Option<PathBuf>,
	},
	/// Print the message and hashes signed for one allowance
	Digest {
		/// Verifying context address
		#[arg(long, value_parser = parse_address)]
		context: Address,
		/// Beneficiary address
		#[arg(long, value_parser = parse_address)]
		beneficiary: Address,
		/// Identifier, decimal or 0x hex
		#[arg(long, value_parser = parse_identifier)]
		identifier: U256,
		/// Message layout (packed, abi_encoded)
		#[arg(long, default_value = "packed")]
		layout: MessageLayout,
	},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	// Logs go to stderr so tool output on stdout stays machine-readable.
	fmt()
		.with_env_filter(env_filter)
		.with_writer(std::io::stderr)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	match args.command {
		Command::Serve { config } => serve(&config).await,
		Command::Sign {
			config,
			allowances,
			tier,
			output,
		} => sign(&config, &allowances, tier, output.as_deref()).await,
		Command::Digest {
			context,
			beneficiary,
			identifier,
			layout,
		} => {
			let report = digest_report(context, beneficiary, identifier, layout);
			println!("{}", serde_json::to_string_pretty(&report)?);
			Ok(())
		},
	}
}

async fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
	let path = path.to_str().ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(path).await?;
	tracing::info!("Loaded configuration [{}]", config.gate.id);
	Ok(config)
}

async fn serve(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
	let config = load_config(config_path).await?;
	let api_config = config
		.api
		.clone()
		.filter(|api| api.enabled)
		.ok_or("Serving requires an [api] section with enabled = true")?;

	let components = factory_registry::build_gate_from_config(config)?;
	let state = server::AppState {
		gate: components.gate,
		admin: components.admin,
	};

	tracing::info!("Started gate");
	server::start_server(api_config, state, shutdown_signal()).await?;
	tracing::info!("Stopped gate");
	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!("Failed to listen for shutdown signal: {}", e);
		return;
	}
	tracing::info!("Shutdown signal received");
}

async fn sign(
	config_path: &Path,
	allowances_path: &Path,
	tier: Option<u128>,
	output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
	let config = load_config(config_path).await?;
	let signer = factory_registry::build_signer_from_config(config)?;
	tracing::info!(signer = %signer.signer_address().await?, "Signing allowances");

	let raw = tokio::fs::read_to_string(allowances_path).await?;
	let allowances = parse_allowances(&raw)?;
	let total = allowances
		.values()
		.try_fold(U256::ZERO, |acc, v| acc.checked_add(*v))
		.ok_or("Allowance total overflows 256 bits")?;
	tracing::info!(beneficiaries = allowances.len(), total = %total, "Allowances loaded");

	let signed = signer.sign_allowances(&allowances, tier).await?;
	let signed: BTreeMap<String, _> = signed
		.into_iter()
		.map(|(beneficiary, allowance)| (beneficiary.to_string(), allowance))
		.collect();
	let rendered = serde_json::to_string_pretty(&signed)?;

	match output {
		Some(path) => {
			tokio::fs::write(path, rendered).await?;
			tracing::info!(count = signed.len(), path = %path.display(), "Wrote signed allowances");
		},
		None => println!("{}", rendered),
	}
	Ok(())
}

/// Parses `{ "<address>": "<allowance>" }`; allowances may also be JSON integers.
fn parse_allowances(raw: &str) -> Result<BTreeMap<Address, U256>, String> {
	let entries: BTreeMap<String, serde_json::Value> =
		serde_json::from_str(raw).map_err(|e| format!("Invalid allowances file: {}", e))?;

	entries
		.into_iter()
		.map(|(beneficiary, value)| {
			let address = parse_address(&beneficiary)
				.map_err(|e| format!("Invalid beneficiary '{}': {}", beneficiary, e))?;
			let allowance = match &value {
				serde_json::Value::String(s) => parse_identifier(s)?,
				serde_json::Value::Number(n) => n
					.as_u64()
					.map(U256::from)
					.ok_or_else(|| format!("Allowance for {} must be a non-negative integer", address))?,
				other => return Err(format!("Allowance for {} has unsupported type: {}", address, other)),
			};
			Ok((address, allowance))
		})
		.collect()
}

fn digest_report(
	context: Address,
	beneficiary: Address,
	identifier: U256,
	layout: MessageLayout,
) -> serde_json::Value {
	let encoder = MessageEncoder::new(context, layout);
	let digest = encoder.digest(beneficiary, identifier);
	json!({
		"layout": layout.as_str(),
		"message": hex::encode_prefixed(encoder.encode(beneficiary, identifier)),
		"digest": digest,
		"signedHash": MessageEncoder::signed_message_hash(&digest),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	#[test]
	fn test_serve_defaults() {
		let args = Args::try_parse_from(["allowance-gate", "serve"]).unwrap();
		assert_eq!(args.log_level, "info");
		assert!(matches!(args.command, Command::Serve { config } if config == PathBuf::from("config.toml")));
	}

	#[test]
	fn test_sign_arguments() {
		let args = Args::try_parse_from([
			"allowance-gate",
			"--log-level",
			"debug",
			"sign",
			"--allowances",
			"allowances.json",
			"--tier",
			"2",
		])
		.unwrap();
		assert_eq!(args.log_level, "debug");
		match args.command {
			Command::Sign {
				allowances,
				tier,
				output,
				..
			} => {
				assert_eq!(allowances, PathBuf::from("allowances.json"));
				assert_eq!(tier, Some(2));
				assert!(output.is_none());
			},
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn test_digest_rejects_bad_layout() {
		let result = Args::try_parse_from([
			"allowance-gate",
			"digest",
			"--context",
			"0x5FbDB2315678afecb367f032d93F642f64180aa3",
			"--beneficiary",
			"0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
			"--identifier",
			"1",
			"--layout",
			"rlp",
		]);
		assert!(result.is_err());
	}

	#[test]
	fn test_parse_allowances() {
		let parsed = parse_allowances(
			r#"{
				"0x70997970C51812dc3A010C7d01b50e0d17dc79C8": "5",
				"0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC": 3
			}"#,
		)
		.unwrap();
		assert_eq!(
			parsed[&address!("70997970c51812dc3a010c7d01b50e0d17dc79c8")],
			U256::from(5u8)
		);
		assert_eq!(
			parsed[&address!("3c44cdddb6a900fa2b585dd299e03d12fa4293bc")],
			U256::from(3u8)
		);

		assert!(parse_allowances(r#"{ "0x1234": "1" }"#).is_err());
		assert!(parse_allowances(r#"{ "0x70997970C51812dc3A010C7d01b50e0d17dc79C8": -1 }"#).is_err());
	}

	#[tokio::test]
	async fn test_bundled_config_loads() {
		let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/gate.toml");
		let config = load_config(&path).await.unwrap();

		assert_eq!(config.ledger.primary, "file");
		assert_eq!(config.issuance.primary, "memory");
		assert!(config.api.is_some_and(|api| api.enabled && !api.admin_enabled));
	}

	#[test]
	fn test_digest_report() {
		let context = address!("5fbdb2315678afecb367f032d93f642f64180aa3");
		let beneficiary = address!("70997970c51812dc3a010c7d01b50e0d17dc79c8");
		let report = digest_report(context, beneficiary, U256::from(1u8), MessageLayout::Packed);

		let message = report["message"].as_str().unwrap();
		// 0x + 72 bytes
		assert_eq!(message.len(), 2 + 144);
		assert!(message.starts_with("0x70997970c51812dc3a010c7d01b50e0d17dc79c8"));
		assert!(message.ends_with("5fbdb2315678afecb367f032d93f642f64180aa3"));
		assert_eq!(report["layout"], "packed");
	}
}
