/*!
SPL token operations from the command line.

Usage:
    spl_toolkit <OPERATION> [--<field> <value> ...] [OPTIONS]

Operations:
    mint, transfer, burn, close, set-authority, approve, revoke, freeze, thaw

Options:
    --repeat <N>          Submit the same form N times concurrently (default: 1)
    --preview             Print the Rust code preview for the operation
    --json                Print the recent history as JSON
    --config <PATH>       Configuration file path (default: $SPL_TOOLKIT_CONFIG or config.toml)
    --help                Show this help message

Examples:
    spl_toolkit mint --mint 7xKX... --amount 1000 --destination 9WzD...
    spl_toolkit set-authority --account 7xKX... --authority-type freeze --current-authority 9WzD...
*/

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use futures::future::join_all;
use itertools::Itertools;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use spl_toolkit::config::Config;
use spl_toolkit::controller::Toolkit;
use spl_toolkit::snippet;
use spl_toolkit::types::TxKind;
use spl_toolkit::validation::field_specs;

struct CliArgs {
    kind: TxKind,
    fields: Vec<(String, String)>,
    repeat: usize,
    preview: bool,
    json: bool,
    config_path: Option<PathBuf>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(cli) = parse_args(&args)? else {
        return Ok(());
    };

    let cfg = match &cli.config_path {
        Some(path) => {
            let mut cfg = Config::from_file(path)?;
            cfg.apply_overrides(|key| env::var(key).ok());
            cfg
        }
        None => Config::load(),
    };
    cfg.validate().context("invalid configuration")?;

    let toolkit = Toolkit::from_config(&cfg).context("failed to set up executor")?;
    let controller = toolkit.controller(cli.kind);
    for (name, value) in &cli.fields {
        controller.set_field(name, value);
    }

    if cli.preview {
        match controller.preview() {
            Ok(op) => println!("{}", snippet::render(&op, cfg.network)),
            Err(e) => warn!(error=%e, "No preview for an invalid form"),
        }
    }

    info!(kind=%cli.kind, repeat=cli.repeat, "Submitting");
    let notices = join_all((0..cli.repeat).map(|_| controller.submit())).await;
    for notice in &notices {
        println!("{notice}");
    }

    let recent = toolkit.recent().await;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&recent)?);
    } else {
        println!();
        println!("Recent transactions:");
        for record in &recent {
            println!("  {}", record.summary_line());
            if let Some(reason) = &record.failure {
                println!("    {reason}");
            }
        }
    }

    if notices.iter().all(|n| n.is_destructive()) {
        bail!("no {} submission succeeded", cli.kind);
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Result<Option<CliArgs>> {
    let mut kind = None;
    let mut fields = Vec::new();
    let mut repeat = 1;
    let mut preview = false;
    let mut json = false;
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            "--preview" => preview = true,
            "--json" => json = true,
            "--repeat" => {
                let value = args.get(i + 1).context("--repeat requires a value")?;
                repeat = value
                    .parse()
                    .with_context(|| format!("invalid --repeat value: {value}"))?;
                if repeat == 0 {
                    bail!("--repeat must be at least 1");
                }
                i += 1;
            }
            "--config" => {
                let value = args.get(i + 1).context("--config requires a value")?;
                config_path = Some(PathBuf::from(value));
                i += 1;
            }
            flag if flag.starts_with("--") => {
                let name = &flag[2..];
                let value = args
                    .get(i + 1)
                    .with_context(|| format!("{flag} requires a value"))?;
                fields.push((name.to_string(), value.clone()));
                i += 1;
            }
            op if kind.is_none() => {
                kind = Some(op.parse::<TxKind>().map_err(anyhow::Error::msg)?);
            }
            other => bail!("Unknown argument: {}", other),
        }
        i += 1;
    }

    let Some(kind) = kind else {
        print_help();
        bail!("missing operation");
    };

    let specs = field_specs(kind);
    if let Some((name, _)) = fields
        .iter()
        .find(|(n, _)| !specs.iter().any(|s| s.name == n.as_str()))
    {
        bail!(
            "{kind} has no field --{name} (fields: {})",
            specs.iter().map(|s| s.name).join(", ")
        );
    }

    Ok(Some(CliArgs {
        kind,
        fields,
        repeat,
        preview,
        json,
        config_path,
    }))
}

fn print_help() {
    println!("SPL Toolkit");
    println!();
    println!("USAGE:");
    println!("    spl_toolkit <OPERATION> [--<field> <value> ...] [OPTIONS]");
    println!();
    println!("OPERATIONS:");
    for kind in TxKind::ALL {
        let fields = field_specs(kind)
            .iter()
            .map(|s| {
                if s.required {
                    format!("--{}", s.name)
                } else {
                    format!("[--{}]", s.name)
                }
            })
            .join(" ");
        println!("    {:<14} {}", kind.as_str(), fields);
    }
    println!();
    println!("OPTIONS:");
    println!("    --repeat <N>          Submit the same form N times concurrently (default: 1)");
    println!("    --preview             Print the Rust code preview for the operation");
    println!("    --json                Print the recent history as JSON");
    println!("    --config <PATH>       Configuration file path");
    println!("    --help, -h            Show this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("    SPL_TOOLKIT_EXECUTOR  simulated | rpc");
    println!("    SPL_TOOLKIT_RPC_URL   RPC endpoint override");
    println!("    SPL_TOOLKIT_SEED      Seed for simulated outcomes");
    println!("    RUST_LOG              Log filter (e.g. info)");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(s: &str) -> Vec<String> {
        std::iter::once("spl_toolkit")
            .chain(s.split_whitespace())
            .map(String::from)
            .collect()
    }

    #[test]
    fn parses_operation_and_fields() {
        let cli = parse_args(&argv("transfer --mint A --source B --destination C --amount 5 --repeat 3"))
            .unwrap()
            .unwrap();
        assert_eq!(cli.kind, TxKind::Transfer);
        assert_eq!(cli.fields.len(), 4);
        assert_eq!(cli.repeat, 3);
        assert!(!cli.preview);
    }

    #[test]
    fn rejects_unknown_fields_and_operations() {
        assert!(parse_args(&argv("revoke --amount 5")).is_err());
        assert!(parse_args(&argv("swap --amount 5")).is_err());
        assert!(parse_args(&argv("mint --repeat 0")).is_err());
        assert!(parse_args(&argv("mint --amount")).is_err());
    }
}
