//! Code preview: a self-contained Rust snippet performing the operation with
//! `solana-client` and `spl-token`, values substituted from the form.

use std::fmt::Write;

use crate::config::Network;
use crate::types::{AuthorityKind, Operation};

const PRELUDE: &str = "use solana_client::rpc_client::RpcClient;
use solana_sdk::{pubkey::Pubkey, signature::{read_keypair_file, Signer}, transaction::Transaction};
use spl_associated_token_account::get_associated_token_address;
use std::str::FromStr;
";

fn pubkey_line(out: &mut String, name: &str, value: &str) {
    let _ = writeln!(out, "let {name} = Pubkey::from_str(\"{value}\")?;");
}

/// Rust source for `op` against `network`'s public endpoint.
pub fn render(op: &Operation, network: Network) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "// {} SPL tokens with solana-client", title(op));
    out.push_str(PRELUDE);
    if !matches!(op, Operation::Mint { .. }) {
        out.push_str("use solana_sdk::program_pack::Pack;\n");
    }
    out.push('\n');
    let _ = writeln!(
        out,
        "let client = RpcClient::new(\"{}\".to_string());",
        network.default_rpc_url()
    );
    out.push_str("let payer = read_keypair_file(\"payer.json\")?;\n");

    let body = match op {
        Operation::Mint { mint, destination, amount, decimals } => {
            pubkey_line(&mut out, "mint", mint.as_str());
            pubkey_line(&mut out, "destination", destination.as_str());
            format!(
                "let ata = get_associated_token_address(&destination, &mint);
let amount = spl_token::ui_amount_to_amount({amount:?}, {decimals}); // adjust for decimals
let ix = spl_token::instruction::mint_to_checked(
    &spl_token::id(), &mint, &ata, &payer.pubkey(), &[], amount, {decimals},
)?;"
            )
        }
        Operation::Transfer { mint, source, destination, amount } => {
            pubkey_line(&mut out, "mint", mint.as_str());
            pubkey_line(&mut out, "source", source.as_str());
            pubkey_line(&mut out, "destination", destination.as_str());
            format!(
                "{DECIMALS}
let from = get_associated_token_address(&source, &mint);
let to = get_associated_token_address(&destination, &mint);
let ix = spl_token::instruction::transfer_checked(
    &spl_token::id(), &from, &mint, &to, &payer.pubkey(), &[],
    spl_token::ui_amount_to_amount({amount:?}, decimals), decimals,
)?;"
            )
        }
        Operation::Burn { mint, account, amount } => {
            pubkey_line(&mut out, "mint", mint.as_str());
            pubkey_line(&mut out, "account", account.as_str());
            format!(
                "{DECIMALS}
let ix = spl_token::instruction::burn_checked(
    &spl_token::id(), &account, &mint, &payer.pubkey(), &[],
    spl_token::ui_amount_to_amount({amount:?}, decimals), decimals,
)?;"
            )
        }
        Operation::Close { account, destination } => {
            pubkey_line(&mut out, "account", account.as_str());
            pubkey_line(&mut out, "destination", destination.as_str());
            "// Balance must be zero; rent goes to `destination`.
let ix = spl_token::instruction::close_account(
    &spl_token::id(), &account, &destination, &payer.pubkey(), &[],
)?;"
            .to_string()
        }
        Operation::SetAuthority { account, authority_kind, new_authority, .. } => {
            pubkey_line(&mut out, "account", account.as_str());
            let new = match new_authority {
                Some(a) => format!("Some(&Pubkey::from_str(\"{a}\")?)"),
                None => "None // revokes the authority".to_string(),
            };
            let kind = match authority_kind {
                AuthorityKind::Mint => "MintTokens",
                AuthorityKind::Freeze => "FreezeAccount",
                AuthorityKind::Close => "CloseAccount",
            };
            format!(
                "let ix = spl_token::instruction::set_authority(
    &spl_token::id(), &account,
    {new},
    spl_token::instruction::AuthorityType::{kind},
    &payer.pubkey(), &[],
)?;"
            )
        }
        Operation::Approve { account, delegate, amount } => {
            pubkey_line(&mut out, "account", account.as_str());
            pubkey_line(&mut out, "delegate", delegate.as_str());
            format!(
                "{ACCOUNT_MINT}
{DECIMALS}
let ix = spl_token::instruction::approve_checked(
    &spl_token::id(), &account, &mint, &delegate, &payer.pubkey(), &[],
    spl_token::ui_amount_to_amount({amount:?}, decimals), decimals,
)?;"
            )
        }
        Operation::Revoke { account } => {
            pubkey_line(&mut out, "account", account.as_str());
            "let ix = spl_token::instruction::revoke(&spl_token::id(), &account, &payer.pubkey(), &[])?;"
                .to_string()
        }
        Operation::Freeze { account } | Operation::Thaw { account } => {
            pubkey_line(&mut out, "account", account.as_str());
            let call = if matches!(op, Operation::Freeze { .. }) {
                "freeze_account"
            } else {
                "thaw_account"
            };
            format!(
                "{ACCOUNT_MINT}
let ix = spl_token::instruction::{call}(
    &spl_token::id(), &account, &mint, &payer.pubkey(), &[],
)?;"
            )
        }
    };
    out.push('\n');
    out.push_str(&body);
    out.push_str(SEND);
    out
}

const DECIMALS: &str =
    "let decimals = spl_token::state::Mint::unpack(&client.get_account_data(&mint)?)?.decimals;";

const ACCOUNT_MINT: &str =
    "let mint = spl_token::state::Account::unpack(&client.get_account_data(&account)?)?.mint;";

const SEND: &str = "

let blockhash = client.get_latest_blockhash()?;
let tx = Transaction::new_signed_with_payer(&[ix], Some(&payer.pubkey()), &[&payer], blockhash);
let signature = client.send_and_confirm_transaction(&tx)?;
println!(\"Transaction signature: {signature}\");
";

fn title(op: &Operation) -> &'static str {
    match op {
        Operation::Mint { .. } => "Mint",
        Operation::Transfer { .. } => "Transfer",
        Operation::Burn { .. } => "Burn",
        Operation::Close { .. } => "Close account holding",
        Operation::SetAuthority { .. } => "Set authority on",
        Operation::Approve { .. } => "Approve a delegate for",
        Operation::Revoke { .. } => "Revoke the delegate of",
        Operation::Freeze { .. } => "Freeze an account of",
        Operation::Thaw { .. } => "Thaw an account of",
    }
}
