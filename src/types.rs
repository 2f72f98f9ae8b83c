use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Base58 alphabet, 32..=44 chars. Format only: no checksum, no curve check.
const ADDRESS_PATTERN: &str = "^[1-9A-HJ-NP-Za-km-z]{32,44}$";

fn address_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ADDRESS_PATTERN).ok()).as_ref()
}

pub fn is_valid_address(s: &str) -> bool {
    address_regex().map_or(false, |re| re.is_match(s))
}

/// A base58-formatted account address as typed into a form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(s: &str) -> Option<Self> {
        is_valid_address(s).then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `first6...last6`, as shown in history rows.
    pub fn abbreviated(&self) -> String {
        abbreviate(&self.0, 6)
    }
}

impl TryFrom<String> for Address {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_valid_address(&value) {
            Ok(Self(value))
        } else {
            Err(format!("not a base58 address: {value}"))
        }
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keeps `keep` chars on each side. Short strings are returned unchanged.
pub fn abbreviate(s: &str, keep: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= keep * 2 {
        return s.to_string();
    }
    let head: String = chars[..keep].iter().collect();
    let tail: String = chars[chars.len() - keep..].iter().collect();
    format!("{head}...{tail}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TxKind {
    Mint,
    Transfer,
    Burn,
    Close,
    SetAuthority,
    Approve,
    Revoke,
    Freeze,
    Thaw,
}

impl TxKind {
    pub const ALL: [TxKind; 9] = [
        TxKind::Mint,
        TxKind::Transfer,
        TxKind::Burn,
        TxKind::Close,
        TxKind::SetAuthority,
        TxKind::Approve,
        TxKind::Revoke,
        TxKind::Freeze,
        TxKind::Thaw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Mint => "mint",
            TxKind::Transfer => "transfer",
            TxKind::Burn => "burn",
            TxKind::Close => "close",
            TxKind::SetAuthority => "set-authority",
            TxKind::Approve => "approve",
            TxKind::Revoke => "revoke",
            TxKind::Freeze => "freeze",
            TxKind::Thaw => "thaw",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TxKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TxKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("unknown operation: {s}"))
    }
}

/// Lifecycle of a transaction record. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Success,
    Error,
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }

    /// Only `Pending -> Success` and `Pending -> Error` are allowed.
    pub fn transition(self, to: TxStatus) -> Option<TxStatus> {
        match (self, to) {
            (TxStatus::Pending, TxStatus::Success) | (TxStatus::Pending, TxStatus::Error) => Some(to),
            _ => None,
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxStatus::Pending => "pending",
            TxStatus::Success => "success",
            TxStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Which authority a set-authority operation replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityKind {
    Mint,
    Freeze,
    Close,
}

impl AuthorityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorityKind::Mint => "mint",
            AuthorityKind::Freeze => "freeze",
            AuthorityKind::Close => "close",
        }
    }
}

impl std::str::FromStr for AuthorityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mint" => Ok(AuthorityKind::Mint),
            "freeze" => Ok(AuthorityKind::Freeze),
            "close" => Ok(AuthorityKind::Close),
            other => Err(format!("unknown authority type: {other}")),
        }
    }
}

impl fmt::Display for AuthorityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully validated token operation, ready for an executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Operation {
    Mint {
        mint: Address,
        destination: Address,
        amount: f64,
        decimals: u8,
    },
    Transfer {
        mint: Address,
        source: Address,
        destination: Address,
        amount: f64,
    },
    Burn {
        mint: Address,
        account: Address,
        amount: f64,
    },
    Close {
        account: Address,
        destination: Address,
    },
    SetAuthority {
        account: Address,
        authority_kind: AuthorityKind,
        current_authority: Address,
        /// `None` revokes the authority.
        new_authority: Option<Address>,
    },
    Approve {
        account: Address,
        delegate: Address,
        amount: f64,
    },
    Revoke {
        account: Address,
    },
    Freeze {
        account: Address,
    },
    Thaw {
        account: Address,
    },
}

impl Operation {
    pub fn kind(&self) -> TxKind {
        match self {
            Operation::Mint { .. } => TxKind::Mint,
            Operation::Transfer { .. } => TxKind::Transfer,
            Operation::Burn { .. } => TxKind::Burn,
            Operation::Close { .. } => TxKind::Close,
            Operation::SetAuthority { .. } => TxKind::SetAuthority,
            Operation::Approve { .. } => TxKind::Approve,
            Operation::Revoke { .. } => TxKind::Revoke,
            Operation::Freeze { .. } => TxKind::Freeze,
            Operation::Thaw { .. } => TxKind::Thaw,
        }
    }

    /// The account the operation acts on, used for the history row.
    pub fn primary_address(&self) -> &Address {
        match self {
            Operation::Mint { mint, .. } => mint,
            Operation::Transfer { source, .. } => source,
            Operation::Burn { account, .. }
            | Operation::Close { account, .. }
            | Operation::SetAuthority { account, .. }
            | Operation::Approve { account, .. }
            | Operation::Revoke { account }
            | Operation::Freeze { account }
            | Operation::Thaw { account } => account,
        }
    }

    pub fn amount(&self) -> Option<f64> {
        match self {
            Operation::Mint { amount, .. }
            | Operation::Transfer { amount, .. }
            | Operation::Burn { amount, .. }
            | Operation::Approve { amount, .. } => Some(*amount),
            _ => None,
        }
    }
}

/// Opaque record key, a base58 string shaped like a transaction signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(String);

impl TxId {
    pub fn generate(rng: &mut fastrand::Rng) -> Self {
        let mut bytes = [0u8; 64];
        rng.fill(&mut bytes);
        Self(bs58::encode(bytes).into_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `first8...last8`
    pub fn abbreviated(&self) -> String {
        abbreviate(&self.0, 8)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TxId,
    pub status: TxStatus,
    pub created_at: DateTime<Utc>,
    pub operation: Operation,
    /// Signature returned by the executor on success.
    pub signature: Option<String>,
    /// Executor failure message on error.
    pub failure: Option<String>,
}

impl TransactionRecord {
    pub fn pending(id: TxId, operation: Operation) -> Self {
        Self {
            id,
            status: TxStatus::Pending,
            created_at: Utc::now(),
            operation,
            signature: None,
            failure: None,
        }
    }

    pub fn kind(&self) -> TxKind {
        self.operation.kind()
    }

    /// One-line history row.
    pub fn summary_line(&self) -> String {
        let amount = self
            .operation
            .amount()
            .map(|a| format!(" {a}"))
            .unwrap_or_default();
        format!(
            "[{}] {}{} {} {} {}",
            self.status,
            self.kind(),
            amount,
            self.operation.primary_address().abbreviated(),
            self.id.abbreviated(),
            self.created_at.format("%H:%M:%S"),
        )
    }
}
