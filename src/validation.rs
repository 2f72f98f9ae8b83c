//! Form validation for token operations.
//!
//! Each operation declares its fields once (`field_specs`). Validation walks the
//! declared fields in a fixed order and stops at the first failure:
//! 1. every required field is present,
//! 2. every address field is base58 formatted (and the authority type is known),
//! 3. every numeric field is finite and strictly positive,
//! 4. the operation's cross-field rule (transfer: source != destination).

use std::collections::BTreeMap;

use thiserror::Error;

use crate::types::{Address, AuthorityKind, Operation, TxKind};

pub const DEFAULT_DECIMALS: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Address,
    /// Address that may be left empty.
    OptionalAddress,
    Amount,
    Decimals,
    AuthorityType,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub role: FieldRole,
    pub required: bool,
}

const fn req(name: &'static str, role: FieldRole) -> FieldSpec {
    FieldSpec { name, role, required: true }
}

const fn opt(name: &'static str, role: FieldRole) -> FieldSpec {
    FieldSpec { name, role, required: false }
}

const MINT_FIELDS: &[FieldSpec] = &[
    req("mint", FieldRole::Address),
    req("amount", FieldRole::Amount),
    req("destination", FieldRole::Address),
    opt("decimals", FieldRole::Decimals),
];
const TRANSFER_FIELDS: &[FieldSpec] = &[
    req("mint", FieldRole::Address),
    req("source", FieldRole::Address),
    req("destination", FieldRole::Address),
    req("amount", FieldRole::Amount),
];
const BURN_FIELDS: &[FieldSpec] = &[
    req("mint", FieldRole::Address),
    req("account", FieldRole::Address),
    req("amount", FieldRole::Amount),
];
const CLOSE_FIELDS: &[FieldSpec] = &[
    req("account", FieldRole::Address),
    req("destination", FieldRole::Address),
];
const SET_AUTHORITY_FIELDS: &[FieldSpec] = &[
    req("account", FieldRole::Address),
    req("authority-type", FieldRole::AuthorityType),
    req("current-authority", FieldRole::Address),
    opt("new-authority", FieldRole::OptionalAddress),
];
const APPROVE_FIELDS: &[FieldSpec] = &[
    req("account", FieldRole::Address),
    req("delegate", FieldRole::Address),
    req("amount", FieldRole::Amount),
];
const ACCOUNT_ONLY_FIELDS: &[FieldSpec] = &[req("account", FieldRole::Address)];

pub fn field_specs(kind: TxKind) -> &'static [FieldSpec] {
    match kind {
        TxKind::Mint => MINT_FIELDS,
        TxKind::Transfer => TRANSFER_FIELDS,
        TxKind::Burn => BURN_FIELDS,
        TxKind::Close => CLOSE_FIELDS,
        TxKind::SetAuthority => SET_AUTHORITY_FIELDS,
        TxKind::Approve => APPROVE_FIELDS,
        TxKind::Revoke | TxKind::Freeze | TxKind::Thaw => ACCOUNT_ONLY_FIELDS,
    }
}

/// Fields wiped from the form after a successful submission.
pub fn cleared_on_success(kind: TxKind) -> &'static [&'static str] {
    match kind {
        TxKind::Mint => &["amount", "destination"],
        TxKind::Transfer | TxKind::Burn | TxKind::Approve => &["amount"],
        TxKind::Close => &["account", "destination"],
        TxKind::SetAuthority => &["new-authority"],
        TxKind::Revoke | TxKind::Freeze | TxKind::Thaw => &[],
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please fill in all required fields ({field} is empty)")]
    MissingField { field: &'static str },
    #[error("Please enter valid Solana addresses ({field} is not a base58 address)")]
    InvalidAddress { field: &'static str },
    #[error("New authority must be a valid Solana address or empty to revoke")]
    InvalidNewAuthority,
    #[error("Authority type must be one of mint, freeze or close")]
    InvalidAuthorityType,
    #[error("Please enter a valid positive number ({field})")]
    InvalidAmount { field: &'static str },
    #[error("Decimals must be a whole number between 0 and 255")]
    InvalidDecimals,
    #[error("Source and destination addresses cannot be the same")]
    SameSourceAndDestination,
}

impl ValidationError {
    /// Short heading for the notice shown to the user.
    pub fn title(&self) -> &'static str {
        match self {
            ValidationError::MissingField { .. } => "Validation Error",
            ValidationError::InvalidAddress { .. }
            | ValidationError::InvalidNewAuthority
            | ValidationError::InvalidAuthorityType => "Invalid Address",
            ValidationError::InvalidAmount { .. } | ValidationError::InvalidDecimals => "Invalid Amount",
            ValidationError::SameSourceAndDestination => "Invalid Transfer",
        }
    }
}

/// Raw, user-typed values for one operation form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    values: BTreeMap<String, String>,
}

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    pub fn clear(&mut self, name: &str) {
        self.values.remove(name);
    }

    /// Trimmed value, `None` when absent or blank.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(|v| v.trim().is_empty())
    }
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite() && *v > 0.0)
}

/// Validate `fields` for `kind`, returning the typed operation on success.
pub fn validate(kind: TxKind, fields: &FormFields) -> Result<Operation, ValidationError> {
    let specs = field_specs(kind);

    // 1. presence
    if let Some(missing) = specs.iter().find(|s| s.required && fields.get(s.name).is_none()) {
        return Err(ValidationError::MissingField { field: missing.name });
    }

    // 2. formats
    for spec in specs {
        let Some(raw) = fields.get(spec.name) else { continue };
        match spec.role {
            FieldRole::Address if Address::parse(raw).is_none() => {
                return Err(ValidationError::InvalidAddress { field: spec.name });
            }
            FieldRole::OptionalAddress if Address::parse(raw).is_none() => {
                return Err(ValidationError::InvalidNewAuthority);
            }
            FieldRole::AuthorityType if raw.parse::<AuthorityKind>().is_err() => {
                return Err(ValidationError::InvalidAuthorityType);
            }
            _ => {}
        }
    }

    // 3. numbers
    for spec in specs {
        let Some(raw) = fields.get(spec.name) else { continue };
        match spec.role {
            FieldRole::Amount if parse_amount(raw).is_none() => {
                return Err(ValidationError::InvalidAmount { field: spec.name });
            }
            FieldRole::Decimals if raw.parse::<u8>().is_err() => {
                return Err(ValidationError::InvalidDecimals);
            }
            _ => {}
        }
    }

    let op = build_operation(kind, fields)?;

    // 4. cross-field
    if let Operation::Transfer { source, destination, .. } = &op {
        if source == destination {
            return Err(ValidationError::SameSourceAndDestination);
        }
    }

    Ok(op)
}

fn build_operation(kind: TxKind, f: &FormFields) -> Result<Operation, ValidationError> {
    let addr = |name: &'static str| -> Result<Address, ValidationError> {
        f.get(name)
            .and_then(Address::parse)
            .ok_or(ValidationError::InvalidAddress { field: name })
    };
    let amount = |name: &'static str| -> Result<f64, ValidationError> {
        f.get(name)
            .and_then(parse_amount)
            .ok_or(ValidationError::InvalidAmount { field: name })
    };

    let op = match kind {
        TxKind::Mint => Operation::Mint {
            mint: addr("mint")?,
            destination: addr("destination")?,
            amount: amount("amount")?,
            decimals: match f.get("decimals") {
                Some(d) => d.parse().map_err(|_| ValidationError::InvalidDecimals)?,
                None => DEFAULT_DECIMALS,
            },
        },
        TxKind::Transfer => Operation::Transfer {
            mint: addr("mint")?,
            source: addr("source")?,
            destination: addr("destination")?,
            amount: amount("amount")?,
        },
        TxKind::Burn => Operation::Burn {
            mint: addr("mint")?,
            account: addr("account")?,
            amount: amount("amount")?,
        },
        TxKind::Close => Operation::Close {
            account: addr("account")?,
            destination: addr("destination")?,
        },
        TxKind::SetAuthority => Operation::SetAuthority {
            account: addr("account")?,
            authority_kind: f
                .get("authority-type")
                .and_then(|s| s.parse().ok())
                .ok_or(ValidationError::InvalidAuthorityType)?,
            current_authority: addr("current-authority")?,
            new_authority: match f.get("new-authority") {
                Some(raw) => Some(Address::parse(raw).ok_or(ValidationError::InvalidNewAuthority)?),
                None => None,
            },
        },
        TxKind::Approve => Operation::Approve {
            account: addr("account")?,
            delegate: addr("delegate")?,
            amount: amount("amount")?,
        },
        TxKind::Revoke => Operation::Revoke { account: addr("account")? },
        TxKind::Freeze => Operation::Freeze { account: addr("account")? },
        TxKind::Thaw => Operation::Thaw { account: addr("account")? },
    };
    Ok(op)
}
