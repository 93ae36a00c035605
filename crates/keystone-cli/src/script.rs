//! Operation scripts
//!
//! A script is a TOML document listing steps to replay against one in-memory
//! identity. Each step names an operation and its caller; a step may declare
//! the error code it expects, in which case a matching failure is not fatal.
//! Keys a step's operation does not take are rejected, so a misspelled
//! field fails the script instead of falling back to a default.
//!
//! ```toml
//! identity = "0x00000000000000000000000000000000000000ee"
//!
//! [[step]]
//! op = "initialize"
//! caller = "0x0000000000000000000000000000000000000001"
//!
//! [[step]]
//! op = "execute"
//! caller = "0x0000000000000000000000000000000000000001"
//! call = { op = "add_key", key = "0x...", purpose = 2 }
//! ```

use anyhow::{bail, Context, Result};
use keystone_core::{
    Address, EventRecord, ExecutionId, IdentityResult, KeyId, KeyType, Purpose, PurposeSet,
};
use keystone_identity::{Identity, SelfCall};
use serde::Deserialize;
use tracing::{debug, info};

/// Parsed operation script
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Address of the identity; defaults to a fixed placeholder
    #[serde(default = "default_identity")]
    pub identity: Address,
    /// Steps in execution order
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

fn default_identity() -> Address {
    Address::new([0xee; 20])
}

/// One scripted operation
#[derive(Debug, Deserialize)]
pub struct Step {
    /// Principal performing the operation
    pub caller: Address,
    /// Error code this step must fail with
    #[serde(default)]
    pub expect_error: Option<String>,
    /// The operation itself
    #[serde(flatten)]
    pub op: Operation,
}

/// Operations a script can perform
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Initialize,
    SetKey {
        key: KeyRef,
        purposes: u64,
        key_type: Option<u64>,
    },
    AddKey {
        key: KeyRef,
        purpose: u64,
        key_type: Option<u64>,
    },
    RemoveKey {
        key: KeyRef,
    },
    RemoveKeyPurpose {
        key: KeyRef,
        purpose: u64,
    },
    ChangeKeysRequired {
        purpose: u64,
        count: u32,
    },
    Execute {
        /// Call target; the identity itself when omitted
        target: Option<Address>,
        #[serde(default)]
        value: u64,
        /// Raw hex payload for external targets
        payload: Option<String>,
        /// Self-call to encode as the payload
        call: Option<ScriptCall>,
    },
    Approve {
        id: u64,
        #[serde(default = "default_decision")]
        approve: bool,
    },
}

fn default_decision() -> bool {
    true
}

/// Self-call as written in a script
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptCall {
    SetKey {
        key: KeyRef,
        purposes: u64,
        key_type: Option<u64>,
    },
    AddKey {
        key: KeyRef,
        purpose: u64,
        key_type: Option<u64>,
    },
    RemoveKey {
        key: KeyRef,
    },
    RemoveKeyPurpose {
        key: KeyRef,
        purpose: u64,
    },
    ChangeKeysRequired {
        purpose: u64,
        count: u32,
    },
}

/// Key named either by its 32-byte id or by the 20-byte address it derives from
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct KeyRef(KeyId);

impl TryFrom<String> for KeyRef {
    type Error = String;

    fn try_from(text: String) -> std::result::Result<Self, Self::Error> {
        let digits = text.strip_prefix("0x").unwrap_or(&text);
        match digits.len() {
            64 => text
                .parse::<KeyId>()
                .map(KeyRef)
                .map_err(|e| e.to_string()),
            40 => text
                .parse::<Address>()
                .map(|address| KeyRef(address.key_id()))
                .map_err(|e| e.to_string()),
            n => Err(format!("key reference must be 40 or 64 hex digits, got {n}")),
        }
    }
}

fn key_type(raw: Option<u64>, identity: &Identity) -> KeyType {
    raw.map(KeyType)
        .unwrap_or(identity.config().default_key_type)
}

impl ScriptCall {
    fn into_self_call(self, identity: &Identity) -> Result<SelfCall> {
        let call = match self {
            ScriptCall::SetKey {
                key,
                purposes,
                key_type: raw,
            } => SelfCall::SetKey {
                key: key.0,
                purposes: PurposeSet::from_bits(purposes),
                key_type: key_type(raw, identity),
            },
            ScriptCall::AddKey {
                key,
                purpose,
                key_type: raw,
            } => SelfCall::AddKey {
                key: key.0,
                purpose: Purpose::from_bits(purpose)?,
                key_type: key_type(raw, identity),
            },
            ScriptCall::RemoveKey { key } => SelfCall::RemoveKey { key: key.0 },
            ScriptCall::RemoveKeyPurpose { key, purpose } => SelfCall::RemoveKeyPurpose {
                key: key.0,
                purpose: Purpose::from_bits(purpose)?,
            },
            ScriptCall::ChangeKeysRequired { purpose, count } => SelfCall::ChangeKeysRequired {
                purpose: Purpose::from_bits(purpose)?,
                count,
            },
        };
        Ok(call)
    }
}

impl Script {
    /// Parse a script from TOML
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content).context("invalid operation script")?;
        if let Some(steps) = table.get("step").and_then(toml::Value::as_array) {
            for (index, step) in steps.iter().enumerate() {
                check_fields(step, &["caller", "expect_error"])
                    .with_context(|| format!("step {}", index + 1))?;
            }
        }
        toml::Value::Table(table)
            .try_into()
            .context("invalid operation script")
    }
}

// Fields each operation takes besides `op`; None for unknown operations
fn operation_fields(op: &str) -> Option<&'static [&'static str]> {
    let fields: &[&str] = match op {
        "initialize" => &[],
        "set_key" => &["key", "purposes", "key_type"],
        "add_key" => &["key", "purpose", "key_type"],
        "remove_key" => &["key"],
        "remove_key_purpose" => &["key", "purpose"],
        "change_keys_required" => &["purpose", "count"],
        "execute" => &["target", "value", "payload", "call"],
        "approve" => &["id", "approve"],
        _ => return None,
    };
    Some(fields)
}

// Flattened tagged enums drop unrecognised keys, so check them up front.
// Unknown or missing operations are left for deserialization to report.
fn check_fields(value: &toml::Value, common: &[&str]) -> Result<()> {
    let Some(table) = value.as_table() else {
        return Ok(());
    };
    let Some(fields) = table
        .get("op")
        .and_then(toml::Value::as_str)
        .and_then(operation_fields)
    else {
        return Ok(());
    };
    for key in table.keys() {
        if key != "op" && !common.contains(&key.as_str()) && !fields.contains(&key.as_str()) {
            bail!("unknown field `{key}`");
        }
    }
    if let Some(call) = table.get("call") {
        check_fields(call, &[]).context("call")?;
    }
    Ok(())
}

// Outer error: the script itself is malformed. Inner: the identity refused.
fn apply(
    identity: &mut Identity,
    caller: Address,
    number: usize,
    op: Operation,
) -> Result<IdentityResult<()>> {
    let outcome = match op {
        Operation::Initialize => identity.initialize(caller).map(drop),
        Operation::SetKey {
            key,
            purposes,
            key_type: raw,
        } => {
            let key_type = key_type(raw, identity);
            identity.set_key(caller, key.0, PurposeSet::from_bits(purposes), key_type)
        }
        Operation::AddKey {
            key,
            purpose,
            key_type: raw,
        } => {
            let key_type = key_type(raw, identity);
            identity.add_key(caller, key.0, purpose, key_type)
        }
        Operation::RemoveKey { key } => identity.remove_key(caller, key.0),
        Operation::RemoveKeyPurpose { key, purpose } => {
            identity.remove_key_purpose(caller, key.0, purpose)
        }
        Operation::ChangeKeysRequired { purpose, count } => {
            identity.change_keys_required(caller, purpose, count)
        }
        Operation::Execute {
            target,
            value,
            payload,
            call,
        } => {
            let target = target.unwrap_or_else(|| identity.address());
            let payload = match (payload, call) {
                (Some(_), Some(_)) => {
                    bail!("step {number}: execute takes either payload or call, not both")
                }
                (Some(raw), None) => hex::decode(raw.trim_start_matches("0x"))
                    .with_context(|| format!("step {number}: payload is not hex"))?,
                (None, Some(call)) => call.into_self_call(identity)?.encode()?,
                (None, None) => Vec::new(),
            };
            identity
                .execute(caller, target, u128::from(value), payload)
                .map(|id| info!(step = number, id = %id, "execution requested"))
        }
        Operation::Approve { id, approve } => identity
            .approve(caller, ExecutionId::new(id), approve)
            .map(drop),
    };
    Ok(outcome)
}

/// Replay `script` against `identity`, returning every emitted notification
pub fn run(identity: &mut Identity, script: Script) -> Result<Vec<EventRecord>> {
    let mut emitted = Vec::new();

    for (index, step) in script.steps.into_iter().enumerate() {
        let number = index + 1;
        debug!(step = number, op = ?step.op, "applying step");

        match (apply(identity, step.caller, number, step.op)?, step.expect_error) {
            (Ok(()), None) => {}
            (Err(err), Some(expected)) if err.code() == expected => {
                info!(step = number, code = err.code(), "step failed as expected");
            }
            (Ok(()), Some(expected)) => {
                bail!("step {number}: expected error {expected}, but it succeeded")
            }
            (Err(err), _) => {
                return Err(anyhow::Error::new(err).context(format!("step {number} failed")))
            }
        }
        emitted.extend(identity.take_events());
    }

    Ok(emitted)
}
