//! Identity fixtures
//!
//! Actors are addresses derived from a label, so the same name always maps
//! to the same key id across tests.

use crate::external::RecordingExternalCall;
use keystone_core::hash::hash;
use keystone_core::{Address, IdentityConfig, KeyType, Purpose};
use keystone_identity::Identity;

/// Deterministic address for `label`
pub fn actor(label: &str) -> Address {
    let digest = hash(format!("keystone-actor-{label}").as_bytes());
    Address::new(digest[..20].try_into().unwrap())
}

/// An initialized identity and the actors holding its keys
#[derive(Debug)]
pub struct IdentityFixture {
    /// The identity under test
    pub identity: Identity,
    /// Address of the identity itself
    pub address: Address,
    /// First MANAGEMENT key holder, installed by `initialize`
    pub manager: Address,
    /// Additional MANAGEMENT key holders
    pub managers: Vec<Address>,
    /// EXECUTION key holders
    pub executors: Vec<Address>,
    /// Collaborator handle sharing the identity's call log
    pub external: RecordingExternalCall,
}

impl IdentityFixture {
    /// Start building a fixture
    pub fn builder() -> IdentityFixtureBuilder {
        IdentityFixtureBuilder::default()
    }

    /// Initialized identity with only the first manager
    pub fn basic() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`IdentityFixture`]
#[derive(Debug, Clone)]
pub struct IdentityFixtureBuilder {
    config: IdentityConfig,
    managers: usize,
    executors: usize,
    management_threshold: Option<u32>,
    execution_threshold: Option<u32>,
    external: RecordingExternalCall,
    keep_events: bool,
}

impl Default for IdentityFixtureBuilder {
    fn default() -> Self {
        Self {
            config: IdentityConfig::default(),
            managers: 0,
            executors: 0,
            management_threshold: None,
            execution_threshold: None,
            external: RecordingExternalCall::new(),
            keep_events: false,
        }
    }
}

impl IdentityFixtureBuilder {
    /// Use `config` when creating the identity
    pub fn config(mut self, config: IdentityConfig) -> Self {
        self.config = config;
        self
    }

    /// Add `count` MANAGEMENT holders besides the initial manager
    pub fn managers(mut self, count: usize) -> Self {
        self.managers = count;
        self
    }

    /// Add `count` EXECUTION holders
    pub fn executors(mut self, count: usize) -> Self {
        self.executors = count;
        self
    }

    /// Set the MANAGEMENT threshold after keys are installed
    pub fn management_threshold(mut self, count: u32) -> Self {
        self.management_threshold = Some(count);
        self
    }

    /// Set the EXECUTION threshold after keys are installed
    pub fn execution_threshold(mut self, count: u32) -> Self {
        self.execution_threshold = Some(count);
        self
    }

    /// Use `external` as the identity's external collaborator
    pub fn external(mut self, external: RecordingExternalCall) -> Self {
        self.external = external;
        self
    }

    /// Keep setup notifications instead of draining them
    pub fn keep_events(mut self) -> Self {
        self.keep_events = true;
        self
    }

    /// Create, initialize and populate the identity
    pub fn build(self) -> IdentityFixture {
        let address = actor("identity");
        let manager = actor("manager-0");
        let mut identity = Identity::with_external(address, self.config, self.external.boxed());
        identity.initialize(manager).unwrap();

        let managers: Vec<Address> = (1..=self.managers)
            .map(|i| actor(&format!("manager-{i}")))
            .collect();
        for holder in &managers {
            identity
                .add_key(
                    manager,
                    holder.key_id(),
                    Purpose::MANAGEMENT.bits(),
                    KeyType::ECDSA,
                )
                .unwrap();
        }

        let executors: Vec<Address> = (0..self.executors)
            .map(|i| actor(&format!("executor-{i}")))
            .collect();
        for holder in &executors {
            identity
                .add_key(
                    manager,
                    holder.key_id(),
                    Purpose::EXECUTION.bits(),
                    KeyType::ECDSA,
                )
                .unwrap();
        }

        // MANAGEMENT last so the single manager can still write it
        if let Some(count) = self.execution_threshold {
            identity
                .change_keys_required(manager, Purpose::EXECUTION.bits(), count)
                .unwrap();
        }
        if let Some(count) = self.management_threshold {
            identity
                .change_keys_required(manager, Purpose::MANAGEMENT.bits(), count)
                .unwrap();
        }

        if !self.keep_events {
            identity.take_events();
        }

        IdentityFixture {
            identity,
            address,
            manager,
            managers,
            executors,
            external: self.external,
        }
    }
}
