//! # Anonymous Group Voting Ledger
//!
//! Votes are admitted on a Groth16 zero-knowledge membership proof
//! (BN254, see `veilvote-groth16`): the proof shows that the voter's
//! commitment was a leaf of the group tree at some retained historical root,
//! and spends a one-time nullifier to rule out double voting. No voter
//! identity is ever stored or emitted.
//!
//! The contract is composed from two parts: the proposal store
//! (`proposals` module: lifecycle, windows, tallies) and the vote admission
//! sequence in [`Voting::vote`]. The group tree is a separate contract whose
//! address is fixed at construction.
//!
//! Every proof is additionally bound to this deployment through an immutable
//! `scope` value derived once in the constructor; proofs generated for
//! another instance can never be replayed here. Re-entrancy needs no guard
//! of its own: the Soroban host rejects re-entrant contract invocations and
//! proof verification is an in-process library call.

#![no_std]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, xdr::ToXdr, Address, Bytes,
    BytesN, Env, IntoVal, String, Symbol, Vec, U256,
};

use veilvote_groth16 as groth16;
pub use veilvote_groth16::{MembershipProof, Proof, VerificationKey};

pub mod proposals;
pub use proposals::{
    Proposal, MAX_DESCRIPTION_LEN, MAX_OPTIONS, MAX_TITLE_LEN, MAX_VOTING_DURATION, MIN_OPTIONS,
    MIN_VOTING_DURATION,
};

const TREE_CONTRACT: Symbol = symbol_short!("tree");
const ADMIN: Symbol = symbol_short!("admin");
const SCOPE: Symbol = symbol_short!("scope");

/// Mirrors the group tree's history capacity; a vote names the ring slot its
/// proof root is expected to occupy.
pub const ROOT_HISTORY_SIZE: u32 = 64;
pub const MIN_TREE_DEPTH: u32 = 1;
pub const MAX_TREE_DEPTH: u32 = 32;

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum VotingError {
    ProposalNotFound = 1,
    VotingNotStarted = 2,
    VotingEnded = 3,
    InvalidOptionIndex = 4,
    /// Nullifier is zero or not a valid BN254 scalar
    InvalidNullifier = 5,
    NullifierAlreadyUsed = 6,
    ScopeMismatch = 7,
    /// Declared root does not match the named history slot, or the slot is empty
    UnknownRoot = 8,
    InvalidTreeDepth = 9,
    VerifierKeyNotSet = 10,
    ProofVerificationFailed = 11,
    InvalidOptionCount = 12,
    EmptyOptionLabel = 13,
    DurationTooShort = 14,
    DurationTooLong = 15,
    EmptyTitle = 16,
    EmptyDescription = 17,
    TitleTooLong = 18,
    DescriptionTooLong = 19,
    AlreadyExecuted = 20,
    VotingStillOpen = 21,
    NotGroupMember = 22,
    InvalidVerifierKey = 24,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Nullifier(U256),  // nullifier -> spent (never reset)
    VerifierKey(u32), // tree depth -> VerificationKey
}

/// Read-only ledger configuration.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct VotingConfig {
    pub root_history_size: u32,
    pub min_tree_depth: u32,
    pub max_tree_depth: u32,
    pub min_voting_duration: u64,
    pub max_voting_duration: u64,
    pub min_options: u32,
    pub max_options: u32,
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ProposalCreatedEvent {
    #[topic]
    pub proposal_id: u64,
    pub title: String,
    pub description: String,
    pub options: Vec<String>,
    pub start_time: u64,
    pub end_time: u64,
    pub proposer: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct VoteCastEvent {
    #[topic]
    pub proposal_id: u64,
    pub option_index: u32,
    pub nullifier: U256,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ProposalExecutedEvent {
    #[topic]
    pub proposal_id: u64,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct VerifierKeySetEvent {
    #[topic]
    pub depth: u32,
}

#[contract]
pub struct Voting;

#[contractimpl]
impl Voting {
    /// Constructor: bind the group tree and admin, and derive this
    /// instance's scope.
    ///
    /// The scope is computed exactly once, from the contract's own address
    /// plus ledger entropy (timestamp and sequence), and stored immutably.
    /// No code path recomputes or rewrites it.
    pub fn __constructor(env: Env, tree_contract: Address, admin: Address) {
        env.storage().instance().set(&TREE_CONTRACT, &tree_contract);
        env.storage().instance().set(&ADMIN, &admin);

        let mut seed = Bytes::new(&env);
        seed.append(&env.current_contract_address().to_xdr(&env));
        seed.append(&Bytes::from_array(
            &env,
            &env.ledger().timestamp().to_be_bytes(),
        ));
        seed.append(&Bytes::from_array(
            &env,
            &env.ledger().sequence().to_be_bytes(),
        ));
        let digest: BytesN<32> = env.crypto().sha256(&seed).into();
        let scope = groth16::hash_to_field(
            &env,
            &U256::from_be_bytes(&env, &Bytes::from_array(&env, &digest.to_array())),
        );

        env.storage().instance().set(&SCOPE, &scope);
    }

    /// The immutable per-instance scope every proof must declare.
    pub fn scope(env: Env) -> U256 {
        env.storage().instance().get(&SCOPE).unwrap()
    }

    /// Get group tree contract address
    pub fn tree_contract(env: Env) -> Address {
        env.storage().instance().get(&TREE_CONTRACT).unwrap()
    }

    pub fn admin(env: Env) -> Address {
        env.storage().instance().get(&ADMIN).unwrap()
    }

    /// Set the verification key for proofs declaring `depth` (admin only).
    ///
    /// One key per supported tree depth; the IC vector must have exactly
    /// 5 elements (4 public signals + 1).
    pub fn set_verifier_key(env: Env, depth: u32, vk: VerificationKey) -> Result<(), VotingError> {
        let admin: Address = env.storage().instance().get(&ADMIN).unwrap();
        admin.require_auth();

        if !(MIN_TREE_DEPTH..=MAX_TREE_DEPTH).contains(&depth) {
            return Err(VotingError::InvalidTreeDepth);
        }
        if vk.ic.len() != groth16::EXPECTED_IC_LENGTH || vk.ic.len() > groth16::MAX_IC_LENGTH {
            return Err(VotingError::InvalidVerifierKey);
        }

        env.storage()
            .persistent()
            .set(&DataKey::VerifierKey(depth), &vk);

        VerifierKeySetEvent { depth }.publish(&env);
        Ok(())
    }

    /// The verification key for a given tree depth, if one has been set.
    pub fn verifier_key(env: Env, depth: u32) -> Option<VerificationKey> {
        env.storage().persistent().get(&DataKey::VerifierKey(depth))
    }

    /// Create a new proposal. Restricted to group members (addresses with a
    /// registered commitment). Voting opens immediately and closes after
    /// `duration` seconds.
    pub fn create_proposal(
        env: Env,
        title: String,
        description: String,
        options: Vec<String>,
        duration: u64,
        proposer: Address,
    ) -> Result<u64, VotingError> {
        proposer.require_auth();

        let tree_contract: Address = env.storage().instance().get(&TREE_CONTRACT).unwrap();
        let commitment: Option<U256> = env.invoke_contract(
            &tree_contract,
            &Symbol::new(&env, "commitment_of"),
            soroban_sdk::vec![&env, proposer.clone().into_val(&env)],
        );
        if commitment.is_none() {
            return Err(VotingError::NotGroupMember);
        }

        let proposal = proposals::create(&env, title, description, options, duration, proposer)?;

        ProposalCreatedEvent {
            proposal_id: proposal.id,
            title: proposal.title.clone(),
            description: proposal.description.clone(),
            options: proposal.options.clone(),
            start_time: proposal.start_time,
            end_time: proposal.end_time,
            proposer: proposal.proposer.clone(),
        }
        .publish(&env);

        Ok(proposal.id)
    }

    /// Submit a vote with a ZK membership proof.
    ///
    /// Admission sequence; every step is a hard precondition and the first
    /// failure aborts the call with no partial effects:
    /// 1. proposal exists and the voting window is open
    /// 2. option index is in range
    /// 3. nullifier is valid and unspent
    /// 4. declared scope matches this instance
    /// 5. declared root occupies the named history slot (and is non-zero)
    /// 6. declared tree depth is within bounds
    /// 7. the Groth16 proof verifies
    pub fn vote(
        env: Env,
        proposal_id: u64,
        option_index: u32,
        proof: MembershipProof,
        root_history_index: u32,
    ) -> Result<(), VotingError> {
        let mut proposal = proposals::load(&env, proposal_id)?;

        let now = env.ledger().timestamp();
        if now < proposal.start_time {
            return Err(VotingError::VotingNotStarted);
        }
        if now > proposal.end_time {
            return Err(VotingError::VotingEnded);
        }

        if option_index >= proposal.option_count {
            return Err(VotingError::InvalidOptionIndex);
        }

        if groth16::validate_nullifier(&env, &proof.nullifier).is_err() {
            return Err(VotingError::InvalidNullifier);
        }
        let null_key = DataKey::Nullifier(proof.nullifier.clone());
        if env.storage().persistent().has(&null_key) {
            return Err(VotingError::NullifierAlreadyUsed);
        }

        let scope: U256 = env.storage().instance().get(&SCOPE).unwrap();
        if proof.scope != scope {
            return Err(VotingError::ScopeMismatch);
        }

        if root_history_index >= ROOT_HISTORY_SIZE {
            return Err(VotingError::UnknownRoot);
        }
        let tree_contract: Address = env.storage().instance().get(&TREE_CONTRACT).unwrap();
        let stored_root: U256 = env.invoke_contract(
            &tree_contract,
            &symbol_short!("root_at"),
            soroban_sdk::vec![&env, root_history_index.into_val(&env)],
        );
        if stored_root == U256::from_u32(&env, 0) || stored_root != proof.merkle_tree_root {
            return Err(VotingError::UnknownRoot);
        }

        if !(MIN_TREE_DEPTH..=MAX_TREE_DEPTH).contains(&proof.merkle_tree_depth) {
            return Err(VotingError::InvalidTreeDepth);
        }

        let vk: VerificationKey = env
            .storage()
            .persistent()
            .get(&DataKey::VerifierKey(proof.merkle_tree_depth))
            .ok_or(VotingError::VerifierKeyNotSet)?;
        match groth16::verify_membership_proof(&env, &vk, &proof) {
            Ok(true) => {}
            _ => return Err(VotingError::ProofVerificationFailed),
        }

        // All preconditions hold; commit.
        env.storage().persistent().set(&null_key, &true);
        proposals::bump_tally(&env, proposal_id, option_index);
        proposal.total_votes += 1;
        proposals::store(&env, &proposal);

        VoteCastEvent {
            proposal_id,
            option_index,
            nullifier: proof.nullifier,
        }
        .publish(&env);

        Ok(())
    }

    /// Execute a proposal once its voting window has closed. One-way; a
    /// second call fails with `AlreadyExecuted`.
    pub fn execute_proposal(env: Env, proposal_id: u64) -> Result<(), VotingError> {
        proposals::mark_executed(&env, proposal_id)?;
        ProposalExecutedEvent { proposal_id }.publish(&env);
        Ok(())
    }

    /// Get proposal header
    pub fn get_proposal(env: Env, proposal_id: u64) -> Result<Proposal, VotingError> {
        proposals::load(&env, proposal_id)
    }

    /// Option labels of a proposal, indexed 0..option_count-1.
    pub fn get_options(env: Env, proposal_id: u64) -> Result<Vec<String>, VotingError> {
        Ok(proposals::load(&env, proposal_id)?.options)
    }

    /// Current tally vector of a proposal (length = option_count).
    pub fn get_tally(env: Env, proposal_id: u64) -> Result<Vec<u64>, VotingError> {
        let proposal = proposals::load(&env, proposal_id)?;
        Ok(proposals::tally_vector(&env, &proposal))
    }

    /// Get total number of proposals created
    pub fn proposal_count(env: Env) -> u64 {
        proposals::count(&env)
    }

    /// Ids of proposals currently open for voting.
    pub fn active_proposals(env: Env) -> Vec<u64> {
        proposals::active_ids(&env)
    }

    /// Check if nullifier has been used
    pub fn is_nullifier_used(env: Env, nullifier: U256) -> bool {
        env.storage()
            .persistent()
            .has(&DataKey::Nullifier(nullifier))
    }

    pub fn config(_env: Env) -> VotingConfig {
        VotingConfig {
            root_history_size: ROOT_HISTORY_SIZE,
            min_tree_depth: MIN_TREE_DEPTH,
            max_tree_depth: MAX_TREE_DEPTH,
            min_voting_duration: MIN_VOTING_DURATION,
            max_voting_duration: MAX_VOTING_DURATION,
            min_options: MIN_OPTIONS,
            max_options: MAX_OPTIONS,
        }
    }
}
