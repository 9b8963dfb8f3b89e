//! # Vote Fee Sponsor
//!
//! Decides, in a read-only pre-execution phase, whether a pending vote
//! transaction should have its fee underwritten. The relayer decodes the
//! pending transaction into a typed [`SponsorshipRequest`] once; the
//! validator checks it against a single allow-listed account and an explicit
//! allow-list of permitted operations (exactly one: a zero-value `vote` call
//! on the configured voting contract), then re-runs the vote's own admission
//! checks (nullifier, scope, root, depth, proof) as pure reads against the
//! voting and group-tree contracts.
//!
//! A declined request is a neutral outcome, not an error: the voter can
//! always self-pay. Nothing here mutates voting state, and the validator
//! keeps no record of its decisions; its only mutable state is the deposit
//! balance and the allow-listed account, both admin-controlled.
//!
//! An approval is advisory. The real vote executes later as an independent
//! transaction and can still lose the nullifier race to a competing vote.

#![no_std]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, Address, Env, IntoVal,
    Symbol, U256,
};

use veilvote_groth16 as groth16;
pub use veilvote_groth16::{MembershipProof, VerificationKey};

const ADMIN: Symbol = symbol_short!("admin");
const VOTING_CONTRACT: Symbol = symbol_short!("voting");
const ALLOWED_ACCOUNT: Symbol = symbol_short!("allowed");
const DEPOSIT: Symbol = symbol_short!("deposit");

// Bounds mirrored from the voting ledger's admission checks.
pub const ROOT_HISTORY_SIZE: u32 = 64;
pub const MIN_TREE_DEPTH: u32 = 1;
pub const MAX_TREE_DEPTH: u32 = 32;

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SponsorError {
    /// Deposit/withdraw amount must be positive
    InvalidAmount = 1,
    /// Withdrawal exceeds the deposit balance
    InsufficientBalance = 2,
}

/// Decoded arguments of the inner `vote(...)` invocation.
#[contracttype]
#[derive(Clone)]
pub struct VoteCall {
    pub proposal_id: u64,
    pub option_index: u32,
    pub proof: MembershipProof,
    pub root_history_index: u32,
}

/// A pending transaction, decoded once by the relayer into a typed request.
///
/// `source_deployed` is false when the operation would also create the
/// originating account in the same step; such operations are never sponsored.
/// `call` is present only when the inner invocation parsed as a `vote(...)`.
#[contracttype]
#[derive(Clone)]
pub struct SponsorshipRequest {
    pub source: Address,
    pub source_deployed: bool,
    pub target: Address,
    pub func: Symbol,
    pub transferred: i128,
    pub max_fee: i128,
    pub call: Option<VoteCall>,
}

/// Why the mirrored vote admission checks rejected the inner call.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub enum VoteRejection {
    InvalidNullifier,
    NullifierAlreadyUsed,
    ScopeMismatch,
    UnknownRoot,
    InvalidTreeDepth,
    VerifierKeyNotSet,
    ProofVerificationFailed,
}

#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub enum DeclineReason {
    UnauthorizedAccount,
    AccountNotDeployed,
    InsufficientDeposit,
    MalformedCall,
    InnerValidationFailed(VoteRejection),
}

#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub enum SponsorshipDecision {
    Approved,
    Declined(DeclineReason),
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct AllowedAccountSetEvent {
    #[topic]
    pub account: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct DepositEvent {
    pub amount: i128,
    pub balance: i128,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct WithdrawEvent {
    pub amount: i128,
    pub balance: i128,
}

#[contract]
pub struct FeeSponsor;

#[contractimpl]
impl FeeSponsor {
    /// Constructor: bind the voting contract and admin. No account is
    /// allow-listed until the admin sets one; until then every request is
    /// declined.
    pub fn __constructor(env: Env, voting_contract: Address, admin: Address) {
        env.storage()
            .instance()
            .set(&VOTING_CONTRACT, &voting_contract);
        env.storage().instance().set(&ADMIN, &admin);
        env.storage().instance().set(&DEPOSIT, &0i128);
    }

    /// Decide whether to underwrite the fee for a pending vote transaction.
    ///
    /// Read-only: repeated calls with the same request and ledger state
    /// return the same decision.
    pub fn check_sponsorship(env: Env, request: SponsorshipRequest) -> SponsorshipDecision {
        let allowed: Option<Address> = env.storage().instance().get(&ALLOWED_ACCOUNT);
        match allowed {
            Some(account) if account == request.source => {}
            _ => return SponsorshipDecision::Declined(DeclineReason::UnauthorizedAccount),
        }

        if !request.source_deployed {
            return SponsorshipDecision::Declined(DeclineReason::AccountNotDeployed);
        }

        let balance: i128 = env.storage().instance().get(&DEPOSIT).unwrap();
        if balance < request.max_fee {
            return SponsorshipDecision::Declined(DeclineReason::InsufficientDeposit);
        }

        // The operation allow-list has exactly one entry: a zero-value
        // vote(...) on the configured voting contract.
        let voting: Address = env.storage().instance().get(&VOTING_CONTRACT).unwrap();
        if request.target != voting
            || request.transferred != 0
            || request.func != symbol_short!("vote")
            || request.max_fee < 0
        {
            return SponsorshipDecision::Declined(DeclineReason::MalformedCall);
        }
        let call = match request.call {
            Some(call) => call,
            None => return SponsorshipDecision::Declined(DeclineReason::MalformedCall),
        };

        match Self::mirror_vote_checks(&env, &voting, &call) {
            Ok(()) => SponsorshipDecision::Approved,
            Err(rejection) => {
                SponsorshipDecision::Declined(DeclineReason::InnerValidationFailed(rejection))
            }
        }
    }

    /// Replace the allow-listed account (admin only).
    pub fn set_allowed_account(env: Env, account: Address) {
        let admin: Address = env.storage().instance().get(&ADMIN).unwrap();
        admin.require_auth();

        env.storage().instance().set(&ALLOWED_ACCOUNT, &account);
        AllowedAccountSetEvent { account }.publish(&env);
    }

    /// Add to the sponsorship deposit (admin only). Returns the new balance.
    pub fn deposit(env: Env, amount: i128) -> Result<i128, SponsorError> {
        let admin: Address = env.storage().instance().get(&ADMIN).unwrap();
        admin.require_auth();

        if amount <= 0 {
            return Err(SponsorError::InvalidAmount);
        }

        let balance: i128 = env.storage().instance().get(&DEPOSIT).unwrap();
        let balance = balance + amount;
        env.storage().instance().set(&DEPOSIT, &balance);

        DepositEvent { amount, balance }.publish(&env);
        Ok(balance)
    }

    /// Withdraw from the sponsorship deposit (admin only). Returns the new
    /// balance.
    pub fn withdraw(env: Env, amount: i128) -> Result<i128, SponsorError> {
        let admin: Address = env.storage().instance().get(&ADMIN).unwrap();
        admin.require_auth();

        if amount <= 0 {
            return Err(SponsorError::InvalidAmount);
        }

        let balance: i128 = env.storage().instance().get(&DEPOSIT).unwrap();
        if amount > balance {
            return Err(SponsorError::InsufficientBalance);
        }
        let balance = balance - amount;
        env.storage().instance().set(&DEPOSIT, &balance);

        WithdrawEvent { amount, balance }.publish(&env);
        Ok(balance)
    }

    pub fn admin(env: Env) -> Address {
        env.storage().instance().get(&ADMIN).unwrap()
    }

    pub fn voting_contract(env: Env) -> Address {
        env.storage().instance().get(&VOTING_CONTRACT).unwrap()
    }

    pub fn allowed_account(env: Env) -> Option<Address> {
        env.storage().instance().get(&ALLOWED_ACCOUNT)
    }

    pub fn deposit_balance(env: Env) -> i128 {
        env.storage().instance().get(&DEPOSIT).unwrap()
    }

    // Internal: re-run the vote admission checks that gate nullifier, scope,
    // root, depth, and proof, as pure reads. The window and option checks
    // belong to the proposal store and are left to the ledger itself.
    fn mirror_vote_checks(
        env: &Env,
        voting: &Address,
        call: &VoteCall,
    ) -> Result<(), VoteRejection> {
        let proof = &call.proof;

        if groth16::validate_nullifier(env, &proof.nullifier).is_err() {
            return Err(VoteRejection::InvalidNullifier);
        }
        let used: bool = env.invoke_contract(
            voting,
            &Symbol::new(env, "is_nullifier_used"),
            soroban_sdk::vec![env, proof.nullifier.clone().into_val(env)],
        );
        if used {
            return Err(VoteRejection::NullifierAlreadyUsed);
        }

        let scope: U256 = env.invoke_contract(
            voting,
            &symbol_short!("scope"),
            soroban_sdk::vec![env],
        );
        if proof.scope != scope {
            return Err(VoteRejection::ScopeMismatch);
        }

        if call.root_history_index >= ROOT_HISTORY_SIZE {
            return Err(VoteRejection::UnknownRoot);
        }
        let tree: Address = env.invoke_contract(
            voting,
            &Symbol::new(env, "tree_contract"),
            soroban_sdk::vec![env],
        );
        let stored_root: U256 = env.invoke_contract(
            &tree,
            &symbol_short!("root_at"),
            soroban_sdk::vec![env, call.root_history_index.into_val(env)],
        );
        if stored_root == U256::from_u32(env, 0) || stored_root != proof.merkle_tree_root {
            return Err(VoteRejection::UnknownRoot);
        }

        if !(MIN_TREE_DEPTH..=MAX_TREE_DEPTH).contains(&proof.merkle_tree_depth) {
            return Err(VoteRejection::InvalidTreeDepth);
        }

        let vk: Option<VerificationKey> = env.invoke_contract(
            voting,
            &Symbol::new(env, "verifier_key"),
            soroban_sdk::vec![env, proof.merkle_tree_depth.into_val(env)],
        );
        let vk = vk.ok_or(VoteRejection::VerifierKeyNotSet)?;
        match groth16::verify_membership_proof(env, &vk, proof) {
            Ok(true) => Ok(()),
            _ => Err(VoteRejection::ProofVerificationFailed),
        }
    }
}
