//! Proposal store: lifecycle and tally bookkeeping.
//!
//! Proposals are created by group members, carry a fixed option list, and
//! are open for voting over a bounded `[start_time, end_time]` window.
//! Execution is a one-way latch allowed only after the window has closed.
//! Nothing is ever deleted; tallies only grow.

use soroban_sdk::{contracttype, Address, Env, String, Vec};

use crate::VotingError;

pub const MIN_OPTIONS: u32 = 2;
pub const MAX_OPTIONS: u32 = 10;

/// One hour. Anything shorter gives voters no realistic chance to react.
pub const MIN_VOTING_DURATION: u64 = 3_600;
/// Thirty days.
pub const MAX_VOTING_DURATION: u64 = 2_592_000;

// Size limits to prevent DoS attacks
pub const MAX_TITLE_LEN: u32 = 256;
pub const MAX_DESCRIPTION_LEN: u32 = 1024;

#[contracttype]
#[derive(Clone)]
pub enum ProposalKey {
    Proposal(u64),   // proposal_id -> Proposal
    ProposalCount,   // u64
    Tally(u64, u32), // (proposal_id, option_index) -> u64
}

#[contracttype]
#[derive(Clone)]
pub struct Proposal {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub start_time: u64,
    pub end_time: u64,
    pub option_count: u32,
    pub options: Vec<String>,
    pub proposer: Address,
    pub executed: bool,
    pub total_votes: u64,
}

impl Proposal {
    /// Voting is open while `start_time <= now <= end_time`.
    pub fn is_open(&self, now: u64) -> bool {
        now >= self.start_time && now <= self.end_time
    }
}

/// Validate the shape of a new proposal before anything is stored.
pub fn validate_new(
    title: &String,
    description: &String,
    options: &Vec<String>,
    duration: u64,
) -> Result<(), VotingError> {
    if title.len() == 0 {
        return Err(VotingError::EmptyTitle);
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(VotingError::TitleTooLong);
    }
    if description.len() == 0 {
        return Err(VotingError::EmptyDescription);
    }
    if description.len() > MAX_DESCRIPTION_LEN {
        return Err(VotingError::DescriptionTooLong);
    }
    if options.len() < MIN_OPTIONS || options.len() > MAX_OPTIONS {
        return Err(VotingError::InvalidOptionCount);
    }
    for option in options.iter() {
        if option.len() == 0 {
            return Err(VotingError::EmptyOptionLabel);
        }
    }
    if duration < MIN_VOTING_DURATION {
        return Err(VotingError::DurationTooShort);
    }
    if duration > MAX_VOTING_DURATION {
        return Err(VotingError::DurationTooLong);
    }
    Ok(())
}

/// Create and store a proposal. The voting window opens immediately:
/// `start_time = now`, `end_time = now + duration`. Ids are assigned
/// monotonically from 1.
pub fn create(
    env: &Env,
    title: String,
    description: String,
    options: Vec<String>,
    duration: u64,
    proposer: Address,
) -> Result<Proposal, VotingError> {
    validate_new(&title, &description, &options, duration)?;

    let now = env.ledger().timestamp();
    let id = next_id(env);

    let proposal = Proposal {
        id,
        title,
        description,
        start_time: now,
        end_time: now + duration,
        option_count: options.len(),
        options,
        proposer,
        executed: false,
        total_votes: 0,
    };
    store(env, &proposal);

    Ok(proposal)
}

pub fn load(env: &Env, proposal_id: u64) -> Result<Proposal, VotingError> {
    env.storage()
        .persistent()
        .get(&ProposalKey::Proposal(proposal_id))
        .ok_or(VotingError::ProposalNotFound)
}

pub fn store(env: &Env, proposal: &Proposal) {
    env.storage()
        .persistent()
        .set(&ProposalKey::Proposal(proposal.id), proposal);
}

pub fn count(env: &Env) -> u64 {
    env.storage()
        .instance()
        .get(&ProposalKey::ProposalCount)
        .unwrap_or(0)
}

/// Flip the one-way `executed` latch. Only valid once the window has closed.
pub fn mark_executed(env: &Env, proposal_id: u64) -> Result<Proposal, VotingError> {
    let mut proposal = load(env, proposal_id)?;

    if proposal.executed {
        return Err(VotingError::AlreadyExecuted);
    }
    if env.ledger().timestamp() <= proposal.end_time {
        return Err(VotingError::VotingStillOpen);
    }

    proposal.executed = true;
    store(env, &proposal);
    Ok(proposal)
}

pub fn tally_entry(env: &Env, proposal_id: u64, option_index: u32) -> u64 {
    env.storage()
        .persistent()
        .get(&ProposalKey::Tally(proposal_id, option_index))
        .unwrap_or(0)
}

pub fn bump_tally(env: &Env, proposal_id: u64, option_index: u32) {
    let count = tally_entry(env, proposal_id, option_index);
    env.storage()
        .persistent()
        .set(&ProposalKey::Tally(proposal_id, option_index), &(count + 1));
}

/// The tally vector of a proposal, one entry per option.
pub fn tally_vector(env: &Env, proposal: &Proposal) -> Vec<u64> {
    let mut tally = Vec::new(env);
    for option_index in 0..proposal.option_count {
        tally.push_back(tally_entry(env, proposal.id, option_index));
    }
    tally
}

/// Ids of proposals whose window is open and that have not been executed.
/// Computed on demand; no index is stored.
pub fn active_ids(env: &Env) -> Vec<u64> {
    let now = env.ledger().timestamp();
    let mut active = Vec::new(env);
    for id in 1..=count(env) {
        if let Some(proposal) = env
            .storage()
            .persistent()
            .get::<ProposalKey, Proposal>(&ProposalKey::Proposal(id))
        {
            if proposal.is_open(now) && !proposal.executed {
                active.push_back(id);
            }
        }
    }
    active
}

// Internal: Get next proposal ID
fn next_id(env: &Env) -> u64 {
    let count: u64 = env
        .storage()
        .instance()
        .get(&ProposalKey::ProposalCount)
        .unwrap_or(0);
    let new_id = count + 1;
    env.storage()
        .instance()
        .set(&ProposalKey::ProposalCount, &new_id);
    new_id
}
