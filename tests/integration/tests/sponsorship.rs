// Sponsorship Mirror Tests
//
// The fee sponsor's decision must mirror the ledger's admission outcome:
// 1. A request the sponsor approves succeeds as a direct self-paid vote
//    with the same parameters (absent a competing vote)
// 2. Once the vote lands, re-checking the same request is declined for the
//    same reason the ledger would reject it (spent nullifier)
// 3. Structural declines (wrong target, value transfer, foreign account)
//    never involve the ledger at all
// 4. Checks are read-only: no deposit is consumed, no nullifier spent

use soroban_sdk::{
    symbol_short,
    testutils::{Address as _, Ledger as _},
    Address, BytesN, Env, String, U256, Vec,
};

use fee_sponsor::{
    DeclineReason, FeeSponsor, FeeSponsorClient, SponsorshipDecision, SponsorshipRequest,
    VoteCall, VoteRejection,
};
use group_tree::{GroupTree, GroupTreeClient};
use voting::{MembershipProof, VerificationKey, Voting, VotingClient};

struct Setup<'a> {
    env: Env,
    tree: GroupTreeClient<'a>,
    voting: VotingClient<'a>,
    sponsor: FeeSponsorClient<'a>,
    voter_account: Address,
    proposal_id: u64,
    root: U256,
    root_slot: u32,
    depth: u32,
}

fn setup<'a>() -> Setup<'a> {
    let env = Env::default();
    env.mock_all_auths();
    env.cost_estimate().budget().reset_unlimited();
    env.ledger().with_mut(|li| {
        li.timestamp = 1_700_000_000;
    });

    let admin = Address::generate(&env);
    let tree_id = env.register(GroupTree, ());
    let voting_id = env.register(Voting, (tree_id.clone(), admin.clone()));
    let sponsor_id = env.register(FeeSponsor, (voting_id.clone(), admin.clone()));

    let tree = GroupTreeClient::new(&env, &tree_id);
    let voting = VotingClient::new(&env, &voting_id);
    let sponsor = FeeSponsorClient::new(&env, &sponsor_id);

    // Three members; the proof will bind to the latest root (slot 2)
    let proposer = Address::generate(&env);
    tree.join(&proposer, &U256::from_u32(&env, 501));
    for i in 0..2u32 {
        let member = Address::generate(&env);
        tree.join(&member, &U256::from_u32(&env, 502 + i));
    }
    let depth = tree.tree_depth();
    let root = tree.current_root();
    let root_slot = 2u32;

    voting.set_verifier_key(&depth, &dummy_vk(&env));
    let proposal_id = voting.create_proposal(
        &String::from_str(&env, "Sponsored vote"),
        &String::from_str(&env, "Fee underwritten by the sponsor"),
        &soroban_sdk::vec![
            &env,
            String::from_str(&env, "yes"),
            String::from_str(&env, "no"),
        ],
        &3600u64,
        &proposer,
    );

    let voter_account = Address::generate(&env);
    sponsor.set_allowed_account(&voter_account);
    sponsor.deposit(&10_000i128);

    Setup {
        env,
        tree,
        voting,
        sponsor,
        voter_account,
        proposal_id,
        root,
        root_slot,
        depth,
    }
}

fn dummy_vk(env: &Env) -> VerificationKey {
    let g1 = BytesN::from_array(env, &[0u8; 64]);
    let g2 = BytesN::from_array(env, &[0u8; 128]);
    VerificationKey {
        alpha: g1.clone(),
        beta: g2.clone(),
        gamma: g2.clone(),
        delta: g2,
        ic: soroban_sdk::vec![
            env,
            g1.clone(),
            g1.clone(),
            g1.clone(),
            g1.clone(),
            g1.clone()
        ],
    }
}

fn make_proof(s: &Setup, nullifier: u32) -> MembershipProof {
    let mut points = Vec::new(&s.env);
    for i in 1..=8u32 {
        points.push_back(U256::from_u32(&s.env, i));
    }
    MembershipProof {
        merkle_tree_depth: s.depth,
        merkle_tree_root: s.root.clone(),
        nullifier: U256::from_u32(&s.env, nullifier),
        message: U256::from_u32(&s.env, 0),
        scope: s.voting.scope(),
        points,
    }
}

fn make_request(s: &Setup, proof: MembershipProof) -> SponsorshipRequest {
    SponsorshipRequest {
        source: s.voter_account.clone(),
        source_deployed: true,
        target: s.voting.address.clone(),
        func: symbol_short!("vote"),
        transferred: 0,
        max_fee: 250,
        call: Some(VoteCall {
            proposal_id: s.proposal_id,
            option_index: 0,
            proof,
            root_history_index: s.root_slot,
        }),
    }
}

#[test]
fn test_approved_request_succeeds_on_ledger() {
    let s = setup();
    let proof = make_proof(&s, 888);
    let request = make_request(&s, proof.clone());

    // The sponsor approves...
    assert_eq!(
        s.sponsor.check_sponsorship(&request),
        SponsorshipDecision::Approved
    );

    // ...and the identical self-paid vote lands
    s.voting
        .vote(&s.proposal_id, &0u32, &proof, &s.root_slot);
    assert_eq!(
        s.voting.get_tally(&s.proposal_id),
        soroban_sdk::vec![&s.env, 1u64, 0u64]
    );

    // The same request is now declined exactly where the ledger would
    // reject it: the nullifier is spent
    assert_eq!(
        s.sponsor.check_sponsorship(&request),
        SponsorshipDecision::Declined(DeclineReason::InnerValidationFailed(
            VoteRejection::NullifierAlreadyUsed
        ))
    );
}

#[test]
fn test_sponsorship_race_is_advisory() {
    let s = setup();
    let proof = make_proof(&s, 999);
    let request = make_request(&s, proof.clone());

    assert_eq!(
        s.sponsor.check_sponsorship(&request),
        SponsorshipDecision::Approved
    );

    // A competing self-paid vote consumes the nullifier between the
    // sponsorship decision and execution
    s.voting
        .vote(&s.proposal_id, &1u32, &proof, &s.root_slot);

    // The sponsored transaction would now fail on-ledger; the earlier
    // approval carried no guarantee
    assert_eq!(
        s.voting
            .try_vote(&s.proposal_id, &0u32, &proof, &s.root_slot),
        Err(Ok(voting::VotingError::NullifierAlreadyUsed))
    );
}

#[test]
fn test_structural_declines() {
    let s = setup();

    // Target is not the voting ledger
    let mut request = make_request(&s, make_proof(&s, 1));
    request.target = s.tree.address.clone();
    assert_eq!(
        s.sponsor.check_sponsorship(&request),
        SponsorshipDecision::Declined(DeclineReason::MalformedCall)
    );

    // Nonzero value transfer
    let mut request = make_request(&s, make_proof(&s, 1));
    request.transferred = 5;
    assert_eq!(
        s.sponsor.check_sponsorship(&request),
        SponsorshipDecision::Declined(DeclineReason::MalformedCall)
    );

    // Foreign originating account
    let mut request = make_request(&s, make_proof(&s, 1));
    request.source = Address::generate(&s.env);
    assert_eq!(
        s.sponsor.check_sponsorship(&request),
        SponsorshipDecision::Declined(DeclineReason::UnauthorizedAccount)
    );
}

#[test]
fn test_checks_consume_nothing() {
    let s = setup();
    let request = make_request(&s, make_proof(&s, 777));

    let balance = s.sponsor.deposit_balance();
    for _ in 0..3 {
        assert_eq!(
            s.sponsor.check_sponsorship(&request),
            SponsorshipDecision::Approved
        );
    }

    assert_eq!(s.sponsor.deposit_balance(), balance);
    assert!(!s.voting.is_nullifier_used(&U256::from_u32(&s.env, 777)));
    // The vote is still available to whoever pays for it
    let proof = make_proof(&s, 777);
    s.voting
        .vote(&s.proposal_id, &0u32, &proof, &s.root_slot);
}
