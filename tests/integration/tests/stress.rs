// Stress smoke: a realistically sized group driving several concurrent
// proposals. Exercises tree growth, the active-proposal scan, and tally
// accounting under many distinct nullifiers.

use soroban_sdk::{
    testutils::{Address as _, Ledger as _},
    Address, BytesN, Env, String, U256, Vec,
};

use group_tree::{GroupTree, GroupTreeClient};
use voting::{MembershipProof, VerificationKey, Voting, VotingClient};

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

#[test]
fn stress_many_members_and_proposals() {
    let env = Env::default();
    env.mock_all_auths();
    env.cost_estimate().budget().reset_unlimited();
    env.ledger().with_mut(|li| {
        li.timestamp = 1_700_000_000;
    });

    let admin = Address::generate(&env);
    let tree_id = env.register(GroupTree, ());
    let voting_id = env.register(Voting, (tree_id.clone(), admin));

    let tree = GroupTreeClient::new(&env, &tree_id);
    let voting = VotingClient::new(&env, &voting_id);

    // Populate 20 members
    let proposer = Address::generate(&env);
    tree.join(&proposer, &U256::from_u32(&env, 50_000));
    for i in 1..20u32 {
        let member = Address::generate(&env);
        tree.join(&member, &U256::from_u32(&env, 50_000 + i));
    }
    assert_eq!(tree.member_count(), 20);
    assert_eq!(tree.tree_depth(), 5);

    let depth = tree.tree_depth();
    let root = tree.current_root();
    voting.set_verifier_key(&depth, &dummy_vk(&env));

    // Five 3-option proposals
    let options = soroban_sdk::vec![
        &env,
        String::from_str(&env, "for"),
        String::from_str(&env, "against"),
        String::from_str(&env, "abstain"),
    ];
    let mut proposal_ids = vec![];
    for i in 0..5u32 {
        let title = String::from_str(&env, &format!("Proposal {}", i));
        let id = voting.create_proposal(
            &title,
            &String::from_str(&env, "stress"),
            &options,
            &3600u64,
            &proposer,
        );
        proposal_ids.push(id);
    }
    assert_eq!(voting.proposal_count(), 5);
    assert_eq!(voting.active_proposals().len(), 5);

    // Ten voters per proposal, each with a distinct nullifier, rotating
    // through the options
    let scope = voting.scope();
    let root_slot = 19u32;
    for (p, proposal_id) in proposal_ids.iter().enumerate() {
        for v in 0..10u32 {
            let mut points = Vec::new(&env);
            for i in 1..=8u32 {
                points.push_back(U256::from_u32(&env, i));
            }
            let proof = MembershipProof {
                merkle_tree_depth: depth,
                merkle_tree_root: root.clone(),
                nullifier: U256::from_u32(&env, 1_000_000 + (p as u32) * 100 + v),
                message: U256::from_u32(&env, 0),
                scope: scope.clone(),
                points,
            };
            voting.vote(proposal_id, &(v % 3), &proof, &root_slot);
        }
    }

    for proposal_id in &proposal_ids {
        let tally = voting.get_tally(proposal_id);
        // 10 votes rotating over 3 options: 4/3/3
        assert_eq!(tally, soroban_sdk::vec![&env, 4u64, 3u64, 3u64]);
        assert_eq!(voting.get_proposal(proposal_id).total_votes, 10);
    }
}
