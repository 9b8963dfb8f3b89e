//! # Group Membership Tree
//!
//! Append-only membership accumulator for a single anonymity group. Member
//! commitments are the leaves of a lean incremental Merkle tree over
//! Poseidon/BN254: the depth grows with the member count
//! (`depth = ceil(log2(size))`), an unpaired node is carried upward without
//! hashing, and the empty tree has root zero. There are no zero-value
//! subtrees and no removal operation.
//!
//! Every insertion publishes the new root into a fixed 64-slot history ring
//! so proofs generated against a slightly stale membership state remain
//! verifiable until 64 newer roots have been published.

#![no_std]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, Address, Env, Symbol, Vec, U256,
};

/// Number of historical roots retained. A proof bound to a root older than
/// the most recent 64 is permanently unverifiable.
pub const ROOT_HISTORY_SIZE: u32 = 64;
pub const MIN_TREE_DEPTH: u32 = 1;
pub const MAX_TREE_DEPTH: u32 = 32;

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum GroupTreeError {
    /// Zero is the empty-leaf sentinel and can never be a commitment
    ZeroCommitment = 1,
    /// Commitment is already a leaf of the tree
    DuplicateCommitment = 2,
    /// Address has already registered a commitment
    MemberAlreadyJoined = 3,
    /// Insertion would grow the tree beyond MAX_TREE_DEPTH
    DepthExceeded = 4,
    /// Commitment is not a leaf of the tree
    CommitmentNotFound = 5,
    /// History slot index must be < ROOT_HISTORY_SIZE
    RootIndexOutOfRange = 6,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Size,                      // u32: number of leaves
    Depth,                     // u32: current tree depth
    SideNodes,                 // Vec<U256>: per-level last left node; slot [depth] is the root
    Roots,                     // Vec<U256>: 64-slot ring, zero-initialized
    RootCount,                 // u64: total roots ever published
    LeafIndex(U256),           // commitment -> leaf index
    MemberCommitment(Address), // member -> commitment (set exactly once)
}

/// Read-only tree configuration.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct TreeConfig {
    pub root_history_size: u32,
    pub min_tree_depth: u32,
    pub max_tree_depth: u32,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct MemberAddedEvent {
    #[topic]
    pub index: u32,
    pub commitment: U256,
    pub new_root: U256,
}

#[contract]
pub struct GroupTree;

#[contractimpl]
impl GroupTree {
    /// Constructor: start with an empty tree and a zeroed history ring.
    pub fn __constructor(env: Env) {
        let storage = env.storage().persistent();
        storage.set(&DataKey::Size, &0u32);
        storage.set(&DataKey::Depth, &0u32);
        storage.set(&DataKey::SideNodes, &Vec::<U256>::new(&env));
        storage.set(&DataKey::RootCount, &0u64);

        let mut roots = Vec::new(&env);
        for _ in 0..ROOT_HISTORY_SIZE {
            roots.push_back(U256::from_u32(&env, 0));
        }
        storage.set(&DataKey::Roots, &roots);
    }

    /// Register `commitment` for `member` and append it to the tree.
    ///
    /// A member registers exactly one commitment; a commitment appears in the
    /// tree exactly once. Returns the new root, which is also published into
    /// the history ring.
    pub fn join(env: Env, member: Address, commitment: U256) -> Result<U256, GroupTreeError> {
        member.require_auth();

        if commitment == U256::from_u32(&env, 0) {
            return Err(GroupTreeError::ZeroCommitment);
        }

        let member_key = DataKey::MemberCommitment(member.clone());
        if env.storage().persistent().has(&member_key) {
            return Err(GroupTreeError::MemberAlreadyJoined);
        }

        let leaf_key = DataKey::LeafIndex(commitment.clone());
        if env.storage().persistent().has(&leaf_key) {
            return Err(GroupTreeError::DuplicateCommitment);
        }

        let size: u32 = env.storage().persistent().get(&DataKey::Size).unwrap();
        let mut depth: u32 = env.storage().persistent().get(&DataKey::Depth).unwrap();

        // The tree grows one level at a time: depth is ceil(log2(size)) and
        // size only ever increments.
        if (1u64 << depth) < (size as u64) + 1 {
            depth += 1;
        }
        if depth > MAX_TREE_DEPTH {
            return Err(GroupTreeError::DepthExceeded);
        }

        let new_root = Self::insert_leaf(&env, commitment.clone(), size, depth);

        env.storage().persistent().set(&DataKey::Size, &(size + 1));
        env.storage().persistent().set(&DataKey::Depth, &depth);
        env.storage().persistent().set(&leaf_key, &size);
        env.storage().persistent().set(&member_key, &commitment);

        Self::publish_root(&env, new_root.clone());

        MemberAddedEvent {
            index: size,
            commitment,
            new_root: new_root.clone(),
        }
        .publish(&env);

        Ok(new_root)
    }

    /// Current root of the tree (0 while the tree is empty).
    pub fn current_root(env: Env) -> U256 {
        let count: u64 = env.storage().persistent().get(&DataKey::RootCount).unwrap();
        if count == 0 {
            return U256::from_u32(&env, 0);
        }
        let roots: Vec<U256> = env.storage().persistent().get(&DataKey::Roots).unwrap();
        let slot = ((count - 1) % ROOT_HISTORY_SIZE as u64) as u32;
        roots.get(slot).unwrap()
    }

    /// Check whether `root` is one of the retained historical roots.
    ///
    /// Scans newest-first: recent proofs are the common case, so the match is
    /// usually found within the first few slots. A zero root is never valid.
    pub fn is_known_root(env: Env, root: U256) -> bool {
        if root == U256::from_u32(&env, 0) {
            return false;
        }

        let count: u64 = env.storage().persistent().get(&DataKey::RootCount).unwrap();
        if count == 0 {
            return false;
        }

        let roots: Vec<U256> = env.storage().persistent().get(&DataKey::Roots).unwrap();
        let steps = count.min(ROOT_HISTORY_SIZE as u64) as u32;
        let mut slot = ((count - 1) % ROOT_HISTORY_SIZE as u64) as u32;

        for _ in 0..steps {
            if roots.get(slot).unwrap() == root {
                return true;
            }
            slot = if slot == 0 {
                ROOT_HISTORY_SIZE - 1
            } else {
                slot - 1
            };
        }
        false
    }

    /// Raw read of a history ring slot. Returns 0 for a slot that has never
    /// been written; callers must treat a zero entry as invalid.
    pub fn root_at(env: Env, index: u32) -> Result<U256, GroupTreeError> {
        if index >= ROOT_HISTORY_SIZE {
            return Err(GroupTreeError::RootIndexOutOfRange);
        }
        let roots: Vec<U256> = env.storage().persistent().get(&DataKey::Roots).unwrap();
        Ok(roots.get(index).unwrap())
    }

    /// Membership test for a commitment.
    pub fn contains(env: Env, commitment: U256) -> bool {
        env.storage()
            .persistent()
            .has(&DataKey::LeafIndex(commitment))
    }

    /// The commitment registered by `member`, if any.
    pub fn commitment_of(env: Env, member: Address) -> Option<U256> {
        env.storage()
            .persistent()
            .get(&DataKey::MemberCommitment(member))
    }

    /// Leaf index of a commitment.
    pub fn leaf_index(env: Env, commitment: U256) -> Result<u32, GroupTreeError> {
        env.storage()
            .persistent()
            .get(&DataKey::LeafIndex(commitment))
            .ok_or(GroupTreeError::CommitmentNotFound)
    }

    /// Number of members (leaves).
    pub fn member_count(env: Env) -> u32 {
        env.storage().persistent().get(&DataKey::Size).unwrap()
    }

    /// Current tree depth.
    pub fn tree_depth(env: Env) -> u32 {
        env.storage().persistent().get(&DataKey::Depth).unwrap()
    }

    /// Total number of roots ever published (monotonic; slots wrap at 64).
    pub fn root_count(env: Env) -> u64 {
        env.storage().persistent().get(&DataKey::RootCount).unwrap()
    }

    pub fn config(_env: Env) -> TreeConfig {
        TreeConfig {
            root_history_size: ROOT_HISTORY_SIZE,
            min_tree_depth: MIN_TREE_DEPTH,
            max_tree_depth: MAX_TREE_DEPTH,
        }
    }

    // Internal: append a leaf and recompute the root from the side nodes.
    //
    // At each level the leaf's ancestor is either a right child (hash it
    // with the stored left sibling) or a left child (store it for the next
    // right sibling and carry it up unchanged). The final carried node is
    // the new root, stored at side_nodes[depth] so it becomes the level-depth
    // left sibling when the tree later grows a level.
    fn insert_leaf(env: &Env, leaf: U256, index: u32, depth: u32) -> U256 {
        let mut side: Vec<U256> = env.storage().persistent().get(&DataKey::SideNodes).unwrap();

        let mut node = leaf;
        let mut current_index = index;

        for level in 0..depth {
            if current_index % 2 == 1 {
                let left = side.get(level).unwrap();
                node = Self::hash_pair(env, &left, &node);
            } else {
                Self::set_side_node(&mut side, level, node.clone());
            }
            current_index /= 2;
        }

        Self::set_side_node(&mut side, depth, node.clone());
        env.storage().persistent().set(&DataKey::SideNodes, &side);

        node
    }

    // Internal: write the new root into the ring at (count mod 64),
    // overwriting the oldest entry once the ring is full.
    fn publish_root(env: &Env, root: U256) {
        let count: u64 = env.storage().persistent().get(&DataKey::RootCount).unwrap();
        let mut roots: Vec<U256> = env.storage().persistent().get(&DataKey::Roots).unwrap();

        let slot = (count % ROOT_HISTORY_SIZE as u64) as u32;
        roots.set(slot, root);

        env.storage().persistent().set(&DataKey::Roots, &roots);
        env.storage()
            .persistent()
            .set(&DataKey::RootCount, &(count + 1));
    }

    // Internal: side-node slots fill strictly in order, so a write is either
    // an in-place update or an append.
    fn set_side_node(side: &mut Vec<U256>, level: u32, node: U256) {
        if level < side.len() {
            side.set(level, node);
        } else {
            side.push_back(node);
        }
    }

    // Internal: Poseidon hash of two U256 values
    fn hash_pair(env: &Env, left: &U256, right: &U256) -> U256 {
        let field = Symbol::new(env, "BN254");
        let inputs = soroban_sdk::vec![env, left.clone(), right.clone()];
        env.crypto().poseidon_hash(&inputs, field)
    }
}
