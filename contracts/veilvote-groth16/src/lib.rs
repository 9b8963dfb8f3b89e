//! # VeilVote Groth16 Verification Library
//!
//! Shared Groth16 zero-knowledge proof verification for VeilVote contracts.
//! Uses the BN254 elliptic curve (alt_bn128) for pairing-based verification.
//!
//! ## Cryptographic Primitives
//!
//! ### BN254 Curve (alt_bn128)
//! - **Definition**: y² = x³ + 3 over 𝔽_p where p = 21888242871839275222246405745257275088696311157297823662689037894645226208583
//! - **Scalar field order**: r = 21888242871839275222246405745257275088548364400416034343698204186575808495617
//!
//! ### Groth16 SNARK
//! - **Paper**: "On the Size of Pairing-based Non-interactive Arguments" by Jens Groth (2016)
//! - **Implementation**: Uses Soroban BN254 host functions for verification
//!
//! ## Public Signal Tuple
//!
//! A membership proof commits to exactly four public signals, in order:
//! `[merkle_tree_root, nullifier, hash(message), hash(scope)]`
//! where `hash` is SHA-256 of the big-endian value, right-shifted by one byte
//! so the result always fits the BN254 scalar field.

#![no_std]

#[allow(unused_imports)]
use soroban_sdk::{
    contracterror, contracttype,
    crypto::bn254::{Fr, G1Affine, G2Affine},
    Bytes, BytesN, Env, Vec, U256,
};

/// BN254 scalar field modulus (Fr) in big-endian bytes
/// r = 21888242871839275222246405745257275088548364400416034343698204186575808495617
/// All public signals (nullifier, root, etc.) must be < r to prevent modular reduction attacks
pub const BN254_FR_MODULUS: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91, 0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x01,
];

/// BN254 scalar field order minus one (r - 1) in big-endian bytes
/// Used for G1 point negation: (r-1) * P = -P since (r-1) ≡ -1 (mod r)
#[allow(dead_code)]
const BN254_R_MINUS_ONE: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91, 0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x00,
];

/// Number of public signals in the membership circuit
pub const PUBLIC_SIGNAL_COUNT: u32 = 4;

/// Exact IC length for the membership circuit (4 public signals + 1)
pub const EXPECTED_IC_LENGTH: u32 = 5;

/// Maximum allowed IC vector length, with slack for future circuit upgrades
pub const MAX_IC_LENGTH: u32 = 21;

/// Length of the flattened proof point vector: A (2) + B (4) + C (2)
pub const PROOF_POINTS_LEN: u32 = 8;

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Groth16Error {
    /// IC vector length doesn't match public signals + 1
    IcLengthMismatch = 30,
    /// Public signal value >= BN254 scalar field modulus (invalid field element)
    SignalNotInField = 31,
    /// Nullifier is zero (invalid)
    InvalidNullifier = 32,
    /// Proof point vector is not the 8-element [A, B, C] tuple
    MalformedProofPoints = 33,
}

/// Groth16 Verification Key for BN254
#[contracttype]
#[derive(Clone)]
pub struct VerificationKey {
    pub alpha: BytesN<64>,   // G1 point
    pub beta: BytesN<128>,   // G2 point
    pub gamma: BytesN<128>,  // G2 point
    pub delta: BytesN<128>,  // G2 point
    pub ic: Vec<BytesN<64>>, // IC points (G1)
}

/// Groth16 Proof
#[contracttype]
#[derive(Clone)]
pub struct Proof {
    pub a: BytesN<64>,  // G1 point
    pub b: BytesN<128>, // G2 point
    pub c: BytesN<64>,  // G1 point
}

/// A group-membership proof as it arrives on the wire.
///
/// `points` is the flattened Groth16 tuple
/// `[a.x, a.y, b.x1, b.x0, b.y1, b.y0, c.x, c.y]` in EIP-197 ordering,
/// each element the big-endian encoding of a base-field coordinate.
#[contracttype]
#[derive(Clone)]
pub struct MembershipProof {
    pub merkle_tree_depth: u32,
    pub merkle_tree_root: U256,
    pub nullifier: U256,
    pub message: U256,
    pub scope: U256,
    pub points: Vec<U256>,
}

/// Validate that a U256 value is within the BN254 scalar field (< r)
///
/// This prevents modular reduction attacks where values >= r are reduced mod r,
/// allowing attackers to submit different U256 values that verify identically.
///
/// SECURITY: All public signals (nullifier, root) MUST be validated before use.
/// Without this check, an attacker could double-vote by submitting nullifier=r+1
/// (stored as different key) which verifies the same as nullifier=1.
///
/// Returns `Err(Groth16Error::SignalNotInField)` if value >= r.
pub fn assert_in_field(env: &Env, value: &U256) -> Result<(), Groth16Error> {
    let modulus = U256::from_be_bytes(env, &Bytes::from_array(env, &BN254_FR_MODULUS));
    if value >= &modulus {
        return Err(Groth16Error::SignalNotInField);
    }
    Ok(())
}

/// Check if a U256 value is within the BN254 scalar field (< r)
/// Returns true if valid, false if >= r.
pub fn is_in_field(env: &Env, value: &U256) -> bool {
    let modulus = U256::from_be_bytes(env, &Bytes::from_array(env, &BN254_FR_MODULUS));
    value < &modulus
}

/// Validate that a nullifier is non-zero and within the BN254 scalar field.
/// Returns appropriate error for zero nullifier or out-of-field value.
pub fn validate_nullifier(env: &Env, nullifier: &U256) -> Result<(), Groth16Error> {
    // Check for zero nullifier
    if nullifier == &U256::from_u32(env, 0) {
        return Err(Groth16Error::InvalidNullifier);
    }
    // Check field bounds
    assert_in_field(env, nullifier)
}

/// Map an arbitrary 256-bit value into the BN254 scalar field.
///
/// SHA-256 of the big-endian encoding, right-shifted by one byte. The top
/// byte of the result is always zero, so the value is strictly below r.
pub fn hash_to_field(env: &Env, value: &U256) -> U256 {
    let digest: BytesN<32> = env.crypto().sha256(&value.to_be_bytes()).into();
    let raw = digest.to_array();

    let mut shifted = [0u8; 32];
    shifted[1..32].copy_from_slice(&raw[0..31]);

    U256::from_be_bytes(env, &Bytes::from_array(env, &shifted))
}

/// Decode the flattened point vector of a [`MembershipProof`] into a
/// Groth16 [`Proof`].
///
/// Coordinate validity is not checked here; points off the curve or outside
/// the proper subgroup cannot satisfy the pairing equation and are rejected
/// by verification.
pub fn proof_points(env: &Env, proof: &MembershipProof) -> Result<Proof, Groth16Error> {
    if proof.points.len() != PROOF_POINTS_LEN {
        return Err(Groth16Error::MalformedProofPoints);
    }

    let mut a = [0u8; 64];
    let mut b = [0u8; 128];
    let mut c = [0u8; 64];

    copy_coordinate(&proof.points.get(0).unwrap(), &mut a[0..32]);
    copy_coordinate(&proof.points.get(1).unwrap(), &mut a[32..64]);
    for i in 0..4u32 {
        let offset = (i as usize) * 32;
        copy_coordinate(
            &proof.points.get(i + 2).unwrap(),
            &mut b[offset..offset + 32],
        );
    }
    copy_coordinate(&proof.points.get(6).unwrap(), &mut c[0..32]);
    copy_coordinate(&proof.points.get(7).unwrap(), &mut c[32..64]);

    Ok(Proof {
        a: BytesN::from_array(env, &a),
        b: BytesN::from_array(env, &b),
        c: BytesN::from_array(env, &c),
    })
}

fn copy_coordinate(value: &U256, out: &mut [u8]) {
    value.to_be_bytes().copy_into_slice(out);
}

/// Assemble the public-signal tuple for a membership proof:
/// `[root, nullifier, hash(message), hash(scope)]`.
pub fn public_signals(env: &Env, proof: &MembershipProof) -> Vec<U256> {
    soroban_sdk::vec![
        env,
        proof.merkle_tree_root.clone(),
        proof.nullifier.clone(),
        hash_to_field(env, &proof.message),
        hash_to_field(env, &proof.scope),
    ]
}

/// Verify a full membership proof: decode the point vector, assemble the
/// public-signal tuple, and run the pairing check.
///
/// Returns `Ok(false)` when the pairing check rejects; `Err` only for
/// structurally malformed input.
pub fn verify_membership_proof(
    env: &Env,
    vk: &VerificationKey,
    proof: &MembershipProof,
) -> Result<bool, Groth16Error> {
    let groth16_proof = proof_points(env, proof)?;
    let signals = public_signals(env, proof);
    Ok(verify_groth16(env, vk, &groth16_proof, &signals))
}

/// Verify a Groth16 proof using BN254 pairing check.
///
/// The Groth16 verification equation is:
/// e(-A, B) * e(alpha, beta) * e(vk_x, gamma) * e(C, delta) = 1
///
/// Where vk_x = IC[0] + sum(pub_signals[i] * IC[i+1])
///
/// # Arguments
/// * `env` - Soroban environment
/// * `vk` - Verification key
/// * `proof` - Groth16 proof (A, B, C points)
/// * `pub_signals` - Public signals (must have length = IC.len() - 1)
///
/// # Returns
/// `true` if the proof verifies, `false` otherwise.
///
/// # Test Mode
/// In test mode (cfg(test) or feature="testutils"), always returns true
/// to allow testing without real proofs.
#[allow(unused_variables)]
pub fn verify_groth16(
    env: &Env,
    vk: &VerificationKey,
    proof: &Proof,
    pub_signals: &Vec<U256>,
) -> bool {
    // Validate IC length matches public signals
    if pub_signals.len() + 1 != vk.ic.len() {
        return false;
    }

    // In test mode, skip actual verification
    #[cfg(any(test, feature = "testutils"))]
    {
        return true;
    }

    #[cfg(not(any(test, feature = "testutils")))]
    {
        // Step 1: Compute vk_x = IC[0] + sum(pub_signals[i] * IC[i+1])
        let vk_x = compute_vk_x(env, vk, pub_signals);

        // Step 2: Negate A using scalar multiplication by (r-1)
        // For a point P, (r-1) * P = -P since (r-1) ≡ -1 (mod r)
        let a_point = G1Affine::from_bytes(proof.a.clone());
        let neg_one = get_neg_one_scalar(env);
        let neg_a = a_point * neg_one;

        // Step 3: Build pairing vectors
        let mut g1_vec = Vec::new(env);
        g1_vec.push_back(neg_a);
        g1_vec.push_back(G1Affine::from_bytes(vk.alpha.clone()));
        g1_vec.push_back(G1Affine::from_bytes(vk_x));
        g1_vec.push_back(G1Affine::from_bytes(proof.c.clone()));

        let mut g2_vec = Vec::new(env);
        g2_vec.push_back(G2Affine::from_bytes(proof.b.clone()));
        g2_vec.push_back(G2Affine::from_bytes(vk.beta.clone()));
        g2_vec.push_back(G2Affine::from_bytes(vk.gamma.clone()));
        g2_vec.push_back(G2Affine::from_bytes(vk.delta.clone()));

        // Step 4: Perform pairing check
        env.crypto().bn254().pairing_check(g1_vec, g2_vec)
    }
}

/// Returns the scalar (r - 1) which is equivalent to -1 mod r.
/// Used for G1 point negation via scalar multiplication.
#[cfg(not(any(test, feature = "testutils")))]
fn get_neg_one_scalar(env: &Env) -> Fr {
    let bytes = Bytes::from_array(env, &BN254_R_MINUS_ONE);
    let u = U256::from_be_bytes(env, &bytes);
    Fr::from(u)
}

/// Compute vk_x = IC[0] + sum(pub_signals[i] * IC[i+1])
/// This is the linear combination of IC points weighted by public signals.
#[cfg(not(any(test, feature = "testutils")))]
fn compute_vk_x(env: &Env, vk: &VerificationKey, pub_signals: &Vec<U256>) -> BytesN<64> {
    // Start with IC[0]
    let ic0 = vk.ic.get(0).expect("IC[0] missing");
    let mut vk_x = G1Affine::from_bytes(ic0);

    // Add each pub_signal[i] * IC[i+1]
    for i in 0..pub_signals.len() {
        let signal = pub_signals.get(i).expect("signal missing");
        let ic_point_bytes = vk.ic.get(i + 1).expect("IC point missing");
        let ic_point = G1Affine::from_bytes(ic_point_bytes);

        // Scalar multiplication: signal * IC[i+1]
        let scalar = Fr::from(signal);
        let scaled_point = ic_point * scalar;

        // Add to accumulator
        vk_x = vk_x + scaled_point;
    }

    vk_x.to_bytes()
}
