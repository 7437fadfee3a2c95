//! Merkle-distributor claim transaction
//!
//! Instruction layout (in order):
//! - compute unit limit / price
//! - idempotent creation of the claimant's token account
//! - `new_claim` against the distributor for the mint

use async_trait::async_trait;
use borsh::BorshSerialize;
use sha2::{Digest, Sha256};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::system_program;
use solana_sdk::transaction::Transaction;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use super::solana_rpc::SolanaRpc;
use super::traits::{ClaimRequest, ClaimSubmitter};
use crate::error::{classify_message, ClaimError, ErrorClass, RedeemerError};

pub const TOKEN_PROGRAM_ID: Pubkey = pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");
pub const COMPUTE_BUDGET_PROGRAM_ID: Pubkey =
    pubkey!("ComputeBudget111111111111111111111111111111");

pub const COMPUTE_UNIT_LIMIT: u32 = 200_000;
pub const COMPUTE_UNIT_PRICE_MICRO_LAMPORTS: u64 = 375_000;

#[derive(BorshSerialize)]
struct NewClaimArgs {
    amount_unlocked: u64,
    amount_locked: u64,
    proof: Vec<[u8; 32]>,
}

/// Anchor instruction discriminator for `new_claim`
pub fn new_claim_discriminator() -> [u8; 8] {
    let digest = Sha256::digest(b"global:new_claim");
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

pub fn set_compute_unit_limit(units: u32) -> Instruction {
    let mut data = vec![2u8];
    data.extend_from_slice(&units.to_le_bytes());
    Instruction::new_with_bytes(COMPUTE_BUDGET_PROGRAM_ID, &data, vec![])
}

pub fn set_compute_unit_price(micro_lamports: u64) -> Instruction {
    let mut data = vec![3u8];
    data.extend_from_slice(&micro_lamports.to_le_bytes());
    Instruction::new_with_bytes(COMPUTE_BUDGET_PROGRAM_ID, &data, vec![])
}

pub fn associated_token_address(wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[wallet.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}

/// Create the associated token account unless it already exists
pub fn create_associated_token_account_idempotent(
    payer: &Pubkey,
    wallet: &Pubkey,
    mint: &Pubkey,
) -> Instruction {
    Instruction::new_with_bytes(
        ASSOCIATED_TOKEN_PROGRAM_ID,
        &[1],
        vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(associated_token_address(wallet, mint), false),
            AccountMeta::new_readonly(*wallet, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        ],
    )
}

/// Program ids of the distribution deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimProgram {
    pub merkle_distributor: Pubkey,
    pub token_distributor: Pubkey,
}

impl Default for ClaimProgram {
    fn default() -> Self {
        Self {
            merkle_distributor: pubkey!("boopEtkTLx8x8moK7mMBQZUfzaEiA96Qn7gQeNdcQMg"),
            token_distributor: pubkey!("J7cV46t2BLkoHWvmrcG1nK3wgB2D1EmHLko29bEDbnpV"),
        }
    }
}

impl ClaimProgram {
    pub fn distributor_address(&self, mint: &Pubkey) -> Result<Pubkey, ClaimError> {
        Pubkey::try_find_program_address(
            &[
                b"MerkleDistributor",
                self.token_distributor.as_ref(),
                mint.as_ref(),
                &0u64.to_le_bytes(),
            ],
            &self.merkle_distributor,
        )
        .map(|(address, _)| address)
        .ok_or_else(|| ClaimError::DistributorNotFound(mint.to_string()))
    }

    pub fn claim_status_address(
        &self,
        claimant: &Pubkey,
        distributor: &Pubkey,
    ) -> Result<Pubkey, ClaimError> {
        Pubkey::try_find_program_address(
            &[b"ClaimStatus", claimant.as_ref(), distributor.as_ref()],
            &self.merkle_distributor,
        )
        .map(|(address, _)| address)
        .ok_or_else(|| ClaimError::Chain("failed to derive claim status address".into()))
    }

    pub fn new_claim_instruction(
        &self,
        claimant: &Pubkey,
        mint: &Pubkey,
        amount: u64,
        proof: &[[u8; 32]],
    ) -> Result<Instruction, ClaimError> {
        let distributor = self.distributor_address(mint)?;
        let claim_status = self.claim_status_address(claimant, &distributor)?;
        let vault = associated_token_address(&distributor, mint);
        let claimant_account = associated_token_address(claimant, mint);

        let args = NewClaimArgs {
            amount_unlocked: amount,
            amount_locked: 0,
            proof: proof.to_vec(),
        };
        let mut data = new_claim_discriminator().to_vec();
        data.extend(
            borsh::to_vec(&args)
                .map_err(|e| ClaimError::Chain(format!("failed to encode claim: {}", e)))?,
        );

        Ok(Instruction::new_with_bytes(
            self.merkle_distributor,
            &data,
            vec![
                AccountMeta::new(distributor, false),
                AccountMeta::new(claim_status, false),
                AccountMeta::new(vault, false),
                AccountMeta::new(claimant_account, false),
                AccountMeta::new(*claimant, true),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
        ))
    }

    /// Full instruction list for one claim
    pub fn claim_instructions(
        &self,
        claimant: &Pubkey,
        mint: &Pubkey,
        amount: u64,
        proof: &[[u8; 32]],
    ) -> Result<Vec<Instruction>, ClaimError> {
        Ok(vec![
            set_compute_unit_limit(COMPUTE_UNIT_LIMIT),
            set_compute_unit_price(COMPUTE_UNIT_PRICE_MICRO_LAMPORTS),
            create_associated_token_account_idempotent(claimant, claimant, mint),
            self.new_claim_instruction(claimant, mint, amount, proof)?,
        ])
    }
}

fn claim_error(e: RedeemerError) -> ClaimError {
    match e {
        RedeemerError::Http(e) => ClaimError::Network(e.to_string()),
        other => {
            let msg = other.to_string();
            match classify_message(&msg) {
                ErrorClass::Auth => ClaimError::Auth(msg),
                ErrorClass::Network => ClaimError::Network(msg),
                _ => ClaimError::Chain(msg),
            }
        }
    }
}

/// Signs claim transactions with the wallet keypair and submits them
pub struct SolanaClaimSubmitter {
    rpc: Arc<SolanaRpc>,
    keypair: Arc<Keypair>,
    program: ClaimProgram,
}

impl SolanaClaimSubmitter {
    pub fn new(rpc: Arc<SolanaRpc>, keypair: Arc<Keypair>, program: ClaimProgram) -> Self {
        Self {
            rpc,
            keypair,
            program,
        }
    }
}

#[async_trait]
impl ClaimSubmitter for SolanaClaimSubmitter {
    async fn submit_claim(&self, request: &ClaimRequest) -> Result<String, ClaimError> {
        let mint = Pubkey::from_str(&request.mint)
            .map_err(|e| ClaimError::Chain(format!("invalid mint {}: {}", request.mint, e)))?;
        let payer = self.keypair.pubkey();

        let instructions =
            self.program
                .claim_instructions(&payer, &mint, request.amount, &request.proof)?;
        debug!(
            airdrop = %request.airdrop_id,
            "Creating claim transaction with {} instructions",
            instructions.len()
        );

        let blockhash = self.rpc.latest_blockhash().await.map_err(claim_error)?;
        let tx = Transaction::new_signed_with_payer(
            &instructions,
            Some(&payer),
            &[&*self.keypair],
            blockhash,
        );
        let wire = bincode::serialize(&tx)
            .map_err(|e| ClaimError::Chain(format!("failed to serialize transaction: {}", e)))?;

        let signature = self.rpc.send_transaction(&wire).await.map_err(claim_error)?;
        info!(airdrop = %request.airdrop_id, %signature, "Claim transaction submitted");
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminator_matches_anchor_convention() {
        let digest = Sha256::digest(b"global:new_claim");
        assert_eq!(new_claim_discriminator(), digest[..8]);
    }

    #[test]
    fn test_compute_budget_instruction_data() {
        let limit = set_compute_unit_limit(COMPUTE_UNIT_LIMIT);
        assert_eq!(limit.program_id, COMPUTE_BUDGET_PROGRAM_ID);
        assert_eq!(limit.data, [2, 0x40, 0x0d, 0x03, 0x00]);

        let price = set_compute_unit_price(COMPUTE_UNIT_PRICE_MICRO_LAMPORTS);
        assert_eq!(price.data[0], 3);
        assert_eq!(price.data[1..], 375_000u64.to_le_bytes());
        assert!(price.accounts.is_empty());
    }

    #[test]
    fn test_new_claim_layout() {
        let program = ClaimProgram::default();
        let claimant = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let proof = vec![[7u8; 32], [9u8; 32]];

        let ix = program
            .new_claim_instruction(&claimant, &mint, 1_500, &proof)
            .unwrap();

        assert_eq!(ix.program_id, program.merkle_distributor);
        assert_eq!(ix.data.len(), 8 + 8 + 8 + 4 + 32 * 2);
        assert_eq!(ix.data[..8], new_claim_discriminator());
        assert_eq!(ix.data[8..16], 1_500u64.to_le_bytes());
        assert_eq!(ix.data[16..24], 0u64.to_le_bytes());
        assert_eq!(ix.data[24..28], 2u32.to_le_bytes());
        assert_eq!(ix.data[28], 7);

        assert_eq!(ix.accounts.len(), 7);
        let distributor = program.distributor_address(&mint).unwrap();
        assert_eq!(ix.accounts[0].pubkey, distributor);
        assert_eq!(
            ix.accounts[2].pubkey,
            associated_token_address(&distributor, &mint)
        );
        assert_eq!(
            ix.accounts[3].pubkey,
            associated_token_address(&claimant, &mint)
        );
        assert!(ix.accounts[4].is_signer);
        assert_eq!(ix.accounts[4].pubkey, claimant);
        assert!(!ix.accounts[5].is_writable);
    }

    #[test]
    fn test_addresses_are_deterministic() {
        let program = ClaimProgram::default();
        let mint = Pubkey::new_unique();
        assert_eq!(
            program.distributor_address(&mint).unwrap(),
            program.distributor_address(&mint).unwrap()
        );
        assert_ne!(
            program.distributor_address(&mint).unwrap(),
            program.distributor_address(&Pubkey::new_unique()).unwrap()
        );
    }

    #[test]
    fn test_claim_instructions_order() {
        let program = ClaimProgram::default();
        let claimant = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let ixs = program
            .claim_instructions(&claimant, &mint, 1, &[])
            .unwrap();

        assert_eq!(ixs.len(), 4);
        assert_eq!(ixs[0].program_id, COMPUTE_BUDGET_PROGRAM_ID);
        assert_eq!(ixs[1].program_id, COMPUTE_BUDGET_PROGRAM_ID);
        assert_eq!(ixs[2].program_id, ASSOCIATED_TOKEN_PROGRAM_ID);
        assert_eq!(ixs[2].data, vec![1]);
        assert_eq!(ixs[3].program_id, program.merkle_distributor);
    }

    #[test]
    fn test_rpc_errors_are_classified() {
        let err = claim_error(RedeemerError::Rpc("read: connection refused".into()));
        assert!(matches!(err, ClaimError::Network(_)));
        let err = claim_error(RedeemerError::Rpc("custom program error: 0x1".into()));
        assert!(matches!(err, ClaimError::Chain(_)));
    }
}
