//! Wire size of an assembled batch

use solana_hash::Hash;
use solana_instruction::Instruction;
use solana_message::Message;
use solana_pubkey::Pubkey;
use solana_transaction::Transaction;

use crate::error::ChainError;

/// Largest serialized transaction the network accepts
pub const PACKET_DATA_SIZE: usize = 1232;

/// Distinct accounts a single message may reference
pub const MAX_MESSAGE_ACCOUNTS: usize = 256;

/// Serialize `instructions` as one unsigned transaction paid by `payer`.
///
/// Signature slots are zero-filled, so the length equals that of the
/// signed transaction.
pub fn encode_unsigned(
  instructions: &[Instruction],
  payer: &Pubkey,
  blockhash: &Hash,
) -> Result<Vec<u8>, ChainError> {
  let distinct = distinct_accounts(instructions, payer);
  if distinct > MAX_MESSAGE_ACCOUNTS {
    return Err(ChainError::Encode {
      what: "transaction",
      reason: format!("{distinct} accounts exceed {MAX_MESSAGE_ACCOUNTS}"),
    });
  }
  let message = Message::new_with_blockhash(instructions, Some(payer), blockhash);
  let tx = Transaction::new_unsigned(message);
  bincode::serialize(&tx).map_err(|e| ChainError::Encode {
    what: "transaction",
    reason: e.to_string(),
  })
}

pub fn encoded_len(instructions: &[Instruction], payer: &Pubkey) -> Result<usize, ChainError> {
  Ok(encode_unsigned(instructions, payer, &Hash::default())?.len())
}

pub fn fits_in_packet(instructions: &[Instruction], payer: &Pubkey) -> Result<bool, ChainError> {
  Ok(encoded_len(instructions, payer)? <= PACKET_DATA_SIZE)
}

fn distinct_accounts(instructions: &[Instruction], payer: &Pubkey) -> usize {
  let mut keys: Vec<&Pubkey> = vec![payer];
  for ix in instructions {
    keys.push(&ix.program_id);
    keys.extend(ix.accounts.iter().map(|m| &m.pubkey));
  }
  keys.sort_unstable();
  keys.dedup();
  keys.len()
}
