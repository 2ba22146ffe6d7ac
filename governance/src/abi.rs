//! Contract call encoding for the calls the client builds itself.

use dao_wallet::{Address, ADDRESS_LENGTH};
use primitive_types::U256;

use crate::amount::TokenAmount;

/// `bytes4(keccak256("transfer(address,uint256)"))`.
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

const WORD: usize = 32;

/// ABI-encode `transfer(to, amount)`: selector followed by two 32-byte words.
pub fn encode_transfer(to: Address, amount: TokenAmount) -> Vec<u8> {
    let mut data = Vec::with_capacity(TRANSFER_SELECTOR.len() + 2 * WORD);
    data.extend_from_slice(&TRANSFER_SELECTOR);
    data.extend_from_slice(&address_word(to));
    data.extend_from_slice(&uint_word(amount));
    data
}

/// Inverse of [`encode_transfer`]; `None` for any other call shape.
pub fn decode_transfer(data: &[u8]) -> Option<(Address, TokenAmount)> {
    let args = data.strip_prefix(&TRANSFER_SELECTOR[..])?;
    if args.len() != 2 * WORD {
        return None;
    }
    let (to_word, amount_word) = args.split_at(WORD);
    if to_word[..WORD - ADDRESS_LENGTH].iter().any(|b| *b != 0) {
        return None;
    }
    let mut to = [0u8; ADDRESS_LENGTH];
    to.copy_from_slice(&to_word[WORD - ADDRESS_LENGTH..]);
    let amount = TokenAmount::from_raw(U256::from_big_endian(amount_word));
    Some((Address::from_bytes(to), amount))
}

fn address_word(addr: Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - ADDRESS_LENGTH..].copy_from_slice(addr.as_bytes());
    word
}

fn uint_word(amount: TokenAmount) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    amount.raw().to_big_endian(&mut word);
    word
}
