//! Session identifiers.
//!
//! Secrets and codes are 21 characters drawn from a 64-symbol URL-safe
//! alphabet (126 bits of entropy), so they can appear in links unescaped.

use rand::Rng;

const ALPHABET: &[u8; 64] = b"useandom-26T198340PX75pxJACKVERYMINDBUSHWOLF_GQZbfghjklqvwyzrict";

/// Length of a minted identifier.
pub const IDENT_LEN: usize = 21;

/// Mint a fresh random identifier.
pub fn mint() -> String {
    let mut rng = rand::thread_rng();
    (0..IDENT_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// True if `s` could have been produced by `mint`.
pub fn is_well_formed(s: &str) -> bool {
    s.len() == IDENT_LEN && s.bytes().all(|b| ALPHABET.contains(&b))
}
