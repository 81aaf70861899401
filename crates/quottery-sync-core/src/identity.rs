//! Conversion between raw 32-byte public keys and the node's printable
//! 60-letter identities.
//!
//! The codec sits behind [`IdentityCodec`] so the node client can be tested
//! with a trivial implementation and the engine never depends on the hash.

use tiny_keccak::{Hasher, KangarooTwelve};

use crate::error::IdentityError;
use crate::types::PublicKey;

pub const IDENTITY_LEN: usize = 60;

const LIMBS: usize = 4;
const LETTERS_PER_LIMB: usize = 14;
const CHECKSUM_LETTERS: usize = 4;
const CHECKSUM_MASK: u32 = 0x3FFFF;

pub trait IdentityCodec: Send + Sync {
    fn identity_for_pubkey(&self, pubkey: &PublicKey) -> String;

    fn pubkey_for_identity(&self, identity: &str) -> Result<PublicKey, IdentityError>;
}

/// Uppercase base-26 encoding of the four little-endian u64 limbs of the
/// key, least significant letter first, followed by a checksum taken from
/// the low 18 bits of a 3-byte KangarooTwelve digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct QubicIdentityCodec;

impl QubicIdentityCodec {
    fn checksum(pubkey: &PublicKey) -> u32 {
        let mut hasher = KangarooTwelve::new(b"");
        hasher.update(pubkey);
        let mut digest = [0u8; 3];
        hasher.finalize(&mut digest);
        u32::from_le_bytes([digest[0], digest[1], digest[2], 0]) & CHECKSUM_MASK
    }
}

impl IdentityCodec for QubicIdentityCodec {
    fn identity_for_pubkey(&self, pubkey: &PublicKey) -> String {
        let mut out = String::with_capacity(IDENTITY_LEN);
        for limb in pubkey.chunks_exact(8) {
            let mut fragment = u64::from_le_bytes(limb.try_into().unwrap_or([0; 8]));
            for _ in 0..LETTERS_PER_LIMB {
                out.push(char::from(b'A' + (fragment % 26) as u8));
                fragment /= 26;
            }
        }
        let mut checksum = Self::checksum(pubkey);
        for _ in 0..CHECKSUM_LETTERS {
            out.push(char::from(b'A' + (checksum % 26) as u8));
            checksum /= 26;
        }
        out
    }

    fn pubkey_for_identity(&self, identity: &str) -> Result<PublicKey, IdentityError> {
        let len = identity.chars().count();
        if len != IDENTITY_LEN {
            return Err(IdentityError::Length(len));
        }
        if let Some(bad) = identity.chars().find(|c| !c.is_ascii_uppercase()) {
            return Err(IdentityError::Character(bad));
        }

        let letters = identity.as_bytes();
        let mut pubkey = [0u8; 32];
        for limb in 0..LIMBS {
            let mut fragment: u64 = 0;
            for j in (0..LETTERS_PER_LIMB).rev() {
                let digit = u64::from(letters[limb * LETTERS_PER_LIMB + j] - b'A');
                fragment = fragment.wrapping_mul(26).wrapping_add(digit);
            }
            pubkey[limb * 8..limb * 8 + 8].copy_from_slice(&fragment.to_le_bytes());
        }

        // Catches both a wrong checksum and limbs that overflowed 64 bits.
        if self.identity_for_pubkey(&pubkey) != identity {
            return Err(IdentityError::Checksum);
        }
        Ok(pubkey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO_IDENTITY: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAFXIB";

    #[test]
    fn zero_key_has_known_identity() {
        assert_eq!(
            QubicIdentityCodec.identity_for_pubkey(&[0u8; 32]),
            ZERO_IDENTITY
        );
    }

    #[test]
    fn contract_key_has_known_identity() {
        let mut pubkey = [0u8; 32];
        pubkey[0] = 2;
        assert_eq!(
            QubicIdentityCodec.identity_for_pubkey(&pubkey),
            "CAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAACNKL"
        );
    }

    #[test]
    fn identity_round_trips_to_key() {
        let codec = QubicIdentityCodec;
        let pubkey = crate::test_util::key(7);
        let identity = codec.identity_for_pubkey(&pubkey);
        assert_eq!(
            identity,
            "GXHSWSJBTCZHFAFXHSWSJBTCZHFAFXHSWSJBTCZHFAFXHSWSJBTCZHFARIXG"
        );
        assert_eq!(codec.pubkey_for_identity(&identity), Ok(pubkey));
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            QubicIdentityCodec.pubkey_for_identity("ABC"),
            Err(IdentityError::Length(3))
        );
    }

    #[test]
    fn rejects_lowercase() {
        let lowered = ZERO_IDENTITY.to_lowercase();
        assert_eq!(
            QubicIdentityCodec.pubkey_for_identity(&lowered),
            Err(IdentityError::Character('a'))
        );
    }

    #[test]
    fn rejects_bad_checksum() {
        let tampered = format!("{}FXIC", &ZERO_IDENTITY[..56]);
        assert_eq!(
            QubicIdentityCodec.pubkey_for_identity(&tampered),
            Err(IdentityError::Checksum)
        );
    }
}
