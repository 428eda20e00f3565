//! Computes the `nprofile` bech32 identity bundle logged (and optionally
//! persisted) at startup: the proxy's public key plus up to
//! `nprofileMaxRelays` currently-connected, safe relay hints, TLV-encoded
//! the way NIP-19 profile pointers are.

use bech32::{Bech32, Hrp};
use wrap_crypto::PublicKeyHex;

const TLV_SPECIAL: u8 = 0;
const TLV_RELAY: u8 = 1;

/// Build the TLV payload (pubkey + relay hints) and bech32-encode it with
/// the `nprofile` human-readable part.
pub fn encode_nprofile(public: &PublicKeyHex, relays: &[String], max_relays: usize) -> Result<String, String> {
    let mut tlv = Vec::new();

    let pubkey_bytes = hex::decode(public.to_hex()).map_err(|e| e.to_string())?;
    tlv.push(TLV_SPECIAL);
    tlv.push(pubkey_bytes.len() as u8);
    tlv.extend_from_slice(&pubkey_bytes);

    for relay in relays.iter().take(max_relays) {
        let bytes = relay.as_bytes();
        if bytes.len() > u8::MAX as usize {
            continue;
        }
        tlv.push(TLV_RELAY);
        tlv.push(bytes.len() as u8);
        tlv.extend_from_slice(bytes);
    }

    let hrp = Hrp::parse("nprofile").map_err(|e| e.to_string())?;
    bech32::encode::<Bech32>(hrp, &tlv).map_err(|e| e.to_string())
}
