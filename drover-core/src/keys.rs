//! Peer key material and trust scoring.
//!
//! Trust is never stored; it is recomputed from the exchange-mechanism
//! flag set every time key info is read.

use bitflags::bitflags;

bitflags! {
    /// Exchange mechanisms a stored peer key has been confirmed through.
    ///
    /// Bit values are part of the engine's wire contract; do not renumber.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeyFlags: u64 {
        const NONE     = 0x01;
        const DH       = 0x02;
        const PASSWORD = 0x04;
        const HASH     = 0x08;
        const QR_CODE  = 0x10;
        const NFC      = 0x20;
    }
}

impl Default for KeyFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Stored key material for a peer endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub fingerprint: String,
    pub data: String,
    pub flags: KeyFlags,
}

impl KeyInfo {
    /// Derived trust score for this key; see [`trust_level`].
    pub fn trust_level(&self) -> u32 {
        trust_level(self.flags)
    }
}

/// Numeric confidence score for a peer key, derived from its flag set.
///
/// Fixed precedence, evaluated top-down; the first matching tier wins:
/// near-field or QR code ⇒ 100, hash-confirmed or password-authenticated
/// ⇒ 60, Diffie-Hellman only ⇒ 10, unverified ⇒ 1, empty set ⇒ 0.
pub fn trust_level(flags: KeyFlags) -> u32 {
    if flags.intersects(KeyFlags::NFC | KeyFlags::QR_CODE) {
        100
    } else if flags.intersects(KeyFlags::HASH | KeyFlags::PASSWORD) {
        60
    } else if flags.contains(KeyFlags::DH) {
        10
    } else if flags.contains(KeyFlags::NONE) {
        1
    } else {
        0
    }
}

// ---------------------------------------------------------------------------
// Key-exchange protocol codes
// ---------------------------------------------------------------------------

/// Protocols a key exchange can be initiated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyExchangeProtocol {
    None,
    Dh,
    Password,
    Hash,
    QrCode,
    Nfc,
}

impl KeyExchangeProtocol {
    /// Numeric protocol code understood by the engine.
    pub fn code(self) -> i32 {
        match self {
            KeyExchangeProtocol::None => 0,
            KeyExchangeProtocol::Dh => 1,
            KeyExchangeProtocol::Password => 2,
            KeyExchangeProtocol::Hash => 3,
            KeyExchangeProtocol::QrCode => 4,
            KeyExchangeProtocol::Nfc => 5,
        }
    }
}

/// Response code confirming a password round.
pub const PASSWORD_RESPONSE: i32 = 2;
/// Response code answering a hash-comparison round.
pub const HASH_RESPONSE: i32 = 100;
/// Response code accepting or rejecting a newly negotiated key.
pub const NEW_KEY_RESPONSE: i32 = 101;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
