use rand::rngs::OsRng;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey, Signature};
use sha2::{Digest, Sha256};
use std::convert::TryInto;

/// 32-byte sha256 digest of a canonical byte form
pub type DeedHash = [u8; 32];
/// secp256k1 compressed public key; peer identity and account owner
pub type DeedPublicKey = [u8; 33];
pub type DeedPrivateKey = [u8; 32];
/// compact ECDSA signature
pub type DeedSignature = [u8; 64];

// a single secp256k1 context shared by every caller rather than a fresh
// object per sign/verify
lazy_static! {
    static ref SECP: Secp256k1<All> = Secp256k1::new();
}

pub fn hash(data: &[u8]) -> DeedHash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().as_slice().try_into().unwrap()
}

/// Create a fresh keypair from the OS random source.
pub fn generate_keys() -> (DeedPublicKey, DeedPrivateKey) {
    let mut rng = OsRng::new().expect("OsRng");
    let (secret_key, public_key) = SECP.generate_keypair(&mut rng);
    (public_key.serialize(), secret_key[..].try_into().unwrap())
}

/// Sign the sha256 of `message_bytes` with `privatekey`.
pub fn sign(message_bytes: &[u8], privatekey: &DeedPrivateKey) -> DeedSignature {
    let secret_key = SecretKey::from_slice(privatekey).expect("32 bytes, within curve order");
    let msg = Message::from_slice(&hash(message_bytes)).unwrap();
    SECP.sign(&msg, &secret_key).serialize_compact()
}

/// Verify a compact signature over the sha256 of `message_bytes`.
pub fn verify(message_bytes: &[u8], signature: &DeedSignature, publickey: &DeedPublicKey) -> bool {
    let msg = match Message::from_slice(&hash(message_bytes)) {
        Ok(msg) => msg,
        Err(_) => return false,
    };
    let sig = match Signature::from_compact(signature) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    let pk = match PublicKey::from_slice(publickey) {
        Ok(pk) => pk,
        Err(_) => return false,
    };
    SECP.verify(&msg, &sig, &pk).is_ok()
}
