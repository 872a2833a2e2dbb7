pub mod derivation;
pub mod keypair;
pub mod seed;
