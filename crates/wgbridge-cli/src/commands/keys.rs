//! `genkey` and `pubkey` command implementations.

use std::io::Write;

use wgbridge::{PrivateKey, generate_keypair};

use crate::error::CliError;
use crate::output::{KeyPairOutput, OutputFormat, PublicKeyOutput};

/// Key generation and derivation.
pub struct KeyCommand;

impl KeyCommand {
    /// Generate a key pair and write both halves.
    ///
    /// # Errors
    ///
    /// Returns an error if output fails.
    pub fn genkey<W: Write>(writer: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let (private, public) = generate_keypair();
        let output = KeyPairOutput {
            private_key: private.to_base64(),
            public_key: public.to_base64(),
        };
        format.write(writer, &output)
    }

    /// Derive and write the public key for a base64 private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not decode or output fails.
    pub fn pubkey<W: Write>(writer: &mut W, format: &OutputFormat, private_key: &str) -> Result<(), CliError> {
        let private = PrivateKey::from_base64(private_key.trim())?;
        let output = PublicKeyOutput {
            public_key: private.public_key().to_base64(),
        };
        format.write(writer, &output)
    }
}
