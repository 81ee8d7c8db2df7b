//! Build a capsa where one recipient's mail is handled by a delegate, and
//! decrypt it from the delegate's side.
//!
//! party_A sends to party_B, but party_D holds a delegate key authorized to
//! act for party_B. party_B gets a keychain entry for uniqueness/audit but
//! no direct wrapped key; party_D's entry carries `actingFor: [party_B]` and
//! is the one that actually unwraps the master key.
//!
//! Run with: cargo run --example delegated_recipient

use capsara_client::builder::CapsaBuilder;
use capsara_client::cache::MasterKeyCache;
use capsara_client::config::Limits;
use capsara_client::decryptor::CapsaDecryptor;
use capsara_crypto::rsa_keys::KeyPair;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("🔐 Capsara - Delegated Recipient Example\n");

    println!("👤 Generating key pairs for party_A (creator), party_B (recipient), party_D (delegate)...");
    let creator_keys = KeyPair::generate()?;
    let recipient_keys = KeyPair::generate()?;
    let recipient_public = recipient_keys.public_key()?;
    let delegate_keys = KeyPair::generate()?;
    let delegate_public = delegate_keys.public_key()?;

    println!("\n📦 Building a capsa from party_A, addressed to party_B via delegate party_D...");
    let (upload, _ciphertexts) = CapsaBuilder::new("party_A", creator_keys, Limits::default())?
        .with_subject("Quarterly figures")
        .add_delegated_recipient("party_B", recipient_public)?
        .add_delegate("party_D", delegate_public, vec!["party_B".to_string()])?
        .build()
        .await?;

    println!("   ✅ Built capsa {} with {} keychain entries", upload.package_id, upload.keychain.len());
    for entry in &upload.keychain {
        println!(
            "   - {} (encrypted_key empty: {}, acting_for: {:?})",
            entry.party_id,
            entry.encrypted_key.is_empty(),
            entry.acting_for
        );
    }

    println!("\n📥 Decrypting as party_D (the delegate)...");
    let cache = Arc::new(MasterKeyCache::new(Default::default()));
    let decryptor = CapsaDecryptor::new(delegate_keys, cache);
    let decrypted = decryptor.decrypt_capsa(&upload)?;
    println!("   Subject: {}", decrypted.subject.as_deref().unwrap_or(""));

    println!("\n🚫 party_B itself holds no direct wrapped key and cannot decrypt without the delegate");

    println!("\n✨ Example completed successfully!");
    Ok(())
}
