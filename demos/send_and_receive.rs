//! Build a capsa for one recipient and decrypt it on the receiving end.
//!
//! This walks through the full local pipeline — no server is involved, the
//! built payload is handed directly to the decryptor — to show the shape of
//! the cryptographic contract both sides rely on.
//!
//! Run with: cargo run --example send_and_receive

use bytes::Bytes;
use capsara_crypto::rsa_keys::KeyPair;
use chrono::{Duration as ChronoDuration, Utc};
use capsara_client::builder::CapsaBuilder;
use capsara_client::config::Limits;
use capsara_client::decryptor::CapsaDecryptor;
use capsara_client::cache::MasterKeyCache;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("🔐 Capsara - Send and Receive Example\n");

    println!("👤 Generating key pairs for party_A (creator) and party_B (recipient)...");
    let creator_keys = KeyPair::generate()?;
    let recipient_keys = KeyPair::generate()?;
    let recipient_public = recipient_keys.public_key()?;

    println!("\n📦 Building a capsa from party_A to party_B...");
    let builder = CapsaBuilder::new("party_A", creator_keys, Limits::default())?
        .with_subject("Project update")
        .with_body("Attached is the latest draft, let me know what you think.")
        .with_structured(serde_json::json!({ "reviewRequested": true, "dueInDays": 3 }))
        .with_expiration(Utc::now() + ChronoDuration::days(7))
        .add_recipient("party_B", recipient_public, vec!["read".to_string()])?
        .add_file_bytes(
            "draft.txt",
            Bytes::from_static(b"Here is the draft content of the document."),
            Some("text/plain".to_string()),
        );

    let (upload, ciphertexts) = builder.build().await?;
    println!("   ✅ Built capsa {} with {} file(s)", upload.package_id, upload.files.len());
    println!("   Keychain entries: {}", upload.keychain.len());
    if let Some(expires_at) = upload.access_control.expires_at {
        println!("   Expires at: {}", expires_at);
    }

    println!("\n📥 Decrypting as party_B...");
    let cache = Arc::new(MasterKeyCache::new(Default::default()));
    let decryptor = CapsaDecryptor::new(recipient_keys, cache.clone());

    let decrypted = decryptor.decrypt_capsa(&upload)?;
    println!("   Subject: {}", decrypted.subject.as_deref().unwrap_or(""));
    println!("   Body: {}", decrypted.body.as_deref().unwrap_or(""));
    if let Some(structured) = &decrypted.structured {
        println!("   Structured: {}", structured);
    }

    let master_key = cache.get_master_key(&upload.package_id).expect("master key was just cached");
    for file in &upload.files {
        let ciphertext = ciphertexts
            .iter()
            .find(|(id, _)| id == &file.file_id)
            .map(|(_, bytes)| bytes.as_slice())
            .expect("ciphertext was returned by build");
        let decrypted_file = decryptor.decrypt_file(&master_key, file, ciphertext)?;
        println!(
            "   File: {} ({} bytes, {})",
            decrypted_file.filename,
            decrypted_file.content.len(),
            decrypted_file.mime_type
        );
    }

    println!("\n✨ Example completed successfully!");
    Ok(())
}
