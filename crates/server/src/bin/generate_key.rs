//! `generate-key` — print a fresh field encryption key for `ENCRYPTION_KEY`.

use supportflow_server::keys::generate_key_hex;

fn main() {
    let key = generate_key_hex();
    println!("Generated a new 256-bit field encryption key:");
    println!();
    println!("ENCRYPTION_KEY={key}");
    println!();
    println!("Store it in your deployment secrets, never in source control.");
    println!("Data written under one key cannot be read back under another.");
    println!("Keep the old key until every stored record has been re-encrypted.");
}
