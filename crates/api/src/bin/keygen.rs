//! Print a fresh random API key for `QEDIT_API_KEY`.

use qedit_core::api_keys::generate_api_key;

fn main() {
    let key = generate_api_key();
    println!("Generated API key:\n\n  {key}\n");
    println!("Add it to your environment or .env file:\n\n  QEDIT_API_KEY={key}\n");
    println!("Clients send it in the X-API-Key header.");
}
