use jam_core::LABEL_ALPHABET;
use rand::{thread_rng, Rng};

/// Generates a random jam label, which is always uppercase.
pub fn random_label(length: usize) -> String {
    let mut rng = thread_rng();
    let symbols = LABEL_ALPHABET.as_bytes();

    std::iter::repeat(())
        .map(|_| symbols[rng.gen_range(0..symbols.len())] as char)
        .take(length)
        .collect()
}

/// Labels are stored and looked up in uppercase.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_uppercase()
}
