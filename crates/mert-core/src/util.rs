use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub fn calculate_file_hash<P: AsRef<Path>>(path: P) -> Result<String, std::io::Error> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0; 4096];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

fn digest_to_u64(digest: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Master seed for a seed string. Stable across platforms and releases.
pub fn seed_from_str(seed: &str) -> u64 {
    digest_to_u64(&Sha256::digest(seed.as_bytes()))
}

/// Worker seed for a starting point: its sorted weight values mixed with the master seed.
pub fn seed_from_values(values: &[f64], master: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(master.to_le_bytes());
    for v in values {
        hasher.update(v.to_bits().to_le_bytes());
    }
    digest_to_u64(&hasher.finalize())
}

/// Standard normal draw (Box-Muller).
pub fn gaussian(rng: &mut fastrand::Rng) -> f64 {
    let u1 = 1.0 - rng.f64();
    let u2 = rng.f64();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
