use chrono::Utc;
use rand::Rng;

const PREFIX: &str = "HSTL";
const SUFFIX_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 8;

/// Transaction reference in the form `HSTL-<unix-millis>-<8 uppercase alphanumerics>`.
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
        .collect();
    format!("{}-{}-{}", PREFIX, Utc::now().timestamp_millis(), suffix)
}
