//! Handle format rule
//!
//! A handle is 5-32 characters of ASCII letters, digits or underscore
//! (`^[A-Za-z0-9_]{5,32}$`). Anything else is dropped before queueing.

pub const MIN_HANDLE_LEN: usize = 5;
pub const MAX_HANDLE_LEN: usize = 32;

pub fn is_valid_handle(handle: &str) -> bool {
    (MIN_HANDLE_LEN..=MAX_HANDLE_LEN).contains(&handle.len())
        && handle
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Split candidates into valid handles (input order kept) and an invalid count.
pub fn partition_handles<I, S>(candidates: I) -> (Vec<String>, usize)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut valid = Vec::new();
    let mut invalid = 0usize;
    for candidate in candidates {
        let candidate = candidate.into();
        if is_valid_handle(&candidate) {
            valid.push(candidate);
        } else {
            invalid += 1;
        }
    }
    (valid, invalid)
}
