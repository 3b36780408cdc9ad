//! Candidate handle list loading
//!
//! The list is one candidate per line. Lines are trimmed and blanks skipped;
//! the format rule is applied later by the distributor so dropped entries
//! are counted in the run report.

use std::path::Path;

use crate::error::{Error, Result};

pub fn parse_handle_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

pub async fn load_handles(path: &Path) -> Result<Vec<String>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| Error::HandleList {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(parse_handle_list(&contents))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_skips_blank_lines() {
        let parsed = parse_handle_list("  first_handle \n\n\tsecond_one\r\n   \nbad-one\n");
        assert_eq!(parsed, vec!["first_handle", "second_one", "bad-one"]);
    }

    #[test]
    fn empty_input_yields_no_candidates() {
        assert!(parse_handle_list("").is_empty());
        assert!(parse_handle_list("\n \n").is_empty());
    }

    #[tokio::test]
    async fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usernames.txt");
        std::fs::write(&path, "alpha_one\nbeta_two\n").unwrap();

        let handles = load_handles(&path).await.unwrap();
        assert_eq!(handles, vec!["alpha_one", "beta_two"]);
    }

    #[tokio::test]
    async fn missing_file_names_path() {
        let err = load_handles(Path::new("/nonexistent/usernames.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HandleList { .. }));
        assert!(err.to_string().contains("/nonexistent/usernames.txt"));
    }
}
