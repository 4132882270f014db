use std::fs;
use std::path::PathBuf;

use tracing::debug;

/// Resolve a bearer token from the environment and well-known token files.
///
/// Search order: `HF_TOKEN` → `HUGGING_FACE_HUB_TOKEN` → the file named by
/// `HF_TOKEN_PATH` → `$HF_HOME/token` → `~/.cache/huggingface/token` →
/// `~/.huggingface/token`. The first non-empty hit wins; values are trimmed.
pub fn resolve_token() -> Option<String> {
    token_from_sources(
        [
            std::env::var("HF_TOKEN").ok(),
            std::env::var("HUGGING_FACE_HUB_TOKEN").ok(),
        ],
        token_file_candidates(
            std::env::var("HF_TOKEN_PATH").ok().map(PathBuf::from),
            std::env::var("HF_HOME").ok().map(PathBuf::from),
            dirs::home_dir(),
        ),
    )
}

fn token_from_sources(env_values: [Option<String>; 2], files: Vec<PathBuf>) -> Option<String> {
    for value in env_values.into_iter().flatten() {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    for path in files {
        if let Ok(contents) = fs::read_to_string(&path) {
            let trimmed = contents.trim();
            if !trimmed.is_empty() {
                debug!(path = %path.display(), "token loaded from file");
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

fn token_file_candidates(
    token_path: Option<PathBuf>,
    hf_home: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(p) = token_path {
        candidates.push(p);
    }
    if let Some(base) = hf_home {
        candidates.push(base.join("token"));
    }
    if let Some(home) = home {
        candidates.push(home.join(".cache").join("huggingface").join("token"));
        candidates.push(home.join(".huggingface").join("token"));
    }
    candidates
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn env_token_wins_over_files() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("token");
        fs::write(&file, "file-token").unwrap();
        let token = token_from_sources([Some("env-token".into()), None], vec![file]);
        assert_eq!(token.as_deref(), Some("env-token"));
    }

    #[test]
    fn second_env_var_is_consulted() {
        let token = token_from_sources([None, Some("  legacy-token\n".into())], vec![]);
        assert_eq!(token.as_deref(), Some("legacy-token"));
    }

    #[test]
    fn empty_env_value_falls_through() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("token");
        fs::write(&file, " stored \n").unwrap();
        let token = token_from_sources([Some("   ".into()), None], vec![file]);
        assert_eq!(token.as_deref(), Some("stored"));
    }

    #[test]
    fn first_readable_file_wins() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        let present = dir.path().join("token");
        fs::write(&present, "from-file").unwrap();
        let token = token_from_sources([None, None], vec![missing, present]);
        assert_eq!(token.as_deref(), Some("from-file"));
    }

    #[test]
    fn no_sources_yields_none() {
        let dir = tempdir().unwrap();
        let token = token_from_sources([None, None], vec![dir.path().join("nope")]);
        assert_eq!(token, None);
    }

    #[test]
    fn candidate_order_matches_search_order() {
        let candidates = token_file_candidates(
            Some(PathBuf::from("/explicit/token")),
            Some(PathBuf::from("/hf/home")),
            Some(PathBuf::from("/home/u")),
        );
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/explicit/token"),
                PathBuf::from("/hf/home/token"),
                PathBuf::from("/home/u/.cache/huggingface/token"),
                PathBuf::from("/home/u/.huggingface/token"),
            ]
        );
    }
}
