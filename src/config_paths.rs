//! Purpose: Shared resolution of the config store's on-disk location.
//! Exports: `CONFIG_FILE_NAME` and `default_config_path`.
//! Role: Keep CLI and library path semantics aligned from one source.
//! Invariants: Default store location remains `~/.quillconfig`.

use std::path::PathBuf;

pub const CONFIG_FILE_NAME: &str = ".quillconfig";

pub fn default_config_path() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::default_config_path;

    #[test]
    fn default_path_ends_with_config_file_name() {
        let path = default_config_path();
        assert!(path.to_string_lossy().ends_with(".quillconfig"));
    }
}
