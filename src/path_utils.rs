use std::path::{Path, PathBuf};

use crate::constants::GAME_DIR_NAME;

/// Render a path with `/` separators regardless of platform.
pub fn to_posix(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Project root: the game directory with a trailing `game` component stripped.
pub fn project_root(game_dir: &Path) -> PathBuf {
    match (game_dir.file_name(), game_dir.parent()) {
        (Some(name), Some(parent)) if name == GAME_DIR_NAME => parent.to_path_buf(),
        _ => game_dir.to_path_buf(),
    }
}

/// Map a host-reported script path (`game/script.rpy`) to its game-relative
/// form (`script.rpy`). Paths outside `game/` are returned unchanged.
pub fn game_relative(reported: &str) -> PathBuf {
    let normalized = reported.replace('\\', "/");
    let path = Path::new(&normalized);
    match path.strip_prefix(GAME_DIR_NAME) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_root_strips_game() {
        assert_eq!(
            project_root(Path::new("/home/dev/novel/game")),
            PathBuf::from("/home/dev/novel")
        );
        assert_eq!(
            project_root(Path::new("/home/dev/novel")),
            PathBuf::from("/home/dev/novel")
        );
    }

    #[test]
    fn test_game_relative() {
        assert_eq!(game_relative("game/script.rpy"), PathBuf::from("script.rpy"));
        assert_eq!(
            game_relative("game\\chapters\\one.rpy"),
            PathBuf::from("chapters/one.rpy")
        );
        assert_eq!(game_relative("other/x.rpy"), PathBuf::from("other/x.rpy"));
        // Only a whole `game` component counts
        assert_eq!(game_relative("gameplay/x.rpy"), PathBuf::from("gameplay/x.rpy"));
    }

    #[test]
    fn test_to_posix() {
        assert_eq!(to_posix(Path::new("a/b/c.rpy")), "a/b/c.rpy");
    }
}
