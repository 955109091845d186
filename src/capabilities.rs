//! Host capability detection, resolved once per process and passed to the
//! run entry points.

use std::path::Path;

const DISABLE_PICKER_ENV: &str = "MINI_INDEX_DISABLE_PICKER";
const STANDALONE_ENV: &str = "MINI_INDEX_STANDALONE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// A directory can be picked and walked as a handle.
    pub directory_picker: bool,
    /// Running as an installed binary rather than from a build tree.
    pub standalone: bool,
}

impl Capabilities {
    pub fn detect() -> Self {
        let directory_picker = std::env::var_os(DISABLE_PICKER_ENV).is_none();
        let standalone = std::env::var_os(STANDALONE_ENV).is_some()
            || std::env::current_exe()
                .map(|exe| is_standalone_path(&exe))
                .unwrap_or(false);

        Self {
            directory_picker,
            standalone,
        }
    }
}

/// An executable counts as installed unless it sits in a cargo `target/<profile>` directory.
pub fn is_standalone_path(exe: &Path) -> bool {
    let mut components = exe
        .parent()
        .into_iter()
        .flat_map(|dir| dir.components().rev())
        .map(|c| c.as_os_str().to_string_lossy().into_owned());

    let profile = components.next();
    let parent = components.next();

    !matches!(
        (profile.as_deref(), parent.as_deref()),
        (Some("debug" | "release"), Some("target")) | (Some("deps"), Some("debug" | "release"))
    )
}
