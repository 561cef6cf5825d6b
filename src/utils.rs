use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use once_cell::sync::Lazy;
use tracing::warn;

/// `EVENT_FINDER_DATA_DIR`, else `<platform data dir>/event-finder`.
static DATA_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    if let Some(dir) = env::var_os("EVENT_FINDER_DATA_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::data_dir() {
        Some(base) => base.join("event-finder"),
        None => {
            warn!("no platform data directory; using ./event-finder");
            PathBuf::from("event-finder")
        }
    }
});

pub fn database_path() -> PathBuf {
    DATA_ROOT.join("event-finder.sqlite")
}

pub fn config_path() -> PathBuf {
    DATA_ROOT.join("config.json")
}

pub fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(
            escape_html(r#"<b>"Tom & Jerry's"</b>"#),
            "&lt;b&gt;&quot;Tom &amp; Jerry&#39;s&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn ensure_parent_creates_nested_dirs() {
        let root = env::temp_dir().join(format!("event-finder-utils-{}", std::process::id()));
        let file = root.join("a").join("b").join("store.sqlite");
        ensure_parent(&file).expect("create dirs");
        assert!(file.parent().is_some_and(Path::is_dir));
        ensure_parent(Path::new("bare.sqlite")).expect("no parent to create");
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn paths_live_under_data_root() {
        assert_eq!(database_path().parent(), config_path().parent());
        assert!(config_path().ends_with("config.json"));
    }
}
