//! Post input and snapshot output on disk.
//!
//! Snapshots are full JSON arrays. Each write goes to a hidden temp file in
//! the destination directory and is renamed into place, so a reader never
//! sees a partial file.
use crate::post::{EnrichedPost, Post};
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Load the input posts. A missing or malformed file is logged and yields
/// no posts; the run then completes trivially.
pub fn load_posts(path: &Path) -> Vec<Post> {
    match read_posts(path) {
        Ok(posts) => posts,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %format!("{err:#}"),
                "failed to load posts"
            );
            Vec::new()
        }
    }
}

fn read_posts(path: &Path) -> Result<Vec<Post>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("read posts {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parse posts {}", path.display()))
}

/// Where checkpoint and final snapshots land: `<dir>/<prefix>_part_<k>.json`
/// and `<dir>/<prefix>_final.json`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    prefix: String,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Default layout for an input file: `processed_<stem>` next to it.
    pub fn for_input(input: &Path) -> Self {
        let stem = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "posts".to_string());
        let dir = input
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(dir, format!("processed_{stem}"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn checkpoint_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}_part_{index}.json", self.prefix))
    }

    pub fn final_path(&self) -> PathBuf {
        self.dir.join(format!("{}_final.json", self.prefix))
    }

    pub fn write_checkpoint(&self, index: usize, posts: &[EnrichedPost]) -> Result<PathBuf> {
        let path = self.checkpoint_path(index);
        write_snapshot(&path, posts)?;
        Ok(path)
    }

    pub fn write_final(&self, posts: &[EnrichedPost]) -> Result<PathBuf> {
        let path = self.final_path();
        write_snapshot(&path, posts)?;
        Ok(path)
    }
}

/// Write `posts` as a pretty JSON array, all-or-nothing.
pub fn write_snapshot(path: &Path, posts: &[EnrichedPost]) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(posts).context("serialize snapshot")?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("snapshot path has no file name: {}", path.display()))?;
    let tmp_path = parent.join(format!(".{file_name}.tmp"));

    fs::write(&tmp_path, &bytes).with_context(|| format!("write {}", tmp_path.display()))?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("publish {}", path.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::{CoordinateRecord, LocationPrecision};

    fn enriched(id: &str) -> EnrichedPost {
        let record = CoordinateRecord {
            formatted_address: "四川成都 Chengdu".to_string(),
            lat: 30.66,
            lng: 104.06,
            place_id: format!("place-{id}"),
            location_type: LocationPrecision::Rooftop,
        };
        EnrichedPost::new(Post::new(id, "标题", "正文"), vec![record], 75).expect("enriched")
    }

    #[test]
    fn missing_input_yields_no_posts() {
        let dir = tempfile::tempdir().expect("create temp dir");
        assert!(load_posts(&dir.path().join("absent.json")).is_empty());
    }

    #[test]
    fn malformed_input_yields_no_posts() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("posts.json");
        fs::write(&path, "{\"not\": \"an array\"}").expect("write input");
        assert!(load_posts(&path).is_empty());
    }

    #[test]
    fn loads_posts_in_file_order() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("posts.json");
        let input = r#"[
            {"note_id": "b", "title": "", "desc": ""},
            {"note_id": "a", "title": "", "desc": ""}
        ]"#;
        fs::write(&path, input).expect("write input");
        let ids: Vec<_> = load_posts(&path).into_iter().map(|post| post.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn artifact_names_follow_input_stem() {
        let store = ArtifactStore::for_input(Path::new("data/search_contents.json"));
        assert_eq!(
            store.checkpoint_path(3),
            Path::new("data/processed_search_contents_part_3.json")
        );
        assert_eq!(
            store.final_path(),
            Path::new("data/processed_search_contents_final.json")
        );

        let bare = ArtifactStore::for_input(Path::new("posts.json"));
        assert_eq!(bare.dir(), Path::new("."));
    }

    #[test]
    fn snapshot_is_pretty_utf8_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = ArtifactStore::new(dir.path(), "processed_posts");
        let path = store
            .write_checkpoint(1, &[enriched("n1"), enriched("n2")])
            .expect("write checkpoint");

        let text = fs::read_to_string(&path).expect("read snapshot");
        assert!(text.contains("四川成都"));
        assert!(text.contains("\n  {"));
        let back: Vec<EnrichedPost> = serde_json::from_str(&text).expect("parse snapshot");
        assert_eq!(back, vec![enriched("n1"), enriched("n2")]);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .expect("list dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn snapshot_into_missing_dir_fails() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = ArtifactStore::new(dir.path().join("nope"), "processed_posts");
        assert!(store.write_final(&[enriched("n1")]).is_err());
        assert!(!store.final_path().exists());
    }
}
