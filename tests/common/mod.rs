//! Shared fixtures: an upstream repository built commit by commit
#![allow(dead_code)]

use git2::{Index, IndexEntry, IndexTime, Oid, Repository, Signature, Time};
use sqs_git_resource::config::Source;
use sqs_git_resource::git::{GitCredentials, ReferenceStore};
use std::cell::Cell;
use std::path::Path;
use tempfile::TempDir;

/// A bare repository acting as the remote
pub struct Upstream {
    dir: TempDir,
    pub repo: Repository,
    clock: Cell<i64>,
}

impl Upstream {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init_bare(dir.path()).unwrap();
        Self {
            dir,
            repo,
            clock: Cell::new(1_600_000_000),
        }
    }

    pub fn uri(&self) -> String {
        self.dir.path().to_str().unwrap().to_string()
    }

    /// Create a commit whose tree is the first parent's tree plus `changes`
    pub fn commit(&self, parents: &[Oid], changes: &[(&str, &str)], message: &str) -> Oid {
        let mut index = Index::new().unwrap();
        if let Some(first) = parents.first() {
            let tree = self.repo.find_commit(*first).unwrap().tree().unwrap();
            index.read_tree(&tree).unwrap();
        }
        for (path, content) in changes {
            let mut entry = entry(path);
            entry.id = self.repo.blob(content.as_bytes()).unwrap();
            entry.file_size = content.len() as u32;
            index.add(&entry).unwrap();
        }
        let tree_id = index.write_tree_to(&self.repo).unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();

        let time = self.clock.get() + 60;
        self.clock.set(time);
        let sig = Signature::new("Test", "test@example.com", &Time::new(time, 0)).unwrap();

        let parent_commits: Vec<_> = parents
            .iter()
            .map(|id| self.repo.find_commit(*id).unwrap())
            .collect();
        let parent_refs: Vec<_> = parent_commits.iter().collect();

        self.repo
            .commit(None, &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    /// Linear history: one commit per change set, each on top of the previous one
    pub fn chain(&self, base: Option<Oid>, changes: &[&[(&str, &str)]]) -> Vec<Oid> {
        let mut ids = Vec::new();
        let mut parent = base;
        for (i, change) in changes.iter().enumerate() {
            let parents: Vec<Oid> = parent.into_iter().collect();
            let id = self.commit(&parents, change, &format!("commit {}", i));
            ids.push(id);
            parent = Some(id);
        }
        ids
    }

    /// `n` commits each touching its own file under `src/`
    pub fn linear(&self, n: usize) -> Vec<Oid> {
        let files: Vec<String> = (0..n).map(|i| format!("src/file{}.txt", i)).collect();
        let changes: Vec<Vec<(&str, &str)>> = files
            .iter()
            .map(|f| vec![(f.as_str(), "content")])
            .collect();
        let slices: Vec<&[(&str, &str)]> = changes.iter().map(|c| c.as_slice()).collect();
        self.chain(None, &slices)
    }

    pub fn set_branch(&self, branch: &str, id: Oid) {
        self.repo
            .reference(&format!("refs/heads/{}", branch), id, true, "test")
            .unwrap();
    }

    pub fn delete_branch(&self, branch: &str) {
        self.repo
            .find_reference(&format!("refs/heads/{}", branch))
            .unwrap()
            .delete()
            .unwrap();
    }

    pub fn set_tag(&self, tag: &str, id: Oid) {
        self.repo
            .reference(&format!("refs/tags/{}", tag), id, true, "test")
            .unwrap();
    }
}

fn entry(path: &str) -> IndexEntry {
    IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: 0o100644,
        uid: 0,
        gid: 0,
        file_size: 0,
        id: Oid::zero(),
        flags: 0,
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    }
}

/// Fetched mirror of `upstream` in `dir`
pub fn mirror(upstream: &Upstream, dir: &Path) -> ReferenceStore {
    let store =
        ReferenceStore::ensure_mirror(&upstream.uri(), dir, GitCredentials::default()).unwrap();
    store.fetch_latest().unwrap();
    store
}

/// A `source` block pointing at `upstream` with its mirror in `mirror_dir`
pub fn source(upstream: &Upstream, mirror_dir: &Path, extra: serde_json::Value) -> Source {
    let mut value = serde_json::json!({
        "uri": upstream.uri(),
        "queue": "builds",
        "aws_region": "eu-west-1",
        "mirror_dir": mirror_dir,
    });
    if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(value).unwrap()
}

pub fn ids(oids: &[Oid]) -> Vec<String> {
    oids.iter().map(|o| o.to_string()).collect()
}

/// CodeCommit notification body for one reference update
pub fn notification(reference: &str, commit: Oid) -> String {
    serde_json::json!({
        "Records": [{
            "eventSource": "aws:codecommit",
            "eventSourceARN": "arn:aws:codecommit:eu-west-1:123456789012:app",
            "codecommit": {
                "references": [{ "ref": reference, "commit": commit.to_string() }]
            }
        }]
    })
    .to_string()
}
