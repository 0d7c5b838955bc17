use crate::error::{GitError, Result};
use git2::{
    AutotagOption, Commit, Cred, CredentialType, FetchOptions, FetchPrune, RemoteCallbacks,
    Repository, Tree,
};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Name of the single remote every mirror tracks
pub const REMOTE_NAME: &str = "origin";

/// Every branch lands under `refs/remotes/origin/`, every tag is mirrored as-is
const FETCH_REFSPECS: [&str; 2] = [
    "+refs/heads/*:refs/remotes/origin/*",
    "+refs/tags/*:refs/tags/*",
];

/// libgit2 keeps asking for credentials while authentication fails
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Credentials used for fetching from the remote
///
/// Passed explicitly into the store instead of being written to a
/// credential helper file in the home directory.
#[derive(Clone, Default)]
pub struct GitCredentials {
    pub username: Option<String>,
    pub password: Option<String>,
    /// PEM/OpenSSH private key contents (not a path)
    pub private_key: Option<String>,
    pub passphrase: Option<String>,
}

impl fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitCredentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Which kind of credential answers a transport's request
#[derive(Debug, Clone, PartialEq, Eq)]
enum CredentialChoice<'a> {
    Username(&'a str),
    SshKey {
        username: &'a str,
        key: &'a str,
        passphrase: Option<&'a str>,
    },
    UserPass {
        username: &'a str,
        password: &'a str,
    },
    SshAgent(&'a str),
    Default,
}

impl GitCredentials {
    /// Pick a credential for what the transport allows
    ///
    /// Order: bare username, in-memory SSH key, user/password, SSH agent,
    /// then libgit2's default credential.
    fn choose<'a>(
        &'a self,
        username_from_url: Option<&'a str>,
        allowed: CredentialType,
    ) -> CredentialChoice<'a> {
        let username = self
            .username
            .as_deref()
            .or(username_from_url)
            .unwrap_or("git");

        if allowed.contains(CredentialType::USERNAME) {
            return CredentialChoice::Username(username);
        }

        if allowed.contains(CredentialType::SSH_KEY)
            && let Some(key) = &self.private_key
        {
            return CredentialChoice::SshKey {
                username,
                key,
                passphrase: self.passphrase.as_deref(),
            };
        }

        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT)
            && let Some(password) = &self.password
        {
            return CredentialChoice::UserPass { username, password };
        }

        if allowed.contains(CredentialType::SSH_KEY) {
            return CredentialChoice::SshAgent(username);
        }

        CredentialChoice::Default
    }

    fn to_cred(
        &self,
        username_from_url: Option<&str>,
        allowed: CredentialType,
    ) -> std::result::Result<Cred, git2::Error> {
        match self.choose(username_from_url, allowed) {
            CredentialChoice::Username(username) => Cred::username(username),
            CredentialChoice::SshKey {
                username,
                key,
                passphrase,
            } => Cred::ssh_key_from_memory(username, None, key, passphrase),
            CredentialChoice::UserPass { username, password } => {
                Cred::userpass_plaintext(username, password)
            }
            CredentialChoice::SshAgent(username) => Cred::ssh_key_from_agent(username),
            CredentialChoice::Default => Cred::default(),
        }
    }
}

/// Local mirror of one remote repository
///
/// The mirror is a bare repository: it never materialises a working tree,
/// it only holds objects and references fetched from the remote.
pub struct ReferenceStore {
    repo: Repository,
    root: PathBuf,
    uri: String,
    credentials: GitCredentials,
}

impl ReferenceStore {
    /// Open the mirror at `local_path`, creating it if needed, and point its
    /// remote at `uri`
    ///
    /// Safe to call on every invocation.
    pub fn ensure_mirror<P: AsRef<Path>>(
        uri: &str,
        local_path: P,
        credentials: GitCredentials,
    ) -> Result<Self> {
        let local_path = local_path.as_ref();

        let repo = match Repository::open(local_path) {
            Ok(repo) => {
                tracing::debug!("Opened existing mirror at {}", local_path.display());
                repo
            }
            Err(open_err) => {
                tracing::info!(
                    "No usable mirror at {} ({}), initializing",
                    local_path.display(),
                    open_err.message()
                );
                std::fs::create_dir_all(local_path)?;
                Repository::init_bare(local_path).map_err(|e| GitError::InitFailed {
                    path: local_path.display().to_string(),
                    reason: e.message().to_string(),
                })?
            }
        };

        Self::ensure_remote(&repo, uri)?;

        Ok(Self {
            repo,
            root: local_path.to_path_buf(),
            uri: uri.to_string(),
            credentials,
        })
    }

    fn ensure_remote(repo: &Repository, uri: &str) -> Result<()> {
        let remote_err = |e: git2::Error| GitError::RemoteFailed {
            remote: REMOTE_NAME.to_string(),
            reason: e.message().to_string(),
        };

        let current_url = match repo.find_remote(REMOTE_NAME) {
            Ok(remote) => Some(remote.url().unwrap_or_default().to_string()),
            Err(_) => None,
        };

        match current_url {
            Some(url) if url == uri => {}
            Some(url) => {
                tracing::warn!("Remote {} moved from {} to {}", REMOTE_NAME, url, uri);
                repo.remote_set_url(REMOTE_NAME, uri).map_err(remote_err)?;
            }
            None => {
                repo.remote(REMOTE_NAME, uri).map_err(remote_err)?;
                tracing::debug!("Registered remote {} -> {}", REMOTE_NAME, uri);
            }
        }
        Ok(())
    }

    /// Root directory of the mirror
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remote URI the mirror tracks
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Fetch every branch and tag from the remote
    ///
    /// References that no longer exist upstream are pruned, so a reused
    /// mirror resolves exactly like a fresh one. Progress is only logged. Any failure is returned as is; retrying is up
    /// to whoever runs the check.
    pub fn fetch_latest(&self) -> Result<()> {
        let fetch_err = |e: git2::Error| GitError::FetchFailed {
            uri: self.uri.clone(),
            reason: e.message().to_string(),
        };

        let mut remote = self.repo.find_remote(REMOTE_NAME).map_err(fetch_err)?;

        let credentials = self.credentials.clone();
        let mut attempts = 0usize;
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |_url, username_from_url, allowed| {
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str("authentication failed"));
            }
            credentials.to_cred(username_from_url, allowed)
        });
        callbacks.sideband_progress(|data| {
            let line = String::from_utf8_lossy(data);
            let line = line.trim_end();
            if !line.is_empty() {
                tracing::debug!("remote: {}", line);
            }
            true
        });
        callbacks.transfer_progress(|stats| {
            if stats.total_objects() > 0 && stats.received_objects() == stats.total_objects() {
                tracing::debug!(
                    "Received {}/{} objects ({} bytes)",
                    stats.received_objects(),
                    stats.total_objects(),
                    stats.received_bytes()
                );
            }
            true
        });

        let mut options = FetchOptions::new();
        options.remote_callbacks(callbacks);
        options.download_tags(AutotagOption::All);
        // References deleted upstream must not linger in a reused mirror
        options.prune(FetchPrune::On);

        tracing::info!("Fetching {}", self.uri);
        remote
            .fetch(&FETCH_REFSPECS, Some(&mut options), Some("check: fetch"))
            .map_err(fetch_err)?;

        let stats = remote.stats();
        tracing::info!(
            "Fetched {} ({} objects, {} bytes)",
            self.uri,
            stats.total_objects(),
            stats.received_bytes()
        );
        Ok(())
    }

    /// Resolve a commit id, abbreviated id or reference name to a commit
    ///
    /// Anything that does not name a commit in the mirror is reported as
    /// `UnknownReference`; callers decide whether that is fatal.
    pub fn resolve(&self, spec: &str) -> Result<Commit<'_>> {
        let unknown = |_| GitError::UnknownReference(spec.to_string());
        let object = self.repo.revparse_single(spec).map_err(unknown)?;
        let commit = object.peel_to_commit().map_err(unknown)?;
        Ok(commit)
    }

    /// Current head of a fetched remote branch
    pub fn branch_head(&self, branch: &str) -> Result<Commit<'_>> {
        self.resolve(&format!("refs/remotes/{}/{}", REMOTE_NAME, branch))
    }

    /// Repository-relative paths touched by a commit
    ///
    /// For merges this is the union of the diffs against every parent, so a
    /// change that only exists on a merged side branch is still visible. Root
    /// commits are compared against the empty tree.
    pub fn changed_paths(&self, commit: &Commit<'_>) -> Result<Vec<PathBuf>> {
        let diff_err = |e: git2::Error| GitError::DiffFailed {
            commit: commit.id().to_string(),
            reason: e.message().to_string(),
        };

        let tree = commit.tree().map_err(diff_err)?;
        let parent_trees: Vec<Option<Tree<'_>>> = if commit.parent_count() == 0 {
            vec![None]
        } else {
            commit
                .parents()
                .map(|parent| parent.tree().map(Some))
                .collect::<std::result::Result<_, _>>()
                .map_err(diff_err)?
        };

        let mut paths = BTreeSet::new();
        for parent_tree in &parent_trees {
            let diff = self
                .repo
                .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)
                .map_err(diff_err)?;

            for delta in diff.deltas() {
                for path in [delta.old_file().path(), delta.new_file().path()]
                    .into_iter()
                    .flatten()
                {
                    paths.insert(path.to_path_buf());
                }
            }
        }

        Ok(paths.into_iter().collect())
    }

    /// Detach `HEAD` at `commit`
    ///
    /// The mirror has no working tree, so this is a pure reference update.
    pub fn set_checked_out_head(&self, commit: &Commit<'_>) -> Result<()> {
        self.repo
            .set_head_detached(commit.id())
            .map_err(|e| GitError::HeadUpdateFailed {
                commit: commit.id().to_string(),
                reason: e.message().to_string(),
            })?;
        tracing::debug!("HEAD is now at {}", commit.id());
        Ok(())
    }

    /// Commit `HEAD` currently points at, if any
    pub fn checked_out_head(&self) -> Option<String> {
        self.repo
            .head()
            .ok()?
            .peel_to_commit()
            .ok()
            .map(|c| c.id().to_string())
    }
}
