//! git2-backed version-control adapter.
//!
//! Thread-safe wrapper that holds only the repository path and opens a
//! fresh `Repository` per operation, since `git2::Repository` is not
//! Sync.

use super::{CommitSummary, VcsAdapter, VcsError};
use git2::{BranchType, IndexAddOption, ObjectType, Repository, Sort};
use log::debug;
use std::path::{Path, PathBuf};

pub struct GitAdapter {
    repo_path: PathBuf,
}

impl GitAdapter {
    /// Open a repository, discovering the root from any subdirectory.
    pub fn open(path: &Path) -> Result<Self, VcsError> {
        let repo = Repository::discover(path).map_err(|_| VcsError::NoRepository)?;
        let repo_path = repo
            .workdir()
            .ok_or(VcsError::NoRepository)?
            .to_path_buf();
        Ok(Self { repo_path })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    fn open_repo(&self) -> Result<Repository, VcsError> {
        Repository::open(&self.repo_path).map_err(VcsError::from)
    }
}

impl VcsAdapter for GitAdapter {
    fn current_branch(&self) -> Result<String, VcsError> {
        let repo = self.open_repo()?;
        if repo.head_detached()? {
            return Err(VcsError::DetachedHead);
        }
        let head = repo.head()?;
        head.shorthand()
            .map(|s| s.to_string())
            .ok_or(VcsError::DetachedHead)
    }

    fn branch_exists(&self, name: &str) -> Result<bool, VcsError> {
        let repo = self.open_repo()?;
        let result = match repo.find_branch(name, BranchType::Local) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        };
        result
    }

    fn create_branch(&self, name: &str) -> Result<(), VcsError> {
        let repo = self.open_repo()?;
        let head = repo.head()?.peel_to_commit()?;
        repo.branch(name, &head, false)?;
        repo.set_head(&format!("refs/heads/{name}"))?;
        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.safe();
        repo.checkout_head(Some(&mut checkout))?;
        debug!("created and checked out branch {name}");
        Ok(())
    }

    fn list_changed_files(&self, base: &str) -> Result<Vec<PathBuf>, VcsError> {
        let repo = self.open_repo()?;
        let object = repo
            .revparse_single(base)
            .map_err(|_| VcsError::UnknownBranch(base.to_string()))?;
        let commit = object
            .peel(ObjectType::Commit)?
            .into_commit()
            .map_err(|_| VcsError::UnknownBranch(base.to_string()))?;
        let tree = commit.tree()?;

        let mut opts = git2::DiffOptions::new();
        opts.include_untracked(true);
        let diff = repo.diff_tree_to_workdir_with_index(Some(&tree), Some(&mut opts))?;

        let mut files = Vec::new();
        diff.foreach(
            &mut |delta, _| {
                if let Some(path) = delta.new_file().path() {
                    files.push(path.to_path_buf());
                }
                true
            },
            None,
            None,
            None,
        )?;
        files.sort();
        files.dedup();
        Ok(files)
    }

    fn commits_since(&self, base: &str) -> Result<Vec<CommitSummary>, VcsError> {
        let repo = self.open_repo()?;
        let mut revwalk = repo.revwalk()?;
        revwalk.push_head()?;
        if let Ok(object) = repo.revparse_single(base) {
            if let Some(commit) = object.as_commit() {
                revwalk.hide(commit.id())?;
            }
        }
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let oid = oid?;
            let commit = repo.find_commit(oid)?;
            commits.push(CommitSummary {
                hash: oid.to_string()[..7].to_string(),
                subject: commit.summary().unwrap_or_default().to_string(),
                author: commit
                    .author()
                    .name()
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }
        Ok(commits)
    }

    fn stage_and_commit(&self, paths: &[PathBuf], message: &str) -> Result<String, VcsError> {
        let repo = self.open_repo()?;
        let mut index = repo.index()?;
        if !paths.is_empty() {
            index.add_all(
                paths.iter().map(|p| p.as_path()),
                IndexAddOption::DEFAULT,
                None,
            )?;
            index.write()?;
        }
        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;
        let signature = repo.signature()?;

        // Unborn branch means no parent
        let head = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = head.iter().collect();
        let oid = repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;
        Ok(oid.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::current_branch_or_env;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, GitAdapter) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Steward Test").unwrap();
        config.set_str("user.email", "steward@example.com").unwrap();
        drop(config);

        fs::write(dir.path().join("seed.txt"), "seed\n").unwrap();
        let adapter = GitAdapter::open(dir.path()).unwrap();
        adapter
            .stage_and_commit(&[PathBuf::from("seed.txt")], "chore: seed repository")
            .unwrap();
        (dir, adapter)
    }

    #[test]
    fn open_fails_outside_a_repository() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            GitAdapter::open(dir.path()),
            Err(VcsError::NoRepository)
        ));
    }

    #[test]
    fn current_branch_matches_head() {
        let (_dir, adapter) = fixture();
        let branch = adapter.current_branch().unwrap();
        assert!(!branch.is_empty());
        assert!(adapter.branch_exists(&branch).unwrap());
    }

    #[test]
    fn create_branch_switches_head() {
        let (_dir, adapter) = fixture();
        adapter.create_branch("feat/steward-test").unwrap();
        assert_eq!(adapter.current_branch().unwrap(), "feat/steward-test");
        assert!(adapter.branch_exists("feat/steward-test").unwrap());
        assert!(!adapter.branch_exists("feat/unrelated").unwrap());
    }

    #[test]
    fn detached_head_recovers_through_environment() {
        let (dir, adapter) = fixture();
        let repo = Repository::open(dir.path()).unwrap();
        let oid = repo.head().unwrap().target().unwrap();
        repo.set_head_detached(oid).unwrap();

        assert!(matches!(
            adapter.current_branch(),
            Err(VcsError::DetachedHead)
        ));

        std::env::set_var("CODESTEWARD_TEST_BRANCH", "ci/fallback");
        let branch = current_branch_or_env(&adapter, "CODESTEWARD_TEST_BRANCH").unwrap();
        assert_eq!(branch, "ci/fallback");
        std::env::remove_var("CODESTEWARD_TEST_BRANCH");
    }

    #[test]
    fn changed_files_are_listed_against_a_base() {
        let (dir, adapter) = fixture();
        let base = adapter.current_branch().unwrap();
        fs::write(dir.path().join("new.txt"), "fresh\n").unwrap();

        let changed = adapter.list_changed_files(&base).unwrap();
        assert!(changed.contains(&PathBuf::from("new.txt")));
    }

    #[test]
    fn commits_since_base_excludes_the_base() {
        let (dir, adapter) = fixture();
        let base = adapter.current_branch().unwrap();
        adapter.create_branch("feat/extra").unwrap();
        fs::write(dir.path().join("extra.txt"), "x\n").unwrap();
        adapter
            .stage_and_commit(&[PathBuf::from("extra.txt")], "feat: add extra file")
            .unwrap();

        let commits = adapter.commits_since(&base).unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].subject, "feat: add extra file");
        assert_eq!(commits[0].author, "Steward Test");
    }

    #[test]
    fn unknown_base_is_a_typed_error() {
        let (_dir, adapter) = fixture();
        assert!(matches!(
            adapter.list_changed_files("no-such-branch"),
            Err(VcsError::UnknownBranch(_))
        ));
    }
}
