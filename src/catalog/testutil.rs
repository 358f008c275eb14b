//! Shared fixtures for catalog tests.

use crate::catalog::{Cataloger, CommitLog, CreateEntryParams, Entry};
use crate::config::CatalogerConfig;
use crate::storage::Metadata;
use crate::transaction::Context;

pub(crate) const TEST_REPO: &str = "repo1";
pub(crate) const TEST_BRANCH: &str = "master";

/// an in-memory cataloger without repositories
pub(crate) fn cataloger() -> (Cataloger, Context) {
    let cataloger = Cataloger::open(CatalogerConfig::in_memory()).unwrap();
    (cataloger, Context::background())
}

/// an in-memory cataloger holding [`TEST_REPO`] with default branch [`TEST_BRANCH`]
pub(crate) fn catalog_with_repo() -> (Cataloger, Context) {
    let (cataloger, ctx) = cataloger();
    cataloger
        .create_repository(&ctx, TEST_REPO, "s3://bucket", TEST_BRANCH)
        .unwrap();
    (cataloger, ctx)
}

pub(crate) fn entry(path: &str, checksum: &str, size: i64) -> Entry {
    Entry::new(path, format!("/addr/{}", path), checksum, size)
}

/// stage `path` on [`TEST_BRANCH`]
pub(crate) fn put(cataloger: &Cataloger, ctx: &Context, path: &str, checksum: &str) -> Entry {
    put_on(cataloger, ctx, TEST_BRANCH, path, checksum)
}

pub(crate) fn put_on(
    cataloger: &Cataloger,
    ctx: &Context,
    branch: &str,
    path: &str,
    checksum: &str,
) -> Entry {
    cataloger
        .create_entry(ctx, TEST_REPO, branch, entry(path, checksum, 1024), CreateEntryParams::default())
        .unwrap()
}

/// commit [`TEST_BRANCH`]
pub(crate) fn commit(cataloger: &Cataloger, ctx: &Context, message: &str) -> CommitLog {
    commit_on(cataloger, ctx, TEST_BRANCH, message)
}

pub(crate) fn commit_on(cataloger: &Cataloger, ctx: &Context, branch: &str, message: &str) -> CommitLog {
    cataloger
        .commit(ctx, TEST_REPO, branch, message, "tester", Metadata::new())
        .unwrap()
}

pub(crate) fn head(branch: &str) -> String {
    format!("{}:HEAD", branch)
}

/// every live path visible at `reference`, in listing order
pub(crate) fn list_paths(cataloger: &Cataloger, ctx: &Context, reference: &str) -> Vec<String> {
    let (entries, has_more) = cataloger
        .list_entries(ctx, TEST_REPO, reference, "", "", "", None)
        .unwrap();
    assert!(!has_more);
    entries.into_iter().map(|e| e.path).collect()
}
