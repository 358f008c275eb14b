//! Commit log reads.

use crate::catalog::cataloger::Cataloger;
use crate::catalog::errors::CatalogResult;
use crate::catalog::model::CommitLog;
use crate::storage::{branches, commits};
use crate::transaction::Context;

impl Cataloger {
    /// The commit a reference points at.
    ///
    /// Branch references resolve to the branch's HEAD commit.
    pub fn get_commit(&self, ctx: &Context, repository: &str, reference: &str) -> CatalogResult<CommitLog> {
        self.store().read(ctx, "get_commit", |tx| {
            let repo = Self::resolve_repository(tx, repository)?;
            let commit = Self::resolve_commit(tx, &repo, reference)?;
            Ok(CommitLog::from_row(commit))
        })
    }

    /// History of `branch`, newest first.
    ///
    /// History follows the branch back to the commit it was created from and
    /// on into its source. With a non-empty `from_reference` only commits
    /// older than that one are listed. Returns the commits and whether more
    /// follow.
    pub fn list_commits(
        &self,
        ctx: &Context,
        repository: &str,
        branch: &str,
        from_reference: &str,
        limit: Option<usize>,
    ) -> CatalogResult<(Vec<CommitLog>, bool)> {
        let limit = self.config().effective_limit(limit);

        self.store().read(ctx, "list_commits", |tx| {
            let repo = Self::resolve_repository(tx, repository)?;
            let branch = Self::resolve_branch(tx, &repo, branch)?;
            let Some(head) = branch.head else {
                return Ok((Vec::new(), false));
            };

            let before = match from_reference {
                "" => None,
                reference => Some(Self::resolve_commit(tx, &repo, reference)?.commit_id),
            };

            // commit ids only decrease along the lineage, so one cursor
            // serves every segment
            let mut rows = Vec::new();
            for segment in branches::lineage(tx, branch.id, head)? {
                if rows.len() > limit {
                    break;
                }
                let wanted = limit + 1 - rows.len();
                rows.extend(commits::list_segment(tx, repo.row.id, segment, before, wanted)?);
            }

            let has_more = rows.len() > limit;
            rows.truncate(limit);
            Ok((rows.into_iter().map(CommitLog::from_row).collect(), has_more))
        })
    }
}
