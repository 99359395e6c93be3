//! Renders the Dev / QA / PROD changelog of a repository.
//!
//! Releases follow a weekly naming scheme: a release branch
//! `release-<year>W<week>-<n>` is cut from master, and each deployment of it
//! is tagged `release-<year>W<week>-<n>.<patch>`. The changelog shows:
//!
//! - **Dev**: on master, not yet on the latest release branch
//! - **QA**: on the latest release branch, not yet in the latest release tag
//! - **PROD**: history of the latest release tag, with a header wherever a
//!   release tag points

use std::collections::HashMap;
use std::fmt::Write as _;

use lazy_static::lazy_static;
use regex::Regex;

use crate::github::{CommitSummary, NamedRef};
use crate::types::RepoId;

use super::{ChangelogError, ChangelogSource};

/// Commits fetched per page of PROD history.
pub const PROD_PAGE_SIZE: u32 = 30;

/// Returned instead of a changelog when a repository has no release
/// branches or no release tags.
pub const NO_RELEASES: &str =
    "TBD: generate changelogs for repos which don't have tags or release branches yet";

lazy_static! {
    static ref RELEASE_BRANCH: Regex =
        Regex::new(r"^release-\d+W\d+-\d+$").expect("release branch pattern must parse");
    static ref RELEASE_TAG: Regex =
        Regex::new(r"^release-\d+W\d+-\d+\.\d+$").expect("release tag pattern must parse");
    static ref PR_REFERENCE: Regex = Regex::new(r"\(#(\d+)\)").expect("PR pattern must parse");
    static ref JIRA_KEY: Regex = Regex::new(r"([A-Z]+-\d+)").expect("Jira pattern must parse");
}

/// Where changelog lines link to.
#[derive(Debug, Clone, Default)]
pub struct Links {
    /// Base URL for Jira issues, e.g. `https://example.atlassian.net/browse`.
    pub jira_browse_url: Option<String>,
}

pub fn is_release_branch(name: &str) -> bool {
    RELEASE_BRANCH.is_match(name)
}

pub fn is_release_tag(name: &str) -> bool {
    RELEASE_TAG.is_match(name)
}

/// Release refs, newest first.
fn releases(refs: Vec<NamedRef>, is_release: fn(&str) -> bool) -> Vec<NamedRef> {
    let mut releases: Vec<_> = refs.into_iter().filter(|r| is_release(&r.name)).collect();
    releases.sort_by(|a, b| b.name.cmp(&a.name));
    releases
}

pub async fn build_changelog<S: ChangelogSource>(
    source: &S,
    repo: &RepoId,
    pages: u32,
    links: &Links,
) -> Result<String, ChangelogError> {
    let branches = releases(
        source
            .list_branches(repo)
            .await
            .map_err(|e| ChangelogError::upstream("list branches", e))?,
        is_release_branch,
    );
    let tags = releases(
        source
            .list_tags(repo)
            .await
            .map_err(|e| ChangelogError::upstream("list tags", e))?,
        is_release_tag,
    );

    let (Some(branch), Some(tag)) = (branches.first(), tags.first()) else {
        return Ok(NO_RELEASES.to_string());
    };

    let dev = source
        .compare(repo, &branch.name, "master")
        .await
        .map_err(|e| ChangelogError::upstream("compare release branch to master", e))?;
    let qa = source
        .compare(repo, &tag.name, &branch.name)
        .await
        .map_err(|e| ChangelogError::upstream("compare release tag to release branch", e))?;
    let prod = source
        .commits(repo, &tag.name, pages.max(1), PROD_PAGE_SIZE)
        .await
        .map_err(|e| ChangelogError::upstream("list release history", e))?;

    let tag_at: HashMap<&str, &str> = tags
        .iter()
        .map(|t| (t.sha.as_str(), t.name.as_str()))
        .collect();

    let mut out = String::from("## Dev:\n");
    for commit in dev.iter().rev() {
        let _ = writeln!(out, "{}", with_pr_links(repo, summary_line(commit)));
    }

    let _ = write!(out, "\n## QA:\n#### {} (QA)\n", branch.name);
    for commit in qa.iter().rev() {
        let _ = writeln!(out, "{}", summary_line(commit));
    }

    out.push_str("\n## PROD:");
    for commit in &prod {
        if let Some(name) = tag_at.get(commit.sha.as_str()) {
            let _ = write!(out, "\n#### {name}\n");
        }
        let line = with_jira_links(links, with_pr_links(repo, summary_line(commit)));
        let _ = writeln!(out, "{line}");
    }

    Ok(out)
}

fn summary_line(commit: &CommitSummary) -> String {
    format!("* {}", commit.message.lines().next().unwrap_or_default())
}

fn with_pr_links(repo: &RepoId, mut line: String) -> String {
    let numbers: Vec<String> = PR_REFERENCE
        .captures_iter(&line)
        .map(|c| c[1].to_string())
        .collect();
    for number in numbers {
        let _ = write!(
            line,
            " https://github.com/{}/{}/pull/{}",
            repo.org, repo.name, number
        );
    }
    line
}

fn with_jira_links(links: &Links, mut line: String) -> String {
    let Some(base) = links.jira_browse_url.as_deref() else {
        return line;
    };
    let base = base.trim_end_matches('/');
    let keys: Vec<String> = JIRA_KEY
        .captures_iter(&line)
        .map(|c| c[1].to_string())
        .collect();
    for key in keys {
        let _ = write!(line, " {base}/{key}");
    }
    line
}
