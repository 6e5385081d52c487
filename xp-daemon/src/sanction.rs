//! Post-malus policy: report the malus, or block the assignee.

use bigdecimal::BigDecimal;
use tracing::{error, info, warn};

use crate::error::EngineError;
use crate::format::{code, display_handle, format_xp};
use crate::github::{GithubApi, RepoRef, UserRef};

/// Which terminal action a total calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Report,
    Ban,
}

/// What the sanction step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanctionOutcome {
    /// Assignee blocked from the organization; no malus report
    Banned { org: String },
    /// Malus report posted
    Reported,
    /// Report due but comment posting is disabled
    ReportSuppressed,
}

/// Totals at or above the threshold are reported; anything lower is banned.
pub fn decide(total: &BigDecimal, threshold: &BigDecimal) -> Decision {
    if total >= threshold {
        Decision::Report
    } else {
        Decision::Ban
    }
}

/// Content of the malus report comment.
#[derive(Debug, Clone)]
pub struct MalusReport<'a> {
    pub assignee: &'a UserRef,
    pub multiplier: u64,
    pub collaborators: &'a [UserRef],
    /// Penalty magnitude (positive)
    pub malus: &'a BigDecimal,
    pub total: &'a BigDecimal,
}

impl MalusReport<'_> {
    pub fn render(&self) -> String {
        let collaborators = if self.collaborators.is_empty() {
            code("None")
        } else {
            self.collaborators
                .iter()
                .map(|c| code(&display_handle(&c.login, c.id)))
                .collect::<Vec<_>>()
                .join(", ")
        };

        [
            "### XP Malus Applied".to_string(),
            String::new(),
            "| Field | Value |".to_string(),
            "| --- | --- |".to_string(),
            format!("| Assignee | {} |", code(&display_handle(&self.assignee.login, self.assignee.id))),
            format!("| Collaborator Multiplier | {} |", code(&format!("{}x", self.multiplier))),
            format!("| Collaborators | {} |", collaborators),
            format!("| Applied Malus | {} |", code(&format!("-{} XP", format_xp(self.malus)))),
            format!("| Current XP | {} |", code(&format!("{} XP", format_xp(self.total)))),
        ]
        .join("\n")
    }
}

pub fn ban_notice(login: &str, org: &str, total: &BigDecimal, threshold: &BigDecimal) -> String {
    format!(
        "XP total fell below threshold ({} < {}). Banning `{}` from `{}`.",
        format_xp(total),
        format_xp(threshold),
        login,
        org
    )
}

/// Everything the sanction step needs beyond the report itself.
#[derive(Debug, Clone)]
pub struct SanctionContext<'a> {
    /// Conversation the report and notices are posted on
    pub target: (&'a RepoRef, u64),
    pub org: Option<&'a str>,
    pub threshold: &'a BigDecimal,
    pub disable_comment_posting: bool,
}

/// Apply the decision for `report.total`.
///
/// On the ban path the ban notice is the only comment; a missing
/// organization or a failed block is fatal. The ledger write has already
/// happened by the time this runs and is not undone.
pub async fn apply_sanction(
    github: &dyn GithubApi,
    ctx: &SanctionContext<'_>,
    report: &MalusReport<'_>,
) -> Result<SanctionOutcome, EngineError> {
    let login = report.assignee.login.as_str();

    match decide(report.total, ctx.threshold) {
        Decision::Report => {
            info!(
                login,
                total = %report.total,
                threshold = %ctx.threshold,
                "XP total at or above threshold, skipping ban"
            );
            if ctx.disable_comment_posting {
                info!("Comment posting disabled via configuration");
                return Ok(SanctionOutcome::ReportSuppressed);
            }
            post(github, ctx, &report.render()).await?;
            Ok(SanctionOutcome::Reported)
        }
        Decision::Ban => {
            let Some(org) = ctx.org else {
                error!(login, "Organization login missing from payload, cannot ban user");
                return Err(EngineError::MissingOrganization(login.to_string()));
            };

            let notice = ban_notice(login, org, report.total, ctx.threshold);
            warn!(login, org, "{}", notice);
            if !ctx.disable_comment_posting {
                post(github, ctx, &notice).await?;
            }

            github.block_user(org, login).await.map_err(|e| {
                error!(login, org, error = %e, "Failed to ban user");
                EngineError::Ban {
                    login: login.to_string(),
                    org: org.to_string(),
                    source: e,
                }
            })?;

            info!(login, org, "Banned user");
            Ok(SanctionOutcome::Banned { org: org.to_string() })
        }
    }
}

async fn post(github: &dyn GithubApi, ctx: &SanctionContext<'_>, body: &str) -> Result<(), EngineError> {
    let (repo, number) = ctx.target;
    github.post_comment(repo, number, body).await?;
    Ok(())
}
