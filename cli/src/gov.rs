use clap::Subcommand;
use dao_governance::view::View;
use dao_governance::{ComposerInputs, DaoClient, DaoError, Proposal, VoteChoice};

use crate::parse_utils::parse_ballots;

#[derive(Subcommand)]
pub enum GovCmd {
    /// Show the member page for the connected wallet
    Status,
    /// List members and their token balances
    Members,
    /// List proposals grouped by state
    Proposals,
    /// Mint the free membership NFT
    Mint,
    /// Vote on every active proposal; unlisted proposals abstain
    Vote {
        /// `<proposal id>=<for|against|abstain>`
        ballots: Vec<String>,
    },
    /// Propose a treasury transfer
    Propose {
        #[arg(long)]
        amount: String,
        #[arg(long)]
        to: String,
        #[arg(long, default_value = "")]
        reason: String,
    },
}

#[derive(Debug)]
pub enum CliError {
    Usage(String),
    Dao(DaoError),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => f.write_str(msg),
            CliError::Dao(err) => write!(f, "{err}"),
        }
    }
}

impl From<DaoError> for CliError {
    fn from(err: DaoError) -> Self {
        CliError::Dao(err)
    }
}

pub async fn handle(client: &DaoClient, cmd: GovCmd) -> Result<(), CliError> {
    match cmd {
        GovCmd::Status => println!("{}", client.view()),
        GovCmd::Members => {
            let snap = client.snapshot();
            if !snap.has_membership {
                return Err(CliError::Usage("connected account is not a member".into()));
            }
            for member in &snap.members {
                println!("{} {}", member.address, member.token_amount);
            }
        }
        GovCmd::Proposals => {
            let snap = client.snapshot();
            print_bucket("active", &snap.proposals.active);
            print_bucket("voted", &snap.proposals.voted);
            print_bucket("defeated", &snap.proposals.defeated);
            print_bucket("executed", &snap.proposals.executed);
        }
        GovCmd::Mint => {
            if client.snapshot().has_membership {
                println!("already a member");
                return Ok(());
            }
            client.mint().await?;
            println!("membership minted");
        }
        GovCmd::Vote { ballots } => {
            let choices = parse_ballots(&ballots).map_err(CliError::Usage)?;
            let snap = client.snapshot();
            if let Some(id) = choices
                .keys()
                .find(|id| !snap.proposals.active.iter().any(|p| &p.id == *id))
            {
                return Err(CliError::Usage(format!("proposal {id} is not open for voting")));
            }
            let report = client.submit_votes(&choices).await?;
            println!(
                "voted on {} proposal(s), skipped {}, executed {} (trace {})",
                report.cast.len(),
                report.skipped.len(),
                report.executed.len(),
                report.trace_id
            );
        }
        GovCmd::Propose { amount, to, reason } => {
            client.set_composer_inputs(ComposerInputs {
                amount,
                to_address: to,
                reason,
            });
            let draft = client.propose().await?;
            println!("proposed: {}", draft.description);
        }
    }
    Ok(())
}

fn print_bucket(title: &str, proposals: &[Proposal]) {
    if proposals.is_empty() {
        return;
    }
    println!("{title}:");
    for p in proposals {
        let tallies: Vec<String> = VoteChoice::ALL
            .iter()
            .map(|c| format!("{}={}", c.label(), p.tally(*c).count.whole_tokens_rounded()))
            .collect();
        println!("  {} {} [{}]", p.id, p.description, tallies.join(" "));
    }
}

/// Refuse to act without a usable wallet connection.
pub fn check_view(view: &View) -> Result<(), CliError> {
    match view {
        View::ChainMismatch { expected, actual } => Err(CliError::Usage(format!(
            "wallet is on chain {actual}, switch it to chain {expected}"
        ))),
        View::Landing => Err(CliError::Usage("no wallet account available".into())),
        _ => Ok(()),
    }
}
