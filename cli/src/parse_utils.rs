use std::collections::HashMap;

use dao_governance::{ProposalId, VoteChoice};

pub fn parse_choice(raw: &str) -> Result<VoteChoice, String> {
    match raw.to_ascii_lowercase().as_str() {
        "for" | "yes" | "1" => Ok(VoteChoice::For),
        "against" | "no" | "0" => Ok(VoteChoice::Against),
        "abstain" | "2" => Ok(VoteChoice::Abstain),
        other => Err(format!("invalid vote choice '{other}' (expected for, against or abstain)")),
    }
}

/// Parse `<proposal id>=<choice>` arguments. A proposal may appear once.
pub fn parse_ballots(args: &[String]) -> Result<HashMap<ProposalId, VoteChoice>, String> {
    let mut ballots = HashMap::new();
    for arg in args {
        let (id, choice) = arg
            .split_once('=')
            .ok_or_else(|| format!("invalid ballot '{arg}' (expected <proposal id>=<choice>)"))?;
        let id = id.trim();
        if id.is_empty() {
            return Err(format!("invalid ballot '{arg}': empty proposal id"));
        }
        let choice = parse_choice(choice.trim())?;
        if ballots.insert(ProposalId::new(id), choice).is_some() {
            return Err(format!("proposal {id} appears more than once"));
        }
    }
    Ok(ballots)
}
