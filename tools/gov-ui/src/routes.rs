use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use dao_governance::{ComposerInputs, DaoClient, ProposalId, VoteChoice};
use dao_wallet::ConnectorKind;
use serde::Deserialize;
use tracing::warn;
use warp::{Filter, Rejection, Reply};

use crate::html;

fn with_client(
    client: Arc<DaoClient>,
) -> impl Filter<Extract = (Arc<DaoClient>,), Error = Infallible> + Clone {
    warp::any().map(move || client.clone())
}

#[derive(Deserialize)]
struct ProposeForm {
    amount: String,
    to_address: String,
    #[serde(default)]
    reason: String,
}

fn back_home() -> impl Reply {
    warp::redirect::see_other(warp::http::Uri::from_static("/"))
}

/// Ballot form fields are `<proposal id>=<choice code>`. Unknown codes fall
/// back to abstaining; unrelated fields are ignored.
pub fn ballots_from_form(form: &HashMap<String, String>) -> HashMap<ProposalId, VoteChoice> {
    form.iter()
        .map(|(id, code)| {
            let choice = code
                .parse::<u8>()
                .ok()
                .and_then(|c| VoteChoice::try_from(c).ok())
                .unwrap_or_default();
            (ProposalId::new(id.as_str()), choice)
        })
        .collect()
}

pub fn routes(
    client: Arc<DaoClient>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let home = warp::get()
        .and(warp::path::end())
        .and(with_client(client.clone()))
        .map(|c: Arc<DaoClient>| warp::reply::html(html::page(&c.view())));

    let connect = warp::post()
        .and(warp::path("connect"))
        .and(warp::path::end())
        .and(with_client(client.clone()))
        .and_then(|c: Arc<DaoClient>| async move {
            c.connect(ConnectorKind::Injected).await;
            Ok::<_, Rejection>(back_home())
        });

    let mint = warp::post()
        .and(warp::path("mint"))
        .and(warp::path::end())
        .and(with_client(client.clone()))
        .and_then(|c: Arc<DaoClient>| async move {
            if let Err(err) = c.mint().await {
                warn!(error = %err, "mint request failed");
            }
            Ok::<_, Rejection>(back_home())
        });

    let vote = warp::post()
        .and(warp::path("vote"))
        .and(warp::path::end())
        .and(warp::body::form())
        .and(with_client(client.clone()))
        .and_then(|form: HashMap<String, String>, c: Arc<DaoClient>| async move {
            let choices = ballots_from_form(&form);
            if let Err(err) = c.submit_votes(&choices).await {
                warn!(error = %err, "vote request failed");
            }
            Ok::<_, Rejection>(back_home())
        });

    let propose = warp::post()
        .and(warp::path("propose"))
        .and(warp::path::end())
        .and(warp::body::form())
        .and(with_client(client))
        .and_then(|form: ProposeForm, c: Arc<DaoClient>| async move {
            c.set_composer_inputs(ComposerInputs {
                amount: form.amount,
                to_address: form.to_address,
                reason: form.reason,
            });
            if let Err(err) = c.propose().await {
                warn!(error = %err, "propose request failed");
            }
            Ok::<_, Rejection>(back_home())
        });

    home.or(connect).or(mint).or(vote).or(propose)
}
