use dao_governance::view::{BallotView, MemberPage, ProposalCard, View};

const STYLE: &str = "body{background:#121212;color:#eee;font-family:sans-serif;\
max-width:48em;margin:auto;}\n\
a{color:#8ab4f8;} input,select{background:#222;color:#eee;border:1px solid #555;padding:4px;}\n\
.card{border:1px solid #333;border-radius:6px;padding:8px;margin:8px 0;} table{width:100%;}\n";

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub fn page(view: &View) -> String {
    let mut html = format!("<html><head><title>DAO</title><style>{STYLE}</style></head><body>");
    match view {
        View::ChainMismatch { expected, actual } => html.push_str(&format!(
            "<div class=unsupported-network><h2>Please connect to chain {expected}</h2>\
             <p>Your wallet is on chain {actual}. This page only works on the configured network, \
             please switch networks in your connected wallet.</p></div>"
        )),
        View::Landing => html.push_str(
            "<div class=landing><h1>Welcome to the DAO</h1>\
             <form method=post action=/connect>\
             <button type=submit>Connect your wallet</button></form></div>",
        ),
        View::Mint { claiming, button } => {
            let disabled = if *claiming { " disabled" } else { "" };
            html.push_str(&format!(
                "<div class=landing><h1>Welcome to the DAO</h1>\
                 <h2>Mint your free membership NFT</h2>\
                 <form method=post action=/mint>\
                 <button type=submit{disabled}>{button}</button></form></div>"
            ));
        }
        View::Member(member) => member_page(&mut html, member),
    }
    html.push_str("</body></html>");
    html
}

fn member_page(html: &mut String, page: &MemberPage) {
    html.push_str(&format!(
        "<h1>DAO Member Page</h1><p>{}</p><p>Congratulations on being a member</p>",
        page.address
    ));
    html.push_str(
        "<h2>Member List</h2><table class=card>\
         <thead><tr><th>Address</th><th>Token Amount</th></tr></thead><tbody>",
    );
    for m in &page.members {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>",
            escape(&m.address),
            escape(&m.token_amount)
        ));
    }
    html.push_str("</tbody></table>");

    if !page.ballots.is_empty() {
        html.push_str("<h2>Active Proposals</h2><form method=post action=/vote>");
        for ballot in &page.ballots {
            ballot_card(html, ballot);
        }
        let disabled = if page.voting { " disabled" } else { "" };
        html.push_str(&format!(
            "<button type=submit{disabled}>{}</button>\
             <p>This will trigger multiple transactions that you will need to sign.</p></form>",
            page.vote_button
        ));
    }

    if let Some(composer) = &page.composer {
        let disabled = if composer.proposing { " disabled" } else { "" };
        html.push_str(&format!(
            "<h2>Propose Vote</h2><form method=post action=/propose class=card>\
             <p>Should the DAO transfer</p><input name=amount placeholder=amount value=\"{}\">\
             <p>tokens from the treasury to</p>\
             <input name=to_address placeholder=address value=\"{}\">\
             <p>because</p><input name=reason placeholder=reason value=\"{}\">\
             <button type=submit{disabled}>{}</button></form>",
            escape(&composer.inputs.amount),
            escape(&composer.inputs.to_address),
            escape(&composer.inputs.reason),
            composer.button
        ));
    }

    for (title, cards) in [
        ("Already Voted Active Proposals", &page.voted),
        ("Defeated Proposals", &page.defeated),
        ("Executed Proposals", &page.executed),
    ] {
        if cards.is_empty() {
            continue;
        }
        html.push_str(&format!("<h2>{title}</h2>"));
        for card in cards {
            tally_card(html, card);
        }
    }
}

fn ballot_card(html: &mut String, ballot: &BallotView) {
    let id = escape(ballot.id.as_str());
    html.push_str(&format!("<div class=card><h5>{}</h5>", escape(&ballot.description)));
    for option in &ballot.options {
        let code = u8::from(option.choice);
        let checked = if option.selected { " checked" } else { "" };
        html.push_str(&format!(
            "<div><input type=radio id=\"{id}-{code}\" name=\"{id}\" value={code}{checked}>\
             <label for=\"{id}-{code}\">{}</label></div>",
            escape(&option.label)
        ));
    }
    html.push_str("</div>");
}

fn tally_card(html: &mut String, card: &ProposalCard) {
    html.push_str(&format!("<div class=card><h5>{}</h5>", escape(&card.description)));
    for (label, count) in &card.tallies {
        html.push_str(&format!("<p>{}: {}</p>", escape(label), escape(count)));
    }
    html.push_str("</div>");
}
