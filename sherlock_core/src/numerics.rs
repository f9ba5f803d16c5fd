//! Parsing of the numeric replies that answer lookups, and routing of the parsed
//! values to the pending lookups waiting for them.

use crate::correlator::{Correlator, LookupKind};

/// `RPL_USERHOST`: `<me> :nick[*]=(+|-)ident@host ...`
pub const RPL_USERHOST: &str = "302";
/// `RPL_USERIP`: same format as `RPL_USERHOST`, with an address in place of the host
pub const RPL_USERIP: &str = "340";
/// `RPL_WHOREPLY`: `<me> <channel> <user> <host> <server> <nick> <flags> :<hops> <realname>`
pub const RPL_WHOREPLY: &str = "352";

/// The lookup kind answered by a given numeric, if any
pub fn lookup_kind(numeric: &str) -> Option<LookupKind> {
    match numeric {
        RPL_USERHOST => Some(LookupKind::UserHost),
        RPL_USERIP => Some(LookupKind::UserIp),
        RPL_WHOREPLY => Some(LookupKind::UserMask),
        _ => None,
    }
}

/// Extract `(nick, host)` from a WHO reply's parameters
pub fn parse_who_reply<S: AsRef<str>>(params: &[S]) -> Option<(String, String)> {
    let host = params.get(3)?.as_ref().trim();
    let nick = params.get(5)?.as_ref();

    if nick.is_empty() || host.is_empty() {
        return None;
    }

    Some((nick.to_owned(), host.to_owned()))
}

/// Extract `(nick, host)` from a single USERHOST/USERIP entry.
///
/// The trailing `*` on the nick marks an oper and the leading `+`/`-` on the value
/// marks away status; both are dropped, as is the ident.
pub fn parse_userhost_entry(entry: &str) -> Option<(String, String)> {
    let entry = entry.trim_start_matches(':');
    let (nick, ident_host) = entry.split_once('=')?;

    let nick = nick.trim_end_matches('*');
    let ident_host = ident_host
        .strip_prefix(['+', '-'])
        .unwrap_or(ident_host);
    let (_ident, host) = ident_host.split_once('@')?;
    let host = host.trim();

    if nick.is_empty() || host.is_empty() {
        return None;
    }

    Some((nick.to_owned(), host.to_owned()))
}

/// Extract every `(nick, host)` pair from a USERHOST/USERIP reply's parameters
pub fn parse_userhost_reply<S: AsRef<str>>(params: &[S]) -> Vec<(String, String)> {
    params
        .get(1)
        .map(|reply| {
            reply
                .as_ref()
                .split_whitespace()
                .filter_map(parse_userhost_entry)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a lookup reply into its kind and the `(nick, value)` pairs it carries
pub fn parse_reply<S: AsRef<str>>(
    numeric: &str,
    params: &[S],
) -> Option<(LookupKind, Vec<(String, String)>)> {
    let kind = lookup_kind(numeric)?;

    let pairs = match kind {
        LookupKind::UserMask => parse_who_reply(params).into_iter().collect(),
        LookupKind::UserHost | LookupKind::UserIp => parse_userhost_reply(params),
    };

    Some((kind, pairs))
}

/// Resolve any pending lookups answered by this numeric reply.
///
/// Returns the number of lookups resolved. Replies that nobody is waiting for are
/// expected (other clients and opers cause them too) and are ignored.
pub fn route_reply<S: AsRef<str>>(correlator: &Correlator, numeric: &str, params: &[S]) -> usize {
    let Some((kind, pairs)) = parse_reply(numeric, params) else {
        return 0;
    };

    if pairs.is_empty() {
        tracing::debug!(numeric, "Couldn't parse lookup reply");
    }

    pairs
        .into_iter()
        .filter(|(nick, value)| correlator.resolve(kind, nick, value.clone()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn who_params(nick: &str, host: &str) -> Vec<String> {
        ["me", "*", "ident", host, "irc.example.net", nick, "H", "0 Real Name"]
            .into_iter()
            .map(ToOwned::to_owned)
            .collect()
    }

    #[test]
    fn who_reply_is_positional() {
        assert_eq!(
            parse_who_reply(&who_params("Carol", "user/carol")),
            Some(("Carol".to_owned(), "user/carol".to_owned()))
        );
        assert_eq!(parse_who_reply(&["me", "*", "ident"]), None);
    }

    #[test]
    fn userhost_entry_strips_markers() {
        assert_eq!(
            parse_userhost_entry("Carol*=+ident@host.example"),
            Some(("Carol".to_owned(), "host.example".to_owned()))
        );
        assert_eq!(
            parse_userhost_entry(":dave=-~dave@198.51.100.7"),
            Some(("dave".to_owned(), "198.51.100.7".to_owned()))
        );
    }

    #[test]
    fn userhost_entry_rejects_garbage() {
        assert_eq!(parse_userhost_entry("noequals"), None);
        assert_eq!(parse_userhost_entry("nick=+noat"), None);
        assert_eq!(parse_userhost_entry("=+ident@host"), None);
    }

    #[test]
    fn userhost_reply_with_several_entries() {
        let params = ["me", "a=+x@host.a b*=-y@host.b "];
        assert_eq!(
            parse_userhost_reply(&params),
            vec![
                ("a".to_owned(), "host.a".to_owned()),
                ("b".to_owned(), "host.b".to_owned()),
            ]
        );
    }

    #[test]
    fn empty_userhost_reply() {
        assert!(parse_userhost_reply(&["me", ""]).is_empty());
        assert!(parse_userhost_reply(&["me"]).is_empty());
    }

    #[test]
    fn unrelated_numerics_are_ignored() {
        let correlator = Correlator::default();
        assert_eq!(parse_reply("001", &["me", "Welcome"]), None);
        assert_eq!(route_reply(&correlator, "315", &["me", "nick", "End of WHO"]), 0);
    }

    #[tokio::test]
    async fn replies_resolve_pending_lookups() {
        let correlator = Correlator::default();

        let mask = correlator.request(LookupKind::UserMask, "carol", || {});
        let ip = correlator.request(LookupKind::UserIp, "Carol", || {});
        let replies = async {
            tokio::task::yield_now().await;
            assert_eq!(
                route_reply(&correlator, RPL_WHOREPLY, &who_params("CAROL", "user/carol")),
                1
            );
            assert_eq!(
                route_reply(&correlator, RPL_USERIP, &["me", ":Carol*=+ident@203.0.113.9"]),
                1
            );
            // Nobody is waiting any more
            assert_eq!(
                route_reply(&correlator, RPL_USERIP, &["me", "Carol=+ident@203.0.113.9"]),
                0
            );
        };

        let (mask, ip, ()) = tokio::join!(mask, ip, replies);
        assert_eq!(mask.unwrap(), "user/carol");
        assert_eq!(ip.unwrap(), "203.0.113.9");
    }
}
