//! Directed interaction ledger.
//!
//! Every retweet/reply/quote/mention is recorded from both ends: the
//! sender's outgoing tally and the target's incoming tally, with unique
//! partner sets per kind plus an "all" union used for total degree.
//! Each interaction also appends a sanitized edge to the per-kind
//! network list exported as a Gephi graph.

use std::collections::{HashMap, HashSet};

use crate::schema::TweetKind;

/// Interaction kinds tracked by the ledger.
pub const KINDS: [TweetKind; 4] = [
    TweetKind::Retweet,
    TweetKind::Reply,
    TweetKind::Quote,
    TweetKind::Mention,
];

/// Network name for a kind: RTs, ATs, QTs, MTs (replies are "AT"s,
/// i.e. @-messages).
pub fn network_name(kind: TweetKind) -> &'static str {
    match kind {
        TweetKind::Retweet => "RTs",
        TweetKind::Reply => "ATs",
        TweetKind::Quote => "QTs",
        TweetKind::Mention => "MTs",
        TweetKind::Tweet => "tweets",
    }
}

/// One direction of the ledger: per-user interaction count and unique
/// partner set.
#[derive(Debug, Default)]
pub struct Direction {
    pub count: HashMap<String, u64>,
    pub unique: HashMap<String, HashSet<String>>,
}

impl Direction {
    fn record(&mut self, user: &str, partner: &str) {
        *self.count.entry(user.to_string()).or_insert(0) += 1;
        self.unique
            .entry(user.to_string())
            .or_default()
            .insert(partner.to_string());
    }

    pub fn count_for(&self, user: &str) -> u64 {
        self.count.get(user).copied().unwrap_or(0)
    }

    pub fn unique_for(&self, user: &str) -> usize {
        self.unique.get(user).map(|s| s.len()).unwrap_or(0)
    }
}

/// Metadata attached to an interaction edge.
pub struct EdgeMeta<'a> {
    pub tweet_id: &'a str,
    pub text: &'a str,
    pub favorite_count: i64,
    pub rt_count: i64,
    pub time: i64,
}

/// Sanitize a cell for network export: graph-hostile characters are
/// stripped and long values truncated.
pub fn edge_cell(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, ',' | '\'' | '"' | '\n' | '\r'))
        .collect();
    if cleaned.chars().count() > 140 {
        let truncated: String = cleaned.chars().take(140).collect();
        format!("{truncated}...")
    } else {
        cleaned
    }
}

/// The full interaction ledger.
#[derive(Debug, Default)]
pub struct Interactions {
    pub sent: HashMap<TweetKind, Direction>,
    pub received: HashMap<TweetKind, Direction>,
    pub sent_all: HashMap<String, HashSet<String>>,
    pub received_all: HashMap<String, HashSet<String>>,
    /// Network edges keyed by network name (RTs/ATs/QTs/MTs).
    pub edges: HashMap<&'static str, Vec<Vec<String>>>,
}

impl Interactions {
    /// Record one directed interaction with its tweet metadata.
    pub fn record(&mut self, sender: &str, target: &str, kind: TweetKind, meta: &EdgeMeta) {
        self.sent.entry(kind).or_default().record(sender, target);
        self.sent_all
            .entry(sender.to_string())
            .or_default()
            .insert(target.to_string());
        self.received.entry(kind).or_default().record(target, sender);
        self.received_all
            .entry(target.to_string())
            .or_default()
            .insert(sender.to_string());

        self.edges.entry(network_name(kind)).or_default().push(vec![
            edge_cell(sender),
            edge_cell(target),
            edge_cell(kind.as_str()),
            edge_cell(meta.tweet_id),
            edge_cell(meta.text),
            edge_cell(&meta.favorite_count.to_string()),
            edge_cell(&meta.rt_count.to_string()),
            edge_cell(&meta.time.to_string()),
        ]);
    }

    pub fn sent_dir(&self, kind: TweetKind) -> Option<&Direction> {
        self.sent.get(&kind)
    }

    pub fn received_dir(&self, kind: TweetKind) -> Option<&Direction> {
        self.received.get(&kind)
    }

    /// Number of users that sent at least one interaction of this kind.
    pub fn senders(&self, kind: TweetKind) -> usize {
        self.sent.get(&kind).map(|d| d.count.len()).unwrap_or(0)
    }

    /// Number of users that received at least one interaction of this kind.
    pub fn receivers(&self, kind: TweetKind) -> usize {
        self.received.get(&kind).map(|d| d.count.len()).unwrap_or(0)
    }

    /// Total interactions of one kind across all senders.
    pub fn total_sent(&self, kind: TweetKind) -> u64 {
        self.sent
            .get(&kind)
            .map(|d| d.count.values().sum())
            .unwrap_or(0)
    }
}
