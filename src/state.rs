//! Accumulator state for one aggregation run.
//!
//! Every statistic collected during the streaming pass lives in this
//! struct; the report synthesizer consumes it read-only after the pass.
//! Nothing here survives a run.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::interactions::Interactions;
use crate::schema::TweetKind;

/// Metadata snapshot of a tweet entering the top-tweets candidates,
/// taken from the first row with positive engagement for its id.
#[derive(Debug, Clone)]
pub struct TweetSnapshot {
    pub text: String,
    pub from_user: String,
    pub hashtags: String,
    pub rt_count: i64,
    pub favorite_count: i64,
    pub kind: TweetKind,
    pub lang: String,
    pub place: String,
    pub country: String,
    pub source: String,
    pub media: String,
    pub created_at: String,
    pub url: String,
}

/// Graph node attributes for a posting user.
#[derive(Debug, Clone)]
pub struct UserNode {
    pub name: String,
    pub followers: i64,
    pub following: i64,
    /// Engagement of the user's first seen tweet; only collected for
    /// ExportComments inputs.
    pub engagement: Option<i64>,
}

/// All accumulators of one pass.
#[derive(Debug, Default)]
pub struct AggregationState {
    // line accounting
    pub rows_read: u64,
    pub corrupted_lines: u64,
    pub duplicate_lines: u64,
    pub ads_lines: u64,
    pub language_filtered_lines: u64,

    // id and time ranges over accepted rows
    pub min_id: Option<i64>,
    pub max_id: Option<i64>,
    pub min_timestamp: Option<i64>,
    pub max_timestamp: Option<i64>,

    // dedup
    pub seen_ids: HashSet<String>,

    // date bucketing (sorted keys feed the by-period tables)
    pub dates: BTreeSet<String>,
    /// metric name ("tweet", "retweet", …, "mention", "hashtag",
    /// "sentiment") => date => value
    pub date_metrics: HashMap<&'static str, HashMap<String, i64>>,
    pub users_by_date: HashMap<String, HashSet<String>>,
    pub hashtags_by_date: HashMap<String, HashMap<String, u64>>,
    pub words_by_date: HashMap<String, HashMap<String, u64>>,

    // frequency tables
    pub word_counts: HashMap<String, u64>,
    pub capitalized_counts: HashMap<String, u64>,
    pub hashtag_counts: HashMap<String, u64>,
    pub emoji_counts: HashMap<String, u64>,
    pub url_counts: HashMap<String, u64>,
    pub media_counts: HashMap<String, u64>,
    pub lang_counts: HashMap<String, u64>,
    pub source_counts: HashMap<String, u64>,
    pub type_counts: HashMap<String, u64>,
    pub text_counts: HashMap<String, u64>,
    pub country_counts: HashMap<String, u64>,
    pub place_counts: HashMap<String, u64>,
    pub quote_counts: HashMap<String, u64>,
    pub reply_counts: HashMap<String, u64>,

    // engagement-weighted word tables
    pub words_favorited: HashMap<String, i64>,
    pub words_retweeted: HashMap<String, i64>,
    pub capitalized_favorited: HashMap<String, i64>,
    pub capitalized_retweeted: HashMap<String, i64>,

    // per-text lookups
    pub retweets_by_text: HashMap<String, i64>,
    pub favorites_by_text: HashMap<String, i64>,
    pub sentiment_by_text: HashMap<String, i64>,

    // per-user totals
    pub user_tweets: HashMap<String, u64>,
    pub user_retweets: HashMap<String, i64>,
    pub user_favorites: HashMap<String, i64>,
    pub user_original_tweets: HashMap<String, u64>,

    // unique-user sets per key
    pub hashtag_users: HashMap<String, HashSet<String>>,
    pub media_users: HashMap<String, HashSet<String>>,
    pub url_users: HashMap<String, HashSet<String>>,

    /// Rows having at least one of: emoji, mention, hashtag, url,
    /// media_url, place, geocode, in_geonames.
    pub row_totals: HashMap<&'static str, u64>,

    // top-tweets candidates
    pub engagement_by_tweet: HashMap<String, i64>,
    pub tweet_snapshots: HashMap<String, TweetSnapshot>,

    // users
    pub all_users: HashSet<String>,
    pub seen_posters: HashSet<String>,
    pub users_rows: Vec<Vec<String>>,
    pub user_nodes: Vec<UserNode>,

    // geo output rows
    pub locations: Vec<Vec<String>>,

    // non-interaction networks (hashtags, hashtags_users, URLs, …)
    pub networks: HashMap<&'static str, Vec<Vec<String>>>,

    pub interactions: Interactions,

    // global sums
    pub global_sentiment: i64,
    pub global_favorites: i64,
    pub global_retweets: i64,
}

impl AggregationState {
    /// Total physical lines including the header.
    pub fn total_lines(&self) -> u64 {
        self.rows_read + 1
    }

    /// Valid lines by the accounting decomposition: everything that is
    /// neither the header nor corrupted, duplicate, ad or filtered out
    /// by language.
    pub fn valid_lines(&self) -> u64 {
        self.rows_read
            .saturating_sub(self.corrupted_lines)
            .saturating_sub(self.duplicate_lines)
            .saturating_sub(self.ads_lines)
            .saturating_sub(self.language_filtered_lines)
    }

    pub fn bump_date_metric(&mut self, metric: &'static str, date: &str, delta: i64) {
        *self
            .date_metrics
            .entry(metric)
            .or_default()
            .entry(date.to_string())
            .or_insert(0) += delta;
    }

    pub fn date_metric(&self, metric: &str, date: &str) -> i64 {
        self.date_metrics
            .get(metric)
            .and_then(|m| m.get(date))
            .copied()
            .unwrap_or(0)
    }

    pub fn track_id(&mut self, id: i64) {
        self.min_id = Some(self.min_id.map_or(id, |m| m.min(id)));
        self.max_id = Some(self.max_id.map_or(id, |m| m.max(id)));
    }

    pub fn track_timestamp(&mut self, ts: i64) {
        self.min_timestamp = Some(self.min_timestamp.map_or(ts, |m| m.min(ts)));
        self.max_timestamp = Some(self.max_timestamp.map_or(ts, |m| m.max(ts)));
    }
}

/// Increment a string-keyed counter.
pub fn bump(map: &mut HashMap<String, u64>, key: &str) {
    *map.entry(key.to_string()).or_insert(0) += 1;
}

/// Add to a string-keyed sum.
pub fn add(map: &mut HashMap<String, i64>, key: &str, delta: i64) {
    *map.entry(key.to_string()).or_insert(0) += delta;
}
