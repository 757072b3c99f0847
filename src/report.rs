//! Report synthesis: turns the final accumulator state into ranked
//! tables, per-user indices, graph exports, the machine-readable
//! summary and the textual overview.
//!
//! Pure function of the state; no further row access happens here.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use chrono::DateTime;
use serde::Serialize;

use crate::gender;
use crate::interactions::KINDS;
use crate::output::{
    OutputConfig, csv_safe_cell, rank, rank_counts, write_gdf, write_ranked, write_ranked_utf16,
    write_rows, write_wordcloud,
};
use crate::schema::{SchemaVariant, TweetKind, USERS_HEADER};
use crate::state::AggregationState;

/// Ranked tweet candidates kept in the top-tweets table.
const MAX_TOP_TWEETS: usize = 5000;
/// Words kept in the top-words tables.
const MAX_TOP_WORDS: usize = 250;
/// Keys kept in the by-period matrices.
const MAX_BY_PERIOD: usize = 50;
/// Entries for each "top" line of the overview.
const TOP_N: usize = 5;

/// Per-kind interaction totals for the summary.
#[derive(Debug, Serialize)]
pub struct InteractionTotals {
    pub count: u64,
    pub senders: usize,
    pub receivers: usize,
}

/// Machine-readable run summary, also rendered as the prose overview.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub total_lines: u64,
    pub valid_lines: u64,
    pub corrupted_lines: u64,
    pub duplicate_lines: u64,
    pub ads_lines: u64,
    pub language_filtered_lines: u64,

    pub tweets: usize,
    pub users_tweeting: usize,
    pub original: u64,
    pub users_original: usize,
    pub users_total: usize,

    pub countries: usize,
    pub dialogue_global: Option<f64>,
    pub emojis: usize,
    pub tweets_with_emoji: u64,
    pub favorited: i64,
    pub geocodes: u64,
    pub geonames_matched: u64,
    pub hashtags: usize,
    pub tweets_with_hashtag: u64,
    pub languages: usize,
    pub media: usize,
    pub tweets_with_media: u64,
    pub places: usize,
    pub tweets_with_place: u64,
    pub retweeted: i64,
    pub sentiment_global: Option<f64>,
    pub sources: usize,
    pub urls: usize,
    pub tweets_with_url: u64,
    pub words: usize,

    pub retweets: InteractionTotals,
    pub quotes: InteractionTotals,
    pub replies: InteractionTotals,
    pub mentions: InteractionTotals,
    pub interactions: InteractionTotals,

    pub top_words: Vec<String>,
    pub top_hashtags: Vec<String>,
    pub top_users: Vec<String>,
    pub top_country: Option<String>,
    pub top_lang: Option<String>,
    pub top_source: Option<String>,
    pub top_url: Option<String>,
    pub top_retweet: Option<String>,
    pub top_favorite: Option<String>,

    pub time_span: f64,
    pub time_unit: &'static str,
    pub tweets_per_unit: f64,
    pub favorites_per_tweet: f64,
    pub retweets_per_tweet: f64,
    pub oldest_id: Option<i64>,
    pub newest_id: Option<i64>,
    pub since: String,
    pub until: String,
}

/// Everything derived from the state, ready for emission.
pub struct Synthesis {
    pub top_dates: Vec<Vec<String>>,
    pub top_users: Vec<Vec<String>>,
    pub top_tweets: Vec<Vec<String>>,
    pub top_words: Vec<Vec<String>>,
    pub top_words_capitalized: Vec<Vec<String>>,
    pub hashtags_by_period: Vec<Vec<String>>,
    pub words_by_period: Vec<Vec<String>>,
    pub node_rows: Vec<Vec<String>>,
    pub node_attrs: Vec<&'static str>,
    pub summary: Summary,
    pub overview: String,
}

/// Format a number the way the tables expect: two decimals, trailing
/// ".00" stripped so integers stay integers.
pub fn fmt_num(value: f64) -> String {
    let s = format!("{value:.2}");
    s.strip_suffix(".00").map(str::to_string).unwrap_or(s)
}

/// Best-fit unit for a time span in seconds.
pub fn best_fit_unit(seconds: i64) -> (f64, &'static str) {
    let s = seconds as f64;
    if seconds < 60 {
        (s, "seconds")
    } else if seconds < 3600 {
        (s / 60.0, "minutes")
    } else if seconds < 86400 {
        (s / 3600.0, "hours")
    } else {
        (s / 86400.0, "days")
    }
}

fn rank_f64(map: &HashMap<String, f64>) -> Vec<(String, f64)> {
    let mut entries: Vec<(String, f64)> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    entries
}

fn top_keys(entries: &[(String, i64)], n: usize) -> Vec<String> {
    entries.iter().take(n).map(|(k, _)| k.clone()).collect()
}

/// Quote a tweet text for the overview: accents folded, non-ASCII
/// dropped, wrapped in double quotes.
fn quoted_text(entries: &[(String, i64)]) -> Option<String> {
    entries.first().map(|(text, _)| {
        format!(
            "\"{}\"",
            crate::text::ascii_fold(&crate::text::remove_latin_accents(text))
        )
    })
}

/// Build every derived table and the summary from the final state.
pub fn synthesize(state: &AggregationState, schema: SchemaVariant) -> Synthesis {
    let sorted_dates: Vec<&String> = state.dates.iter().collect();

    // --- per-date table -------------------------------------------------
    let mut top_dates = Vec::new();
    for date in &sorted_dates {
        let original = state.date_metric("tweet", date);
        let retweets = state.date_metric("retweet", date);
        let replies = state.date_metric("reply", date);
        let tweets = original + retweets + replies;
        let users = state
            .users_by_date
            .get(*date)
            .map(|s| s.len())
            .unwrap_or(0);
        top_dates.push(vec![
            (*date).clone(),
            users.to_string(),
            tweets.to_string(),
            original.to_string(),
            retweets.to_string(),
            replies.to_string(),
            state.date_metric("mention", date).to_string(),
            state.date_metric("hashtag", date).to_string(),
            state.date_metric("sentiment", date).to_string(),
        ]);
    }

    // --- per-user table and composite indices ---------------------------
    let mut influence_index: HashMap<String, f64> = HashMap::new();
    let mut dialogue_sum = 0.0f64;
    let mut dialogue_users = 0usize;
    let mut top_users = Vec::new();
    let mut sorted_users: Vec<&String> = state.all_users.iter().collect();
    sorted_users.sort();

    let dir = |kind: TweetKind| {
        (
            state.interactions.received_dir(kind),
            state.interactions.sent_dir(kind),
        )
    };
    for user in sorted_users {
        let tweets = state.user_tweets.get(user).copied().unwrap_or(0);
        let rt_count = state.user_retweets.get(user).copied().unwrap_or(0);
        let favorite_count = state.user_favorites.get(user).copied().unwrap_or(0);

        let (rts_recv, rts_sent) = dir(TweetKind::Retweet);
        let (ats_recv, ats_sent) = dir(TweetKind::Reply);
        let (mts_recv, mts_sent) = dir(TweetKind::Mention);
        let rts_in = rts_recv.map_or(0, |d| d.count_for(user));
        let rts_out = rts_sent.map_or(0, |d| d.count_for(user));
        let ats_in = ats_recv.map_or(0, |d| d.count_for(user));
        let ats_out = ats_sent.map_or(0, |d| d.count_for(user));
        let mts_in = mts_recv.map_or(0, |d| d.count_for(user));
        let mts_out = mts_sent.map_or(0, |d| d.count_for(user));
        let rts_users_in = rts_recv.map_or(0, |d| d.unique_for(user));
        let rts_users_out = rts_sent.map_or(0, |d| d.unique_for(user));
        let ats_users_in = ats_recv.map_or(0, |d| d.unique_for(user));
        let ats_users_out = ats_sent.map_or(0, |d| d.unique_for(user));
        let mts_users_in = mts_recv.map_or(0, |d| d.unique_for(user));
        let mts_users_out = mts_sent.map_or(0, |d| d.unique_for(user));

        let empty = HashSet::new();
        let received_all = state.interactions.received_all.get(user).unwrap_or(&empty);
        let sent_all = state.interactions.sent_all.get(user).unwrap_or(&empty);
        let total_users_in = received_all.len();
        let total_users_out = sent_all.len();
        let total_users = received_all.union(sent_all).count();
        let total_in = rts_in + ats_in + mts_in;
        let total_out = rts_out + ats_out + mts_out;
        let total = total_in + total_out;

        // influence: retweets received per tweet posted
        let influence = if tweets > 0 {
            let value = rts_in as f64 / tweets as f64;
            influence_index.insert(format!("@{user}"), value);
            fmt_num(value)
        } else {
            String::new()
        };
        // dialogue: share of @-messages sent in all @-message traffic
        let dialogue = if ats_in + ats_out > 0 {
            let value = ats_out as f64 / (ats_in + ats_out) as f64;
            dialogue_sum += value;
            dialogue_users += 1;
            fmt_num(value)
        } else {
            String::new()
        };
        // plurality: unique partners per interaction
        let plurality = if total > 0 {
            fmt_num(total_users as f64 / total as f64)
        } else {
            String::new()
        };

        top_users.push(vec![
            user.clone(),
            tweets.to_string(),
            rt_count.to_string(),
            favorite_count.to_string(),
            influence,
            dialogue,
            plurality,
            rts_in.to_string(),
            rts_users_in.to_string(),
            rts_out.to_string(),
            rts_users_out.to_string(),
            ats_in.to_string(),
            ats_users_in.to_string(),
            ats_out.to_string(),
            ats_users_out.to_string(),
            mts_in.to_string(),
            mts_users_in.to_string(),
            mts_out.to_string(),
            mts_users_out.to_string(),
            total_in.to_string(),
            total_users_in.to_string(),
            total_out.to_string(),
            total_users_out.to_string(),
            total.to_string(),
            total_users.to_string(),
        ]);
    }

    // --- top tweets ------------------------------------------------------
    let ranked_engagement = rank(&state.engagement_by_tweet);
    let mut top_tweets = Vec::new();
    for (tid, _) in ranked_engagement.iter().take(MAX_TOP_TWEETS) {
        let Some(snapshot) = state.tweet_snapshots.get(tid) else {
            continue;
        };
        let txt_count = state
            .text_counts
            .get(&snapshot.text)
            .copied()
            .unwrap_or(0);
        top_tweets.push(vec![
            csv_safe_cell(snapshot.text.clone()),
            snapshot.from_user.clone(),
            tid.clone(),
            snapshot.hashtags.clone(),
            snapshot.rt_count.to_string(),
            snapshot.favorite_count.to_string(),
            txt_count.to_string(),
            snapshot.kind.as_str().to_string(),
            snapshot.lang.clone(),
            snapshot.place.clone(),
            snapshot.country.clone(),
            snapshot.source.clone(),
            snapshot.media.clone(),
            snapshot.created_at.clone(),
            snapshot.url.clone(),
        ]);
    }

    // --- word tables -----------------------------------------------------
    let ranked_words = rank_counts(&state.word_counts);
    let mut top_words = Vec::new();
    for (word, times) in ranked_words.iter().take(MAX_TOP_WORDS) {
        top_words.push(vec![
            word.clone(),
            times.to_string(),
            state.words_favorited.get(word).copied().unwrap_or(0).to_string(),
            state.words_retweeted.get(word).copied().unwrap_or(0).to_string(),
        ]);
    }
    let mut top_words_capitalized = Vec::new();
    for (word, times) in rank_counts(&state.capitalized_counts).iter().take(MAX_TOP_WORDS) {
        top_words_capitalized.push(vec![
            word.clone(),
            times.to_string(),
            gender::identify(word).as_str().to_string(),
            state
                .capitalized_favorited
                .get(word)
                .copied()
                .unwrap_or(0)
                .to_string(),
            state
                .capitalized_retweeted
                .get(word)
                .copied()
                .unwrap_or(0)
                .to_string(),
        ]);
    }

    // --- by-period matrices ----------------------------------------------
    let ranked_hashtags = rank_counts(&state.hashtag_counts);
    let mut hashtags_by_period = Vec::new();
    for (hashtag, _) in ranked_hashtags.iter().take(MAX_BY_PERIOD) {
        let mut row = vec![hashtag.clone()];
        for date in &sorted_dates {
            let count = state
                .hashtags_by_date
                .get(*date)
                .and_then(|m| m.get(hashtag))
                .copied()
                .unwrap_or(0);
            row.push(count.to_string());
        }
        hashtags_by_period.push(row);
    }
    let mut words_by_period = Vec::new();
    for (word, _) in ranked_words.iter().take(MAX_BY_PERIOD) {
        let mut row = vec![word.clone()];
        for date in &sorted_dates {
            let count = state
                .words_by_date
                .get(*date)
                .and_then(|m| m.get(word))
                .copied()
                .unwrap_or(0);
            row.push(count.to_string());
        }
        words_by_period.push(row);
    }

    // --- graph nodes -----------------------------------------------------
    let export_comments = schema == SchemaVariant::ExportComments;
    let mut node_attrs = vec!["user_followers INT", "user_following INT"];
    if export_comments {
        node_attrs.push("user_engagement INT");
        node_attrs.push("user_retweets INT");
    }
    let mut node_rows = Vec::new();
    for node in &state.user_nodes {
        let mut row = vec![
            node.name.clone(),
            node.followers.to_string(),
            node.following.to_string(),
        ];
        if export_comments {
            row.push(node.engagement.unwrap_or(0).to_string());
            row.push(
                state
                    .user_retweets
                    .get(&node.name)
                    .copied()
                    .unwrap_or(0)
                    .to_string(),
            );
        }
        node_rows.push(row);
    }

    // --- summary ---------------------------------------------------------
    let tweets = state.seen_ids.len();
    let totals = |kind: TweetKind| InteractionTotals {
        count: state
            .type_counts
            .get(kind.as_str())
            .copied()
            .unwrap_or(0),
        senders: state.interactions.senders(kind),
        receivers: state.interactions.receivers(kind),
    };
    let mention_count = state.interactions.total_sent(TweetKind::Mention);
    let retweets = totals(TweetKind::Retweet);
    let quotes = totals(TweetKind::Quote);
    let replies = totals(TweetKind::Reply);
    let mentions = InteractionTotals {
        count: mention_count,
        senders: state.interactions.senders(TweetKind::Mention),
        receivers: state.interactions.receivers(TweetKind::Mention),
    };
    let interactions = InteractionTotals {
        count: retweets.count + replies.count + mentions.count,
        senders: state.interactions.sent_all.len(),
        receivers: state.interactions.received_all.len(),
    };

    let span_seconds = match (state.min_timestamp, state.max_timestamp) {
        (Some(min), Some(max)) => max - min,
        _ => 0,
    };
    let (time_span, time_unit) = best_fit_unit(span_seconds);
    let tweets_per_unit = if time_span > 0.0 {
        tweets as f64 / time_span
    } else {
        0.0
    };
    let favorites_per_tweet = if tweets > 0 {
        state.global_favorites as f64 / tweets as f64
    } else {
        0.0
    };
    let retweets_per_tweet = if tweets > 0 {
        state.global_retweets as f64 / tweets as f64
    } else {
        0.0
    };

    let tweets_with_emoji = state.row_totals.get("emoji").copied().unwrap_or(0);
    let geonames_matched = state.row_totals.get("in_geonames").copied().unwrap_or(0);
    let format_utc = |ts: Option<i64>| {
        ts.and_then(|t| DateTime::from_timestamp(t, 0))
            .map(|dt| dt.format("%a %b %d %H:%M:%S %Y UTC").to_string())
            .unwrap_or_default()
    };

    let ranked_countries = rank_counts(&state.country_counts);
    let ranked_langs = rank_counts(&state.lang_counts);
    let ranked_sources = rank_counts(&state.source_counts);
    let ranked_urls = rank_counts(&state.url_counts);
    let ranked_retweet_texts = rank(&state.retweets_by_text);
    let ranked_favorite_texts = rank(&state.favorites_by_text);
    let ranked_influence = rank_f64(&influence_index);

    let summary = Summary {
        total_lines: state.total_lines(),
        valid_lines: state.valid_lines(),
        corrupted_lines: state.corrupted_lines,
        duplicate_lines: state.duplicate_lines,
        ads_lines: state.ads_lines,
        language_filtered_lines: state.language_filtered_lines,
        tweets,
        users_tweeting: state.user_tweets.len(),
        original: state.type_counts.get("tweet").copied().unwrap_or(0),
        users_original: state.user_original_tweets.len(),
        users_total: state.all_users.len(),
        countries: state.country_counts.len(),
        dialogue_global: (dialogue_users > 0).then(|| dialogue_sum / dialogue_users as f64),
        emojis: state.emoji_counts.len(),
        tweets_with_emoji,
        favorited: state.global_favorites,
        geocodes: state.row_totals.get("geocode").copied().unwrap_or(0) + geonames_matched,
        geonames_matched,
        hashtags: state.hashtag_counts.len(),
        tweets_with_hashtag: state.row_totals.get("hashtag").copied().unwrap_or(0),
        languages: state.lang_counts.len(),
        media: state.media_counts.len(),
        tweets_with_media: state.row_totals.get("media_url").copied().unwrap_or(0),
        places: state.place_counts.len(),
        tweets_with_place: state.row_totals.get("place").copied().unwrap_or(0),
        retweeted: state.global_retweets,
        sentiment_global: (tweets_with_emoji > 0)
            .then(|| state.global_sentiment as f64 / tweets_with_emoji as f64),
        sources: state.source_counts.len(),
        urls: state.url_counts.len(),
        tweets_with_url: state.row_totals.get("url").copied().unwrap_or(0),
        words: state.word_counts.len(),
        retweets,
        quotes,
        replies,
        mentions,
        interactions,
        top_words: top_keys(&ranked_words, TOP_N),
        top_hashtags: top_keys(&ranked_hashtags, TOP_N),
        top_users: ranked_influence
            .iter()
            .take(TOP_N)
            .map(|(k, _)| k.clone())
            .collect(),
        top_country: ranked_countries.first().map(|(k, _)| k.clone()),
        top_lang: ranked_langs.first().map(|(k, _)| k.clone()),
        top_source: ranked_sources.first().map(|(k, _)| k.clone()),
        top_url: ranked_urls.first().map(|(k, _)| k.clone()),
        top_retweet: quoted_text(&ranked_retweet_texts),
        top_favorite: quoted_text(&ranked_favorite_texts),
        time_span,
        time_unit,
        tweets_per_unit,
        favorites_per_tweet,
        retweets_per_tweet,
        oldest_id: state.min_id,
        newest_id: state.max_id,
        since: format_utc(state.min_timestamp),
        until: format_utc(state.max_timestamp),
    };

    let overview = render_overview(&summary);

    Synthesis {
        top_dates,
        top_users,
        top_tweets,
        top_words,
        top_words_capitalized,
        hashtags_by_period,
        words_by_period,
        node_rows,
        node_attrs,
        summary,
        overview,
    }
}

fn opt_num(value: Option<f64>) -> String {
    value.map(fmt_num).unwrap_or_else(|| "None".to_string())
}

fn opt_str(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "None".to_string())
}

fn list_str(values: &[String]) -> String {
    if values.is_empty() {
        "None".to_string()
    } else {
        values.join(", ")
    }
}

/// The fixed-order, fixed-wording overview. Downstream scripts grep
/// these lines; the order and phrasing must stay put.
fn render_overview(s: &Summary) -> String {
    let unit_singular = s.time_unit.trim_end_matches('s');
    format!(
        "\nTweets: {} from {} users.\n\
         Original: {} from {} users.\n\
         Users: {} senders and receivers.\n\
         \n\
         Countries: {} (top: {}).\n\
         Dialogue: {} global.\n\
         Emojis: {} from {} tweets.\n\
         Favorited: {} ({}/tweet).\n\
         Geocodes: {} ({} from GeoNames).\n\
         Hashtags: {} from {} tweets.\n\
         Languages: {} (top: {}).\n\
         Media: {} from {} tweets.\n\
         Places: {} from {} tweets.\n\
         Retweeted: {} ({}/tweet).\n\
         Sentiment: {} global.\n\
         Sources: {} (top: {}).\n\
         URLs: {} from {} tweets.\n\
         Words: {} approximately.\n\
         \n\
         Retweets: {} from {} senders to {} receivers.\n\
         Quotes: {} from {} senders to {} receivers.\n\
         @-messages: {} from {} senders to {} receivers.\n\
         Mentions: {} from {} senders to {} receivers.\n\
         Interactions: {} from {} senders to {} receivers.\n\
         \n\
         Top words: {}.\n\
         Top hashtags: {}.\n\
         Top users: {}.\n\
         Top URL: {}.\n\
         Top retweet: {}.\n\
         Top favorite: {}.\n\
         \n\
         Time span: {} {}.\n\
         Frequency: {} tweets/{}.\n\
         Oldest ID: {}.\n\
         Newest ID: {}.\n\
         Since: {}.\n\
         Until: {}.",
        s.tweets,
        s.users_tweeting,
        s.original,
        s.users_original,
        s.users_total,
        s.countries,
        opt_str(&s.top_country),
        opt_num(s.dialogue_global),
        s.emojis,
        s.tweets_with_emoji,
        s.favorited,
        fmt_num(s.favorites_per_tweet),
        s.geocodes,
        s.geonames_matched,
        s.hashtags,
        s.tweets_with_hashtag,
        s.languages,
        opt_str(&s.top_lang).to_uppercase(),
        s.media,
        s.tweets_with_media,
        s.places,
        s.tweets_with_place,
        s.retweeted,
        fmt_num(s.retweets_per_tweet),
        opt_num(s.sentiment_global),
        s.sources,
        opt_str(&s.top_source),
        s.urls,
        s.tweets_with_url,
        s.words,
        s.retweets.count,
        s.retweets.senders,
        s.retweets.receivers,
        s.quotes.count,
        s.quotes.senders,
        s.quotes.receivers,
        s.replies.count,
        s.replies.senders,
        s.replies.receivers,
        s.mentions.count,
        s.mentions.senders,
        s.mentions.receivers,
        s.interactions.count,
        s.interactions.senders,
        s.interactions.receivers,
        list_str(&s.top_words),
        list_str(&s.top_hashtags),
        list_str(&s.top_users),
        opt_str(&s.top_url),
        opt_str(&s.top_retweet),
        opt_str(&s.top_favorite),
        fmt_num(s.time_span),
        s.time_unit,
        fmt_num(s.tweets_per_unit),
        unit_singular,
        s.oldest_id.map(|v| v.to_string()).unwrap_or_default(),
        s.newest_id.map(|v| v.to_string()).unwrap_or_default(),
        s.since,
        s.until,
    )
}

/// Write every output artifact to the current working directory.
pub fn write_outputs(
    state: &AggregationState,
    synthesis: &Synthesis,
    cfg: OutputConfig,
) -> std::io::Result<()> {
    let p = Path::new;
    let io_err = |e: csv::Error| std::io::Error::other(e);

    write_rows(p("users.csv"), USERS_HEADER, &state.users_rows, cfg).map_err(io_err)?;
    write_rows(
        p("locations.csv"),
        &[
            "latitude", "longitude", "geo_type", "place", "country", "country_code", "lang",
            "time", "user", "text", "image_url", "url",
        ],
        &state.locations,
        cfg,
    )
    .map_err(io_err)?;
    write_rows(
        p("top_dates.csv"),
        &[
            "date", "users", "tweets", "original", "retweets", "replies", "mentions", "hashtags",
            "sentiment",
        ],
        &synthesis.top_dates,
        cfg,
    )
    .map_err(io_err)?;
    write_rows(
        p("top_tweets.csv"),
        &[
            "text", "from_user", "tweet_id", "hashtags", "rt_count", "favorite_count",
            "tweet_count", "type", "lang", "place", "country", "source", "media", "date", "url",
        ],
        &synthesis.top_tweets,
        cfg,
    )
    .map_err(io_err)?;
    write_rows(
        p("top_users.csv"),
        &[
            "from_user", "tweets_published", "retweet_count", "favorite_count", "influence",
            "dialogue_%", "plurality_%", "retweets_in", "retweets_users_in", "retweets_out",
            "retweets_users_out", "replies_in", "replies_users_in", "replies_out",
            "replies_users_out", "mentions_in", "mentions_users_in", "mentions_out",
            "mentions_users_out", "total_in", "total_users_in", "total_out", "total_users_out",
            "total", "total_users",
        ],
        &synthesis.top_users,
        cfg,
    )
    .map_err(io_err)?;

    // By-period matrices carry one column per observed date.
    let mut period_header: Vec<&str> = vec!["hashtag"];
    let date_strs: Vec<&str> = state.dates.iter().map(String::as_str).collect();
    period_header.extend(&date_strs);
    write_rows(
        p("top_hashtags_by_period.csv"),
        &period_header,
        &synthesis.hashtags_by_period,
        cfg,
    )
    .map_err(io_err)?;
    period_header[0] = "word";
    write_rows(
        p("top_words_by_period.csv"),
        &period_header,
        &synthesis.words_by_period,
        cfg,
    )
    .map_err(io_err)?;

    write_rows(
        p("top_words.csv"),
        &["word", "times_mentioned", "likes", "retweets"],
        &synthesis.top_words,
        cfg,
    )
    .map_err(io_err)?;
    write_rows(
        p("top_words_capitalized.csv"),
        &["word", "times_mentioned", "name_gender", "likes", "retweets"],
        &synthesis.top_words_capitalized,
        cfg,
    )
    .map_err(io_err)?;

    // Ranked value tables.
    write_ranked(
        p("top_countries.csv"),
        &["country", "tweets", "tweets_%"],
        &rank_counts(&state.country_counts),
        true,
        cfg,
    )
    .map_err(io_err)?;
    write_ranked_utf16(
        p("top_emojis.UTF16.csv"),
        &["emoji", "times_tweeted"],
        &rank_counts(&state.emoji_counts),
        cfg,
    )
    .map_err(io_err)?;
    write_ranked(
        p("top_favorites.csv"),
        &["tweet", "favorite_count"],
        &rank(&state.favorites_by_text),
        false,
        cfg,
    )
    .map_err(io_err)?;
    write_ranked(
        p("top_hashtags.csv"),
        &["hashtag", "times_mentioned"],
        &rank_counts(&state.hashtag_counts),
        false,
        cfg,
    )
    .map_err(io_err)?;
    write_ranked(
        p("top_lang.csv"),
        &["lang", "tweets", "tweets_%"],
        &rank_counts(&state.lang_counts),
        true,
        cfg,
    )
    .map_err(io_err)?;
    write_ranked(
        p("top_media.csv"),
        &["media_url", "times_tweeted"],
        &rank_counts(&state.media_counts),
        false,
        cfg,
    )
    .map_err(io_err)?;
    write_ranked(
        p("top_places.csv"),
        &["place", "tweets", "tweets_%"],
        &rank_counts(&state.place_counts),
        true,
        cfg,
    )
    .map_err(io_err)?;
    write_ranked(
        p("top_quotes.csv"),
        &["tweet", "times_quoted"],
        &rank_counts(&state.quote_counts),
        false,
        cfg,
    )
    .map_err(io_err)?;
    write_ranked(
        p("top_replies.csv"),
        &["tweet", "reply_count"],
        &rank_counts(&state.reply_counts),
        false,
        cfg,
    )
    .map_err(io_err)?;
    write_ranked(
        p("top_retweets.csv"),
        &["tweet", "rt_count"],
        &rank(&state.retweets_by_text),
        false,
        cfg,
    )
    .map_err(io_err)?;
    write_ranked_utf16(
        p("top_sentiments.UTF16.csv"),
        &["tweet", "sent_value"],
        &rank(&state.sentiment_by_text),
        cfg,
    )
    .map_err(io_err)?;
    write_ranked(
        p("top_source.csv"),
        &["source", "tweets", "tweets_%"],
        &rank_counts(&state.source_counts),
        true,
        cfg,
    )
    .map_err(io_err)?;
    write_ranked(
        p("top_text.csv"),
        &["tweet", "txt_count"],
        &rank_counts(&state.text_counts),
        false,
        cfg,
    )
    .map_err(io_err)?;
    write_ranked(
        p("top_type.csv"),
        &["type", "tweets", "tweets_%"],
        &rank_counts(&state.type_counts),
        true,
        cfg,
    )
    .map_err(io_err)?;
    write_ranked(
        p("top_URLs.csv"),
        &["url", "times_tweeted"],
        &rank_counts(&state.url_counts),
        false,
        cfg,
    )
    .map_err(io_err)?;

    // Unique-user tables.
    let by_users = |sets: &HashMap<String, HashSet<String>>| {
        let counts: HashMap<String, u64> = sets
            .iter()
            .map(|(k, v)| (k.clone(), v.len() as u64))
            .collect();
        rank_counts(&counts)
    };
    write_ranked(
        p("top_hashtags_by_users.csv"),
        &["hashtag", "unique_users"],
        &by_users(&state.hashtag_users),
        false,
        cfg,
    )
    .map_err(io_err)?;
    write_ranked(
        p("top_media_by_users.csv"),
        &["media_url", "unique_users"],
        &by_users(&state.media_users),
        false,
        cfg,
    )
    .map_err(io_err)?;
    write_ranked(
        p("top_urls_by_users.csv"),
        &["url", "unique_users"],
        &by_users(&state.url_users),
        false,
        cfg,
    )
    .map_err(io_err)?;

    // Graph exports: interaction networks carry tweet metadata on their
    // edges; hashtag and URL networks do not. Only the hashtag
    // co-occurrence graph is undirected.
    let edge_attrs = [
        "type VARCHAR",
        "tweet_id VARCHAR",
        "text VARCHAR",
        "favorite_count INT",
        "rt_count INT",
        "time INT",
    ];
    let mut networks: BTreeMap<&str, &Vec<Vec<String>>> = BTreeMap::new();
    for kind in KINDS {
        if let Some(edges) = state.interactions.edges.get(crate::interactions::network_name(kind)) {
            networks.insert(crate::interactions::network_name(kind), edges);
        }
    }
    for (name, edges) in &state.networks {
        networks.insert(*name, edges);
    }
    for (name, edges) in networks {
        let with_meta = !name.contains("hashtags") && !name.contains("URLs");
        let attrs: &[&str] = if with_meta { &edge_attrs } else { &[] };
        write_gdf(
            Path::new(&format!("network_{name}.gdf")),
            &synthesis.node_rows,
            &synthesis.node_attrs,
            edges,
            attrs,
            name != "hashtags",
        )
        .map_err(io_err)?;
    }

    write_wordcloud(p("wordcloud_words.txt"), &state.word_counts)?;
    write_wordcloud(p("wordcloud_hashtags.txt"), &state.hashtag_counts)?;

    let json = serde_json::to_string_pretty(&synthesis.summary)?;
    std::fs::write("summary.json", json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::bump;

    #[test]
    fn number_formatting_strips_integer_decimals() {
        assert_eq!(fmt_num(3.0), "3");
        assert_eq!(fmt_num(0.5), "0.50");
        assert_eq!(fmt_num(1.234), "1.23");
    }

    #[test]
    fn time_units_fit_magnitude() {
        assert_eq!(best_fit_unit(30), (30.0, "seconds"));
        assert_eq!(best_fit_unit(120), (2.0, "minutes"));
        assert_eq!(best_fit_unit(7200), (2.0, "hours"));
        assert_eq!(best_fit_unit(172800), (2.0, "days"));
    }

    #[test]
    fn indices_follow_omit_rules() {
        let mut state = AggregationState::default();
        state.all_users.insert("alice".to_string());
        state.user_tweets.insert("alice".to_string(), 4);
        // alice received 2 retweets
        state.interactions.record(
            "bob",
            "alice",
            TweetKind::Retweet,
            &crate::interactions::EdgeMeta {
                tweet_id: "1",
                text: "t",
                favorite_count: 0,
                rt_count: 0,
                time: 0,
            },
        );
        state.interactions.record(
            "carol",
            "alice",
            TweetKind::Retweet,
            &crate::interactions::EdgeMeta {
                tweet_id: "2",
                text: "t",
                favorite_count: 0,
                rt_count: 0,
                time: 0,
            },
        );
        let synthesis = synthesize(&state, SchemaVariant::Current);
        let alice = synthesis
            .top_users
            .iter()
            .find(|row| row[0] == "alice")
            .unwrap();
        // influence = 2 retweets in / 4 tweets
        assert_eq!(alice[4], "0.50");
        // no @-message traffic: dialogue omitted
        assert_eq!(alice[5], "");
        // 2 unique partners over 2 interactions
        assert_eq!(alice[6], "1");
        assert_eq!(synthesis.summary.dialogue_global, None);
    }

    #[test]
    fn overview_section_order_is_fixed() {
        let mut state = AggregationState::default();
        state.rows_read = 1;
        state.seen_ids.insert("1".to_string());
        bump(&mut state.word_counts, "hello");
        let synthesis = synthesize(&state, SchemaVariant::Current);
        let out = &synthesis.overview;
        let i_tweets = out.find("Tweets:").unwrap();
        let i_countries = out.find("Countries:").unwrap();
        let i_interactions = out.find("Interactions:").unwrap();
        let i_top_words = out.find("Top words:").unwrap();
        let i_span = out.find("Time span:").unwrap();
        assert!(i_tweets < i_countries);
        assert!(i_countries < i_interactions);
        assert!(i_interactions < i_top_words);
        assert!(i_top_words < i_span);
        assert!(out.contains("Words: 1 approximately."));
    }

    #[test]
    fn top_tweets_ranked_by_engagement() {
        let mut state = AggregationState::default();
        for (tid, engagement, text) in [("1", 5i64, "five"), ("2", 9, "nine"), ("3", 1, "one")] {
            state.engagement_by_tweet.insert(tid.to_string(), engagement);
            state.tweet_snapshots.insert(
                tid.to_string(),
                crate::state::TweetSnapshot {
                    text: text.to_string(),
                    from_user: "u".to_string(),
                    hashtags: String::new(),
                    rt_count: 0,
                    favorite_count: engagement,
                    kind: TweetKind::Tweet,
                    lang: "en".to_string(),
                    place: String::new(),
                    country: String::new(),
                    source: String::new(),
                    media: String::new(),
                    created_at: String::new(),
                    url: String::new(),
                },
            );
        }
        let synthesis = synthesize(&state, SchemaVariant::Current);
        let order: Vec<&str> = synthesis.top_tweets.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(order, ["nine", "five", "one"]);
    }
}
