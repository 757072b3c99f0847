//! The streaming aggregation pass.
//!
//! One forward pass over the input rows, row order preserved, no
//! backtracking. Each row is structurally validated, normalized,
//! deduplicated and folded into the [`AggregationState`]. Row-level
//! failures are counted and logged; they never abort the pass.

use std::collections::HashSet;
use std::io::Read;

use chrono::{DateTime, FixedOffset};
use log::{info, warn};

use crate::geo::Gazetteer;
use crate::interactions::EdgeMeta;
use crate::schema::{
    AD_SOURCES, ColumnMap, Record, RowError, SchemaVariant, TweetKind, normalize_record,
};
use crate::state::{AggregationState, TweetSnapshot, UserNode, add, bump};
use crate::text;

/// Everything the pass needs besides the rows themselves.
pub struct EngineConfig<'a> {
    pub schema: SchemaVariant,
    pub cols: &'a ColumnMap,
    pub time_format: &'a str,
    pub utc_offset: FixedOffset,
    /// Column index of the consider filter, when configured.
    pub consider_column: Option<usize>,
    /// Language allow-list for ExportComments inputs; empty keeps all.
    pub languages: &'a [String],
    pub gazetteer: &'a Gazetteer,
}

/// Run the pass over all records following the header.
pub fn run<R: Read>(
    reader: &mut csv::Reader<R>,
    header: &csv::StringRecord,
    cfg: &EngineConfig,
) -> AggregationState {
    let mut state = AggregationState::default();

    for result in reader.records() {
        state.rows_read += 1;
        let line = state.rows_read + 1;
        if state.rows_read % 100_000 == 0 {
            info!("read {} lines", state.rows_read);
        }

        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("line {line}: {e}");
                state.corrupted_lines += 1;
                continue;
            }
        };

        // Structural validation: the field count must match the header,
        // and repeated header rows (concatenated exports) are rejected.
        if row.len() != cfg.cols.len() {
            warn!(
                "line {line}: got {} columns, expected {}",
                row.len(),
                cfg.cols.len()
            );
            state.corrupted_lines += 1;
            continue;
        }
        if row.iter().eq(header.iter()) {
            warn!("line {line}: duplicate header");
            state.corrupted_lines += 1;
            continue;
        }

        if let Err(e) = process_row(&row, cfg, &mut state) {
            warn!("line {line}: {e}");
            state.corrupted_lines += 1;
        }
    }
    state
}

fn process_row(
    row: &csv::StringRecord,
    cfg: &EngineConfig,
    state: &mut AggregationState,
) -> Result<(), RowError> {
    let rec = normalize_record(row, cfg.schema, cfg.cols)?;

    // Promoted content and unwanted languages are only identifiable in
    // ExportComments data.
    if cfg.schema == SchemaVariant::ExportComments {
        if AD_SOURCES.contains(&rec.source.as_str()) {
            state.ads_lines += 1;
            return Ok(());
        }
        if !cfg.languages.is_empty() && !cfg.languages.iter().any(|l| *l == rec.lang) {
            state.language_filtered_lines += 1;
            return Ok(());
        }
    }

    if state.seen_ids.contains(&rec.id) {
        state.duplicate_lines += 1;
        return Ok(());
    }
    state.seen_ids.insert(rec.id.clone());

    // Rows with an empty consider column are dropped silently.
    if let Some(idx) = cfg.consider_column {
        if row.get(idx).is_none_or(|v| v.is_empty()) {
            return Ok(());
        }
    }

    let numeric_id = rec.id.trim().parse::<i64>().map_err(|_| RowError::BadNumber {
        field: "id",
        value: rec.id.clone(),
    })?;
    state.track_id(numeric_id);
    state.track_timestamp(rec.time);

    let date = DateTime::from_timestamp(rec.time, 0)
        .ok_or_else(|| RowError::BadTimestamp(rec.time.to_string()))?
        .with_timezone(&cfg.utc_offset);
    let str_date = date.format(cfg.time_format).to_string();
    state.dates.insert(str_date.clone());

    // Tokenize: every token belongs to exactly one class.
    let mut has_emoji = false;
    let mut sent_value = 0i64;
    let mut token_hashtags: Vec<String> = Vec::new();
    let mut token_mentions: Vec<String> = Vec::new();
    let mut token_urls: Vec<String> = Vec::new();
    let mut words_read: HashSet<String> = HashSet::new();
    let mut capitalized_read: HashSet<String> = HashSet::new();

    for token in rec.text.split_whitespace() {
        if text::is_emoji(token) {
            has_emoji = true;
            sent_value += text::emoji_sentiment(token);
            bump(&mut state.emoji_counts, token);
        } else if text::is_hashtag(token) {
            if let Some(body) = text::extract_hashtag(token) {
                token_hashtags.push(format!("#{body}"));
            }
        } else if text::is_mention(token) {
            if let Some(user) = text::extract_mention(token) {
                token_mentions.push(user);
            }
        } else if text::is_url(token) {
            token_urls.push(token.to_string());
        } else {
            let word = text::clean_word(token);
            if text::is_valid_word(&word) {
                if token == text::capitalize(token) {
                    capitalized_read.insert(text::capitalize(&word));
                }
                words_read.insert(word);
            }
        }
    }

    // Lists from dedicated columns win over token extraction.
    let hashtags = rec.hashtags.clone().unwrap_or(token_hashtags);
    let mentions = rec.mentions.clone().unwrap_or(token_mentions);
    let urls = rec.urls.clone().unwrap_or(token_urls);

    if has_emoji {
        state.bump_date_metric("sentiment", &str_date, sent_value);
        state.sentiment_by_text.insert(rec.text.clone(), sent_value);
        *state.row_totals.entry("emoji").or_insert(0) += 1;
        state.global_sentiment += sent_value;
    }

    for word in &words_read {
        bump(&mut state.word_counts, word);
        add(&mut state.words_favorited, word, rec.favorite_count);
        *state
            .words_by_date
            .entry(str_date.clone())
            .or_default()
            .entry(word.clone())
            .or_insert(0) += 1;
    }
    for word in &capitalized_read {
        bump(&mut state.capitalized_counts, word);
        add(&mut state.capitalized_favorited, word, rec.favorite_count);
    }

    let user_name = rec.from_user.to_lowercase();
    state.all_users.insert(user_name.clone());

    let tweet_url = if cfg.schema == SchemaVariant::ExportComments {
        rec.status_url.clone()
    } else {
        format!("https://www.twitter.com/{user_name}/status/{}", rec.id)
    };

    // Canonical grouping id: retweets collapse onto the original tweet.
    let tid = rec.rt_id.clone().unwrap_or_else(|| rec.id.clone());
    let engagement = rec.rt_count + rec.favorite_count;
    let snapshot_text = rec.rt_text.clone().unwrap_or_else(|| rec.text.clone());
    let user_posting = rec
        .rt_user
        .clone()
        .unwrap_or_else(|| rec.from_user.clone());

    if engagement > 0 {
        add(&mut state.engagement_by_tweet, &tid, engagement);
        if !state.tweet_snapshots.contains_key(&tid) {
            let snapshot = make_snapshot(&rec, cfg.schema, &snapshot_text, &user_posting, &hashtags, &tid);
            state.tweet_snapshots.insert(tid.clone(), snapshot);
        }
    }

    if !state.seen_posters.contains(&user_name) {
        state.users_rows.push(rec.profile.clone());
        if cfg.schema.has_user_nodes() {
            state.user_nodes.push(UserNode {
                name: user_name.clone(),
                followers: rec.followers,
                following: rec.following,
                engagement: (cfg.schema == SchemaVariant::ExportComments).then_some(engagement),
            });
        }
        state.seen_posters.insert(user_name.clone());
    }

    // Core per-row statistics.
    state.bump_date_metric(rec.kind.as_str(), &str_date, 1);
    bump(&mut state.text_counts, &snapshot_text);
    bump(&mut state.lang_counts, &rec.lang);
    bump(&mut state.source_counts, &rec.source);
    bump(&mut state.type_counts, rec.kind.as_str());
    *state.user_tweets.entry(user_name.clone()).or_insert(0) += 1;
    state
        .users_by_date
        .entry(str_date.clone())
        .or_default()
        .insert(user_name.clone());

    if rec.kind == TweetKind::Tweet {
        *state
            .user_original_tweets
            .entry(user_name.clone())
            .or_insert(0) += 1;
        for word in &words_read {
            add(&mut state.words_retweeted, word, rec.rt_count);
        }
        for word in &capitalized_read {
            add(&mut state.capitalized_retweeted, word, rec.rt_count);
        }
    }

    let meta = EdgeMeta {
        tweet_id: &rec.id,
        text: &rec.text,
        favorite_count: rec.favorite_count,
        rt_count: rec.rt_count,
        time: rec.time,
    };

    // Resolve the interaction target for retweets, replies and quotes.
    let mut target: Option<String> = None;
    if matches!(
        rec.kind,
        TweetKind::Retweet | TweetKind::Reply | TweetKind::Quote
    ) {
        let (field, raw) = match rec.kind {
            TweetKind::Retweet => ("rt_user", rec.rt_user.as_deref()),
            TweetKind::Reply => ("reply_to_user", rec.reply_to_user.as_deref()),
            TweetKind::Quote => ("quoted_user", rec.quoted_user.as_deref()),
            _ => unreachable!(),
        };
        let resolved = raw
            .filter(|t| !t.is_empty())
            .ok_or(RowError::MissingField(field))?
            .to_lowercase();
        state
            .interactions
            .record(&user_name, &resolved, rec.kind, &meta);
        state.all_users.insert(resolved.clone());
        target = Some(resolved);
    }

    if rec.rt_count > 0 {
        if rec.kind != TweetKind::Retweet {
            state.global_retweets += rec.rt_count;
            add(&mut state.user_retweets, &user_name, rec.rt_count);
        }
        state
            .retweets_by_text
            .insert(snapshot_text.clone(), rec.rt_count);
    }

    if rec.favorite_count > 0 {
        state.global_favorites += rec.favorite_count;
        add(&mut state.user_favorites, &user_name, rec.favorite_count);
        add(&mut state.favorites_by_text, &rec.text, rec.favorite_count);
    }

    // Mentions, minus the one already counted as the interaction target.
    if !mentions.is_empty() {
        *state.row_totals.entry("mention").or_insert(0) += 1;
        for mention in &mentions {
            let mention = text::remove_punctuation_keep_underscore(mention).to_lowercase();
            if mention.is_empty() || Some(&mention) == target.as_ref() {
                continue;
            }
            state.bump_date_metric("mention", &str_date, 1);
            state
                .interactions
                .record(&user_name, &mention, TweetKind::Mention, &meta);
            state.all_users.insert(mention);
        }
    }

    if !hashtags.is_empty() {
        *state.row_totals.entry("hashtag").or_insert(0) += 1;
        // Normalize and deduplicate, keeping first-occurrence order so
        // the pair expansion below is stable.
        let mut valid: Vec<String> = Vec::new();
        for hashtag in &hashtags {
            let normalized = format!("#{}", text::clean_word(hashtag));
            if !valid.contains(&normalized) {
                valid.push(normalized);
            }
        }
        for hashtag in &valid {
            state.bump_date_metric("hashtag", &str_date, 1);
            *state
                .hashtags_by_date
                .entry(str_date.clone())
                .or_default()
                .entry(hashtag.clone())
                .or_insert(0) += 1;
            bump(&mut state.hashtag_counts, hashtag);
            state
                .hashtag_users
                .entry(hashtag.clone())
                .or_default()
                .insert(user_name.clone());
            push_edge(state, "hashtags_users", &[user_name.as_str(), hashtag.as_str()]);
        }
        // All-pairs co-occurrence over the deduplicated list.
        for i in 0..valid.len() {
            for j in (i + 1)..valid.len() {
                push_edge(state, "hashtags", &[valid[i].as_str(), valid[j].as_str()]);
            }
        }
    }

    if !urls.is_empty() {
        *state.row_totals.entry("url").or_insert(0) += 1;
        for url in &urls {
            let Some(domain) = text::url_domain(url) else {
                continue;
            };
            bump(&mut state.url_counts, url);
            state
                .url_users
                .entry(url.clone())
                .or_default()
                .insert(user_name.clone());
            push_edge(state, "URLs_full", &[user_name.as_str(), url.as_str()]);
            push_edge(state, "URLs", &[user_name.as_str(), domain.as_str()]);
            if url.contains("facebook.com") || url.contains("fb.me") {
                push_edge(state, "URLs_facebook", &[user_name.as_str(), url.as_str()]);
            }
            if url.contains("youtube.com") || url.contains("youtu.be") {
                push_edge(state, "URLs_youtube", &[user_name.as_str(), url.as_str()]);
            }
        }
    }

    if cfg.schema.has_extended_fields() {
        if rec.kind == TweetKind::Quote {
            if let Some(quoted) = rec.quoted_text.as_deref().filter(|t| !t.is_empty()) {
                bump(&mut state.quote_counts, quoted);
            }
        }
        if rec.kind == TweetKind::Reply {
            if let Some(reply_id) = rec.reply_to_id.as_deref().filter(|t| !t.is_empty()) {
                bump(&mut state.reply_counts, reply_id);
            }
        }

        if !rec.media_url.is_empty() {
            *state.row_totals.entry("media_url").or_insert(0) += 1;
            bump(&mut state.media_counts, &rec.media_url);
            state
                .media_users
                .entry(rec.media_url.clone())
                .or_default()
                .insert(user_name.clone());
        }

        let mut geo_name = None;
        if !rec.place.is_empty() {
            *state.row_totals.entry("place").or_insert(0) += 1;
            bump(&mut state.country_counts, &rec.country);
            bump(
                &mut state.place_counts,
                &format!("{} ({})", rec.place, rec.country),
            );
            geo_name = Some(
                rec.place
                    .split(',')
                    .next()
                    .unwrap_or("")
                    .replace('-', "")
                    .to_lowercase(),
            );
        }

        if rec.geo_type.eq_ignore_ascii_case("point") {
            *state.row_totals.entry("geocode").or_insert(0) += 1;
            state.locations.push(location_row(
                &rec,
                &rec.latitude,
                &rec.longitude,
                "point",
                &tweet_url,
            ));
        } else if let Some(geo_name) = geo_name {
            if let Some((lat, lon, label)) = cfg.gazetteer.lookup(&geo_name, &rec.country_code) {
                *state.row_totals.entry("in_geonames").or_insert(0) += 1;
                state
                    .locations
                    .push(location_row(&rec, &lat, &lon, &label, &tweet_url));
            }
        }
    }

    Ok(())
}

fn make_snapshot(
    rec: &Record,
    schema: SchemaVariant,
    snapshot_text: &str,
    user_posting: &str,
    hashtags: &[String],
    tid: &str,
) -> TweetSnapshot {
    let (place, url, media) = match schema {
        SchemaVariant::ExportComments => {
            (rec.user_location.clone(), rec.status_url.clone(), String::new())
        }
        _ => {
            let media = if rec.media_url.is_empty() {
                rec.urls.clone().unwrap_or_default().join(", ")
            } else {
                rec.media_url.clone()
            };
            (
                rec.place.clone(),
                format!("https://www.twitter.com/{user_posting}/status/{tid}"),
                media,
            )
        }
    };
    TweetSnapshot {
        text: snapshot_text.to_string(),
        from_user: user_posting.to_string(),
        hashtags: hashtags.join(", "),
        rt_count: rec.rt_count,
        favorite_count: rec.favorite_count,
        kind: rec.kind,
        lang: rec.lang.clone(),
        place,
        country: rec.country.clone(),
        source: rec.source.clone(),
        media,
        created_at: rec.created_at.clone(),
        url,
    }
}

fn location_row(rec: &Record, lat: &str, lon: &str, geo_type: &str, tweet_url: &str) -> Vec<String> {
    vec![
        lat.to_string(),
        lon.to_string(),
        geo_type.to_string(),
        rec.place.clone(),
        rec.country.clone(),
        rec.country_code.clone(),
        rec.lang.clone(),
        rec.time.to_string(),
        rec.from_user.clone(),
        rec.text.clone(),
        rec.user_image_url.clone(),
        tweet_url.to_string(),
    ]
}

fn push_edge(state: &mut AggregationState, network: &'static str, cells: &[&str]) {
    let edge: Vec<String> = cells
        .iter()
        .map(|c| crate::interactions::edge_cell(c))
        .collect();
    state.networks.entry(network).or_default().push(edge);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LEGACY_HEADER, classify_schema};

    fn run_over(csv_text: &str) -> AggregationState {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(csv_text.as_bytes());
        let mut records = reader.records();
        let header = records.next().unwrap().unwrap();
        drop(records);
        let header_fields: Vec<String> = header.iter().map(|s| s.to_string()).collect();
        let schema = classify_schema(&header_fields);
        let cols = ColumnMap::from_header(&header_fields);
        let gazetteer = Gazetteer::default();
        let cfg = EngineConfig {
            schema,
            cols: &cols,
            time_format: "%d/%m/%Y",
            utc_offset: FixedOffset::east_opt(0).unwrap(),
            consider_column: None,
            languages: &[],
            gazetteer: &gazetteer,
        };
        // Re-read from scratch so the engine sees rows after the header.
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(csv_text.as_bytes());
        let mut header_again = csv::StringRecord::new();
        reader.read_record(&mut header_again).unwrap();
        run(&mut reader, &header_again, &cfg)
    }

    #[test]
    fn legacy_retweet_records_interaction() {
        let state = run_over(
            "text,id,from_user,created_at,time\n\
             RT @alice: hello world,1,Bob,x,1500000000\n",
        );
        assert_eq!(state.valid_lines(), 1);
        let sent = state.interactions.sent_dir(TweetKind::Retweet).unwrap();
        assert_eq!(sent.count_for("bob"), 1);
        let received = state.interactions.received_dir(TweetKind::Retweet).unwrap();
        assert_eq!(received.count_for("alice"), 1);
        assert_eq!(state.type_counts["retweet"], 1);
    }

    #[test]
    fn duplicate_ids_are_dropped_from_all_aggregates() {
        let state = run_over(
            "text,id,from_user,created_at,time\n\
             unique words here,1,bob,x,1500000000\n\
             unique words here,1,bob,x,1500000000\n",
        );
        assert_eq!(state.duplicate_lines, 1);
        assert_eq!(state.valid_lines(), 1);
        assert_eq!(state.word_counts.get("unique"), Some(&1));
        assert_eq!(state.user_tweets["bob"], 1);
    }

    #[test]
    fn corrupted_and_header_rows_are_counted() {
        let state = run_over(
            "text,id,from_user,created_at,time\n\
             short row,1,bob\n\
             text,id,from_user,created_at,time\n\
             fine row,2,bob,x,1500000000\n",
        );
        assert_eq!(state.corrupted_lines, 2);
        assert_eq!(state.valid_lines(), 1);
        assert_eq!(
            state.total_lines(),
            state.valid_lines() + state.corrupted_lines + state.duplicate_lines + 1
        );
    }

    #[test]
    fn hashtag_pairs_expand_all_combinations() {
        let state = run_over(
            "text,id,from_user,created_at,time\n\
             saying #a #b #c today,1,bob,x,1500000000\n",
        );
        assert_eq!(state.networks["hashtags"].len(), 3);
        assert_eq!(state.networks["hashtags_users"].len(), 3);
        assert_eq!(state.hashtag_counts.len(), 3);
        assert_eq!(state.row_totals["hashtag"], 1);
    }

    #[test]
    fn engagement_accumulates_on_canonical_id() {
        // Current-schema rows: an original with 10 favorites and a
        // retweet of it carrying 3 retweets.
        let header: Vec<String> = crate::schema::CURRENT_HEADER
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut original = vec![String::new(); header.len()];
        let mut retweet = vec![String::new(); header.len()];
        let set = |row: &mut Vec<String>, name: &str, value: &str| {
            let idx = header.iter().position(|h| h == name).unwrap();
            row[idx] = value.to_string();
        };
        set(&mut original, "text", "original tweet");
        set(&mut original, "from_user", "alice");
        set(&mut original, "id", "100");
        set(&mut original, "type", "tweet");
        set(&mut original, "rt_count", "0");
        set(&mut original, "favorite_count", "10");
        set(&mut original, "time", "1500000000");
        set(&mut retweet, "text", "RT @alice: original tweet");
        set(&mut retweet, "from_user", "bob");
        set(&mut retweet, "id", "101");
        set(&mut retweet, "type", "retweet");
        set(&mut retweet, "rt_count", "3");
        set(&mut retweet, "favorite_count", "0");
        set(&mut retweet, "time", "1500000100");
        set(&mut retweet, "rt_id", "100");
        set(&mut retweet, "rt_user", "alice");
        set(&mut retweet, "rt_text", "original tweet");

        let mut csv_text = header.join(",") + "\n";
        csv_text.push_str(&original.join(","));
        csv_text.push('\n');
        csv_text.push_str(&retweet.join(","));
        csv_text.push('\n');

        let state = run_over(&csv_text);
        assert_eq!(state.valid_lines(), 2);
        assert_eq!(state.engagement_by_tweet["100"], 13);
        assert_eq!(state.tweet_snapshots.len(), 1);
        assert_eq!(state.tweet_snapshots["100"].from_user, "alice");
    }

    #[test]
    fn consider_filter_skips_silently() {
        let header: Vec<String> = LEGACY_HEADER.iter().map(|s| s.to_string()).collect();
        let csv_text = "text,id,from_user,created_at,time\n\
                        with value,1,bob,x,1500000000\n\
                        without value,2,carol,,1500000001\n";
        let cols = ColumnMap::from_header(&header);
        let gazetteer = Gazetteer::default();
        let cfg = EngineConfig {
            schema: SchemaVariant::LegacyAggregator,
            cols: &cols,
            time_format: "%d/%m/%Y",
            utc_offset: FixedOffset::east_opt(0).unwrap(),
            consider_column: cols.position("created_at"),
            languages: &[],
            gazetteer: &gazetteer,
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(csv_text.as_bytes());
        let mut header_rec = csv::StringRecord::new();
        reader.read_record(&mut header_rec).unwrap();
        let state = run(&mut reader, &header_rec, &cfg);
        assert_eq!(state.corrupted_lines, 0);
        assert_eq!(state.duplicate_lines, 0);
        // Filtered row is absent from aggregates but still inside the
        // arithmetic valid count.
        assert_eq!(state.valid_lines(), 2);
        assert!(!state.user_tweets.contains_key("carol"));
    }

    #[test]
    fn url_domains_and_host_specific_networks() {
        let state = run_over(
            "text,id,from_user,created_at,time\n\
             watch https://www.youtube.com/watch?v=1 now,1,bob,x,1500000000\n",
        );
        assert_eq!(state.url_counts.len(), 1);
        assert_eq!(state.networks["URLs"][0][1], "youtube.com");
        assert!(state.networks.contains_key("URLs_youtube"));
        assert!(!state.networks.contains_key("URLs_facebook"));
    }
}
