//! Input schema detection and row normalization.
//!
//! Four header shapes are recognized: the current collector format, a
//! Gephi edge-list export, the YourTwapperKeeper legacy aggregator
//! format and the ExportComments tweet export. Detection happens once
//! per file from the header; afterwards every row is normalized into a
//! [`Record`] and the aggregation pass is schema-agnostic.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use thiserror::Error;

/// Column layout of the current collector output.
pub const CURRENT_HEADER: &[&str] = &[
    "text", "reply_to_user_id", "from_user", "id", "from_user_id", "lang", "source",
    "user_image_url", "geo_type", "latitude", "longitude", "created_at", "time", "type",
    "rt_count", "favorite_count", "place", "country", "country_code", "hashtags", "urls",
    "media_expanded_url", "media_url", "bounding_box", "mentions_user", "mentions_user_id",
    "reply_to_user", "reply_to_id", "rt_text", "rt_user_id", "rt_user", "rt_id", "rt_source",
    "rt_created_at", "quoted_text", "quoted_id", "quoted_user", "quoted_user_id",
    "quoted_created_at", "quoted_source", "user_full_name", "user_tweets", "user_followers",
    "user_following", "user_listed", "user_favorited", "user_created_at", "user_lang",
    "user_location", "user_time_zone", "user_description", "user_url", "user_protected_tweets",
    "user_default_layout", "user_default_image", "user_verified", "link",
];

/// Column layout of the users.csv output.
pub const USERS_HEADER: &[&str] = &[
    "from_user", "from_user_id", "user_image_url", "user_full_name", "user_tweets",
    "user_followers", "user_following", "user_listed", "user_favorited", "user_created_at",
    "user_lang", "user_location", "user_time_zone", "user_description", "user_url",
    "user_protected_tweets", "user_default_layout", "user_default_image", "user_verified",
];

/// Columns every YourTwapperKeeper export carries.
pub const LEGACY_HEADER: &[&str] = &["text", "id", "from_user", "created_at", "time"];

/// Columns an ExportComments tweet export carries (normalized names,
/// ignoring the unnamed line-number columns).
pub const EXPORT_COMMENTS_HEADER: &[&str] = &[
    "name", "username", "tweet_id_(click_to_view_url)", "retweets", "comments", "favorites",
    "is_retweet?", "date", "tweet_text", "author_followers", "author_friends",
    "author_favorites", "author_statuses", "author_bio", "author_image", "author_location",
    "author_verified", "tweet_source", "status_url",
];

/// Tweet sources that identify promoted content in ExportComments data.
pub const AD_SOURCES: &[&str] = &[
    "advertiser-interface",
    "Twitter for Advertisers",
    "Twitter Ads",
    "simpleads-ui",
    "Sprinklr",
    "Sprinklr Publishing",
    "CTW AMS",
];

/// Timestamp formats tried, in order, for the ExportComments date column.
const EC_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d/%m/%y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

/// One of the recognized input layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVariant {
    Current,
    GephiEdges,
    LegacyAggregator,
    ExportComments,
}

impl SchemaVariant {
    /// Gephi edge lists carry no profile data, so no user nodes are
    /// collected for them.
    pub fn has_user_nodes(self) -> bool {
        !matches!(self, SchemaVariant::GephiEdges)
    }

    /// Quote/reply/media/place/geocode handling only applies to inputs
    /// that actually carry those columns.
    pub fn has_extended_fields(self) -> bool {
        matches!(self, SchemaVariant::Current | SchemaVariant::ExportComments)
    }
}

/// Interaction classification of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TweetKind {
    Tweet,
    Retweet,
    Reply,
    Quote,
    Mention,
}

impl TweetKind {
    pub fn parse(s: &str) -> TweetKind {
        match s.trim().to_lowercase().as_str() {
            "retweet" => TweetKind::Retweet,
            "reply" => TweetKind::Reply,
            "quote" => TweetKind::Quote,
            "mention" => TweetKind::Mention,
            _ => TweetKind::Tweet,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TweetKind::Tweet => "tweet",
            TweetKind::Retweet => "retweet",
            TweetKind::Reply => "reply",
            TweetKind::Quote => "quote",
            TweetKind::Mention => "mention",
        }
    }
}

/// Row-local failure. Any of these marks the row corrupted without
/// aborting the run.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' is not a number: '{value}'")]
    BadNumber { field: &'static str, value: String },
    #[error("unparseable timestamp '{0}'")]
    BadTimestamp(String),
}

/// Header-name to column-index mapping, names normalized.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    index: HashMap<String, usize>,
    len: usize,
}

/// Normalize a header name: ASCII only, lowercased, dots and spaces
/// become underscores.
pub fn normalize_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii())
        .collect::<String>()
        .to_lowercase()
        .replace(['.', ' '], "_")
}

impl ColumnMap {
    pub fn from_header(header: &[String]) -> ColumnMap {
        let mut index = HashMap::new();
        for (i, raw) in header.iter().enumerate() {
            let mut name = normalize_name(raw);
            if i == 0 && name.is_empty() {
                name = "lineid".to_string();
            }
            index.entry(name).or_insert(i);
        }
        ColumnMap {
            index,
            len: header.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Field value or empty string when the column is absent.
    pub fn get<'a>(&self, row: &'a csv::StringRecord, name: &str) -> &'a str {
        self.position(name).and_then(|i| row.get(i)).unwrap_or("")
    }

    /// Field value, failing when the column is absent from the header.
    pub fn require<'a>(
        &self,
        row: &'a csv::StringRecord,
        name: &'static str,
    ) -> Result<&'a str, RowError> {
        self.position(name)
            .and_then(|i| row.get(i))
            .ok_or(RowError::MissingField(name))
    }
}

/// Pick the field delimiter by scanning a header line, in priority
/// order: pipe, tab, semicolon, comma.
pub fn detect_delimiter_in(header_line: &str) -> Option<u8> {
    for candidate in [b'|', b'\t', b';', b','] {
        if header_line.as_bytes().contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Determine which schema a header belongs to. Priority: Gephi edge
/// list, exact current format, legacy aggregator, ExportComments;
/// everything else falls back to best-effort current-format access.
pub fn classify_schema(header: &[String]) -> SchemaVariant {
    let names: Vec<String> = header.iter().map(|h| normalize_name(h)).collect();
    let has = |n: &str| names.iter().any(|x| x.as_str() == n);

    if has("source") && has("target") {
        return SchemaVariant::GephiEdges;
    }
    if names.iter().map(String::as_str).eq(CURRENT_HEADER.iter().copied()) {
        return SchemaVariant::Current;
    }
    if ["type", "media_url", "place", "geo_type"].iter().any(|n| !has(n))
        && LEGACY_HEADER.iter().all(|n| has(n))
    {
        return SchemaVariant::LegacyAggregator;
    }
    if EXPORT_COMMENTS_HEADER.iter().all(|n| has(n)) {
        return SchemaVariant::ExportComments;
    }
    SchemaVariant::Current
}

/// A row normalized into named fields. Downstream aggregation never
/// touches raw columns again.
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub id: String,
    pub from_user: String,
    pub text: String,
    pub kind: TweetKind,
    pub rt_count: i64,
    pub favorite_count: i64,
    pub lang: String,
    pub source: String,
    pub place: String,
    pub country: String,
    pub country_code: String,
    pub media_url: String,
    /// Hashtag/mention/URL lists from dedicated columns; `None` means
    /// the schema has no such column and the tokenizer fills them in.
    pub hashtags: Option<Vec<String>>,
    pub mentions: Option<Vec<String>>,
    pub urls: Option<Vec<String>>,
    pub time: i64,
    pub geo_type: String,
    pub latitude: String,
    pub longitude: String,
    pub created_at: String,
    pub user_image_url: String,
    pub user_location: String,
    pub followers: i64,
    pub following: i64,
    pub rt_user: Option<String>,
    pub rt_id: Option<String>,
    pub rt_text: Option<String>,
    pub reply_to_user: Option<String>,
    pub reply_to_id: Option<String>,
    pub quoted_user: Option<String>,
    pub quoted_text: Option<String>,
    /// Permalink when the input carries one (ExportComments).
    pub status_url: String,
    /// users.csv row in USERS_HEADER order.
    pub profile: Vec<String>,
}

impl Default for TweetKind {
    fn default() -> Self {
        TweetKind::Tweet
    }
}

fn clean_breaks(s: &str) -> String {
    s.replace(['\n', '\r'], " ")
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

/// Parse a count field; empty counts as zero.
fn parse_count(field: &'static str, value: &str) -> Result<i64, RowError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    value.parse::<i64>().map_err(|_| RowError::BadNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_time(field: &'static str, value: &str) -> Result<i64, RowError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| RowError::BadNumber {
            field,
            value: value.to_string(),
        })
}

/// Split a list-bearing column value ("a, b, c") into items.
pub fn split_list_field(s: &str) -> Vec<String> {
    let s = s
        .replace(", ", ",")
        .replace(['"', '\'', '\n', '\r'], "");
    if s.is_empty() {
        Vec::new()
    } else {
        s.split(',').map(|p| p.to_string()).collect()
    }
}

/// Normalize one raw row into a [`Record`] according to the schema
/// variant detected for this file.
pub fn normalize_record(
    row: &csv::StringRecord,
    schema: SchemaVariant,
    cols: &ColumnMap,
) -> Result<Record, RowError> {
    match schema {
        SchemaVariant::Current => normalize_current(row, cols),
        SchemaVariant::GephiEdges => normalize_gephi(row, cols),
        SchemaVariant::LegacyAggregator => normalize_legacy(row, cols),
        SchemaVariant::ExportComments => normalize_export_comments(row, cols),
    }
}

fn profile_from_columns(row: &csv::StringRecord, cols: &ColumnMap) -> Vec<String> {
    USERS_HEADER
        .iter()
        .map(|name| cols.get(row, name).to_string())
        .collect()
}

fn normalize_current(row: &csv::StringRecord, cols: &ColumnMap) -> Result<Record, RowError> {
    let mut rec = Record {
        id: cols.require(row, "id")?.to_string(),
        from_user: cols.require(row, "from_user")?.to_string(),
        text: clean_breaks(cols.require(row, "text")?),
        kind: TweetKind::parse(cols.require(row, "type")?),
        rt_count: parse_count("rt_count", cols.get(row, "rt_count"))?,
        favorite_count: parse_count("favorite_count", cols.get(row, "favorite_count"))?,
        lang: cols.get(row, "lang").to_string(),
        source: cols.get(row, "source").to_string(),
        place: cols.get(row, "place").to_string(),
        country: cols.get(row, "country").to_string(),
        country_code: cols.get(row, "country_code").to_string(),
        media_url: cols.get(row, "media_url").to_string(),
        hashtags: Some(split_list_field(cols.get(row, "hashtags"))),
        mentions: Some(split_list_field(cols.get(row, "mentions_user"))),
        urls: Some(split_list_field(cols.get(row, "urls"))),
        geo_type: cols.get(row, "geo_type").to_string(),
        latitude: cols.get(row, "latitude").to_string(),
        longitude: cols.get(row, "longitude").to_string(),
        created_at: cols.get(row, "created_at").to_string(),
        user_image_url: cols.get(row, "user_image_url").to_string(),
        user_location: cols.get(row, "user_location").to_string(),
        followers: parse_count("user_followers", cols.get(row, "user_followers"))?,
        following: parse_count("user_following", cols.get(row, "user_following"))?,
        rt_user: non_empty(cols.get(row, "rt_user")),
        rt_id: non_empty(cols.get(row, "rt_id")),
        rt_text: non_empty(&clean_breaks(cols.get(row, "rt_text"))),
        reply_to_user: non_empty(cols.get(row, "reply_to_user")),
        reply_to_id: non_empty(cols.get(row, "reply_to_id")),
        quoted_user: non_empty(cols.get(row, "quoted_user")),
        quoted_text: non_empty(&clean_breaks(cols.get(row, "quoted_text"))),
        status_url: String::new(),
        profile: profile_from_columns(row, cols),
        ..Record::default()
    };

    // Some collectors store the unix timestamp under "timestamp".
    let time_value = if cols.contains("timestamp") {
        cols.require(row, "timestamp")?
    } else {
        cols.require(row, "time")?
    };
    rec.time = parse_time("time", time_value)?;

    // Truncated retweets can be recovered from the retweeted text.
    if rec.text.ends_with('…') && rec.text.starts_with("RT @") {
        let trimmed = rec.text.trim_end_matches('…');
        if let Some((head, tail)) = trimmed.split_once(": ") {
            if let Some(rt_text) = &rec.rt_text {
                if rt_text.starts_with(tail) {
                    rec.text = format!("{head}: {rt_text}");
                }
            }
        }
    }

    if rec.rt_text.is_none() && rec.rt_count > 0 {
        rec.rt_text = Some(rec.text.clone());
    }
    Ok(rec)
}

fn normalize_gephi(row: &csv::StringRecord, cols: &ColumnMap) -> Result<Record, RowError> {
    let kind = TweetKind::parse(cols.require(row, "type")?);
    let target = cols.require(row, "target")?.to_string();
    let mut rec = Record {
        id: cols.require(row, "tweet_id")?.to_string(),
        from_user: cols.require(row, "source")?.to_string(),
        text: clean_breaks(cols.require(row, "text")?),
        kind,
        rt_count: parse_count("rt_count", cols.get(row, "rt_count"))?,
        favorite_count: parse_count("favorite_count", cols.get(row, "favorite_count"))?,
        time: parse_time("time", cols.require(row, "time")?)?,
        lang: "und".to_string(),
        ..Record::default()
    };
    match kind {
        TweetKind::Reply => rec.reply_to_user = Some(target),
        TweetKind::Retweet => rec.rt_user = Some(target),
        TweetKind::Quote => rec.quoted_user = Some(target),
        TweetKind::Mention => rec.mentions = Some(vec![target]),
        TweetKind::Tweet => {}
    }
    rec.profile = {
        let mut p = vec![String::new(); USERS_HEADER.len()];
        p[0] = rec.from_user.clone();
        p
    };
    Ok(rec)
}

fn normalize_legacy(row: &csv::StringRecord, cols: &ColumnMap) -> Result<Record, RowError> {
    let text = clean_breaks(cols.require(row, "text")?);
    let mut rec = Record {
        id: cols.require(row, "id")?.to_string(),
        from_user: cols.require(row, "from_user")?.to_string(),
        time: parse_time("time", cols.require(row, "time")?)?,
        created_at: cols.get(row, "created_at").to_string(),
        lang: "und".to_string(),
        followers: parse_count("user_followers", cols.get(row, "user_followers"))?,
        following: parse_count("user_following", cols.get(row, "user_following"))?,
        rt_text: Some(text.clone()),
        text,
        ..Record::default()
    };
    // Classic conventions: "@user …" is a reply, "RT @user: …" a retweet.
    if rec.text.starts_with('@') {
        rec.kind = TweetKind::Reply;
        let first = rec.text.split(' ').next().unwrap_or("");
        rec.reply_to_user = non_empty(&first.trim_start_matches('@').to_lowercase());
    } else if rec.text.starts_with("RT @") {
        rec.kind = TweetKind::Retweet;
        let head = rec.text.split(':').next().unwrap_or("");
        rec.rt_user = non_empty(&head[4.min(head.len())..].to_lowercase());
    }
    rec.profile = profile_from_columns(row, cols);
    if rec.profile[0].is_empty() {
        rec.profile[0] = rec.from_user.clone();
    }
    Ok(rec)
}

fn normalize_export_comments(
    row: &csv::StringRecord,
    cols: &ColumnMap,
) -> Result<Record, RowError> {
    let date_raw = cols.require(row, "date")?.to_string();
    let time = EC_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&date_raw, fmt).ok())
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| RowError::BadTimestamp(date_raw.clone()))?;

    let text = clean_breaks(cols.require(row, "tweet_text")?);
    let mut rec = Record {
        id: cols
            .require(row, "tweet_id_(click_to_view_url)")?
            .replace("ID: ", ""),
        from_user: cols.require(row, "username")?.to_string(),
        text,
        time,
        created_at: date_raw,
        rt_count: parse_count("retweets", cols.get(row, "retweets"))?,
        favorite_count: parse_count("favorites", cols.get(row, "favorites"))?,
        source: cols.get(row, "tweet_source").to_string(),
        followers: parse_count("author_followers", cols.get(row, "author_followers"))?,
        following: parse_count("author_friends", cols.get(row, "author_friends"))?,
        user_image_url: cols.get(row, "author_image").to_string(),
        user_location: cols.get(row, "author_location").to_string(),
        status_url: cols.get(row, "status_url").to_string(),
        ..Record::default()
    };
    rec.lang = whatlang::detect(&rec.text)
        .map(|info| info.lang().code().to_string())
        .unwrap_or_else(|| "und".to_string());

    // Truncated retweets: recover author and body from the prefix.
    if rec.text.ends_with('…') && rec.text.starts_with("RT @") {
        let trimmed = rec.text.trim_end_matches('…').to_string();
        if let Some((head, tail)) = trimmed.split_once(": ") {
            rec.rt_user = non_empty(&head.replace("RT @", ""));
            rec.text = tail.to_string();
            rec.kind = TweetKind::Retweet;
        }
    }
    if rec.text.starts_with('@') {
        rec.kind = TweetKind::Reply;
        let first = rec.text.split_whitespace().next().unwrap_or("");
        rec.reply_to_user = non_empty(&first.replace('@', ""));
    }
    if cols.get(row, "is_retweet?").eq_ignore_ascii_case("yes") {
        rec.kind = TweetKind::Retweet;
        if rec.rt_user.is_none() {
            rec.rt_user = Some(rec.from_user.clone());
        }
    }

    rec.profile = vec![
        rec.from_user.clone(),
        String::new(),
        rec.user_image_url.clone(),
        cols.get(row, "name").to_string(),
        cols.get(row, "author_statuses").to_string(),
        cols.get(row, "author_followers").to_string(),
        cols.get(row, "author_friends").to_string(),
        String::new(),
        cols.get(row, "author_favorites").to_string(),
        String::new(),
        String::new(),
        rec.user_location.clone(),
        String::new(),
        cols.get(row, "author_bio").to_string(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        cols.get(row, "author_verified").to_string(),
    ];
    Ok(rec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_of(fields: &[&str]) -> csv::StringRecord {
        csv::StringRecord::from(fields.to_vec())
    }

    #[test]
    fn delimiter_priority() {
        assert_eq!(detect_delimiter_in("a|b,c"), Some(b'|'));
        assert_eq!(detect_delimiter_in("a\tb;c"), Some(b'\t'));
        assert_eq!(detect_delimiter_in("a;b,c"), Some(b';'));
        assert_eq!(detect_delimiter_in("a,b"), Some(b','));
        assert_eq!(detect_delimiter_in("ab"), None);
    }

    #[test]
    fn classification_is_idempotent() {
        let header: Vec<String> = CURRENT_HEADER.iter().map(|s| s.to_string()).collect();
        let first = classify_schema(&header);
        let second = classify_schema(&header);
        assert_eq!(first, SchemaVariant::Current);
        assert_eq!(first, second);
    }

    #[test]
    fn gephi_wins_over_everything() {
        let header: Vec<String> = ["source", "target", "type", "tweet_id", "text", "time"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(classify_schema(&header), SchemaVariant::GephiEdges);
    }

    #[test]
    fn legacy_detected_without_extended_columns() {
        let header: Vec<String> = ["text", "id", "from_user", "created_at", "time"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(classify_schema(&header), SchemaVariant::LegacyAggregator);
    }

    #[test]
    fn unknown_header_falls_back_to_current() {
        let header: Vec<String> = ["foo", "bar"].iter().map(|s| s.to_string()).collect();
        assert_eq!(classify_schema(&header), SchemaVariant::Current);
    }

    #[test]
    fn legacy_reply_and_retweet_prefixes() {
        let header: Vec<String> = LEGACY_HEADER.iter().map(|s| s.to_string()).collect();
        let cols = ColumnMap::from_header(&header);

        let reply = normalize_record(
            &record_of(&["@Alice hello there", "1", "bob", "x", "1500000000"]),
            SchemaVariant::LegacyAggregator,
            &cols,
        )
        .unwrap();
        assert_eq!(reply.kind, TweetKind::Reply);
        assert_eq!(reply.reply_to_user.as_deref(), Some("alice"));

        let retweet = normalize_record(
            &record_of(&["RT @alice: hello world", "2", "bob", "x", "1500000001"]),
            SchemaVariant::LegacyAggregator,
            &cols,
        )
        .unwrap();
        assert_eq!(retweet.kind, TweetKind::Retweet);
        assert_eq!(retweet.rt_user.as_deref(), Some("alice"));

        let plain = normalize_record(
            &record_of(&["just words", "3", "bob", "x", "1500000002"]),
            SchemaVariant::LegacyAggregator,
            &cols,
        )
        .unwrap();
        assert_eq!(plain.kind, TweetKind::Tweet);
        assert_eq!(plain.lang, "und");
        assert_eq!(plain.rt_count, 0);
    }

    #[test]
    fn gephi_target_mapping() {
        let header: Vec<String> =
            ["source", "target", "type", "tweet_id", "text", "favorite_count", "rt_count", "time"]
                .iter()
                .map(|s| s.to_string())
                .collect();
        let cols = ColumnMap::from_header(&header);
        let rec = normalize_record(
            &record_of(&["bob", "alice", "quote", "9", "quoting", "0", "0", "1500000000"]),
            SchemaVariant::GephiEdges,
            &cols,
        )
        .unwrap();
        assert_eq!(rec.kind, TweetKind::Quote);
        assert_eq!(rec.quoted_user.as_deref(), Some("alice"));
        assert_eq!(rec.from_user, "bob");
        assert_eq!(rec.id, "9");
    }

    #[test]
    fn bad_timestamp_is_a_row_error() {
        let header: Vec<String> = LEGACY_HEADER.iter().map(|s| s.to_string()).collect();
        let cols = ColumnMap::from_header(&header);
        let err = normalize_record(
            &record_of(&["text", "1", "bob", "x", "not-a-number"]),
            SchemaVariant::LegacyAggregator,
            &cols,
        )
        .unwrap_err();
        assert!(matches!(err, RowError::BadNumber { .. }));
    }

    #[test]
    fn list_field_splitting() {
        assert_eq!(split_list_field("a, b, c"), vec!["a", "b", "c"]);
        assert_eq!(split_list_field(""), Vec::<String>::new());
    }
}
