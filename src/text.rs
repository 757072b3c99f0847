//! Token classification and word cleaning.
//!
//! Every whitespace-split token of a tweet text falls into exactly one of
//! five classes, checked in this order: emoji, hashtag, mention, URL,
//! plain word. Plain words are cleaned (lowercased, accents stripped,
//! punctuation removed) and filtered against stopwords and junk patterns
//! before they enter any statistic.

use std::sync::LazyLock;

use regex::Regex;

/// Emoji sentiment lexicon: token => sentiment value.
/// Positive values for positive emotion, negative for negative.
static EMOJI_SENTIMENT: &[(&str, i64)] = &[
    ("😀", 1),
    ("😁", 1),
    ("😂", 1),
    ("🤣", 1),
    ("😃", 1),
    ("😄", 1),
    ("😅", 1),
    ("😆", 1),
    ("😇", 1),
    ("😉", 1),
    ("😊", 2),
    ("😋", 1),
    ("😌", 1),
    ("😍", 2),
    ("🥰", 2),
    ("😘", 2),
    ("😗", 1),
    ("😙", 1),
    ("😚", 1),
    ("🙂", 1),
    ("🤗", 1),
    ("🤩", 2),
    ("🥳", 2),
    ("😎", 1),
    ("👍", 1),
    ("👏", 1),
    ("🙌", 1),
    ("💪", 1),
    ("🙏", 1),
    ("❤", 2),
    ("❤️", 2),
    ("💕", 2),
    ("💖", 2),
    ("💙", 2),
    ("💚", 2),
    ("💛", 2),
    ("💜", 2),
    ("🖤", 1),
    ("✨", 1),
    ("🎉", 2),
    ("🔥", 1),
    ("😐", 0),
    ("😑", 0),
    ("🤔", 0),
    ("😶", 0),
    ("🙄", -1),
    ("😏", 0),
    ("😒", -1),
    ("😕", -1),
    ("😟", -1),
    ("🙁", -1),
    ("☹️", -1),
    ("😮", 0),
    ("😢", -1),
    ("😭", -2),
    ("😤", -1),
    ("😠", -2),
    ("😡", -2),
    ("🤬", -2),
    ("😨", -1),
    ("😰", -1),
    ("😱", -2),
    ("😳", -1),
    ("🥺", -1),
    ("😞", -1),
    ("😔", -1),
    ("😫", -1),
    ("😩", -1),
    ("🤢", -2),
    ("🤮", -2),
    ("💔", -2),
    ("👎", -1),
    ("💀", -1),
];

/// Stopwords for the languages the collectors most often return
/// (Portuguese, English, Spanish). Matched after cleaning, so entries
/// are lowercase and accent-free.
static STOPWORDS: &[&str] = &[
    // pt
    "a", "ao", "aos", "aquela", "aquelas", "aquele", "aqueles", "aquilo", "as", "ate", "com",
    "como", "da", "das", "de", "dela", "delas", "dele", "deles", "depois", "do", "dos", "e",
    "ela", "elas", "ele", "eles", "em", "entre", "era", "eram", "essa", "essas", "esse",
    "esses", "esta", "estas", "este", "estes", "eu", "foi", "foram", "ha", "isso", "isto",
    "ja", "lhe", "lhes", "mais", "mas", "me", "mesmo", "meu", "meus", "minha", "minhas",
    "muito", "na", "nao", "nas", "nem", "no", "nos", "nossa", "nossas", "nosso", "nossos",
    "num", "numa", "o", "os", "ou", "para", "pela", "pelas", "pelo", "pelos", "por", "qual",
    "quando", "que", "quem", "sao", "se", "sem", "ser", "seu", "seus", "so", "sua", "suas",
    "tambem", "te", "tem", "teu", "tinha", "tu", "tua", "tuas", "um", "uma", "voce", "voces",
    // en
    "about", "after", "all", "also", "an", "and", "any", "are", "at", "be", "because", "been",
    "before", "being", "but", "by", "can", "could", "did", "for", "from", "had", "has", "have",
    "he", "her", "here", "him", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "just", "like", "more", "most", "my", "new", "not", "now", "of", "on", "one", "only",
    "or", "other", "our", "out", "over", "she", "should", "some", "than", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "to", "was", "we", "were",
    "what", "when", "which", "who", "will", "with", "would", "you", "your",
    // es
    "al", "algo", "antes", "como", "con", "cual", "cuando", "del", "desde", "donde", "el",
    "ella", "ellas", "ellos", "entre", "ese", "esos", "esta", "estas", "esto", "estos", "fue",
    "la", "las", "le", "les", "lo", "los", "mi", "mis", "mucho", "muy", "ni", "nosotros",
    "otra", "otros", "pero", "poco", "porque", "quien", "ser", "si", "sin", "sobre", "son",
    "su", "sus", "tambien", "tiene", "todo", "todos", "tu", "un", "una", "unas", "unos",
    "usted", "y", "ya", "yo",
];

/// Substrings that disqualify a token outright.
static JUNK_INSIDE: &[&str] = &["kk", "rsrs", "haha", "/"];
/// Prefixes that disqualify a token outright.
static JUNK_PREFIX: &[&str] = &["@", "#", "co/", "/", "http"];
/// Exact tokens that are never words.
static JUNK_EXACT: &[&str] = &["rt", "\n", "", "http", "https", "//t", "//"];

static HASHTAG_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9]+").expect("hashtag pattern"));
static MENTION_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9_]+").expect("mention pattern"));
static URL_DOMAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"://([a-zA-Z0-9_.]+)").expect("domain pattern"));

/// Returns true if the token is a known emoji.
pub fn is_emoji(token: &str) -> bool {
    EMOJI_SENTIMENT.iter().any(|(e, _)| *e == token)
}

/// Sentiment value for a known emoji, 0 for anything else.
pub fn emoji_sentiment(token: &str) -> i64 {
    EMOJI_SENTIMENT
        .iter()
        .find(|(e, _)| *e == token)
        .map(|(_, v)| *v)
        .unwrap_or(0)
}

/// Returns true if the token is a hashtag. Tokens truncated by the
/// collector (trailing ellipsis) are not counted.
pub fn is_hashtag(token: &str) -> bool {
    token.starts_with('#') && !token.ends_with('…')
}

/// Returns true if the token is a mention. A mention is a token starting
/// with "@" (the fullwidth "＠" also occurs in scraped data).
pub fn is_mention(token: &str) -> bool {
    (token.starts_with('@') || token.starts_with('＠')) && !token.ends_with('…')
}

/// Returns true if the token is a URL. The collectors emit "http(s)://"
/// links and the occasional mangled "hr…" form.
pub fn is_url(token: &str) -> bool {
    (token.starts_with("ht") || token.starts_with("hr")) && !token.ends_with('…')
}

/// Extract the hashtag body from a token. The token must contain exactly
/// one alphanumeric run, e.g. "#tag!" => "tag" but "#foo-bar" => None.
pub fn extract_hashtag(token: &str) -> Option<String> {
    let body = token.trim_start_matches(['#']);
    let runs: Vec<&str> = HASHTAG_RUNS.find_iter(body).map(|m| m.as_str()).collect();
    if runs.len() == 1 {
        Some(runs[0].to_string())
    } else {
        None
    }
}

/// Extract the username from a mention token, same exactly-one-run rule
/// as [`extract_hashtag`] but with underscores allowed.
pub fn extract_mention(token: &str) -> Option<String> {
    let body = token.trim_start_matches(['@', '＠']);
    let runs: Vec<&str> = MENTION_RUNS.find_iter(body).map(|m| m.as_str()).collect();
    if runs.len() == 1 {
        Some(runs[0].to_string())
    } else {
        None
    }
}

/// Extract the domain of a URL: the substring between "://" and the next
/// "/", with a leading "www." stripped.
pub fn url_domain(url: &str) -> Option<String> {
    URL_DOMAIN
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_start_matches("www.").to_string())
}

/// Replace accented latin characters with their plain counterparts.
pub fn remove_latin_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'ã' | 'â' | 'à' => 'a',
            'è' | 'ê' | 'é' => 'e',
            'í' | 'ì' => 'i',
            'ñ' => 'n',
            'ò' | 'ó' | 'ô' | 'õ' => 'o',
            'ù' | 'ú' | 'ü' => 'u',
            'ç' => 'c',
            'Á' | 'Ã' | 'Â' | 'À' => 'A',
            'È' | 'Ê' | 'É' => 'E',
            'Í' | 'Ì' => 'I',
            'Ñ' => 'N',
            'Ò' | 'Ó' | 'Ô' | 'Õ' => 'O',
            'Ù' | 'Ú' | 'Ü' => 'U',
            'Ç' => 'C',
            _ => c,
        })
        .collect()
}

fn is_undesired(c: char) -> bool {
    c.is_ascii_punctuation() || matches!(c, '”' | '“' | '‘' | '…' | '—')
}

/// Remove punctuation (ASCII punctuation plus typographic quotes,
/// ellipsis and em-dash).
pub fn remove_punctuation(s: &str) -> String {
    s.chars().filter(|c| !is_undesired(*c)).collect()
}

/// Same as [`remove_punctuation`] but underscores survive, as they are
/// legal in usernames.
pub fn remove_punctuation_keep_underscore(s: &str) -> String {
    s.chars()
        .filter(|c| *c == '_' || !is_undesired(*c))
        .collect()
}

/// Clean a word: lowercase, strip accents, strip punctuation.
///
/// # Example
/// ```
/// use tweet_analysis::text::clean_word;
/// assert_eq!(clean_word("Ação!"), "acao");
/// ```
pub fn clean_word(s: &str) -> String {
    remove_punctuation(&remove_latin_accents(&s.to_lowercase()))
}

fn is_number(s: &str) -> bool {
    s.parse::<f64>().is_ok()
}

fn is_stopword(s: &str) -> bool {
    STOPWORDS.contains(&s)
}

/// Check if a cleaned string qualifies as a word for the statistics:
/// longer than one character, not a number, not a stopword, not a junk
/// pattern, not the remains of a URL, mention or hashtag.
pub fn is_valid_word(s: &str) -> bool {
    s.chars().count() > 1
        && !is_number(s)
        && !is_stopword(s)
        && !JUNK_INSIDE.iter().any(|w| s.contains(w))
        && !JUNK_PREFIX.iter().any(|w| s.starts_with(w))
        && !JUNK_EXACT.contains(&s)
}

/// Title-case a single token: first character uppercased, rest lowered.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str().to_lowercase().as_str(),
        None => String::new(),
    }
}

/// Drop every non-ASCII character. Used when quoting tweet text in the
/// plain-text overview.
pub fn ascii_fold(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_classes_are_mutually_exclusive_in_order() {
        assert!(is_emoji("😂"));
        assert!(is_hashtag("#tag"));
        assert!(!is_hashtag("#tag…"));
        assert!(is_mention("@user"));
        assert!(is_mention("＠user"));
        assert!(is_url("https://t.co/x"));
        assert!(!is_url("https://t.co/x…"));
    }

    #[test]
    fn hashtag_extraction_requires_single_run() {
        assert_eq!(extract_hashtag("#Tag123"), Some("Tag123".to_string()));
        assert_eq!(extract_hashtag("#foo-bar"), None);
        assert_eq!(extract_hashtag("#"), None);
    }

    #[test]
    fn mention_extraction_keeps_underscore() {
        assert_eq!(extract_mention("@user_1,"), Some("user_1".to_string()));
        assert_eq!(extract_mention("@a.b"), None);
    }

    #[test]
    fn domain_capture_strips_www() {
        assert_eq!(
            url_domain("https://www.youtube.com/watch?v=x"),
            Some("youtube.com".to_string())
        );
        assert_eq!(url_domain("nodomain"), None);
    }

    #[test]
    fn word_cleaning_and_validity() {
        assert_eq!(clean_word("Coração!"), "coracao");
        assert!(is_valid_word("coracao"));
        assert!(!is_valid_word("a"));
        assert!(!is_valid_word("42"));
        assert!(!is_valid_word("the"));
        assert!(!is_valid_word("kkkk"));
        assert!(!is_valid_word("rt"));
    }

    #[test]
    fn sentiment_values() {
        assert_eq!(emoji_sentiment("😍"), 2);
        assert_eq!(emoji_sentiment("😡"), -2);
        assert_eq!(emoji_sentiment("plain"), 0);
    }

    #[test]
    fn capitalize_single_token() {
        assert_eq!(capitalize("maRIA"), "Maria");
        assert_eq!(capitalize(""), "");
    }
}
