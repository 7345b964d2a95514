use agent_fabric::dedup::CorrelationCache;
use agent_fabric::mentions::parse_mentions;
use std::time::Duration;

#[test]
fn test_parse_single_mention() {
    assert_eq!(parse_mentions("@media make a song"), vec!["media"]);
}

#[test]
fn test_parse_mid_sentence() {
    assert_eq!(
        parse_mentions("hey @news, anything new? ask @automation too"),
        vec!["news", "automation"]
    );
}

#[test]
fn test_parse_dedups_repeats() {
    assert_eq!(parse_mentions("@media and again @media"), vec!["media"]);
}

#[test]
fn test_email_addresses_are_not_mentions() {
    assert!(parse_mentions("mail me at someone@example.com").is_empty());
}

#[test]
fn test_bare_at_is_not_a_mention() {
    assert!(parse_mentions("look @ this").is_empty());
    assert!(parse_mentions("@").is_empty());
}

#[test]
fn test_hyphen_and_underscore_in_names() {
    assert_eq!(
        parse_mentions("@media-creation and @news_bot please"),
        vec!["media-creation", "news_bot"]
    );
}

#[test]
fn test_punctuation_terminates_name() {
    assert_eq!(parse_mentions("thanks @media!"), vec!["media"]);
    assert_eq!(parse_mentions("(@news)"), vec!["news"]);
}

// --- Correlation dedup cache ---

#[test]
fn test_dedup_cache_hits_within_window() {
    let cache = CorrelationCache::new(Duration::from_secs(30));
    assert!(cache.get("coord", "c1").is_none());
    cache.put("coord", "c1", "msg-42");
    assert_eq!(cache.get("coord", "c1").as_deref(), Some("msg-42"));
}

#[test]
fn test_dedup_cache_is_scoped_per_agent() {
    let cache = CorrelationCache::new(Duration::from_secs(30));
    cache.put("coord", "c1", "msg-42");
    assert!(cache.get("media", "c1").is_none());
}

#[test]
fn test_dedup_cache_expires() {
    let cache = CorrelationCache::new(Duration::from_millis(50));
    cache.put("coord", "c1", "msg-42");
    std::thread::sleep(Duration::from_millis(80));
    assert!(cache.get("coord", "c1").is_none());
}
