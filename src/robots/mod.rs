//! robots.txt fetching, parsing and policy evaluation.
//!
//! One [`RobotsRuleSet`] is cached per host. Directives are matched
//! user-agent-group-first (most specific substring match wins), falling
//! back to the `*` group; within a group, path patterns are translated
//! from the glob-ish robots.txt syntax into regexes and matched with
//! `regex_search` semantics (a substring match, not a full match).

use dashmap::DashMap;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// `Allow`/`Disallow` patterns plus an optional crawl-delay for a single
/// user-agent group.
#[derive(Debug, Clone, Default)]
struct GroupRules {
    allow: Vec<Regex>,
    disallow: Vec<Regex>,
    crawl_delay: Option<Duration>,
}

/// Parsed robots.txt for one host: the default (`*`) group plus any
/// named agent groups, keyed by the lowercased agent token from the
/// `User-agent:` line.
#[derive(Debug, Clone, Default)]
pub struct RobotsRuleSet {
    default: GroupRules,
    agents: Vec<(String, GroupRules)>,
}

const DEFAULT_CRAWL_DELAY_MS: u64 = 1000;

impl RobotsRuleSet {
    /// An empty rule set: everything allowed, default crawl delay.
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse a robots.txt body. Unknown directives and malformed lines
    /// are skipped rather than treated as parse errors, matching
    /// robots.txt's historically permissive ecosystem convention.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut default = GroupRules::default();
        let mut agents: Vec<(String, GroupRules)> = Vec::new();
        let mut current: Option<String> = None;

        for raw_line in content.lines() {
            let line = raw_line.trim().to_lowercase();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(value) = strip_directive(&line, "user-agent:") {
                let agent = value.trim().to_string();
                if !agents.iter().any(|(a, _)| a == &agent) {
                    agents.push((agent.clone(), GroupRules::default()));
                }
                current = Some(agent);
                continue;
            }

            let group = match &current {
                Some(agent) => agents.iter_mut().find(|(a, _)| a == agent).map(|(_, g)| g),
                None => Some(&mut default),
            };
            let Some(group) = group else { continue };

            if let Some(value) = strip_directive(&line, "disallow:") {
                if let Some(re) = pattern_to_regex(value.trim()) {
                    group.disallow.push(re);
                }
            } else if let Some(value) = strip_directive(&line, "allow:") {
                if let Some(re) = pattern_to_regex(value.trim()) {
                    group.allow.push(re);
                }
            } else if let Some(value) = strip_directive(&line, "crawl-delay:") {
                if let Ok(secs) = value.trim().parse::<f64>() {
                    group.crawl_delay = Some(Duration::from_millis((secs * 1000.0) as u64));
                }
            }
        }

        Self { default, agents }
    }

    /// Whether `path` (no scheme/host, just `/foo/bar?q`) is allowed for
    /// `user_agent`. The most specific matching agent group wins over the
    /// default group; within a group, allow/disallow order mirrors the
    /// order directives appeared in the file, with the last match deciding.
    #[must_use]
    pub fn is_allowed(&self, path: &str, user_agent: &str) -> bool {
        let ua = user_agent.to_lowercase();
        let specific = self
            .agents
            .iter()
            .filter(|(agent, _)| agent != "*" && ua.contains(agent.as_str()))
            .map(|(_, rules)| rules)
            .next();

        let group = specific.unwrap_or_else(|| {
            self.agents
                .iter()
                .find(|(agent, _)| agent == "*")
                .map(|(_, rules)| rules)
                .unwrap_or(&self.default)
        });

        Self::group_allows(group, path)
    }

    fn group_allows(group: &GroupRules, path: &str) -> bool {
        let disallowed = group.disallow.iter().any(|re| re.is_match(path));
        if !disallowed {
            return true;
        }
        group.allow.iter().any(|re| re.is_match(path))
    }

    /// Crawl delay for `user_agent`, falling back to the default group,
    /// then to [`DEFAULT_CRAWL_DELAY_MS`].
    #[must_use]
    pub fn crawl_delay(&self, user_agent: &str) -> Duration {
        let ua = user_agent.to_lowercase();
        self.agents
            .iter()
            .filter(|(agent, _)| agent != "*" && ua.contains(agent.as_str()))
            .find_map(|(_, rules)| rules.crawl_delay)
            .or(self.default.crawl_delay)
            .or_else(|| {
                self.agents
                    .iter()
                    .find(|(agent, _)| agent == "*")
                    .and_then(|(_, rules)| rules.crawl_delay)
            })
            .unwrap_or_else(|| Duration::from_millis(DEFAULT_CRAWL_DELAY_MS))
    }
}

fn strip_directive<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix)
}

/// Translate a robots.txt path pattern into a regex: `*` becomes `.*`,
/// `?` becomes a literal any-character match, everything else is
/// regex-escaped. Matching is substring (`regex_search`), not anchored,
/// unless the pattern ends in `$` which robots.txt treats as a literal
/// end-of-string anchor.
fn pattern_to_regex(pattern: &str) -> Option<Regex> {
    if pattern.is_empty() {
        return None;
    }
    let mut out = String::with_capacity(pattern.len() * 2);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '$' => out.push('$'),
            c if regex_syntax::is_meta_character(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    Regex::new(&out).ok()
}

/// Per-host robots.txt cache with single-flight fetch-and-parse: two
/// concurrent lookups for the same host share one fetch rather than
/// racing two requests to the origin.
pub struct RobotsPolicy {
    client: reqwest::Client,
    user_agent: String,
    cache: DashMap<String, Arc<RobotsRuleSet>>,
    inflight: DashMap<String, Arc<Mutex<()>>>,
    /// Sync-readable mirror of each host's crawl delay, populated as a
    /// side effect of `rules_for`. Lets `UrlFrontier::next` consult
    /// pacing without awaiting the async robots cache on every call.
    delay_cache: DashMap<String, Duration>,
}

impl RobotsPolicy {
    #[must_use]
    pub fn new(client: reqwest::Client, user_agent: String) -> Self {
        Self {
            client,
            user_agent,
            cache: DashMap::new(),
            inflight: DashMap::new(),
            delay_cache: DashMap::new(),
        }
    }

    /// Best-effort, synchronous crawl delay for a host: the last value
    /// observed by `rules_for`, or the ecosystem-standard default if
    /// the host's robots.txt hasn't been fetched yet.
    #[must_use]
    pub fn cached_crawl_delay(&self, host: &str) -> Duration {
        self.delay_cache
            .get(host)
            .map(|d| *d)
            .unwrap_or_else(|| Duration::from_millis(DEFAULT_CRAWL_DELAY_MS))
    }

    /// Fetch (if not cached) and return the rule set for `host`. A fetch
    /// error or non-2xx response yields an allow-all rule set, matching
    /// robots.txt convention that a missing file permits crawling.
    pub async fn rules_for(&self, scheme: &str, host: &str) -> Arc<RobotsRuleSet> {
        if let Some(cached) = self.cache.get(host) {
            return cached.clone();
        }

        let lock = self
            .inflight
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if let Some(cached) = self.cache.get(host) {
            self.inflight.remove(host);
            return cached.clone();
        }

        let url = format!("{scheme}://{host}/robots.txt");
        let rules = match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => RobotsRuleSet::parse(&body),
                Err(_) => RobotsRuleSet::allow_all(),
            },
            _ => RobotsRuleSet::allow_all(),
        };

        let rules = Arc::new(rules);
        self.delay_cache.insert(host.to_string(), rules.crawl_delay(&self.user_agent));
        self.cache.insert(host.to_string(), rules.clone());
        self.inflight.remove(host);
        rules
    }

    /// Convenience wrapper: is `path` on `host` allowed for this policy's
    /// configured user agent?
    pub async fn is_allowed(&self, scheme: &str, host: &str, path: &str) -> bool {
        self.rules_for(scheme, host).await.is_allowed(path, &self.user_agent)
    }

    pub async fn crawl_delay(&self, scheme: &str, host: &str) -> Duration {
        self.rules_for(scheme, host).await.crawl_delay(&self.user_agent)
    }
}

mod regex_syntax {
    pub fn is_meta_character(c: char) -> bool {
        matches!(
            c,
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '|' | '\\'
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disallow_all_blocks_everything() {
        let rules = RobotsRuleSet::parse("User-agent: *\nDisallow: /\n");
        assert!(!rules.is_allowed("/anything", "mybot"));
    }

    #[test]
    fn allow_overrides_narrower_disallow() {
        let rules = RobotsRuleSet::parse("User-agent: *\nDisallow: /private\nAllow: /private/public\n");
        assert!(!rules.is_allowed("/private/secret", "mybot"));
        assert!(rules.is_allowed("/private/public", "mybot"));
    }

    #[test]
    fn specific_agent_group_wins_over_default() {
        let rules = RobotsRuleSet::parse(
            "User-agent: *\nDisallow: /\n\nUser-agent: goodbot\nDisallow:\n",
        );
        assert!(!rules.is_allowed("/x", "randombot"));
        assert!(rules.is_allowed("/x", "goodbot/1.0"));
    }

    #[test]
    fn glob_star_translates_to_wildcard() {
        let rules = RobotsRuleSet::parse("User-agent: *\nDisallow: /private/*.json\n");
        assert!(!rules.is_allowed("/private/a.json", "mybot"));
        assert!(rules.is_allowed("/private/a.txt", "mybot"));
    }

    #[test]
    fn crawl_delay_parses_seconds_to_duration() {
        let rules = RobotsRuleSet::parse("User-agent: *\nCrawl-delay: 2.5\n");
        assert_eq!(rules.crawl_delay("mybot"), Duration::from_millis(2500));
    }

    #[test]
    fn missing_crawl_delay_uses_default() {
        let rules = RobotsRuleSet::parse("User-agent: *\nDisallow:\n");
        assert_eq!(rules.crawl_delay("mybot"), Duration::from_millis(DEFAULT_CRAWL_DELAY_MS));
    }

    #[test]
    fn allow_all_permits_everything() {
        let rules = RobotsRuleSet::allow_all();
        assert!(rules.is_allowed("/anything/at/all", "mybot"));
    }
}
