//! Robots.txt parser implementation
//!
//! This module evaluates robots.txt content with the robotstxt crate's parser
//! and longest-match strategy. One pass over the file yields both the
//! Allow/Disallow verdict for a path and the Crawl-delay extension.

use robotstxt::matcher::{LongestMatchRobotsMatchStrategy, RobotsMatchStrategy};
use robotstxt::{get_path_params_query, parse_robotstxt, RobotsParseHandler};

/// Outcome of checking a URL against robots.txt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotsVerdict {
    /// An Allow rule is the best match for the URL
    Allowed,
    /// A Disallow rule is the best match for the URL
    Disallowed,
    /// No rule speaks about the URL, or there is no usable robots.txt
    Neutral,
}

/// Best match priorities for the `*` group and the crawler's own group
///
/// A priority of -1 means no line matched.
#[derive(Debug, Clone, Copy)]
struct Priorities {
    global: i32,
    specific: i32,
}

impl Default for Priorities {
    fn default() -> Self {
        Self {
            global: -1,
            specific: -1,
        }
    }
}

impl Priorities {
    /// Keeps the longest match seen for the group being read
    fn record(&mut self, specific: bool, priority: i32) {
        let best = if specific {
            &mut self.specific
        } else {
            &mut self.global
        };
        if *best < priority {
            *best = priority;
        }
    }
}

/// Collects rule matches and crawl delays for one agent and path
struct RuleCollector<'a> {
    agent: &'a str,
    path: &'a str,
    strategy: LongestMatchRobotsMatchStrategy,
    allow: Priorities,
    disallow: Priorities,
    in_global_group: bool,
    in_agent_group: bool,
    ever_seen_agent: bool,
    // a directive ends the run of User-agent lines that opens a group
    group_closed: bool,
    global_delay: Option<f64>,
    agent_delay: Option<f64>,
}

impl<'a> RuleCollector<'a> {
    fn new(agent: &'a str, path: &'a str) -> Self {
        Self {
            agent,
            path,
            strategy: LongestMatchRobotsMatchStrategy,
            allow: Priorities::default(),
            disallow: Priorities::default(),
            in_global_group: false,
            in_agent_group: false,
            ever_seen_agent: false,
            group_closed: false,
            global_delay: None,
            agent_delay: None,
        }
    }

    fn in_any_group(&self) -> bool {
        self.in_global_group || self.in_agent_group
    }

    /// Verdict from the agent's group if the file has one, else from `*`
    fn verdict(&self) -> RobotsVerdict {
        let (allow, disallow) = if self.ever_seen_agent {
            (self.allow.specific, self.disallow.specific)
        } else {
            (self.allow.global, self.disallow.global)
        };

        // an empty Disallow matches with priority 0 and permits everything
        if allow < 0 && disallow < 0 {
            RobotsVerdict::Neutral
        } else if disallow > 0 && disallow > allow {
            RobotsVerdict::Disallowed
        } else {
            RobotsVerdict::Allowed
        }
    }

    fn crawl_delay(&self) -> Option<f64> {
        self.agent_delay.or(self.global_delay)
    }
}

/// Product token of a User-agent value, e.g. "Googlebot/2.1" gives "Googlebot"
fn product_token(value: &str) -> &str {
    let end = value
        .find(|c: char| !(c.is_ascii_alphabetic() || c == '-' || c == '_'))
        .unwrap_or(value.len());
    &value[..end]
}

fn is_global_agent(value: &str) -> bool {
    value == "*" || (value.starts_with('*') && value[1..].starts_with(char::is_whitespace))
}

impl RobotsParseHandler for RuleCollector<'_> {
    fn handle_robots_start(&mut self) {}

    fn handle_robots_end(&mut self) {}

    fn handle_user_agent(&mut self, _line_num: u32, user_agent: &str) {
        if self.group_closed {
            self.in_global_group = false;
            self.in_agent_group = false;
            self.group_closed = false;
        }

        if is_global_agent(user_agent) {
            self.in_global_group = true;
        } else if product_token(user_agent).eq_ignore_ascii_case(self.agent) {
            self.in_agent_group = true;
            self.ever_seen_agent = true;
        }
    }

    fn handle_allow(&mut self, _line_num: u32, value: &str) {
        if !self.in_any_group() {
            return;
        }
        self.group_closed = true;
        let priority = self.strategy.match_allow(self.path, value);
        self.allow.record(self.in_agent_group, priority);
    }

    fn handle_disallow(&mut self, _line_num: u32, value: &str) {
        if !self.in_any_group() {
            return;
        }
        self.group_closed = true;
        let priority = self.strategy.match_disallow(self.path, value);
        self.disallow.record(self.in_agent_group, priority);
    }

    fn handle_sitemap(&mut self, _line_num: u32, _value: &str) {
        self.group_closed = true;
    }

    fn handle_unknown_action(&mut self, _line_num: u32, action: &str, value: &str) {
        self.group_closed = true;
        if !action.eq_ignore_ascii_case("crawl-delay") || !self.in_any_group() {
            return;
        }

        let Ok(delay) = value.parse::<f64>() else {
            return;
        };
        if !delay.is_finite() || delay < 0.0 {
            return;
        }

        // first valid line of a group wins
        if self.in_agent_group {
            self.agent_delay.get_or_insert(delay);
        } else {
            self.global_delay.get_or_insert(delay);
        }
    }
}

/// Parsed robots.txt data
///
/// Keeps the raw content and remembers whether the file could be fetched at
/// all. Rules are evaluated by the robotstxt crate's parser on each query.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content
    content: String,
    /// False when the file was missing or could not be fetched
    available: bool,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            available: true,
        }
    }

    /// Creates a ParsedRobots for an origin whose robots.txt is absent or
    /// unreachable; every URL on it is neutral.
    pub fn unavailable() -> Self {
        Self {
            content: String::new(),
            available: false,
        }
    }

    /// Returns false if no robots.txt could be obtained
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Returns the raw robots.txt content
    pub fn content(&self) -> &str {
        &self.content
    }

    fn collect<'a>(&self, user_agent: &'a str, path: &'a str) -> RuleCollector<'a> {
        let mut collector = RuleCollector::new(user_agent, path);
        parse_robotstxt(&self.content, &mut collector);
        collector
    }

    /// Checks a URL for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL or path to check (e.g., "/page.html")
    /// * `user_agent` - The robots.txt product token of the crawler
    ///
    /// # Returns
    ///
    /// The verdict of the best-matching rule, or [`RobotsVerdict::Neutral`]
    /// if no Allow/Disallow line matched.
    pub fn verdict(&self, url: &str, user_agent: &str) -> RobotsVerdict {
        if !self.available || self.content.trim().is_empty() {
            return RobotsVerdict::Neutral;
        }

        let path = get_path_params_query(url);
        self.collect(user_agent.trim(), &path).verdict()
    }

    /// Gets the crawl delay for a specific user agent
    ///
    /// A group naming the agent wins over the `*` group. Within a group the
    /// first valid Crawl-delay line is used.
    ///
    /// # Returns
    ///
    /// * `Some(f64)` - The crawl delay in seconds
    /// * `None` - If no crawl delay applies
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if !self.available {
            return None;
        }

        self.collect(user_agent.trim(), "/").crawl_delay()
    }
}
