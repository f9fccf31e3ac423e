// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Multicast pattern matching: turns a subscribed multicast id containing
//! single-level (`+`) and multi-level (`*`) wildcards into a compiled
//! regular expression, the same translation MQTT topic filters get.

use regex::Regex;

use crate::error::{Error, ErrorKind};

/// A compiled multicast subscription pattern.
pub struct MulticastMatcher {
    pattern: String,
    regex: Regex,
}

impl MulticastMatcher {
    /// Compile `pattern`, a slash-separated multicast id where a segment
    /// of exactly `+` matches one level and a trailing `*` matches any
    /// number of remaining levels.
    pub fn compile(pattern: &str) -> Result<Self, Error> {
        let mut regex_src = String::with_capacity(pattern.len() * 2);
        regex_src.push('^');
        let segments: Vec<&str> = pattern.split('/').collect();
        for (index, segment) in segments.iter().enumerate() {
            match *segment {
                "+" => {
                    if index > 0 {
                        regex_src.push('/');
                    }
                    regex_src.push_str("[^/]+");
                }
                "*" => {
                    if index != segments.len() - 1 {
                        return Err(Error::new(
                            ErrorKind::Application("InvalidMulticastPattern".to_string()),
                            "'*' is only valid as the last segment",
                        ));
                    }
                    // The slash before a trailing wildcard is itself optional,
                    // so the bare prefix (one level up from this segment) matches too.
                    regex_src.push_str("(/[^/]+)*");
                }
                literal => {
                    if index > 0 {
                        regex_src.push('/');
                    }
                    regex_src.push_str(&regex::escape(literal));
                }
            }
        }
        regex_src.push('$');
        let regex = Regex::new(&regex_src)
            .map_err(|err| Error::from_string(ErrorKind::Runtime, format!("{err}")))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn is_match(&self, multicast_id: &str) -> bool {
        self.regex.is_match(multicast_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pattern_matches_only_itself() {
        let matcher = MulticastMatcher::compile("p1/news").unwrap();
        assert!(matcher.is_match("p1/news"));
        assert!(!matcher.is_match("p1/news/sports"));
    }

    #[test]
    fn single_level_wildcard_matches_one_segment() {
        let matcher = MulticastMatcher::compile("p1/news/+").unwrap();
        assert!(matcher.is_match("p1/news/sports"));
        assert!(!matcher.is_match("p1/news"));
        assert!(!matcher.is_match("p1/news/sports/extra"));
    }

    #[test]
    fn trailing_wildcard_matches_any_depth() {
        let matcher = MulticastMatcher::compile("p1/news/*").unwrap();
        assert!(matcher.is_match("p1/news"));
        assert!(matcher.is_match("p1/news/sports"));
        assert!(matcher.is_match("p1/news/sports/extra"));
        assert!(!matcher.is_match("p1/weather"));
    }

    #[test]
    fn interior_wildcard_is_rejected() {
        assert!(MulticastMatcher::compile("p1/*/sports").is_err());
    }
}
