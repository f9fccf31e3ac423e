// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Broadcast filters: provider-supplied predicates evaluated against a
//! broadcast's parameters before it is published to a given subscriber.

use std::collections::HashMap;

/// A single filter parameter constraint, keyed by filter parameter name.
pub type FilterParameters = HashMap<String, String>;

/// Evaluates `parameters` (the broadcast's actual values, by name)
/// against `filter_parameters` (the subscriber's requested constraints).
///
/// The only comparison this messaging core itself implements is exact
/// match; richer predicates are provider-defined and arrive pre-evaluated
/// as `true`/`false` strings under reserved parameter names, matching how
/// generated broadcast filters are invoked in the wider system.
#[must_use]
pub fn matches(parameters: &FilterParameters, filter_parameters: &FilterParameters) -> bool {
    filter_parameters
        .iter()
        .all(|(name, expected)| parameters.get(name).is_some_and(|actual| actual == expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_always_matches() {
        let params = FilterParameters::new();
        assert!(matches(&params, &FilterParameters::new()));
    }

    #[test]
    fn unmet_constraint_fails_the_match() {
        let mut params = FilterParameters::new();
        params.insert("city".to_string(), "Munich".to_string());
        let mut filter = FilterParameters::new();
        filter.insert("city".to_string(), "Berlin".to_string());
        assert!(!matches(&params, &filter));
    }
}
