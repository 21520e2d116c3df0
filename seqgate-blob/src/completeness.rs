use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::BlobError;

/// How much of a (possibly split) blob the client wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletenessOption {
    /// Properties only.
    None,
    /// Split info, plus every chunk when the blob is small.
    Slim,
    /// Split info, plus the chunks the target sequence needs when the blob is small.
    Smart,
    /// Split info and every chunk.
    Whole,
    /// The monolithic blob, even when a split representation exists.
    Original,
    /// Chunk sub-fetches: fetch own data, never expand.
    Unknown,
}

impl FromStr for CompletenessOption {
    type Err = BlobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(CompletenessOption::None),
            "slim" => Ok(CompletenessOption::Slim),
            "smart" => Ok(CompletenessOption::Smart),
            "whole" => Ok(CompletenessOption::Whole),
            "orig" | "original" => Ok(CompletenessOption::Original),
            _ => Err(BlobError::UnknownCompletenessOption(s.to_string())),
        }
    }
}

impl Display for CompletenessOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CompletenessOption::None => "none",
            CompletenessOption::Slim => "slim",
            CompletenessOption::Smart => "smart",
            CompletenessOption::Whole => "whole",
            CompletenessOption::Original => "orig",
            CompletenessOption::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// What to fetch once the blob properties are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plan {
    Nothing,
    FetchOriginalOnly,
    FetchInfoOnly,
    FetchInfoAndAllChunks,
    FetchInfoThenSmartSubset,
}

impl Plan {
    pub fn uses_split(&self) -> bool {
        matches!(
            self,
            Plan::FetchInfoOnly | Plan::FetchInfoAndAllChunks | Plan::FetchInfoThenSmartSubset
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompletenessPolicy {
    default_size_threshold: u64,
}

impl CompletenessPolicy {
    pub fn new(default_size_threshold: u64) -> Self {
        Self {
            default_size_threshold,
        }
    }

    /// The effective "send blob if small" threshold for one request.
    pub fn size_threshold(&self, request_override: Option<u64>) -> u64 {
        request_override
            .unwrap_or(0)
            .max(self.default_size_threshold)
    }

    pub fn decide(
        option: CompletenessOption,
        blob_size: u64,
        size_threshold: u64,
        has_split_info: bool,
    ) -> Plan {
        use CompletenessOption as C;

        match (option, has_split_info) {
            (C::None, _) => Plan::Nothing,
            (_, false) | (C::Original, true) | (C::Unknown, true) => Plan::FetchOriginalOnly,
            (C::Whole, true) => Plan::FetchInfoAndAllChunks,
            (C::Slim, true) if blob_size <= size_threshold => Plan::FetchInfoAndAllChunks,
            (C::Smart, true) if blob_size <= size_threshold => Plan::FetchInfoThenSmartSubset,
            (C::Slim, true) | (C::Smart, true) => Plan::FetchInfoOnly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CompletenessOption as C;

    #[test]
    fn decision_table() {
        let cases = [
            (C::None, 10, 100, true, Plan::Nothing),
            (C::None, 10, 100, false, Plan::Nothing),
            (C::Original, 10, 100, true, Plan::FetchOriginalOnly),
            (C::Original, 10, 100, false, Plan::FetchOriginalOnly),
            (C::Whole, 10_000, 100, true, Plan::FetchInfoAndAllChunks),
            (C::Whole, 10, 100, false, Plan::FetchOriginalOnly),
            (C::Slim, 100, 100, true, Plan::FetchInfoAndAllChunks),
            (C::Slim, 500, 100, true, Plan::FetchInfoOnly),
            (C::Slim, 500, 100, false, Plan::FetchOriginalOnly),
            (C::Smart, 50, 100, true, Plan::FetchInfoThenSmartSubset),
            (C::Smart, 101, 100, true, Plan::FetchInfoOnly),
            (C::Smart, 50, 100, false, Plan::FetchOriginalOnly),
            (C::Unknown, 50, 100, true, Plan::FetchOriginalOnly),
            (C::Unknown, 50, 100, false, Plan::FetchOriginalOnly),
        ];
        for (option, size, threshold, split, expected) in cases {
            assert_eq!(
                CompletenessPolicy::decide(option, size, threshold, split),
                expected,
                "{option} size={size} threshold={threshold} split={split}"
            );
        }
    }

    #[test]
    fn decide_is_deterministic() {
        let options = [C::None, C::Slim, C::Smart, C::Whole, C::Original, C::Unknown];
        for option in options {
            for size in [0u64, 99, 100, 101, u64::MAX] {
                for split in [true, false] {
                    let first = CompletenessPolicy::decide(option, size, 100, split);
                    let second = CompletenessPolicy::decide(option, size, 100, split);
                    assert_eq!(first, second);
                }
            }
        }
    }

    #[test]
    fn threshold_is_max_of_default_and_override() {
        let policy = CompletenessPolicy::new(100);
        assert_eq!(policy.size_threshold(None), 100);
        assert_eq!(policy.size_threshold(Some(50)), 100);
        assert_eq!(policy.size_threshold(Some(5000)), 5000);
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!("orig".parse::<C>().unwrap(), C::Original);
        assert_eq!("SMART".parse::<C>().unwrap(), C::Smart);
        assert!("unknown".parse::<C>().is_err());
        assert!("everything".parse::<C>().is_err());
    }
}
