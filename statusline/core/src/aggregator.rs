//! Output Aggregator
//!
//! Merges one cycle's module snapshot (and any blocks received from upstream)
//! into the ordered array written to the host.
//!
//! # Ordering
//!
//! [`OrderPolicy::Prepend`] reproduces the classic wrapper behaviour of
//! inserting each module's block at index 0 as the modules are visited in
//! registration order. The last registered non-empty module therefore comes
//! first: modules `A, B, C` render as `[C, B, A, upstream...]`.
//!
//! [`OrderPolicy::Append`] pushes each block to the end instead:
//! `[upstream..., A, B, C]`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::fragment::Fragment;

/// Where each module block is placed in the output array
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderPolicy {
    /// Insert at the front, one module after another
    #[default]
    Prepend,
    /// Push to the end in registration order
    Append,
}

impl FromStr for OrderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prepend" => Ok(Self::Prepend),
            "append" => Ok(Self::Append),
            other => Err(format!(
                "unknown order policy '{other}' (expected 'prepend' or 'append')"
            )),
        }
    }
}

/// One element of the output array
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Block {
    /// Rendered by one of our modules
    Fragment(Fragment),
    /// Passed through unchanged from the input line
    Upstream(serde_json::Value),
}

impl Block {
    /// The block's `full_text`, if it has one
    #[must_use]
    pub fn full_text(&self) -> Option<&str> {
        match self {
            Self::Fragment(f) => Some(&f.full_text),
            Self::Upstream(v) => v.get("full_text").and_then(serde_json::Value::as_str),
        }
    }
}

/// Builds the per-cycle output array
#[derive(Clone, Copy, Debug, Default)]
pub struct OutputAggregator {
    order: OrderPolicy,
}

impl OutputAggregator {
    /// Create an aggregator with the given ordering
    #[must_use]
    pub fn new(order: OrderPolicy) -> Self {
        Self { order }
    }

    /// The ordering in effect
    #[must_use]
    pub fn order(&self) -> OrderPolicy {
        self.order
    }

    /// Merge a registry snapshot with upstream blocks
    ///
    /// `None` entries are omitted. An all-empty cycle with no upstream blocks
    /// yields an empty array.
    #[must_use]
    pub fn aggregate(
        &self,
        snapshot: Vec<Option<Fragment>>,
        upstream: Vec<serde_json::Value>,
    ) -> Vec<Block> {
        let fragments = snapshot.into_iter().flatten().map(Block::Fragment);
        let upstream = upstream.into_iter().map(Block::Upstream);

        match self.order {
            // Inserting each at 0 in turn leaves them reversed ahead of upstream
            OrderPolicy::Prepend => {
                let mut blocks: Vec<Block> = fragments.collect();
                blocks.reverse();
                blocks.extend(upstream);
                blocks
            }
            OrderPolicy::Append => upstream.chain(fragments).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn snapshot(texts: &[Option<&str>]) -> Vec<Option<Fragment>> {
        texts.iter().map(|t| t.map(Fragment::new)).collect()
    }

    fn texts(blocks: &[Block]) -> Vec<&str> {
        blocks.iter().filter_map(Block::full_text).collect()
    }

    #[test]
    fn test_prepend_reverses_registration_order() {
        let aggregator = OutputAggregator::new(OrderPolicy::Prepend);
        let blocks = aggregator.aggregate(snapshot(&[Some("A"), Some("B"), Some("C")]), vec![]);
        assert_eq!(texts(&blocks), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_append_keeps_registration_order() {
        let aggregator = OutputAggregator::new(OrderPolicy::Append);
        let blocks = aggregator.aggregate(snapshot(&[Some("A"), Some("B"), Some("C")]), vec![]);
        assert_eq!(texts(&blocks), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_empty_fragments_are_omitted() {
        let aggregator = OutputAggregator::default();
        assert_eq!(aggregator.order(), OrderPolicy::Prepend);
        let blocks = aggregator.aggregate(snapshot(&[Some("A"), None, Some("C"), None]), vec![]);
        assert_eq!(texts(&blocks), vec!["C", "A"]);

        let empty = aggregator.aggregate(snapshot(&[None, None]), vec![]);
        assert!(empty.is_empty());
        assert_eq!(serde_json::to_string(&empty).unwrap(), "[]");
    }

    #[test]
    fn test_upstream_placement() {
        let upstream = vec![
            json!({"full_text": "disk 40G", "name": "disk_info"}),
            json!({"full_text": "W: up"}),
        ];

        let prepend = OutputAggregator::new(OrderPolicy::Prepend)
            .aggregate(snapshot(&[Some("A"), Some("B")]), upstream.clone());
        assert_eq!(texts(&prepend), vec!["B", "A", "disk 40G", "W: up"]);

        let append = OutputAggregator::new(OrderPolicy::Append)
            .aggregate(snapshot(&[Some("A"), Some("B")]), upstream);
        assert_eq!(texts(&append), vec!["disk 40G", "W: up", "A", "B"]);
    }

    #[test]
    fn test_upstream_blocks_serialize_unchanged() {
        let raw = json!({"full_text": "E: down", "color": "#ff0000", "markup": "none"});
        let blocks = OutputAggregator::default().aggregate(
            snapshot(&[Some("mine")]),
            vec![raw.clone()],
        );
        let value = serde_json::to_value(&blocks).unwrap();
        assert_eq!(value, json!([{"full_text": "mine"}, raw]));
    }

    #[test]
    fn test_order_policy_from_str() {
        assert_eq!("append".parse::<OrderPolicy>(), Ok(OrderPolicy::Append));
        assert_eq!("PREPEND".parse::<OrderPolicy>(), Ok(OrderPolicy::Prepend));
        assert!("sorted".parse::<OrderPolicy>().is_err());
    }
}
