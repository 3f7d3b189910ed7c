//! Document-number codec.
//!
//! A document number is `{PREFIX}-{sequence}` (e.g. `WR-051`). The prefix
//! names the entity type through a fixed table and the sequence is the
//! entity id. Decoding never fails loudly: anything malformed yields `None`
//! and the caller renders a non-navigable label instead of a link.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::NodeType;

/// Entity types addressable by a document number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefType {
    WorkRequest,
    TechTask,
    TestScenario,
    Defect,
    Deployment,
    MeetingNote,
    ProjectIdea,
    KnowledgeBase,
}

const PREFIXES: [(&str, RefType); 8] = [
    ("WR", RefType::WorkRequest),
    ("TK", RefType::TechTask),
    ("TS", RefType::TestScenario),
    ("DF", RefType::Defect),
    ("DP", RefType::Deployment),
    ("MN", RefType::MeetingNote),
    ("ID", RefType::ProjectIdea),
    ("KB", RefType::KnowledgeBase),
];

impl RefType {
    pub const ALL: [RefType; 8] = [
        RefType::WorkRequest,
        RefType::TechTask,
        RefType::TestScenario,
        RefType::Defect,
        RefType::Deployment,
        RefType::MeetingNote,
        RefType::ProjectIdea,
        RefType::KnowledgeBase,
    ];

    /// Document-number prefix (`WR`, `TK`, ...).
    pub fn prefix(self) -> &'static str {
        PREFIXES
            .iter()
            .find(|(_, t)| *t == self)
            .map(|(p, _)| *p)
            .unwrap_or_default()
    }

    /// Look up a prefix. Case-sensitive; callers uppercase first.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        PREFIXES
            .iter()
            .find(|(p, _)| *p == prefix)
            .map(|(_, t)| *t)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RefType::WorkRequest => "WORK_REQUEST",
            RefType::TechTask => "TECH_TASK",
            RefType::TestScenario => "TEST_SCENARIO",
            RefType::Defect => "DEFECT",
            RefType::Deployment => "DEPLOYMENT",
            RefType::MeetingNote => "MEETING_NOTE",
            RefType::ProjectIdea => "PROJECT_IDEA",
            RefType::KnowledgeBase => "KNOWLEDGE_BASE",
        }
    }

    /// The graph node type for this reference, if it can appear on a canvas.
    pub fn node_type(self) -> Option<NodeType> {
        match self {
            RefType::WorkRequest => Some(NodeType::WorkRequest),
            RefType::TechTask => Some(NodeType::TechTask),
            RefType::TestScenario => Some(NodeType::TestScenario),
            RefType::Defect => Some(NodeType::Defect),
            RefType::Deployment => Some(NodeType::Deployment),
            RefType::KnowledgeBase => Some(NodeType::KnowledgeBase),
            RefType::MeetingNote | RefType::ProjectIdea => None,
        }
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        RefType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AppError::Validation(format!("Unknown reference type: {}", s)))
    }
}

/// A decoded document number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedRef {
    pub ref_type: RefType,
    pub ref_id: i64,
}

/// A link from one entity to another, as sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentReference {
    pub ref_type: RefType,
    pub ref_id: i64,
    /// 1-based position in the submitted list.
    pub sort_order: u32,
}

/// Decode a document number such as `WR-051`.
///
/// Returns `None` for unknown prefixes, missing separators, and suffixes
/// that are not a positive integer.
pub fn decode(doc_no: &str) -> Option<DecodedRef> {
    let (prefix, sequence) = doc_no.trim().split_once('-')?;
    let ref_type = RefType::from_prefix(&prefix.to_ascii_uppercase())?;

    if sequence.is_empty() || !sequence.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let ref_id: i64 = sequence.parse().ok()?;

    (ref_id > 0).then_some(DecodedRef { ref_type, ref_id })
}

/// Encode a reference as a document number, zero-padded to three digits.
pub fn encode(ref_type: RefType, ref_id: i64) -> String {
    format!("{}-{:03}", ref_type.prefix(), ref_id)
}

/// Turn a list of document numbers into a backend reference payload.
///
/// Undecodable entries are dropped, duplicates keep their first occurrence,
/// and `sort_order` counts the surviving entries from 1.
pub fn to_reference_payload<I, S>(doc_nos: I) -> Vec<DocumentReference>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    doc_nos
        .into_iter()
        .filter_map(|doc_no| decode(doc_no.as_ref()))
        .filter(|decoded| seen.insert(*decoded))
        .zip(1u32..)
        .map(|(decoded, sort_order)| DocumentReference {
            ref_type: decoded.ref_type,
            ref_id: decoded.ref_id,
            sort_order,
        })
        .collect()
}

/// Detail route for a document number, or `None` when it is not navigable.
pub fn route_for_doc_no(doc_no: &str) -> Option<String> {
    let decoded = decode(doc_no)?;
    decoded
        .ref_type
        .node_type()
        .map(|t| t.detail_route(decoded.ref_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_prefixes() {
        for ref_type in RefType::ALL {
            for id in [1, 7, 51, 999, 1000, 123_456] {
                let doc_no = encode(ref_type, id);
                assert_eq!(
                    decode(&doc_no),
                    Some(DecodedRef {
                        ref_type,
                        ref_id: id
                    }),
                    "round trip failed for {}",
                    doc_no
                );
            }
        }
    }

    #[test]
    fn test_encode_pads_to_three_digits() {
        assert_eq!(encode(RefType::WorkRequest, 51), "WR-051");
        assert_eq!(encode(RefType::TechTask, 1234), "TK-1234");
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        for input in ["XX-5", "WR-abc", "WR5", "", "-5", "WR-", "WR-0", "WR--5", "WR-+5", "WR-5x"] {
            assert_eq!(decode(input), None, "expected None for {:?}", input);
        }
    }

    #[test]
    fn test_decode_is_case_insensitive_on_prefix() {
        assert_eq!(
            decode(" wr-051 "),
            Some(DecodedRef {
                ref_type: RefType::WorkRequest,
                ref_id: 51
            })
        );
    }

    #[test]
    fn test_decode_overflow_is_none() {
        assert_eq!(decode("TK-99999999999999999999"), None);
    }

    #[test]
    fn test_payload_dedupes_in_first_seen_order() {
        let payload = to_reference_payload(["WR-1", "WR-1", "TK-2"]);
        assert_eq!(
            payload,
            vec![
                DocumentReference {
                    ref_type: RefType::WorkRequest,
                    ref_id: 1,
                    sort_order: 1
                },
                DocumentReference {
                    ref_type: RefType::TechTask,
                    ref_id: 2,
                    sort_order: 2
                },
            ]
        );
    }

    #[test]
    fn test_payload_drops_undecodable_before_numbering() {
        let payload = to_reference_payload(vec!["junk", "KB-3", "WR-001", "wr-1"]);
        let orders: Vec<_> = payload.iter().map(|r| (r.ref_type, r.sort_order)).collect();
        assert_eq!(
            orders,
            vec![(RefType::KnowledgeBase, 1), (RefType::WorkRequest, 2)]
        );
    }

    #[test]
    fn test_route_for_doc_no() {
        assert_eq!(route_for_doc_no("DF-12").as_deref(), Some("/defects/12"));
        assert_eq!(route_for_doc_no("MN-4"), None);
        assert_eq!(route_for_doc_no("nope"), None);
    }

    #[test]
    fn test_payload_wire_shape() {
        let json = serde_json::to_value(to_reference_payload(["ID-9"])).unwrap();
        assert_eq!(json[0]["refType"], "PROJECT_IDEA");
        assert_eq!(json[0]["refId"], 9);
        assert_eq!(json[0]["sortOrder"], 1);
    }
}
