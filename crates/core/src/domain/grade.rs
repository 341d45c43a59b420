use serde::{Deserialize, Serialize};

use crate::domain::identity::PublicId;

/// Line content that closes a bulk ingestion loop.
pub const END_SENTINEL: &str = "END";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeRecord {
    pub public_id: PublicId,
    pub course: String,
    pub value: String,
}

/// One `<public_id> <value>` pair taken from a pasted grade block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeLine {
    pub public_id: PublicId,
    pub value: String,
}

impl GradeLine {
    /// Accepts exactly two whitespace-separated tokens.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let (Some(public_id), Some(value), None) = (tokens.next(), tokens.next(), tokens.next())
        else {
            return None;
        };

        Some(Self { public_id: PublicId::new(public_id), value: value.to_owned() })
    }

    pub fn into_record(self, course: &str) -> GradeRecord {
        GradeRecord { public_id: self.public_id, course: course.to_owned(), value: self.value }
    }
}

/// Result of splitting one inbound message into grade lines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GradeBlock {
    pub lines: Vec<GradeLine>,
    pub finished: bool,
}

pub fn is_sentinel(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(END_SENTINEL)
}

/// Lines before the sentinel are kept; anything after it is ignored.
/// Blank and malformed lines are dropped.
pub fn parse_grade_block(text: &str) -> GradeBlock {
    let mut block = GradeBlock::default();

    for line in text.lines() {
        if is_sentinel(line) {
            block.finished = true;
            break;
        }
        if let Some(parsed) = GradeLine::parse(line) {
            block.lines.push(parsed);
        }
    }

    block
}
