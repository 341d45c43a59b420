use serde::{Deserialize, Serialize};

use crate::domain::student::StudentRecord;

const NAVIGATION_PREFIX: &str = "roster@";

/// Window into the roster ordered by public id. `limit: None` lists everyone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: Option<u64>,
}

impl PageRequest {
    /// A page size of zero selects the unpaginated listing.
    pub fn new(offset: u64, page_size: u32) -> Self {
        if page_size == 0 {
            return Self { offset: 0, limit: None };
        }
        Self { offset, limit: Some(u64::from(page_size)) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterPage {
    pub students: Vec<StudentRecord>,
    pub request: PageRequest,
    pub total: u64,
}

impl RosterPage {
    pub fn has_previous(&self) -> bool {
        self.request.limit.is_some() && self.request.offset > 0
    }

    pub fn has_next(&self) -> bool {
        self.request.limit.is_some()
            && self.request.offset + (self.students.len() as u64) < self.total
    }

    pub fn previous_offset(&self) -> Option<u64> {
        let limit = self.request.limit?;
        self.has_previous().then(|| self.request.offset.saturating_sub(limit))
    }

    pub fn next_offset(&self) -> Option<u64> {
        self.has_next().then(|| self.request.offset + self.students.len() as u64)
    }

    /// Students with their 1-based position in the full roster.
    pub fn numbered(&self) -> impl Iterator<Item = (u64, &StudentRecord)> + '_ {
        self.students
            .iter()
            .enumerate()
            .map(move |(index, student)| (self.request.offset + index as u64 + 1, student))
    }
}

pub fn navigation_token(offset: u64) -> String {
    format!("{NAVIGATION_PREFIX}{offset}")
}

pub fn parse_navigation_token(text: &str) -> Option<u64> {
    text.trim().strip_prefix(NAVIGATION_PREFIX)?.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::{navigation_token, parse_navigation_token, PageRequest, RosterPage};
    use crate::domain::identity::{Identity, PublicId};
    use crate::domain::student::StudentRecord;

    fn roster(count: usize) -> Vec<StudentRecord> {
        (1..=count)
            .map(|n| StudentRecord {
                identity: Identity(n as i64),
                given_name: format!("Given{n}"),
                family_name: format!("Family{n}"),
                public_id: PublicId::new(format!("4012{n:04}")),
            })
            .collect()
    }

    fn page(all: &[StudentRecord], offset: u64, page_size: u32) -> RosterPage {
        let request = PageRequest::new(offset, page_size);
        let start = request.offset as usize;
        let end = match request.limit {
            Some(limit) => (start + limit as usize).min(all.len()),
            None => all.len(),
        };
        RosterPage { students: all[start..end].to_vec(), request, total: all.len() as u64 }
    }

    #[test]
    fn twelve_students_paginate_into_three_pages_of_five() {
        let all = roster(12);

        let first = page(&all, 0, 5);
        assert_eq!(first.numbered().map(|(n, _)| n).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert!(!first.has_previous());
        assert_eq!(first.next_offset(), Some(5));

        let second = page(&all, 5, 5);
        assert_eq!(second.numbered().map(|(n, _)| n).collect::<Vec<_>>(), vec![6, 7, 8, 9, 10]);
        assert_eq!(second.previous_offset(), Some(0));
        assert_eq!(second.next_offset(), Some(10));

        let third = page(&all, 10, 5);
        assert_eq!(third.numbered().map(|(n, _)| n).collect::<Vec<_>>(), vec![11, 12]);
        assert_eq!(third.previous_offset(), Some(5));
        assert!(!third.has_next());
    }

    #[test]
    fn zero_page_size_lists_everyone_without_navigation() {
        let all = roster(12);
        let listing = page(&all, 5, 0);

        assert_eq!(listing.students.len(), 12);
        assert!(!listing.has_previous());
        assert!(!listing.has_next());
    }

    #[test]
    fn navigation_tokens_encode_offsets() {
        assert_eq!(navigation_token(10), "roster@10");
        assert_eq!(parse_navigation_token(" roster@10 "), Some(10));
        assert_eq!(parse_navigation_token("roster@"), None);
        assert_eq!(parse_navigation_token("roster@-1"), None);
        assert_eq!(parse_navigation_token("Student roster"), None);
    }
}
